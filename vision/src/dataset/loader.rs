use std::fs;

use ndarray::{Array2, Array4, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;

use super::ImageFolder;
use crate::{Result, VisionErr, augment::Augment, inference::decode_rgb};

/// One decoded mini-batch: NHWC images and `(n, 1)` binary labels.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Array4<f32>,
    pub labels: Array2<f32>,
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Streams an [`ImageFolder`] as batches, decoding images on the fly.
///
/// Files are read and decoded in parallel, then augmented sequentially with
/// the loader's seeded RNG so a fixed seed reproduces the exact batch
/// stream. The final short batch is yielded, not dropped.
#[derive(Debug)]
pub struct BatchLoader {
    folder: ImageFolder,
    size: (u32, u32),
    batch_size: usize,
    augment: Option<Augment>,
    shuffle: bool,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
}

impl BatchLoader {
    /// Creates a loader over `folder`.
    ///
    /// # Arguments
    /// * `size` - Target image extent `(height, width)`.
    /// * `batch_size` - Samples per batch; the tail batch may be shorter.
    /// * `augment` - Per-image augmentation, train split only.
    /// * `shuffle` - Reshuffle the sample order on every [`reset`].
    /// * `seed` - Seed for both shuffling and augmentation sampling.
    ///
    /// [`reset`]: BatchLoader::reset
    pub fn new(
        folder: ImageFolder,
        size: (u32, u32),
        batch_size: usize,
        augment: Option<Augment>,
        shuffle: bool,
        seed: u64,
    ) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");

        let order: Vec<usize> = (0..folder.len()).collect();
        let mut loader = Self {
            folder,
            size,
            batch_size,
            augment,
            shuffle,
            order,
            cursor: 0,
            rng: StdRng::seed_from_u64(seed),
        };
        loader.reset();
        loader
    }

    /// Rewinds to the first batch, reshuffling when shuffling is on.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn num_batches(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    /// Returns the next decoded batch, or `None` when the epoch is
    /// exhausted.
    pub fn next_batch(&mut self) -> Option<Result<Batch>> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let idxs: Vec<usize> = self.order[self.cursor..end].to_vec();
        self.cursor = end;

        Some(self.load(&idxs))
    }

    fn load(&mut self, idxs: &[usize]) -> Result<Batch> {
        let size = self.size;
        let samples = self.folder.samples();

        let decoded = idxs
            .par_iter()
            .map(|&i| {
                let (path, _) = &samples[i];
                let bytes = fs::read(path).map_err(VisionErr::Io)?;
                decode_rgb(&bytes, size)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut images = Array4::zeros((idxs.len(), size.0 as usize, size.1 as usize, 3));
        let mut labels = Array2::zeros((idxs.len(), 1));

        for (row, (&i, img)) in idxs.iter().zip(decoded).enumerate() {
            let img = match &self.augment {
                Some(augment) => augment.apply(&img, &mut self.rng),
                None => img,
            };
            images.index_axis_mut(Axis(0), row).assign(&img);
            labels[[row, 0]] = samples[i].1;
        }

        Ok(Batch { images, labels })
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use image::{Rgb, RgbImage};

    use super::*;

    /// Builds a two-class directory tree of solid-color images under a
    /// unique temp root and returns it.
    fn seeded_folder(tag: &str, per_class: usize) -> PathBuf {
        let root = std::env::temp_dir().join(format!("vision-loader-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);

        for (class, level) in [("cats", 60u8), ("dogs", 200u8)] {
            let dir = root.join(class);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..per_class {
                let img = RgbImage::from_pixel(10, 10, Rgb([level, level, level]));
                img.save(dir.join(format!("{class}{i}.png"))).unwrap();
            }
        }

        root
    }

    #[test]
    fn folder_scan_orders_classes_alphabetically() {
        let root = seeded_folder("scan", 3);
        let folder = ImageFolder::open(&root).unwrap();

        assert_eq!(folder.len(), 6);
        assert_eq!(folder.classes(), ["cats", "dogs"]);
        assert!(folder.samples().iter().take(3).all(|(_, label)| *label == 0.0));
        assert!(folder.samples().iter().skip(3).all(|(_, label)| *label == 1.0));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn batches_cover_the_epoch_with_a_short_tail() {
        let root = seeded_folder("tail", 4);
        let folder = ImageFolder::open(&root).unwrap();
        let mut loader = BatchLoader::new(folder, (12, 12), 3, None, false, 0);

        assert_eq!(loader.num_batches(), 3);
        let sizes: Vec<usize> = std::iter::from_fn(|| loader.next_batch())
            .map(|batch| batch.unwrap().len())
            .collect();
        assert_eq!(sizes, [3, 3, 2]);
        assert!(loader.next_batch().is_none());

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn batch_tensors_have_training_shape_and_range() {
        let root = seeded_folder("shape", 2);
        let folder = ImageFolder::open(&root).unwrap();
        let mut loader = BatchLoader::new(folder, (16, 16), 4, Some(Augment::default()), true, 7);

        let batch = loader.next_batch().unwrap().unwrap();
        assert_eq!(batch.images.dim(), (4, 16, 16, 3));
        assert_eq!(batch.labels.dim(), (4, 1));
        assert!(batch.images.iter().all(|v| (0.0..=1.0).contains(v)));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn fixed_seed_reproduces_the_shuffle() {
        let root = seeded_folder("seed", 5);

        let labels = |seed: u64| -> Vec<u8> {
            let mut loader =
                BatchLoader::new(ImageFolder::open(&root).unwrap(), (8, 8), 10, None, true, seed);
            let batch = loader.next_batch().unwrap().unwrap();
            batch.labels.iter().map(|&l| l as u8).collect()
        };

        assert_eq!(labels(3), labels(3));

        fs::remove_dir_all(&root).unwrap();
    }
}
