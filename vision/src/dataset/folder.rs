use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{Result, VisionErr};

/// File extensions accepted as images, both by the dataset scan and by the
/// upload validation of the serving side.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// Returns whether `name` carries one of the accepted image extensions,
/// case-insensitively. Names without a dot never match.
pub fn has_image_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|&allowed| allowed == ext)
        }
        _ => false,
    }
}

/// A labeled image directory: exactly two class subdirectories whose sorted
/// names binary-encode the labels 0 and 1.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    samples: Vec<(PathBuf, f32)>,
    classes: Vec<String>,
}

impl ImageFolder {
    /// Scans `root` for the two class directories and their image files.
    ///
    /// # Errors
    /// * `ClassLayout` when `root` does not contain exactly two
    ///   subdirectories.
    /// * `EmptyClass` when a class directory holds no image files.
    pub fn open(root: &Path) -> Result<Self> {
        let mut class_dirs: Vec<PathBuf> = fs::read_dir(root)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        class_dirs.sort();

        if class_dirs.len() != 2 {
            return Err(VisionErr::ClassLayout {
                path: root.to_path_buf(),
                found: class_dirs.len(),
            });
        }

        let mut samples = Vec::new();
        let mut classes = Vec::new();

        for (label, dir) in class_dirs.iter().enumerate() {
            let mut files: Vec<PathBuf> = fs::read_dir(dir)?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path
                            .file_name()
                            .map(|name| has_image_extension(&name.to_string_lossy()))
                            .unwrap_or(false)
                })
                .collect();
            files.sort();

            if files.is_empty() {
                return Err(VisionErr::EmptyClass {
                    path: dir.clone(),
                });
            }

            classes.push(
                dir.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            samples.extend(files.into_iter().map(|path| (path, label as f32)));
        }

        Ok(Self { samples, classes })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Class names in label order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// All `(path, label)` samples in deterministic scan order.
    pub fn samples(&self) -> &[(PathBuf, f32)] {
        &self.samples
    }
}
