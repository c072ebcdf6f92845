use ndarray::Array3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Randomized affine augmentation applied to training images only.
///
/// Each field bounds a transform sampled uniformly per image; the sampled
/// rotation, shift, shear and zoom are composed into a single affine map
/// applied by inverse mapping with nearest-edge fill, so augmented pixels
/// stay within the input value range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Augment {
    /// Maximum absolute rotation, in degrees.
    pub rotation: f32,
    /// Maximum horizontal shift, as a fraction of the width.
    pub width_shift: f32,
    /// Maximum vertical shift, as a fraction of the height.
    pub height_shift: f32,
    /// Maximum absolute shear angle, in degrees.
    pub shear: f32,
    /// Maximum zoom deviation; axes scale independently in `1 +/- zoom`.
    pub zoom: f32,
    /// Mirror horizontally with probability one half.
    pub horizontal_flip: bool,
}

impl Default for Augment {
    fn default() -> Self {
        Self {
            rotation: 40.0,
            width_shift: 0.2,
            height_shift: 0.2,
            shear: 0.2,
            zoom: 0.2,
            horizontal_flip: true,
        }
    }
}

impl Augment {
    /// A configuration under which `apply` returns the image unchanged.
    pub fn identity() -> Self {
        Self {
            rotation: 0.0,
            width_shift: 0.0,
            height_shift: 0.0,
            shear: 0.0,
            zoom: 0.0,
            horizontal_flip: false,
        }
    }

    /// Applies one freshly sampled transform to an `(h, w, c)` image.
    pub fn apply<R: Rng>(&self, img: &Array3<f32>, rng: &mut R) -> Array3<f32> {
        let (h, w, c) = img.dim();

        let theta = sample(rng, self.rotation).to_radians();
        let shear = sample(rng, self.shear).to_radians();
        let shift_r = sample(rng, self.height_shift) * h as f32;
        let shift_c = sample(rng, self.width_shift) * w as f32;
        let zoom_r = 1.0 + sample(rng, self.zoom);
        let zoom_c = 1.0 + sample(rng, self.zoom);
        let flip = self.horizontal_flip && rng.gen_bool(0.5);

        // rotation * shear * zoom, in row/column coordinates.
        let (sin, cos) = theta.sin_cos();
        let (sin_s, cos_s) = shear.sin_cos();
        let m00 = cos * zoom_r;
        let m01 = -(cos * sin_s + sin * cos_s) * zoom_c;
        let m10 = sin * zoom_r;
        let m11 = (cos * cos_s - sin * sin_s) * zoom_c;

        let det = m00 * m11 - m01 * m10;
        if det.abs() < 1e-6 {
            return img.clone();
        }
        let inv = [m11 / det, -m01 / det, -m10 / det, m00 / det];

        let (center_r, center_c) = ((h as f32 - 1.0) / 2.0, (w as f32 - 1.0) / 2.0);
        let mut out = Array3::zeros((h, w, c));

        for r in 0..h {
            for col in 0..w {
                let dr = r as f32 - center_r - shift_r;
                let dc = col as f32 - center_c - shift_c;
                let src_r = inv[0] * dr + inv[1] * dc + center_r;
                let src_c = inv[2] * dr + inv[3] * dc + center_c;

                // Nearest-neighbor sample, edge pixels fill the outside.
                let sr = src_r.round().clamp(0.0, (h - 1) as f32) as usize;
                let mut sc = src_c.round().clamp(0.0, (w - 1) as f32) as usize;
                if flip {
                    sc = w - 1 - sc;
                }

                for ch in 0..c {
                    out[[r, col, ch]] = img[[sr, sc, ch]];
                }
            }
        }

        out
    }
}

fn sample<R: Rng>(rng: &mut R, bound: f32) -> f32 {
    if bound > 0.0 {
        rng.gen_range(-bound..=bound)
    } else {
        0.0
    }
}
