use std::fmt;

use image::imageops::FilterType;
use ndarray::{Array3, Array4};

use crate::Result;

/// Image extent every sample is resized to before entering the network,
/// as `(height, width)`.
pub const TARGET_SIZE: (u32, u32) = (128, 128);

/// Decodes an encoded image, resizes it to `size` with nearest-neighbor
/// sampling and rescales the RGB bytes into `[0, 1]`.
pub fn decode_rgb(bytes: &[u8], size: (u32, u32)) -> Result<Array3<f32>> {
    let img = image::load_from_memory(bytes)?
        .resize_exact(size.1, size.0, FilterType::Nearest)
        .to_rgb8();

    let (w, h) = img.dimensions();
    let raw = img.into_raw();
    let pixels = Array3::from_shape_vec((h as usize, w as usize, 3), raw).unwrap();
    Ok(pixels.mapv(|v| v as f32 / 255.0))
}

/// Full request-time preprocessing: decode, resize to [`TARGET_SIZE`],
/// normalize and add the batch dimension.
pub fn preprocess(bytes: &[u8]) -> Result<Array4<f32>> {
    let img = decode_rgb(bytes, TARGET_SIZE)?;
    let (h, w, c) = img.dim();
    Ok(img.into_shape_with_order((1, h, w, c)).unwrap())
}

/// The two classes the network distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Cat,
    Dog,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Cat => write!(f, "Cat"),
            Label::Dog => write!(f, "Dog"),
        }
    }
}

/// A classified sample: the label and the certainty in it, as a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f32,
}

impl Prediction {
    /// Maps a raw sigmoid score to a labeled prediction: scores above one
    /// half read as Dog with confidence `score * 100`, the rest as Cat with
    /// confidence `(1 - score) * 100`.
    pub fn from_score(score: f32) -> Self {
        if score > 0.5 {
            Self {
                label: Label::Dog,
                confidence: score * 100.0,
            }
        } else {
            Self {
                label: Label::Cat,
                confidence: (1.0 - score) * 100.0,
            }
        }
    }
}
