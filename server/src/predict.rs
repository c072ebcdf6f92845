use std::{path::Path, sync::Mutex};

use ndarray::Array4;

use crate::error::PredictErr;
use vision::{
    VisionErr,
    arch::{Phase, Sequential},
    checkpoint,
    inference::{Prediction, preprocess},
};

/// Anything that maps a preprocessed image batch to a raw sigmoid score.
///
/// The handler depends on this seam instead of a concrete model, so tests
/// inject stub scorers and the production path injects [`CnnScorer`].
pub trait Scorer: Send + Sync {
    fn score(&self, batch: Array4<f32>) -> Result<f32, PredictErr>;
}

/// The persisted convolutional model behind a lock: the weights are
/// immutable after load, but a forward pass caches activations and needs
/// exclusive access.
pub struct CnnScorer {
    model: Mutex<Sequential>,
}

impl CnnScorer {
    /// Reads the checkpoint once; called at service startup only.
    pub fn load(path: &Path) -> vision::Result<Self> {
        Ok(Self {
            model: Mutex::new(checkpoint::load_cat_dog(path)?),
        })
    }
}

impl Scorer for CnnScorer {
    fn score(&self, batch: Array4<f32>) -> Result<f32, PredictErr> {
        let mut model = self.model.lock().map_err(|_| PredictErr::Poisoned)?;
        let out = model
            .forward(batch, Phase::Eval)
            .map_err(PredictErr::Inference)?;
        out.first().copied().ok_or(PredictErr::Inference(
            VisionErr::ShapeMismatch {
                what: "model output",
                got: 0,
                expected: 1,
            },
        ))
    }
}

/// Preprocesses uploaded bytes and scores them through `scorer`.
pub fn classify(scorer: &dyn Scorer, bytes: &[u8]) -> Result<Prediction, PredictErr> {
    let batch = preprocess(bytes).map_err(|e| match e {
        e @ VisionErr::Image(_) => PredictErr::Decode(e),
        other => PredictErr::Inference(other),
    })?;

    let score = scorer.score(batch)?;
    Ok(Prediction::from_score(score))
}

#[cfg(test)]
mod tests {
    use vision::inference::Label;

    use super::*;

    struct Fixed(f32);

    impl Scorer for Fixed {
        fn score(&self, _: Array4<f32>) -> Result<f32, PredictErr> {
            Ok(self.0)
        }
    }

    fn tiny_png() -> Vec<u8> {
        // Smallest valid 1x1 PNG, enough to exercise the decode path.
        let mut buf = Vec::new();
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([1, 2, 3]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn classify_applies_the_decision_rule() {
        let p = classify(&Fixed(0.87), &tiny_png()).unwrap();
        assert_eq!(p.label, Label::Dog);
        assert!((p.confidence - 87.0).abs() < 1e-4);

        let p = classify(&Fixed(0.10), &tiny_png()).unwrap();
        assert_eq!(p.label, Label::Cat);
        assert!((p.confidence - 90.0).abs() < 1e-4);
    }

    #[test]
    fn undecodable_bytes_surface_as_decode_errors() {
        let err = classify(&Fixed(0.5), b"definitely not an image").unwrap_err();
        assert!(matches!(err, PredictErr::Decode(_)));
        assert_eq!(err.label(), "Error");
    }
}
