use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Result, VisionErr, arch::Phase};

/// Inverted dropout on flattened features: kept units are scaled by
/// `1 / (1 - rate)` during training so Eval-phase forwards are the identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f32,
    rng: StdRng,

    // Forward metadata, valid after a Train-phase forward.
    mask: Array2<f32>,
}

impl Dropout {
    pub fn new(rate: f32, seed: u64) -> Self {
        Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
            mask: Array2::zeros((1, 1)),
        }
    }

    pub fn forward(&mut self, x: Array2<f32>, phase: Phase) -> Result<Array2<f32>> {
        if phase == Phase::Eval || self.rate <= 0.0 {
            return Ok(x);
        }

        let keep = 1.0 - self.rate;
        let scale = 1.0 / keep;
        let mask = Array2::from_shape_fn(x.raw_dim(), |_| {
            if self.rng.gen_bool(keep as f64) {
                scale
            } else {
                0.0
            }
        });
        let out = &x * &mask;
        self.mask = mask;
        Ok(out)
    }

    /// Backward pass; assumes the last forward ran in the Train phase.
    pub fn backward(&mut self, d: Array2<f32>) -> Result<Array2<f32>> {
        if self.rate <= 0.0 {
            return Ok(d);
        }
        if d.dim() != self.mask.dim() {
            return Err(VisionErr::ShapeMismatch {
                what: "dropout delta",
                got: d.len(),
                expected: self.mask.len(),
            });
        }
        Ok(&d * &self.mask)
    }

    pub fn describe(&self) -> String {
        format!("dropout {}", self.rate)
    }
}
