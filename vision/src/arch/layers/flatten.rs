use ndarray::{Array2, Array4};

use crate::{Result, VisionErr, arch::Phase};

/// Collapses NHWC batches into `(n, h * w * c)` feature rows.
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    in_dim: (usize, usize, usize, usize),
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(&mut self, x: Array4<f32>, phase: Phase) -> Result<Array2<f32>> {
        let (n, h, w, c) = x.dim();
        if phase == Phase::Train {
            self.in_dim = (n, h, w, c);
        }
        Ok(x.into_shape_with_order((n, h * w * c)).unwrap())
    }

    pub fn backward(&mut self, d: Array2<f32>) -> Result<Array4<f32>> {
        let (n, h, w, c) = self.in_dim;
        if d.dim() != (n, h * w * c) {
            return Err(VisionErr::ShapeMismatch {
                what: "flatten delta",
                got: d.len(),
                expected: n * h * w * c,
            });
        }
        Ok(d.into_shape_with_order(self.in_dim).unwrap())
    }

    pub fn describe(&self) -> String {
        "flatten".to_string()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array4};

    use super::*;

    #[test]
    fn round_trips_shapes() {
        let mut flatten = Flatten::new();
        let out = flatten
            .forward(Array4::zeros((2, 3, 4, 5)), Phase::Train)
            .unwrap();
        assert_eq!(out.dim(), (2, 60));

        let back = flatten.backward(Array2::zeros((2, 60))).unwrap();
        assert_eq!(back.dim(), (2, 3, 4, 5));
    }
}
