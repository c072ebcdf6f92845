use ndarray::{Array2, Array4};

use crate::{Result, VisionErr};

/// Activations flowing between layers: rank-2 for flattened features, rank-4
/// for image batches in NHWC order.
#[derive(Debug, Clone)]
pub enum Tensor {
    D2(Array2<f32>),
    D4(Array4<f32>),
}

impl Tensor {
    pub fn into_d2(self, what: &'static str) -> Result<Array2<f32>> {
        match self {
            Tensor::D2(a) => Ok(a),
            Tensor::D4(_) => Err(VisionErr::RankMismatch { what }),
        }
    }

    pub fn into_d4(self, what: &'static str) -> Result<Array4<f32>> {
        match self {
            Tensor::D4(a) => Ok(a),
            Tensor::D2(_) => Err(VisionErr::RankMismatch { what }),
        }
    }
}

impl From<Array2<f32>> for Tensor {
    fn from(value: Array2<f32>) -> Self {
        Self::D2(value)
    }
}

impl From<Array4<f32>> for Tensor {
    fn from(value: Array4<f32>) -> Self {
        Self::D4(value)
    }
}
