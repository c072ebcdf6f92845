use ndarray::{Array2, ArrayView2};

pub trait LossFn {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32;
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32>;
}

const EPS: f32 = 1e-7;

/// Binary cross-entropy over sigmoid scores, probabilities clamped away from
/// 0 and 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryCrossEntropy;

impl BinaryCrossEntropy {
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for BinaryCrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        if y_pred.is_empty() {
            return 0.0;
        }

        let total: f32 = y_pred
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| {
                let p = p.clamp(EPS, 1.0 - EPS);
                -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
            })
            .sum();
        total / y_pred.len() as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len().max(1) as f32;
        let mut d = y_pred.to_owned();
        d.zip_mut_with(&y, |p, &t| {
            let c = p.clamp(EPS, 1.0 - EPS);
            *p = (c - t) / (c * (1.0 - c)) / n;
        });
        d
    }
}

/// Fraction of samples whose thresholded score matches the label.
pub fn accuracy(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
    if y_pred.is_empty() {
        return 0.0;
    }

    let hits = y_pred
        .iter()
        .zip(y.iter())
        .filter(|&(&p, &t)| (p > 0.5) == (t > 0.5))
        .count();
    hits as f32 / y_pred.len() as f32
}
