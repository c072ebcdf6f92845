use ndarray::{Array1, Array4, Axis};

use crate::{
    Result, VisionErr,
    arch::{Phase, sequential::StateMap},
};

const DEFAULT_MOMENTUM: f32 = 0.99;
const DEFAULT_EPS: f32 = 1e-3;

/// Per-channel batch normalization over NHWC batches.
///
/// Train-phase forwards normalize with batch statistics and fold them into
/// the running mean/variance; Eval-phase forwards use the running statistics
/// and leave all state untouched.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    channels: usize,
    momentum: f32,
    eps: f32,

    pub(super) gamma: Array1<f32>,
    pub(super) beta: Array1<f32>,
    pub(super) dgamma: Array1<f32>,
    pub(super) dbeta: Array1<f32>,
    pub(super) running_mean: Array1<f32>,
    pub(super) running_var: Array1<f32>,

    // Forward metadata, valid after a Train-phase forward.
    xhat: Array4<f32>,
    inv_std: Array1<f32>,
}

impl BatchNorm2d {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            momentum: DEFAULT_MOMENTUM,
            eps: DEFAULT_EPS,
            gamma: Array1::ones(channels),
            beta: Array1::zeros(channels),
            dgamma: Array1::zeros(channels),
            dbeta: Array1::zeros(channels),
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            xhat: Array4::zeros((1, 1, 1, 1)),
            inv_std: Array1::zeros(channels),
        }
    }

    pub fn forward(&mut self, x: Array4<f32>, phase: Phase) -> Result<Array4<f32>> {
        let (n, h, w, c) = x.dim();
        if c != self.channels {
            return Err(VisionErr::ShapeMismatch {
                what: "batch norm channels",
                got: c,
                expected: self.channels,
            });
        }

        let mut out = Array4::zeros((n, h, w, c));
        match phase {
            Phase::Train => {
                let m = (n * h * w) as f32;
                let mut xhat = Array4::zeros((n, h, w, c));

                for ch in 0..c {
                    let lane = x.index_axis(Axis(3), ch);
                    let mean = lane.sum() / m;
                    let var = lane.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / m;
                    let inv_std = 1.0 / (var + self.eps).sqrt();

                    xhat.index_axis_mut(Axis(3), ch)
                        .assign(&lane.mapv(|v| (v - mean) * inv_std));
                    let (g, b) = (self.gamma[ch], self.beta[ch]);
                    out.index_axis_mut(Axis(3), ch)
                        .assign(&xhat.index_axis(Axis(3), ch).mapv(|v| g * v + b));

                    self.running_mean[ch] =
                        self.momentum * self.running_mean[ch] + (1.0 - self.momentum) * mean;
                    self.running_var[ch] =
                        self.momentum * self.running_var[ch] + (1.0 - self.momentum) * var;
                    self.inv_std[ch] = inv_std;
                }

                self.xhat = xhat;
            }
            Phase::Eval => {
                for ch in 0..c {
                    let mean = self.running_mean[ch];
                    let inv_std = 1.0 / (self.running_var[ch] + self.eps).sqrt();
                    let (g, b) = (self.gamma[ch], self.beta[ch]);
                    out.index_axis_mut(Axis(3), ch)
                        .assign(&x.index_axis(Axis(3), ch).mapv(|v| g * (v - mean) * inv_std + b));
                }
            }
        }

        Ok(out)
    }

    /// Backward pass; assumes the last forward ran in the Train phase.
    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        if d.dim() != self.xhat.dim() {
            return Err(VisionErr::ShapeMismatch {
                what: "batch norm delta",
                got: d.len(),
                expected: self.xhat.len(),
            });
        }

        let (n, h, w, c) = d.dim();
        let m = (n * h * w) as f32;
        let mut dx = Array4::zeros((n, h, w, c));

        for ch in 0..c {
            let dv = d.index_axis(Axis(3), ch);
            let xh = self.xhat.index_axis(Axis(3), ch);

            let dbeta = dv.sum();
            let dgamma = dv
                .iter()
                .zip(xh.iter())
                .map(|(&a, &b)| a * b)
                .sum::<f32>();
            self.dbeta[ch] = dbeta;
            self.dgamma[ch] = dgamma;

            let k1 = dbeta / m;
            let k2 = dgamma / m;
            let scale = self.gamma[ch] * self.inv_std[ch];

            let mut lane = dv.to_owned();
            lane -= k1;
            lane.zip_mut_with(&xh, |a, &b| *a -= b * k2);
            lane.mapv_inplace(|v| v * scale);
            dx.index_axis_mut(Axis(3), ch).assign(&lane);
        }

        Ok(dx)
    }

    pub fn param_sizes(&self) -> Vec<usize> {
        vec![self.gamma.len(), self.beta.len()]
    }

    pub fn param_count(&self) -> usize {
        // Running statistics are state, not trainable parameters, but the
        // artifact carries all four tensors.
        4 * self.channels
    }

    pub fn describe(&self) -> String {
        format!("batch_norm {}", self.channels)
    }

    pub fn state(&self, prefix: &str, out: &mut Vec<(String, Vec<usize>, Vec<f32>)>) {
        for (name, values) in [
            ("gamma", &self.gamma),
            ("beta", &self.beta),
            ("running_mean", &self.running_mean),
            ("running_var", &self.running_var),
        ] {
            out.push((
                format!("{prefix}.{name}"),
                vec![self.channels],
                values.iter().copied().collect(),
            ));
        }
    }

    pub fn load_state(&mut self, prefix: &str, map: &StateMap) -> Result<()> {
        let shape = [self.channels];
        super::copy_tensor(
            map,
            &format!("{prefix}.gamma"),
            &shape,
            self.gamma.as_slice_mut().unwrap(),
        )?;
        super::copy_tensor(
            map,
            &format!("{prefix}.beta"),
            &shape,
            self.beta.as_slice_mut().unwrap(),
        )?;
        super::copy_tensor(
            map,
            &format!("{prefix}.running_mean"),
            &shape,
            self.running_mean.as_slice_mut().unwrap(),
        )?;
        super::copy_tensor(
            map,
            &format!("{prefix}.running_var"),
            &shape,
            self.running_var.as_slice_mut().unwrap(),
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;

    use super::*;

    #[test]
    fn train_forward_normalizes_each_channel() {
        let mut bn = BatchNorm2d::new(1);
        let x = Array4::from_shape_vec((1, 2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let out = bn.forward(x, Phase::Train).unwrap();

        let mean = out.sum() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!(out[[0, 0, 0, 0]] < 0.0 && out[[0, 1, 1, 0]] > 0.0);

        // Running statistics fold in one batch worth of (mean, var).
        assert!((bn.running_mean[0] - 0.025).abs() < 1e-6);
        assert!((bn.running_var[0] - (0.99 + 0.0125)).abs() < 1e-5);
    }

    #[test]
    fn eval_forward_uses_running_statistics() {
        let mut bn = BatchNorm2d::new(1);
        let x = Array4::from_elem((1, 2, 2, 1), 3.0);
        let out = bn.forward(x, Phase::Eval).unwrap();

        // Fresh running stats are (0, 1): output is roughly the input.
        assert!((out[[0, 0, 0, 0]] - 3.0).abs() < 0.01);
        assert_eq!(bn.running_mean[0], 0.0);
    }

    #[test]
    fn constant_delta_backpropagates_to_zero() {
        let mut bn = BatchNorm2d::new(1);
        let x = Array4::from_shape_vec((1, 2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        bn.forward(x, Phase::Train).unwrap();

        let dx = bn.backward(Array4::from_elem((1, 2, 2, 1), 1.0)).unwrap();
        assert_eq!(bn.dbeta[0], 4.0);
        assert!(bn.dgamma[0].abs() < 1e-4);
        for v in dx.iter() {
            assert!(v.abs() < 1e-4);
        }
    }
}
