use ndarray::{Array1, Array2, Array4, Axis, linalg};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::Rng;

use super::ActFn;
use crate::{
    Result, VisionErr,
    arch::{Phase, sequential::StateMap},
};

/// 2D convolution over NHWC batches, valid padding, stride 1.
///
/// The kernel is stored pre-flattened as a `(kernel * kernel * in_ch, out_ch)`
/// matrix so that a forward pass is an im2col gather followed by one matrix
/// product, mirroring how the dense layer multiplies.
#[derive(Debug, Clone)]
pub struct Conv2d {
    kernel: usize,
    in_ch: usize,
    out_ch: usize,
    act_fn: Option<ActFn>,

    pub(super) w: Array2<f32>,
    pub(super) b: Array1<f32>,
    pub(super) dw: Array2<f32>,
    pub(super) db: Array1<f32>,

    // Forward metadata, valid after a Train-phase forward.
    cols: Array2<f32>,
    z: Array2<f32>,
    in_dim: (usize, usize, usize, usize),
}

impl Conv2d {
    pub fn new<R: Rng>(
        kernel: usize,
        in_ch: usize,
        out_ch: usize,
        act_fn: Option<ActFn>,
        rng: &mut R,
    ) -> Self {
        let fan_in = (kernel * kernel * in_ch) as f32;
        let fan_out = (kernel * kernel * out_ch) as f32;
        let limit = (6.0 / (fan_in + fan_out)).sqrt();
        let w = Array2::random_using(
            (kernel * kernel * in_ch, out_ch),
            Uniform::new(-limit, limit),
            rng,
        );

        Self {
            kernel,
            in_ch,
            out_ch,
            act_fn,
            dw: Array2::zeros(w.raw_dim()),
            w,
            b: Array1::zeros(out_ch),
            db: Array1::zeros(out_ch),
            cols: Array2::zeros((1, 1)),
            z: Array2::zeros((1, 1)),
            in_dim: (0, 0, 0, 0),
        }
    }

    pub fn forward(&mut self, x: Array4<f32>, phase: Phase) -> Result<Array4<f32>> {
        let (n, h, w, c) = x.dim();
        if c != self.in_ch {
            return Err(VisionErr::ShapeMismatch {
                what: "conv input channels",
                got: c,
                expected: self.in_ch,
            });
        }
        let k = self.kernel;
        if h < k || w < k {
            return Err(VisionErr::ShapeMismatch {
                what: "conv input extent",
                got: h.min(w),
                expected: k,
            });
        }

        let (oh, ow) = (h - k + 1, w - k + 1);
        let rows = n * oh * ow;

        let mut cols = Array2::zeros((rows, k * k * self.in_ch));
        for i in 0..n {
            for oy in 0..oh {
                for ox in 0..ow {
                    let row = (i * oh + oy) * ow + ox;
                    for ky in 0..k {
                        for kx in 0..k {
                            for ch in 0..self.in_ch {
                                cols[[row, (ky * k + kx) * self.in_ch + ch]] =
                                    x[[i, oy + ky, ox + kx, ch]];
                            }
                        }
                    }
                }
            }
        }

        let mut z = Array2::zeros((rows, self.out_ch));
        linalg::general_mat_mul(1.0, &cols, &self.w, 0.0, &mut z);
        z += &self.b;

        let out = match self.act_fn {
            Some(act) => z.mapv(|v| act.f(v)),
            None => z.clone(),
        };

        if phase == Phase::Train {
            self.cols = cols;
            self.z = z;
            self.in_dim = (n, h, w, c);
        }

        Ok(out
            .into_shape_with_order((n, oh, ow, self.out_ch))
            .unwrap())
    }

    /// Backward pass; assumes the last forward ran in the Train phase.
    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let (n, oh, ow, oc) = d.dim();
        if oc != self.out_ch {
            return Err(VisionErr::ShapeMismatch {
                what: "conv delta channels",
                got: oc,
                expected: self.out_ch,
            });
        }
        let rows = n * oh * ow;
        if self.cols.nrows() != rows {
            return Err(VisionErr::ShapeMismatch {
                what: "conv delta rows",
                got: rows,
                expected: self.cols.nrows(),
            });
        }

        let mut d2 = d.into_shape_with_order((rows, oc)).unwrap();
        if let Some(act) = self.act_fn {
            d2.zip_mut_with(&self.z, |dv, &z| *dv *= act.df(z));
        }

        linalg::general_mat_mul(1.0, &self.cols.t(), &d2, 0.0, &mut self.dw);
        self.db.assign(&d2.sum_axis(Axis(0)));

        let k = self.kernel;
        let mut dcols = Array2::zeros((rows, k * k * self.in_ch));
        linalg::general_mat_mul(1.0, &d2, &self.w.t(), 0.0, &mut dcols);

        let (n0, h, w, c) = self.in_dim;
        let mut dx = Array4::zeros((n0, h, w, c));
        for i in 0..n {
            for oy in 0..oh {
                for ox in 0..ow {
                    let row = (i * oh + oy) * ow + ox;
                    for ky in 0..k {
                        for kx in 0..k {
                            for ch in 0..self.in_ch {
                                dx[[i, oy + ky, ox + kx, ch]] +=
                                    dcols[[row, (ky * k + kx) * self.in_ch + ch]];
                            }
                        }
                    }
                }
            }
        }

        Ok(dx)
    }

    pub fn param_sizes(&self) -> Vec<usize> {
        vec![self.w.len(), self.b.len()]
    }

    pub fn param_count(&self) -> usize {
        self.w.len() + self.b.len()
    }

    pub fn describe(&self) -> String {
        let act = match self.act_fn {
            Some(ActFn::Relu) => ", relu",
            Some(ActFn::Sigmoid) => ", sigmoid",
            None => "",
        };
        format!(
            "conv2d {k}x{k}, {} -> {}{act}",
            self.in_ch,
            self.out_ch,
            k = self.kernel
        )
    }

    pub fn state(&self, prefix: &str, out: &mut Vec<(String, Vec<usize>, Vec<f32>)>) {
        out.push((
            format!("{prefix}.weight"),
            vec![self.kernel, self.kernel, self.in_ch, self.out_ch],
            self.w.iter().copied().collect(),
        ));
        out.push((
            format!("{prefix}.bias"),
            vec![self.out_ch],
            self.b.iter().copied().collect(),
        ));
    }

    pub fn load_state(&mut self, prefix: &str, map: &StateMap) -> Result<()> {
        super::copy_tensor(
            map,
            &format!("{prefix}.weight"),
            &[self.kernel, self.kernel, self.in_ch, self.out_ch],
            self.w.as_slice_mut().unwrap(),
        )?;
        super::copy_tensor(
            map,
            &format!("{prefix}.bias"),
            &[self.out_ch],
            self.b.as_slice_mut().unwrap(),
        )
    }
}
