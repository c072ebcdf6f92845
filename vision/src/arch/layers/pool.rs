use ndarray::Array4;

use crate::{Result, VisionErr, arch::Phase};

/// Square max-pooling with stride equal to the window, floor semantics on
/// indivisible extents.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    window: usize,

    // Forward metadata: flat input offset of each maximum, in output
    // iteration order. Valid after a Train-phase forward.
    argmax: Vec<usize>,
    in_dim: (usize, usize, usize, usize),
    out_dim: (usize, usize, usize, usize),
}

impl MaxPool2d {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            argmax: Vec::new(),
            in_dim: (0, 0, 0, 0),
            out_dim: (0, 0, 0, 0),
        }
    }

    pub fn forward(&mut self, x: Array4<f32>, phase: Phase) -> Result<Array4<f32>> {
        let (n, h, w, c) = x.dim();
        let (oh, ow) = (h / self.window, w / self.window);
        if oh == 0 || ow == 0 {
            return Err(VisionErr::ShapeMismatch {
                what: "pool input extent",
                got: h.min(w),
                expected: self.window,
            });
        }

        let mut out = Array4::zeros((n, oh, ow, c));
        let mut argmax = Vec::with_capacity(n * oh * ow * c);

        for i in 0..n {
            for oy in 0..oh {
                for ox in 0..ow {
                    for ch in 0..c {
                        let mut best = f32::NEG_INFINITY;
                        let mut best_at = 0;
                        for ky in 0..self.window {
                            for kx in 0..self.window {
                                let (y, x0) = (oy * self.window + ky, ox * self.window + kx);
                                let v = x[[i, y, x0, ch]];
                                if v > best {
                                    best = v;
                                    best_at = ((i * h + y) * w + x0) * c + ch;
                                }
                            }
                        }
                        out[[i, oy, ox, ch]] = best;
                        argmax.push(best_at);
                    }
                }
            }
        }

        if phase == Phase::Train {
            self.argmax = argmax;
            self.in_dim = (n, h, w, c);
            self.out_dim = (n, oh, ow, c);
        }

        Ok(out)
    }

    /// Backward pass; routes each delta to the element that won the window.
    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        if d.dim() != self.out_dim {
            return Err(VisionErr::ShapeMismatch {
                what: "pool delta",
                got: d.len(),
                expected: self.argmax.len(),
            });
        }

        let mut dx = Array4::zeros(self.in_dim);
        let flat = dx.as_slice_mut().unwrap();
        for (&at, &dv) in self.argmax.iter().zip(d.iter()) {
            flat[at] += dv;
        }

        Ok(dx)
    }

    pub fn describe(&self) -> String {
        format!("max_pool {0}x{0}", self.window)
    }
}
