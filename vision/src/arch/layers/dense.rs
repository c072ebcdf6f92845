use ndarray::{Array1, Array2, Axis, linalg};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::Rng;

use super::ActFn;
use crate::{
    Result, VisionErr,
    arch::{Phase, sequential::StateMap},
};

/// Fully connected layer with an optional activation folded in.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,

    pub(super) w: Array2<f32>,
    pub(super) b: Array1<f32>,
    pub(super) dw: Array2<f32>,
    pub(super) db: Array1<f32>,

    // Forward metadata, valid after a Train-phase forward.
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    pub fn new<R: Rng>(dim: (usize, usize), act_fn: Option<ActFn>, rng: &mut R) -> Self {
        let limit = (6.0 / (dim.0 + dim.1) as f32).sqrt();
        let w = Array2::random_using(dim, Uniform::new(-limit, limit), rng);

        Self {
            dim,
            act_fn,
            dw: Array2::zeros(w.raw_dim()),
            w,
            b: Array1::zeros(dim.1),
            db: Array1::zeros(dim.1),
            x: Array2::zeros((1, 1)),
            z: Array2::zeros((1, 1)),
        }
    }

    pub fn forward(&mut self, x: Array2<f32>, phase: Phase) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(VisionErr::ShapeMismatch {
                what: "dense input width",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &self.w, 0.0, &mut z);
        z += &self.b;

        let out = match self.act_fn {
            Some(act) => z.mapv(|v| act.f(v)),
            None => z.clone(),
        };

        if phase == Phase::Train {
            self.x = x;
            self.z = z;
        }

        Ok(out)
    }

    /// Backward pass; assumes the last forward ran in the Train phase.
    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<Array2<f32>> {
        if d.dim() != (self.x.nrows(), self.dim.1) {
            return Err(VisionErr::ShapeMismatch {
                what: "dense delta",
                got: d.len(),
                expected: self.x.nrows() * self.dim.1,
            });
        }

        if let Some(act) = self.act_fn {
            d.zip_mut_with(&self.z, |dv, &z| *dv *= act.df(z));
        }

        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut self.dw);
        self.db.assign(&d.sum_axis(Axis(0)));

        let mut dx = Array2::zeros((d.nrows(), self.dim.0));
        linalg::general_mat_mul(1.0, &d, &self.w.t(), 0.0, &mut dx);

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
        format!("dense {} -> {}{act}", self.dim.0, self.dim.1)
    }

    pub fn state(&self, prefix: &str, out: &mut Vec<(String, Vec<usize>, Vec<f32>)>) {
        out.push((
            format!("{prefix}.weight"),
            vec![self.dim.0, self.dim.1],
            self.w.iter().copied().collect(),
        ));
        out.push((
            format!("{prefix}.bias"),
            vec![self.dim.1],
            self.b.iter().copied().collect(),
        ));
    }

    pub fn load_state(&mut self, prefix: &str, map: &StateMap) -> Result<()> {
        super::copy_tensor(
            map,
            &format!("{prefix}.weight"),
            &[self.dim.0, self.dim.1],
            self.w.as_slice_mut().unwrap(),
        )?;
        super::copy_tensor(
            map,
            &format!("{prefix}.bias"),
            &[self.dim.1],
            self.b.as_slice_mut().unwrap(),
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn fixed_dense(act_fn: Option<ActFn>) -> Dense {
        let mut rng = StdRng::seed_from_u64(3);
        let mut dense = Dense::new((2, 2), act_fn, &mut rng);
        dense.w = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        dense.b = Array1::from_vec(vec![0.5, -0.5]);
        dense
    }

    #[test]
    fn forward_is_affine() {
        let mut dense = fixed_dense(None);
        let x = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        let out = dense.forward(x, Phase::Train).unwrap();
        assert_eq!(out[[0, 0]], 7.5);
        assert_eq!(out[[0, 1]], 9.5);
    }

    #[test]
    fn backward_produces_hand_checked_gradients() {
        let mut dense = fixed_dense(None);
        let x = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        dense.forward(x, Phase::Train).unwrap();

        let d = Array2::from_elem((1, 2), 1.0);
        let dx = dense.backward(d).unwrap();

        assert_eq!(dense.dw[[0, 0]], 1.0);
        assert_eq!(dense.dw[[1, 0]], 2.0);
        assert_eq!(dense.dw[[1, 1]], 2.0);
        assert_eq!(dense.db[0], 1.0);
        assert_eq!(dx[[0, 0]], 3.0);
        assert_eq!(dx[[0, 1]], 7.0);
    }

    #[test]
    fn sigmoid_output_is_bounded() {
        let mut dense = fixed_dense(Some(ActFn::Sigmoid));
        let x = Array2::from_shape_vec((1, 2), vec![10.0, 10.0]).unwrap();
        let out = dense.forward(x, Phase::Eval).unwrap();
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
