use crate::{Result, VisionErr};

/// Adam over one trainable tensor; the model holds one instance per tensor.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of
    ///   training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization
    ///   algorithm.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Overrides the learning rate; moment estimates are kept, so a plateau
    /// schedule can anneal mid-training.
    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    /// Updates `params` in place using the accumulated gradient.
    pub fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() || params.len() != self.v.len() {
            return Err(VisionErr::ShapeMismatch {
                what: "adam parameters",
                got: grad.len(),
                expected: self.v.len(),
            });
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(self.v.iter_mut())
            .zip(self.s.iter_mut())
            .for_each(|(((p, g), v), s)| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_against_the_gradient() {
        let mut adam = Adam::new(1, 0.1, 0.9, 0.999, 1e-7);
        let mut params = [1.0];
        adam.update_params(&[1.0], &mut params).unwrap();

        // The bias-corrected first step has magnitude close to the rate.
        assert!(params[0] < 1.0);
        assert!((params[0] - 0.9).abs() < 1e-3);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let mut adam = Adam::new(2, 0.1, 0.9, 0.999, 1e-7);
        let mut params = [1.0];
        assert!(adam.update_params(&[1.0], &mut params).is_err());
    }

    #[test]
    fn annealed_rate_shrinks_steps() {
        let mut adam = Adam::new(1, 0.1, 0.9, 0.999, 1e-7);
        adam.set_learning_rate(0.05);
        assert_eq!(adam.learning_rate(), 0.05);

        let mut params = [1.0];
        adam.update_params(&[1.0], &mut params).unwrap();
        assert!((params[0] - 0.95).abs() < 1e-3);
    }
}
