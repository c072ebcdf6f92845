use std::collections::HashMap;

use ndarray::{Array2, Array4};

use super::{Phase, Tensor, layers::Layer};
use crate::{Result, optimization::Adam};

/// One named tensor of the model state: name, shape, row-major data.
pub type StateEntry = (String, Vec<usize>, Vec<f32>);

/// Model state keyed by tensor name, as read back from a checkpoint.
pub type StateMap = HashMap<String, (Vec<usize>, Vec<f32>)>;

/// A sequential model: image batches flow forward through the layer stack,
/// deltas flow backward through it in reverse.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `x` - An NHWC batch of images.
    /// * `phase` - Train caches layer metadata for a following backward pass;
    ///   Eval leaves all learned state untouched.
    ///
    /// # Returns
    /// One sigmoid score per sample, shaped `(n, 1)`.
    pub fn forward(&mut self, x: Array4<f32>, phase: Phase) -> Result<Array2<f32>> {
        let mut t = Tensor::D4(x);
        for layer in &mut self.layers {
            t = layer.forward(t, phase)?;
        }
        t.into_d2("model output")
    }

    /// Backpropagates the loss gradient through every layer, leaving each
    /// layer's gradient buffers filled. Assumes the preceding forward ran in
    /// the Train phase.
    pub fn backward(&mut self, d: Array2<f32>) -> Result<()> {
        let mut t = Tensor::D2(d);
        for layer in self.layers.iter_mut().rev() {
            t = layer.backward(t)?;
        }
        Ok(())
    }

    /// Applies one optimizer instance per trainable tensor, in layer order.
    pub fn update(&mut self, optimizers: &mut [Adam]) -> Result<()> {
        let mut it = optimizers.iter_mut();
        for layer in &mut self.layers {
            layer.update(&mut it)?;
        }
        Ok(())
    }

    /// Lengths of all trainable tensors, in the order `update` walks them.
    pub fn param_sizes(&self) -> Vec<usize> {
        self.layers
            .iter()
            .flat_map(|layer| layer.param_sizes())
            .collect()
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.param_count()).sum()
    }

    /// Named tensors of the full model state, including batch norm running
    /// statistics.
    pub fn state(&self) -> Vec<StateEntry> {
        let mut out = Vec::new();
        for (i, layer) in self.layers.iter().enumerate() {
            layer.state(&format!("layer{i}"), &mut out);
        }
        out
    }

    /// Loads a state previously produced by [`Sequential::state`] on a model
    /// of the same architecture.
    pub fn load_state(&mut self, map: &StateMap) -> Result<()> {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.load_state(&format!("layer{i}"), map)?;
        }
        Ok(())
    }

    /// Per-layer architecture listing with parameter counts.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .layers
            .iter()
            .map(|layer| format!("{:<28} {:>10}", layer.describe(), layer.param_count()))
            .collect();
        lines.push(format!("{:<28} {:>10}", "total", self.param_count()));
        lines.join("\n")
    }
}

/// Collects state entries into the keyed form `load_state` consumes.
pub fn state_map(entries: &[StateEntry]) -> StateMap {
    entries
        .iter()
        .map(|(name, shape, data)| (name.clone(), (shape.clone(), data.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::Array4;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::layers::{ActFn, Conv2d, Dense, Dropout, Flatten, MaxPool2d};

    fn tiny_model() -> Sequential {
        let mut rng = StdRng::seed_from_u64(5);
        Sequential::new([
            Layer::Conv2d(Conv2d::new(2, 1, 2, Some(ActFn::Relu), &mut rng)),
            Layer::MaxPool2d(MaxPool2d::new(2)),
            Layer::Flatten(Flatten::new()),
            Layer::Dropout(Dropout::new(0.5, 9)),
            Layer::Dense(Dense::new((8, 1), Some(ActFn::Sigmoid), &mut rng)),
        ])
    }

    #[test]
    fn forward_shapes_and_bounds() {
        let mut model = tiny_model();
        let x = Array4::from_shape_fn((3, 5, 5, 1), |(i, y, x, _)| (i + y + x) as f32 * 0.1);
        let out = model.forward(x, Phase::Eval).unwrap();

        assert_eq!(out.dim(), (3, 1));
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn update_changes_trainable_parameters() {
        let mut model = tiny_model();
        let mut optimizers: Vec<Adam> = model
            .param_sizes()
            .into_iter()
            .map(|len| Adam::new(len, 0.05, 0.9, 0.999, 1e-7))
            .collect();
        assert_eq!(optimizers.len(), 4);

        let before = model.state();
        let x = Array4::from_shape_fn((2, 5, 5, 1), |(i, y, x, _)| (i + y + x) as f32 * 0.1);
        let out = model.forward(x, Phase::Train).unwrap();
        model.backward(out.mapv(|v| v - 1.0)).unwrap();
        model.update(&mut optimizers).unwrap();

        let after = model.state();
        assert!(
            before
                .iter()
                .zip(&after)
                .any(|((_, _, a), (_, _, b))| a != b)
        );
    }

    #[test]
    fn state_round_trips_through_a_fresh_model() {
        let model = tiny_model();
        let entries = model.state();

        let mut rng = StdRng::seed_from_u64(99);
        let mut other = Sequential::new([
            Layer::Conv2d(Conv2d::new(2, 1, 2, Some(ActFn::Relu), &mut rng)),
            Layer::MaxPool2d(MaxPool2d::new(2)),
            Layer::Flatten(Flatten::new()),
            Layer::Dropout(Dropout::new(0.5, 1)),
            Layer::Dense(Dense::new((8, 1), Some(ActFn::Sigmoid), &mut rng)),
        ]);
        other.load_state(&state_map(&entries)).unwrap();

        assert_eq!(model.state(), other.state());
    }

    #[test]
    fn rank_violations_error_out() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut model = Sequential::new([Layer::Dense(Dense::new((4, 1), None, &mut rng))]);
        assert!(model.forward(Array4::zeros((1, 2, 2, 1)), Phase::Eval).is_err());
    }
}
