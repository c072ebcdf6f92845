pub mod builder;
pub mod layers;
pub mod loss;
mod sequential;
mod tensor;

pub use sequential::{Sequential, StateEntry, StateMap, state_map};
pub use tensor::Tensor;

/// Whether a forward pass is part of training or inference.
///
/// Batch normalization and dropout behave differently in each phase; layers
/// must not mutate learned state during an [`Phase::Eval`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Eval,
}
