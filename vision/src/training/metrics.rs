/// Metrics recorded at the end of one training epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
    pub learning_rate: f32,
}

/// The outcome of a full `fit` run.
#[derive(Debug, Clone, Default)]
pub struct FitReport {
    pub epochs: Vec<EpochMetrics>,
    pub best_val_accuracy: f32,
    pub stopped_early: bool,
}
