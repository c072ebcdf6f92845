mod metrics;
mod policies;
mod trainer;

pub use metrics::{EpochMetrics, FitReport};
pub use policies::{Checkpointer, EarlyStopping, PlateauSchedule};
pub use trainer::{AdamConfig, FitOptions, Trainer};
