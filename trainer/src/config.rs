use std::{fs, io, path::PathBuf};

use serde::Deserialize;

use vision::augment::Augment;

/// Everything one training run needs, read from a JSON file so no data path
/// or hyperparameter lives in the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Directory with the two training class folders.
    pub train_dir: PathBuf,
    /// Directory with the two validation/test class folders.
    pub val_dir: PathBuf,
    /// Where the best checkpoint is written.
    pub checkpoint: PathBuf,

    /// Square image extent samples are resized to.
    pub image_size: u32,
    pub batch_size: usize,
    pub epochs: usize,

    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,

    pub early_stop_patience: usize,
    pub lr_patience: usize,
    pub lr_factor: f32,
    pub min_lr: f32,

    /// Seed for weight init, shuffling and augmentation; `None` draws one
    /// from the OS.
    pub seed: Option<u64>,
    pub augment: Augment,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_dir: PathBuf::from("data/training_set"),
            val_dir: PathBuf::from("data/test_set"),
            checkpoint: PathBuf::from("cat_dog_model.safetensors"),
            image_size: 128,
            batch_size: 32,
            epochs: 30,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            early_stop_patience: 5,
            lr_patience: 3,
            lr_factor: 0.5,
            min_lr: 1e-7,
            seed: None,
            augment: Augment::default(),
        }
    }
}

impl TrainConfig {
    /// Loads a configuration file; missing fields keep their defaults.
    pub fn load(path: &str) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{path}: {e}")))
    }
}
