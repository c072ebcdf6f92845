use std::path::PathBuf;

use crate::{
    Result, checkpoint,
    arch::{Sequential, StateEntry, state_map},
};

/// Persists the model whenever validation accuracy reaches a new maximum.
#[derive(Debug)]
pub struct Checkpointer {
    path: PathBuf,
    best: f32,
}

impl Checkpointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            best: f32::NEG_INFINITY,
        }
    }

    /// Saves on improvement; returns whether a checkpoint was written.
    pub fn observe(&mut self, val_accuracy: f32, model: &Sequential) -> Result<bool> {
        if val_accuracy > self.best {
            self.best = val_accuracy;
            checkpoint::save(model, &self.path)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn best(&self) -> f32 {
        self.best.max(0.0)
    }
}

/// Stops training once validation loss has stalled for `patience` epochs,
/// keeping a snapshot of the best-loss weights for restoration.
#[derive(Debug)]
pub struct EarlyStopping {
    patience: usize,
    best: f32,
    stalled: usize,
    snapshot: Option<Vec<StateEntry>>,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f32::INFINITY,
            stalled: 0,
            snapshot: None,
        }
    }

    /// Folds in one epoch's validation loss; returns whether to stop.
    pub fn observe(&mut self, val_loss: f32, model: &Sequential) -> bool {
        if val_loss < self.best {
            self.best = val_loss;
            self.stalled = 0;
            self.snapshot = Some(model.state());
            return false;
        }

        self.stalled += 1;
        self.stalled >= self.patience
    }

    /// Restores the best-loss snapshot, if one was taken.
    pub fn restore(&self, model: &mut Sequential) -> Result<()> {
        match &self.snapshot {
            Some(entries) => model.load_state(&state_map(entries)),
            None => Ok(()),
        }
    }
}

/// Halves the learning rate after `patience` epochs without validation-loss
/// improvement, never dropping below `min_lr`.
#[derive(Debug)]
pub struct PlateauSchedule {
    patience: usize,
    factor: f32,
    min_lr: f32,
    lr: f32,
    best: f32,
    stalled: usize,
}

impl PlateauSchedule {
    pub fn new(initial_lr: f32, factor: f32, patience: usize, min_lr: f32) -> Self {
        Self {
            patience,
            factor,
            min_lr,
            lr: initial_lr,
            best: f32::INFINITY,
            stalled: 0,
        }
    }

    /// Folds in one epoch's validation loss; returns the new learning rate
    /// when a reduction fires.
    pub fn observe(&mut self, val_loss: f32) -> Option<f32> {
        if val_loss < self.best {
            self.best = val_loss;
            self.stalled = 0;
            return None;
        }

        self.stalled += 1;
        if self.stalled < self.patience {
            return None;
        }

        self.stalled = 0;
        let next = (self.lr * self.factor).max(self.min_lr);
        if next < self.lr {
            self.lr = next;
            Some(next)
        } else {
            None
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.lr
    }
}
