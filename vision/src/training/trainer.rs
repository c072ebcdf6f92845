use std::path::PathBuf;

use log::info;

use super::{Checkpointer, EarlyStopping, EpochMetrics, FitReport, PlateauSchedule};
use crate::{
    Result,
    arch::{
        Phase, Sequential,
        loss::{BinaryCrossEntropy, LossFn, accuracy},
    },
    dataset::{Batch, BatchLoader},
    optimization::Adam,
};

/// Adam hyperparameters shared by every trainable tensor.
#[derive(Debug, Clone, Copy)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Epoch budget and control-policy knobs for one `fit` run.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs: usize,
    pub early_stop_patience: usize,
    pub lr_patience: usize,
    pub lr_factor: f32,
    pub min_lr: f32,
    pub checkpoint: PathBuf,
}

impl FitOptions {
    pub fn new(checkpoint: impl Into<PathBuf>) -> Self {
        Self {
            epochs: 30,
            early_stop_patience: 5,
            lr_patience: 3,
            lr_factor: 0.5,
            min_lr: 1e-7,
            checkpoint: checkpoint.into(),
        }
    }
}

/// Drives gradient descent over a model: one optimizer instance per
/// trainable tensor, binary cross-entropy loss, and the three epoch-end
/// policies (checkpoint on best accuracy, early stop on stalled loss,
/// plateau learning-rate reduction).
pub struct Trainer {
    model: Sequential,
    optimizers: Vec<Adam>,
    loss_fn: BinaryCrossEntropy,
    lr: f32,
}

impl Trainer {
    pub fn new(model: Sequential, adam: AdamConfig) -> Self {
        let optimizers = model
            .param_sizes()
            .into_iter()
            .map(|len| Adam::new(len, adam.learning_rate, adam.beta1, adam.beta2, adam.epsilon))
            .collect();

        Self {
            model,
            optimizers,
            loss_fn: BinaryCrossEntropy::new(),
            lr: adam.learning_rate,
        }
    }

    pub fn model(&self) -> &Sequential {
        &self.model
    }

    pub fn into_model(self) -> Sequential {
        self.model
    }

    /// Runs the full training loop.
    ///
    /// Each epoch trains over `train`, evaluates over `val`, then lets the
    /// policies observe the validation metrics. Any I/O, decode or shape
    /// failure aborts the run with the underlying error.
    pub fn fit(
        &mut self,
        train: &mut BatchLoader,
        val: &mut BatchLoader,
        opts: &FitOptions,
    ) -> Result<FitReport> {
        let mut checkpointer = Checkpointer::new(&opts.checkpoint);
        let mut early = EarlyStopping::new(opts.early_stop_patience);
        let mut schedule =
            PlateauSchedule::new(self.lr, opts.lr_factor, opts.lr_patience, opts.min_lr);
        let mut report = FitReport::default();

        for epoch in 0..opts.epochs {
            let (loss, acc) = self.train_epoch(train)?;
            let (val_loss, val_acc) = self.evaluate(val)?;

            info!(
                "epoch {}/{}: loss {loss:.4} accuracy {acc:.4} val_loss {val_loss:.4} val_accuracy {val_acc:.4}",
                epoch + 1,
                opts.epochs,
            );
            report.epochs.push(EpochMetrics {
                epoch,
                loss,
                accuracy: acc,
                val_loss,
                val_accuracy: val_acc,
                learning_rate: self.lr,
            });

            if checkpointer.observe(val_acc, &self.model)? {
                info!(
                    "validation accuracy improved, checkpoint written to {}",
                    opts.checkpoint.display()
                );
            }

            if let Some(lr) = schedule.observe(val_loss) {
                self.lr = lr;
                for optimizer in &mut self.optimizers {
                    optimizer.set_learning_rate(lr);
                }
                info!("validation loss plateaued, learning rate reduced to {lr:e}");
            }

            if early.observe(val_loss, &self.model) {
                info!(
                    "validation loss stalled for {} epochs, stopping and restoring best weights",
                    opts.early_stop_patience
                );
                early.restore(&mut self.model)?;
                report.stopped_early = true;
                break;
            }
        }

        report.best_val_accuracy = checkpointer.best();
        Ok(report)
    }

    fn train_epoch(&mut self, loader: &mut BatchLoader) -> Result<(f32, f32)> {
        loader.reset();

        let mut total_loss = 0.0;
        let mut total_acc = 0.0;
        let mut total = 0usize;

        while let Some(batch) = loader.next_batch() {
            let Batch { images, labels } = batch?;
            let n = labels.nrows();

            let scores = self.model.forward(images, Phase::Train)?;
            total_loss += self.loss_fn.loss(scores.view(), labels.view()) * n as f32;
            total_acc += accuracy(scores.view(), labels.view()) * n as f32;

            let d = self.loss_fn.loss_prime(scores.view(), labels.view());
            self.model.backward(d)?;
            self.model.update(&mut self.optimizers)?;

            total += n;
        }

        let denom = total.max(1) as f32;
        Ok((total_loss / denom, total_acc / denom))
    }

    /// Loss/accuracy pass without weight updates.
    pub fn evaluate(&mut self, loader: &mut BatchLoader) -> Result<(f32, f32)> {
        loader.reset();

        let mut total_loss = 0.0;
        let mut total_acc = 0.0;
        let mut total = 0usize;

        while let Some(batch) = loader.next_batch() {
            let Batch { images, labels } = batch?;
            let n = labels.nrows();

            let scores = self.model.forward(images, Phase::Eval)?;
            total_loss += self.loss_fn.loss(scores.view(), labels.view()) * n as f32;
            total_acc += accuracy(scores.view(), labels.view()) * n as f32;
            total += n;
        }

        let denom = total.max(1) as f32;
        Ok((total_loss / denom, total_acc / denom))
    }
}
