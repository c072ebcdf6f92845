mod config;

use std::{env, error::Error, process::ExitCode};

use log::{error, info};
use rand::{SeedableRng, rngs::StdRng};

use crate::config::TrainConfig;
use vision::{
    arch::builder,
    dataset::{BatchLoader, ImageFolder},
    training::{AdamConfig, FitOptions, Trainer},
};

fn main() -> ExitCode {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "train.json".to_string());

    match run(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("training failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str) -> Result<(), Box<dyn Error>> {
    let config = TrainConfig::load(config_path)?;
    info!("configuration loaded from {config_path}");

    let seed = config.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    info!("rng seed {seed}");

    let size = (config.image_size, config.image_size);
    let train_folder = ImageFolder::open(&config.train_dir)?;
    info!(
        "training set: {} images across {:?}",
        train_folder.len(),
        train_folder.classes()
    );
    let val_folder = ImageFolder::open(&config.val_dir)?;
    info!("validation set: {} images", val_folder.len());

    let mut train = BatchLoader::new(
        train_folder,
        size,
        config.batch_size,
        Some(config.augment.clone()),
        true,
        seed,
    );
    let mut val = BatchLoader::new(
        val_folder,
        size,
        config.batch_size,
        None,
        false,
        seed.wrapping_add(1),
    );

    let model = builder::cat_dog(
        (config.image_size as usize, config.image_size as usize),
        &mut rng,
    );
    for line in model.summary().lines() {
        info!("{line}");
    }

    let mut trainer = Trainer::new(
        model,
        AdamConfig {
            learning_rate: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            epsilon: config.epsilon,
        },
    );

    let mut opts = FitOptions::new(&config.checkpoint);
    opts.epochs = config.epochs;
    opts.early_stop_patience = config.early_stop_patience;
    opts.lr_patience = config.lr_patience;
    opts.lr_factor = config.lr_factor;
    opts.min_lr = config.min_lr;

    let report = trainer.fit(&mut train, &mut val, &opts)?;
    info!(
        "best validation accuracy {:.4}{}",
        report.best_val_accuracy,
        if report.stopped_early {
            " (stopped early)"
        } else {
            ""
        }
    );

    let (test_loss, test_accuracy) = trainer.evaluate(&mut val)?;
    info!("test loss {test_loss:.4}, test accuracy {test_accuracy:.4}");
    info!("best checkpoint saved to {}", config.checkpoint.display());

    Ok(())
}
