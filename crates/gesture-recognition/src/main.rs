//! Config catalog for streaming gesture recognition: https://github.com/openvinotoolkit/training_extensions
mod config;
mod error;
mod model;
mod pipeline;
mod schedule;

use std::fs;

use burn::config::Config;
use log::{error, info};
use simple_logger::SimpleLogger;

use crate::config::GestureRecognitionConfig;
use crate::error::Result;
use crate::schedule::LrPhase;

const ARTIFACT_DIR: &str = "artifacts/gesture-recognition";

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("Logger should only be initialized once");

    if let Err(err) = run(std::env::args().nth(1)) {
        error!("Gesture recognition config is not usable: {}", err);
        std::process::exit(1);
    }
}

fn run(path: Option<String>) -> Result<()> {
    let config = match path {
        Some(path) => GestureRecognitionConfig::load_validated(path)?,
        None => {
            let config = GestureRecognitionConfig::new();
            config.validate()?;
            config
        }
    };

    fs::create_dir_all(ARTIFACT_DIR)?;
    config.save(format!("{ARTIFACT_DIR}/config.json"))?;

    let train_steps: Vec<&str> = config.data.train.pipeline.iter().map(|step| step.name()).collect();
    info!("Train pipeline: {}", train_steps.join(" -> "));

    let head = &config.model.cls_head;
    info!(
        "{} classes, {} clips of {} frames at {}px",
        head.num_classes,
        config.num_train_clips(),
        config.input_clip_length,
        config.input_img_size
    );

    let mut phase = None;
    for epoch in 0..config.total_epochs {
        let current = config.lr_config.phase(epoch);
        let label = match current {
            LrPhase::Cosine { period, .. } => format!("cosine period {}", period),
            other => format!("{:?}", other).to_lowercase(),
        };

        if phase.as_ref() != Some(&label) {
            info!(
                "Epoch {}: {} (loss scale {:.2})",
                epoch,
                label,
                head.loss_cls.scale_cfg.scale(epoch as f64)
            );
            phase = Some(label);
        }
    }

    info!("Saved config to {}/config.json", ARTIFACT_DIR);
    Ok(())
}
