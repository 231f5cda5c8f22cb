//! Dataset from: https://archive.ics.uci.edu/dataset/321/electricityloaddiagrams20112014
mod batcher;
mod config;
mod dataset;
mod download;
mod error;
mod formatter;
mod frame;
mod hourly;
mod index;
mod loader;
mod scaler;

use std::time::SystemTime;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use burn::config::Config;
use log::{error, info};
use simple_logger::SimpleLogger;

use crate::config::ElectricityConfig;

const ARTIFACT_DIR: &str = "artifacts/electricity";
const DATA_FOLDER: &str = "data/electricity";

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("Logger should only be initialized once");

    let config = match std::env::args().nth(1) {
        Some(path) => ElectricityConfig::load(&path).expect("Config file should be valid"),
        None => ElectricityConfig::new(DATA_FOLDER.to_string()),
    };

    let time = SystemTime::now();

    if let Err(err) = loader::run::<NdArray>(ARTIFACT_DIR, config, NdArrayDevice::Cpu) {
        error!("Electricity pipeline failed: {}", err);
        std::process::exit(1);
    }

    info!("Time to prepare: {}", time.elapsed().unwrap().as_millis() as f64 / 1000.0);
}
