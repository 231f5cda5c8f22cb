use std::sync::Arc;

use burn::config::Config;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::prelude::Backend;
use burn::tensor::ElementConversion;
use log::{info, warn};

use crate::batcher::{ElectricityBatch, ElectricityBatcher};
use crate::config::ElectricityConfig;
use crate::dataset::ElectricityDataset;
use crate::error::Result;

type Loader<B> = Arc<dyn DataLoader<ElectricityBatch<B>>>;

fn create_artifact_dir(artifact_dir: &str) {
	// Remove existing artifacts before to get an accurate summary
	std::fs::remove_dir_all(artifact_dir).ok();
	std::fs::create_dir_all(artifact_dir).ok();
}

/// Shuffled training loader and sequential validation loader.
pub fn data_loaders<B: Backend>(
	train: ElectricityDataset,
	valid: ElectricityDataset,
	batch_size: usize,
	num_workers: usize,
	seed: u64,
	device: B::Device,
) -> (Loader<B>, Loader<B>) {
	let dataloader_train = DataLoaderBuilder::new(ElectricityBatcher::<B>::new(device.clone()))
		.batch_size(batch_size)
		.shuffle(seed)
		.num_workers(num_workers)
		.build(train);

	let dataloader_valid = DataLoaderBuilder::new(ElectricityBatcher::<B>::new(device))
		.batch_size(batch_size)
		.num_workers(num_workers)
		.build(valid);

	(dataloader_train, dataloader_valid)
}

/// Builds the three splits, saves the config next to the artifacts and walks
/// the training loader once to report the batch geometry.
pub fn run<B: Backend>(artifact_dir: &str, config: ElectricityConfig, device: B::Device) -> Result<()> {
	create_artifact_dir(artifact_dir);

	config.save(format!("{artifact_dir}/config.json"))?;

	let (train_dataset, valid_dataset, test_dataset) = ElectricityDataset::get_split(&config)?;

	info!("Train Dataset Size: {}", train_dataset.len());
	info!("Valid Dataset Size: {}", valid_dataset.len());
	info!("Test Dataset Size: {}", test_dataset.len());

	let index = train_dataset.index();
	if index.is_empty() {
		warn!("No training windows of length {}", index.lookback());
		return Ok(());
	}
	info!(
		"Windows of length {} (mean group size {:.1})",
		index.lookback(),
		index.mean_group_size()
	);

	let first = train_dataset.item(0)?;
	let outputs: Vec<f64> = first.outputs.iter().map(|value| *value as f64).collect();
	let restored = train_dataset.format_predictions(&first.identifier, &outputs)?;
	info!(
		"First window of {}: {} target steps, first {:.3} kW",
		first.identifier,
		restored.len(),
		restored.first().copied().unwrap_or_default()
	);

	let batch_size = config.model.minibatch_size;
	let (dataloader_train, dataloader_valid) = data_loaders::<B>(
		train_dataset,
		valid_dataset,
		batch_size,
		config.fixed.multiprocessing_workers,
		config.seed,
		device,
	);

	if let Some(batch) = dataloader_train.iter().next() {
		let restored = batch.denormalize(batch.targets.clone());
		info!(
			"Train batch: inputs {:?}, targets {:?}, mean target {:.3} kW",
			batch.inputs.dims(),
			batch.targets.dims(),
			restored.mean().into_scalar().elem::<f32>()
		);
	}

	let valid_batches = dataloader_valid.iter().count();
	info!("Validation loader yields {} batches of up to {}", valid_batches, batch_size);

	Ok(())
}
