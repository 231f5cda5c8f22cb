use burn::data::dataloader::batcher::Batcher;
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::dataset::ElectricityItem;

#[derive(Debug, Clone)]
pub struct ElectricityBatch<B: Backend> {
	/// `[batch, lookback, num_inputs]`
	pub inputs: Tensor<B, 3>,
	/// `[batch, horizon]`
	pub targets: Tensor<B, 2>,
	pub mean: Tensor<B, 1>,
	pub scale: Tensor<B, 1>,
}

impl<B: Backend> ElectricityBatch<B> {
	/// Brings `[batch, horizon]` predictions back to the original unit.
	pub fn denormalize(&self, predictions: Tensor<B, 2>) -> Tensor<B, 2> {
		predictions * self.scale.clone().unsqueeze_dim(1) + self.mean.clone().unsqueeze_dim(1)
	}
}

#[derive(Debug, Clone)]
pub struct ElectricityBatcher<B: Backend> {
	device: B::Device,
}

impl<B: Backend> ElectricityBatcher<B> {
	pub fn new(device: B::Device) -> Self {
		Self { device }
	}
}

impl<B: Backend> Batcher<ElectricityItem, ElectricityBatch<B>> for ElectricityBatcher<B> {
	fn batch(&self, items: Vec<ElectricityItem>) -> ElectricityBatch<B> {
		let batch_size = items.len();
		assert!(batch_size > 0, "Cannot create a batch from an empty Vec");

		let lookback = items[0].inputs.len();
		let num_inputs = items[0].inputs.first().map(Vec::len).unwrap_or(0);
		let horizon = items[0].outputs.len();

		let mut inputs = Vec::with_capacity(batch_size * lookback * num_inputs);
		let mut targets = Vec::with_capacity(batch_size * horizon);
		let mut mean = Vec::with_capacity(batch_size);
		let mut scale = Vec::with_capacity(batch_size);

		for item in items.iter() {
			for row in item.inputs.iter() {
				inputs.extend_from_slice(row);
			}
			targets.extend_from_slice(&item.outputs);
			mean.push(item.scaler_mean);
			scale.push(item.scaler_scale);
		}

		let inputs = Tensor::<B, 3>::from_data(
			TensorData::new(inputs, [batch_size, lookback, num_inputs]).convert::<B::FloatElem>(),
			&self.device,
		);
		let targets = Tensor::<B, 2>::from_data(
			TensorData::new(targets, [batch_size, horizon]).convert::<B::FloatElem>(),
			&self.device,
		);
		let mean = Tensor::<B, 1>::from_data(TensorData::new(mean, [batch_size]).convert::<B::FloatElem>(), &self.device);
		let scale = Tensor::<B, 1>::from_data(TensorData::new(scale, [batch_size]).convert::<B::FloatElem>(), &self.device);

		ElectricityBatch {
			inputs,
			targets,
			mean,
			scale,
		}
	}
}
