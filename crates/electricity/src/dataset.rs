use std::sync::Arc;

use burn::data::dataset::Dataset;
use log::{error, info};

use crate::config::ElectricityConfig;
use crate::download;
use crate::error::{ElectricityError, Result};
use crate::formatter::{ElectricityFormatter, SplitBoundaries};
use crate::frame::Frame;
use crate::hourly::{self, HourlyRecord};
use crate::index::{BoundaryRule, ColumnRoles, WindowIndex};
use crate::scaler::ScalerTable;

/// One window: encoder + decoder inputs, decoder targets and the target
/// scaler needed to bring predictions back to kW.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectricityItem {
	/// `[lookback][num_inputs]`
	pub inputs: Vec<Vec<f32>>,
	/// Target values after the encoder steps.
	pub outputs: Vec<f32>,
	pub scaler_mean: f32,
	pub scaler_scale: f32,
	pub identifier: String,
}

pub struct ElectricityDataset {
	frame: Frame,
	roles: ColumnRoles,
	index: WindowIndex,
	target_scaler: Arc<ScalerTable>,
	num_encoder_steps: usize,
}

impl ElectricityDataset {
	/// Downloads (if needed), aggregates and splits the readings into
	/// train, validation and test datasets.
	pub fn get_split(config: &ElectricityConfig) -> Result<(Self, Self, Self)> {
		config.validate()?;

		let path = download::ensure_downloaded(&config.data_folder)?;
		let records = hourly::aggregating_to_hourly_data(path, config.day_window())?;
		let mut formatter = ElectricityFormatter::new(config.fixed.clone());

		Self::from_records(&records, &mut formatter, config.split_boundaries(), config.boundary_rule)
	}

	pub fn from_records(
		records: &[HourlyRecord],
		formatter: &mut ElectricityFormatter,
		boundaries: SplitBoundaries,
		rule: BoundaryRule,
	) -> Result<(Self, Self, Self)> {
		let (train, valid, test) = formatter.split_data(records, boundaries)?;

		let train = Self::new(train, formatter, rule)?;
		let valid = Self::new(valid, formatter, rule)?;
		let test = Self::new(test, formatter, rule)?;

		info!(
			"Windows: train {}, valid {}, test {}",
			train.len(),
			valid.len(),
			test.len()
		);

		Ok((train, valid, test))
	}

	pub fn new(frame: Frame, formatter: &ElectricityFormatter, rule: BoundaryRule) -> Result<Self> {
		let roles = ColumnRoles::resolve(formatter.column_definition(), &frame)?;
		let index = WindowIndex::build(&frame, formatter.time_steps(), rule)?;

		Ok(Self {
			frame,
			roles,
			index,
			target_scaler: formatter.target_scalers(),
			num_encoder_steps: formatter.num_encoder_steps(),
		})
	}

	pub fn index(&self) -> &WindowIndex {
		&self.index
	}

	pub fn roles(&self) -> &ColumnRoles {
		&self.roles
	}

	pub fn num_inputs(&self) -> usize {
		self.roles.inputs.len()
	}

	/// Inverse-transforms target predictions of `identifier` to kW.
	pub fn format_predictions(&self, identifier: &str, predictions: &[f64]) -> Result<Vec<f64>> {
		self.target_scaler.denormalize(identifier, predictions)
	}

	pub fn item(&self, index: usize) -> Result<ElectricityItem> {
		let entry = self.index.get(index).ok_or(ElectricityError::IndexOutOfBounds {
			index,
			len: self.index.len(),
		})?;

		let identifier = self.frame.identifier(entry.init_abs);
		let scaler = self.target_scaler.get(identifier)?;

		let rows: Vec<&[f32]> = self.frame.rows(entry.init_abs, entry.end_abs).collect();

		let inputs = rows
			.iter()
			.map(|row| self.roles.inputs.iter().map(|&column| row[column]).collect())
			.collect();

		let outputs = rows
			.iter()
			.skip(self.num_encoder_steps)
			.map(|row| row[self.roles.target])
			.collect();

		Ok(ElectricityItem {
			inputs,
			outputs,
			scaler_mean: scaler.mean[0] as f32,
			scaler_scale: scaler.scale[0] as f32,
			identifier: identifier.to_string(),
		})
	}
}

impl Dataset<ElectricityItem> for ElectricityDataset {
	fn get(&self, index: usize) -> Option<ElectricityItem> {
		match self.item(index) {
			Ok(item) => Some(item),
			Err(ElectricityError::IndexOutOfBounds { .. }) => None,
			Err(err) => {
				error!("Window {} could not be loaded: {}", index, err);
				None
			}
		}
	}

	fn len(&self) -> usize {
		self.index.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::FixedParams;
	use crate::formatter::frame_columns;
	use crate::formatter::tests::synthetic_records;

	fn small_formatter() -> ElectricityFormatter {
		ElectricityFormatter::new(FixedParams::new().with_total_time_steps(4).with_num_encoder_steps(3))
	}

	fn fitted_dataset(rule: BoundaryRule) -> (ElectricityDataset, ElectricityFormatter) {
		let mut records = synthetic_records("MT_001", 0, 12);
		records.extend(synthetic_records("MT_002", 0, 8));
		let refs: Vec<&HourlyRecord> = records.iter().collect();

		let mut formatter = small_formatter();
		formatter.set_scalers(&refs).unwrap();
		let frame = formatter.transform_inputs(&refs).unwrap();

		(ElectricityDataset::new(frame, &formatter, rule).unwrap(), formatter)
	}

	#[test]
	fn item_shapes_follow_window_geometry() {
		let (dataset, formatter) = fitted_dataset(BoundaryRule::MeanGroupSize);
		let item = dataset.item(0).unwrap();

		assert_eq!(item.inputs.len(), 4);
		assert!(item.inputs.iter().all(|row| row.len() == dataset.num_inputs()));
		assert_eq!(dataset.num_inputs(), 5);
		// lookback 4 minus 3 encoder steps
		assert_eq!(item.outputs.len(), 1);

		let scaler = formatter.target_scalers();
		let scaler = scaler.get(&item.identifier).unwrap();
		assert_eq!(item.scaler_mean, scaler.mean[0] as f32);
		assert_eq!(item.scaler_scale, scaler.scale[0] as f32);
	}

	#[test]
	fn outputs_are_the_target_after_the_encoder() {
		let (dataset, _) = fitted_dataset(BoundaryRule::MeanGroupSize);
		let item = dataset.item(1).unwrap();

		// power_usage is the first input column
		assert_eq!(item.outputs[0], item.inputs[3][0]);
	}

	#[test]
	fn predictions_are_restored_with_the_identifier_scaler() {
		let (dataset, _) = fitted_dataset(BoundaryRule::MeanGroupSize);
		let item = dataset.item(0).unwrap();
		let outputs: Vec<f64> = item.outputs.iter().map(|value| *value as f64).collect();

		let restored = dataset.format_predictions(&item.identifier, &outputs).unwrap();
		let expected = outputs[0] * item.scaler_scale as f64 + item.scaler_mean as f64;

		assert!((restored[0] - expected).abs() < 1e-4);
		assert!(matches!(
			dataset.format_predictions("MT_404", &outputs),
			Err(ElectricityError::MissingScaler(id)) if id == "MT_404"
		));
	}

	#[test]
	fn repeated_access_is_identical() {
		let (dataset, _) = fitted_dataset(BoundaryRule::MeanGroupSize);

		for index in 0..dataset.len() {
			assert_eq!(dataset.item(index).unwrap(), dataset.item(index).unwrap());
		}
	}

	#[test]
	fn last_index_succeeds_and_len_is_out_of_bounds() {
		let (dataset, _) = fitted_dataset(BoundaryRule::MeanGroupSize);
		let len = dataset.len();

		// mean group size 10: MT_001 keeps end_rel 4..=9, MT_002 keeps end_rel 4..=8
		assert_eq!(len, 6 + 5);
		assert!(dataset.item(len - 1).is_ok());
		assert!(matches!(
			dataset.item(len),
			Err(ElectricityError::IndexOutOfBounds { index, len: l }) if index == len && l == len
		));
		assert!(dataset.get(len).is_none());
	}

	#[test]
	fn identifier_without_scaler_is_a_lookup_error() {
		let train = synthetic_records("MT_001", 0, 8);
		let mut formatter = small_formatter();
		formatter.set_scalers(&train.iter().collect::<Vec<_>>()).unwrap();

		let mut frame = Frame::new(frame_columns(formatter.column_definition()));
		for row in 0..8 {
			frame.push_row("MT_404", &[row as f32; 5]);
		}

		let dataset = ElectricityDataset::new(frame, &formatter, BoundaryRule::OwnGroupSize).unwrap();

		assert!(matches!(dataset.item(0), Err(ElectricityError::MissingScaler(id)) if id == "MT_404"));
		assert!(dataset.get(0).is_none());
	}

	#[test]
	fn from_records_builds_all_splits() {
		let mut records = synthetic_records("MT_001", 0, 24 * 10);
		records.extend(synthetic_records("MT_002", 0, 24 * 10));

		let mut formatter = small_formatter();
		let boundaries = SplitBoundaries {
			valid: 6,
			test: 8,
			context_days: 1,
		};

		let (train, valid, test) =
			ElectricityDataset::from_records(&records, &mut formatter, boundaries, BoundaryRule::MeanGroupSize).unwrap();

		// 144 rows per identifier, end_rel 4..=143
		assert_eq!(train.len(), 2 * 140);
		assert_eq!(valid.len(), 2 * 68);
		assert_eq!(test.len(), 2 * 68);

		for dataset in [&train, &valid, &test] {
			for entry in dataset.index().entries() {
				assert_eq!(entry.end_abs - entry.init_abs, 4);
			}
		}
	}
}
