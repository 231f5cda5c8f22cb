//! Column roles, train/valid/test splitting and scaler fitting for the
//! hourly electricity table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::FixedParams;
use crate::error::{ElectricityError, Result};
use crate::frame::Frame;
use crate::hourly::HourlyRecord;
use crate::scaler::{LabelEncoder, ScalerTable, StandardScaler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
	RealValued,
	Categorical,
	Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
	Target,
	ObservedInput,
	KnownInput,
	StaticInput,
	Id,
	Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDefinition {
	pub name: &'static str,
	pub data_type: DataType,
	pub input_type: InputType,
}

impl ColumnDefinition {
	const fn new(name: &'static str, data_type: DataType, input_type: InputType) -> Self {
		Self {
			name,
			data_type,
			input_type,
		}
	}
}

pub const ELECTRICITY_COLUMNS: [ColumnDefinition; 7] = [
	ColumnDefinition::new("id", DataType::RealValued, InputType::Id),
	ColumnDefinition::new("hours_from_start", DataType::RealValued, InputType::Time),
	ColumnDefinition::new("power_usage", DataType::RealValued, InputType::Target),
	ColumnDefinition::new("hour", DataType::RealValued, InputType::KnownInput),
	ColumnDefinition::new("day_of_week", DataType::RealValued, InputType::KnownInput),
	ColumnDefinition::new("hours_from_start", DataType::RealValued, InputType::KnownInput),
	ColumnDefinition::new("categorical_id", DataType::Categorical, InputType::StaticInput),
];

/// Name of the single column playing `input_type`.
pub fn single_column(definition: &[ColumnDefinition], input_type: InputType) -> Result<&'static str> {
	let mut columns = definition.iter().filter(|column| column.input_type == input_type);

	match (columns.next(), columns.next()) {
		(Some(column), None) => Ok(column.name),
		_ => Err(ElectricityError::ColumnRole(input_type)),
	}
}

/// Columns of `data_type`, skipping the ID and TIME roles.
pub fn columns_of_type(definition: &[ColumnDefinition], data_type: DataType) -> Vec<&'static str> {
	definition
		.iter()
		.filter(|column| column.data_type == data_type)
		.filter(|column| !matches!(column.input_type, InputType::Id | InputType::Time))
		.map(|column| column.name)
		.collect()
}

/// Distinct column names stored in a [Frame], in definition order. The
/// identifier lives next to the rows rather than in a column.
pub fn frame_columns(definition: &[ColumnDefinition]) -> Vec<String> {
	let mut columns: Vec<String> = Vec::new();

	for column in definition.iter().filter(|column| column.input_type != InputType::Id) {
		if !columns.iter().any(|name| name == column.name) {
			columns.push(column.name.to_string());
		}
	}

	columns
}

fn real_field(record: &HourlyRecord, name: &str) -> Result<f64> {
	let value = match name {
		"power_usage" => record.power_usage,
		"t" => record.t,
		"hours_from_start" => record.hours_from_start,
		"days_from_start" => record.days_from_start as f64,
		"hour" => record.hour as f64,
		"day" => record.day as f64,
		"day_of_week" => record.day_of_week as f64,
		"month" => record.month as f64,
		"categorical_hour" => record.categorical_hour as f64,
		"categorical_day_of_week" => record.categorical_day_of_week as f64,
		_ => return Err(ElectricityError::MissingColumn(name.to_string())),
	};

	Ok(value)
}

fn categorical_field(record: &HourlyRecord, name: &str) -> Result<String> {
	match name {
		"id" => Ok(record.id.clone()),
		"categorical_id" => Ok(record.categorical_id.clone()),
		_ => real_field(record, name).map(|value| value.to_string()),
	}
}

/// Day boundaries between the three splits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitBoundaries {
	pub valid: i64,
	pub test: i64,
	pub context_days: i64,
}

impl Default for SplitBoundaries {
	fn default() -> Self {
		Self {
			valid: 1315,
			test: 1339,
			context_days: 7,
		}
	}
}

fn group_by_identifier<'a>(records: &[&'a HourlyRecord]) -> BTreeMap<&'a str, Vec<&'a HourlyRecord>> {
	let mut groups: BTreeMap<&str, Vec<&HourlyRecord>> = BTreeMap::new();

	for &record in records {
		groups.entry(record.id.as_str()).or_default().push(record);
	}

	groups
}

#[derive(Debug, Clone)]
pub struct ElectricityFormatter {
	column_definition: Vec<ColumnDefinition>,
	params: FixedParams,
	real_scalers: HashMap<String, StandardScaler>,
	target_scaler: Arc<ScalerTable>,
	cat_scalers: Vec<LabelEncoder>,
	identifiers: Vec<String>,
}

impl ElectricityFormatter {
	pub fn new(params: FixedParams) -> Self {
		Self {
			column_definition: ELECTRICITY_COLUMNS.to_vec(),
			params,
			real_scalers: HashMap::new(),
			target_scaler: Arc::new(ScalerTable::default()),
			cat_scalers: Vec::new(),
			identifiers: Vec::new(),
		}
	}

	pub fn column_definition(&self) -> &[ColumnDefinition] {
		&self.column_definition
	}

	pub fn params(&self) -> &FixedParams {
		&self.params
	}

	/// Total length of one window, encoder and decoder steps together.
	pub fn time_steps(&self) -> usize {
		self.params.total_time_steps
	}

	pub fn num_encoder_steps(&self) -> usize {
		self.params.num_encoder_steps
	}

	pub fn identifiers(&self) -> &[String] {
		&self.identifiers
	}

	pub fn target_scalers(&self) -> Arc<ScalerTable> {
		Arc::clone(&self.target_scaler)
	}

	pub fn num_classes_per_cat_input(&self) -> Vec<usize> {
		self.cat_scalers.iter().map(LabelEncoder::num_classes).collect()
	}

	/// Splits by `days_from_start`, fits the scalers on the training rows and
	/// returns the transformed (train, valid, test) frames.
	pub fn split_data(&mut self, records: &[HourlyRecord], boundaries: SplitBoundaries) -> Result<(Frame, Frame, Frame)> {
		let train: Vec<&HourlyRecord> = records
			.iter()
			.filter(|record| record.days_from_start < boundaries.valid)
			.collect();

		let valid: Vec<&HourlyRecord> = records
			.iter()
			.filter(|record| record.days_from_start >= boundaries.valid - boundaries.context_days)
			.filter(|record| record.days_from_start < boundaries.test)
			.collect();

		let test: Vec<&HourlyRecord> = records
			.iter()
			.filter(|record| record.days_from_start >= boundaries.test - boundaries.context_days)
			.collect();

		info!("Split rows: train {}, valid {}, test {}", train.len(), valid.len(), test.len());

		self.set_scalers(&train)?;

		Ok((
			self.transform_inputs(&train)?,
			self.transform_inputs(&valid)?,
			self.transform_inputs(&test)?,
		))
	}

	/// Fits per-identifier scalers for identifiers with at least one full window
	/// of rows, and one label encoder per categorical input.
	pub fn set_scalers(&mut self, records: &[&HourlyRecord]) -> Result<()> {
		let target_column = single_column(&self.column_definition, InputType::Target)?;
		let real_inputs = columns_of_type(&self.column_definition, DataType::RealValued);
		let categorical_inputs = columns_of_type(&self.column_definition, DataType::Categorical);

		let mut real_scalers = HashMap::new();
		let mut target_scaler = ScalerTable::default();
		let mut identifiers = Vec::new();

		for (identifier, group) in group_by_identifier(records) {
			if group.len() >= self.time_steps() {
				let data = group
					.iter()
					.map(|record| {
						real_inputs
							.iter()
							.map(|column| real_field(record, column))
							.collect::<Result<Vec<f64>>>()
					})
					.collect::<Result<Vec<Vec<f64>>>>()?;

				let targets = group
					.iter()
					.map(|record| real_field(record, target_column).map(|value| vec![value]))
					.collect::<Result<Vec<Vec<f64>>>>()?;

				real_scalers.insert(identifier.to_string(), StandardScaler::fit(&data));
				target_scaler.insert(identifier, StandardScaler::fit(&targets));
			} else {
				debug!("Identifier {} has {} rows, no scaler fitted", identifier, group.len());
			}

			identifiers.push(identifier.to_string());
		}

		let mut cat_scalers = Vec::with_capacity(categorical_inputs.len());
		for column in categorical_inputs {
			let values = records
				.iter()
				.map(|record| categorical_field(record, column))
				.collect::<Result<Vec<String>>>()?;

			cat_scalers.push(LabelEncoder::fit(column, values.iter().map(String::as_str)));
		}

		info!("Fitted scalers for {} of {} identifiers", real_scalers.len(), identifiers.len());

		self.real_scalers = real_scalers;
		self.target_scaler = Arc::new(target_scaler);
		self.cat_scalers = cat_scalers;
		self.identifiers = identifiers;

		Ok(())
	}

	/// Scales real inputs per identifier and label-encodes categorical inputs.
	/// Identifiers shorter than one window are dropped.
	pub fn transform_inputs(&self, records: &[&HourlyRecord]) -> Result<Frame> {
		let real_inputs = columns_of_type(&self.column_definition, DataType::RealValued);
		let columns = frame_columns(&self.column_definition);
		let mut frame = Frame::new(columns.clone());
		let mut row = vec![0.0f32; columns.len()];

		for (identifier, group) in group_by_identifier(records) {
			if group.len() < self.time_steps() {
				continue;
			}

			let scaler = self
				.real_scalers
				.get(identifier)
				.ok_or_else(|| ElectricityError::MissingScaler(identifier.to_string()))?;

			for record in group {
				for (slot, column) in row.iter_mut().zip(&columns) {
					let value = if let Some(position) = real_inputs.iter().position(|name| *name == column.as_str()) {
						scaler.transform(position, real_field(record, column)?)
					} else if let Some(encoder) = self.cat_scalers.iter().find(|encoder| &encoder.column == column) {
						encoder.transform(&categorical_field(record, column)?)? as f64
					} else {
						real_field(record, column)?
					};

					*slot = value as f32;
				}

				frame.push_row(identifier, &row);
			}
		}

		Ok(frame)
	}
}

impl Default for ElectricityFormatter {
	fn default() -> Self {
		Self::new(FixedParams::new())
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use chrono::{Duration, NaiveDate};

	/// `hours` consecutive hourly rows for `id`, starting on `first_day`.
	pub(crate) fn synthetic_records(id: &str, first_day: i64, hours: usize) -> Vec<HourlyRecord> {
		let origin = NaiveDate::from_ymd_opt(2014, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

		(0..hours)
			.map(|h| {
				let t = (first_day * 24) as f64 + h as f64;
				let date = origin + Duration::hours(t as i64);

				HourlyRecord {
					id: id.to_string(),
					date,
					power_usage: (h % 24) as f64 + 1.0,
					t,
					days_from_start: (t / 24.0).floor() as i64,
					hour: (h % 24) as u32,
					day: 1,
					day_of_week: 0,
					month: 1,
					categorical_id: id.to_string(),
					hours_from_start: t,
					categorical_hour: (h % 24) as u32,
					categorical_day_of_week: 0,
				}
			})
			.collect()
	}

	fn small_params() -> FixedParams {
		FixedParams::new().with_total_time_steps(4).with_num_encoder_steps(3)
	}

	#[test]
	fn column_roles_resolve() {
		assert_eq!(single_column(&ELECTRICITY_COLUMNS, InputType::Id).unwrap(), "id");
		assert_eq!(single_column(&ELECTRICITY_COLUMNS, InputType::Target).unwrap(), "power_usage");
		assert!(matches!(
			single_column(&ELECTRICITY_COLUMNS, InputType::KnownInput),
			Err(ElectricityError::ColumnRole(InputType::KnownInput))
		));

		assert_eq!(
			columns_of_type(&ELECTRICITY_COLUMNS, DataType::RealValued),
			vec!["power_usage", "hour", "day_of_week", "hours_from_start"]
		);
		assert_eq!(
			frame_columns(&ELECTRICITY_COLUMNS),
			vec!["hours_from_start", "power_usage", "hour", "day_of_week", "categorical_id"]
		);
	}

	#[test]
	fn split_follows_day_boundaries() {
		let records = synthetic_records("MT_001", 0, 24 * 10);
		let mut formatter = ElectricityFormatter::new(small_params());
		let boundaries = SplitBoundaries {
			valid: 6,
			test: 8,
			context_days: 1,
		};

		let (train, valid, test) = formatter.split_data(&records, boundaries).unwrap();

		assert_eq!(train.len(), 24 * 6);
		// days 5..8
		assert_eq!(valid.len(), 24 * 3);
		// days 7..10
		assert_eq!(test.len(), 24 * 3);
	}

	#[test]
	fn short_identifiers_are_dropped_and_left_unscaled() {
		let mut records = synthetic_records("MT_001", 0, 10);
		records.extend(synthetic_records("MT_002", 0, 3));
		let refs: Vec<&HourlyRecord> = records.iter().collect();

		let mut formatter = ElectricityFormatter::new(small_params());
		formatter.set_scalers(&refs).unwrap();

		assert_eq!(formatter.identifiers(), &["MT_001".to_string(), "MT_002".to_string()]);
		assert!(formatter.target_scalers().contains("MT_001"));
		assert!(!formatter.target_scalers().contains("MT_002"));
		assert_eq!(formatter.num_classes_per_cat_input(), vec![2]);

		let frame = formatter.transform_inputs(&refs).unwrap();
		assert_eq!(frame.len(), 10);
		assert!(frame.identifiers().iter().all(|id| id == "MT_001"));
	}

	#[test]
	fn transformed_target_is_standardized() {
		let records = synthetic_records("MT_001", 0, 24);
		let refs: Vec<&HourlyRecord> = records.iter().collect();

		let mut formatter = ElectricityFormatter::new(small_params());
		formatter.set_scalers(&refs).unwrap();
		let frame = formatter.transform_inputs(&refs).unwrap();

		let target = frame.column("power_usage").unwrap();
		let mean = (0..frame.len()).map(|row| frame.value(row, target) as f64).sum::<f64>() / frame.len() as f64;
		assert!(mean.abs() < 1e-5);

		let category = frame.column("categorical_id").unwrap();
		assert_eq!(frame.value(0, category), 0.0);

		let scaled = frame.value(3, target) as f64;
		let restored = formatter.target_scalers().denormalize("MT_001", &[scaled]).unwrap();
		assert!((restored[0] - records[3].power_usage).abs() < 1e-4);
	}

	#[test]
	fn unseen_identifier_cannot_be_transformed() {
		let train = synthetic_records("MT_001", 0, 8);
		let other = synthetic_records("MT_002", 0, 8);

		let mut formatter = ElectricityFormatter::new(small_params());
		formatter.set_scalers(&train.iter().collect::<Vec<_>>()).unwrap();

		let result = formatter.transform_inputs(&other.iter().collect::<Vec<_>>());
		assert!(matches!(result, Err(ElectricityError::MissingScaler(id)) if id == "MT_002"));
	}
}
