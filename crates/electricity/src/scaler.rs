use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ElectricityError, Result};

/// Per-column zero mean / unit variance scaling, fitted with the population std.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
	pub mean: Vec<f64>,
	pub scale: Vec<f64>,
}

impl StandardScaler {
	pub fn fit(rows: &[Vec<f64>]) -> Self {
		let width = rows.first().map(Vec::len).unwrap_or(0);
		let count = rows.len().max(1) as f64;

		let mut mean = vec![0.0; width];
		for row in rows {
			for (column, value) in row.iter().enumerate() {
				mean[column] += value;
			}
		}
		mean.iter_mut().for_each(|m| *m /= count);

		let mut variance = vec![0.0; width];
		for row in rows {
			for (column, value) in row.iter().enumerate() {
				variance[column] += (value - mean[column]).powi(2);
			}
		}

		// constant columns keep their values unscaled
		let scale = variance
			.into_iter()
			.map(|v| (v / count).sqrt())
			.map(|std| if std < 10.0 * f64::EPSILON { 1.0 } else { std })
			.collect();

		Self { mean, scale }
	}

	pub fn transform(&self, column: usize, value: f64) -> f64 {
		(value - self.mean[column]) / self.scale[column]
	}

	pub fn inverse_transform(&self, column: usize, value: f64) -> f64 {
		value * self.scale[column] + self.mean[column]
	}
}

/// Maps string categories to their position among the sorted distinct values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
	pub column: String,
	pub classes: Vec<String>,
}

impl LabelEncoder {
	pub fn fit<'a, I: IntoIterator<Item = &'a str>>(column: &str, values: I) -> Self {
		let mut classes: Vec<String> = values.into_iter().map(str::to_string).collect();
		classes.sort();
		classes.dedup();

		Self {
			column: column.to_string(),
			classes,
		}
	}

	pub fn num_classes(&self) -> usize {
		self.classes.len()
	}

	pub fn transform(&self, value: &str) -> Result<usize> {
		self.classes
			.binary_search_by(|class| class.as_str().cmp(value))
			.map_err(|_| ElectricityError::UnknownCategory {
				column: self.column.clone(),
				value: value.to_string(),
			})
	}
}

/// Fitted target scalers keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalerTable {
	scalers: HashMap<String, StandardScaler>,
}

impl ScalerTable {
	pub fn insert(&mut self, identifier: &str, scaler: StandardScaler) {
		self.scalers.insert(identifier.to_string(), scaler);
	}

	pub fn get(&self, identifier: &str) -> Result<&StandardScaler> {
		self.scalers
			.get(identifier)
			.ok_or_else(|| ElectricityError::MissingScaler(identifier.to_string()))
	}

	pub fn contains(&self, identifier: &str) -> bool {
		self.scalers.contains_key(identifier)
	}

	/// Maps normalized target values of `identifier` back to the original unit.
	pub fn denormalize(&self, identifier: &str, values: &[f64]) -> Result<Vec<f64>> {
		let scaler = self.get(identifier)?;

		Ok(values.iter().map(|value| scaler.inverse_transform(0, *value)).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn standard_scaler_uses_population_std() {
		let scaler = StandardScaler::fit(&[vec![1.0, 10.0], vec![3.0, 10.0]]);

		assert_eq!(scaler.mean, vec![2.0, 10.0]);
		assert_eq!(scaler.scale[0], 1.0);
		// zero variance column falls back to a unit scale
		assert_eq!(scaler.scale[1], 1.0);

		let scaler = StandardScaler::fit(&[vec![0.0], vec![4.0]]);
		assert_eq!(scaler.scale, vec![2.0]);
		assert_eq!(scaler.transform(0, 4.0), 1.0);
		assert_eq!(scaler.inverse_transform(0, -1.0), 0.0);
	}

	#[test]
	fn scaler_table_reports_missing_identifiers() {
		let mut table = ScalerTable::default();
		table.insert("MT_001", StandardScaler::fit(&[vec![0.0], vec![4.0]]));

		assert_eq!(table.denormalize("MT_001", &[1.0, 0.0]).unwrap(), vec![4.0, 2.0]);
		assert!(matches!(table.get("MT_002"), Err(ElectricityError::MissingScaler(id)) if id == "MT_002"));
	}

	#[test]
	fn label_encoder_sorts_classes() {
		let encoder = LabelEncoder::fit("categorical_id", ["MT_003", "MT_001", "MT_003", "MT_002"]);

		assert_eq!(encoder.num_classes(), 3);
		assert_eq!(encoder.transform("MT_001").unwrap(), 0);
		assert_eq!(encoder.transform("MT_003").unwrap(), 2);
		assert!(matches!(
			encoder.transform("MT_999"),
			Err(ElectricityError::UnknownCategory { .. })
		));
	}
}
