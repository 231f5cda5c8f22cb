use std::ops::Range;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{ElectricityError, Result};
use crate::formatter::{single_column, ColumnDefinition, InputType};
use crate::frame::Frame;

/// Column positions of every role, resolved once against a [Frame].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRoles {
	pub identifier: &'static str,
	pub time: usize,
	pub target: usize,
	pub inputs: Vec<usize>,
}

impl ColumnRoles {
	pub fn resolve(definition: &[ColumnDefinition], frame: &Frame) -> Result<Self> {
		let identifier = single_column(definition, InputType::Id)?;
		let time = frame.column(single_column(definition, InputType::Time)?)?;
		let target = frame.column(single_column(definition, InputType::Target)?)?;

		let inputs = definition
			.iter()
			.filter(|column| !matches!(column.input_type, InputType::Id | InputType::Time))
			.map(|column| frame.column(column.name))
			.collect::<Result<Vec<usize>>>()?;

		Ok(Self {
			identifier,
			time,
			target,
			inputs,
		})
	}
}

/// Which group size a window's relative end is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryRule {
	/// `end_rel` must stay below the mean row count over all identifiers.
	MeanGroupSize,
	/// Every window that fits inside its own identifier is kept.
	OwnGroupSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
	pub init_abs: usize,
	pub end_abs: usize,
	pub init_rel: usize,
	pub end_rel: usize,
	pub identifier: String,
	pub group_count: usize,
}

/// Every retained fixed-length window of a [Frame].
#[derive(Debug, Clone)]
pub struct WindowIndex {
	entries: Vec<WindowEntry>,
	lookback: usize,
	mean_group_size: f64,
}

/// Row ranges of each identifier, in first-seen order.
fn partition(frame: &Frame) -> Result<Vec<(String, Range<usize>)>> {
	let mut groups: Vec<(String, Range<usize>)> = Vec::new();

	for (row, identifier) in frame.identifiers().iter().enumerate() {
		if let Some((last, rows)) = groups.last_mut() {
			if *last == *identifier {
				rows.end = row + 1;
				continue;
			}
		}

		if groups.iter().any(|(seen, _)| seen == identifier) {
			return Err(ElectricityError::NonContiguousGroup(identifier.clone()));
		}

		groups.push((identifier.clone(), row..row + 1));
	}

	Ok(groups)
}

impl WindowIndex {
	pub fn build(frame: &Frame, lookback: usize, rule: BoundaryRule) -> Result<Self> {
		let groups = partition(frame)?;

		let mean_group_size = if groups.is_empty() {
			0.0
		} else {
			frame.len() as f64 / groups.len() as f64
		};

		let mut entries = Vec::new();

		for (identifier, rows) in &groups {
			let group_rows = rows.len();
			let group_count = (group_rows + 1).saturating_sub(lookback);

			for (init_rel, init_abs) in rows.clone().enumerate() {
				let end_rel = init_rel + lookback;

				let below_threshold = match rule {
					BoundaryRule::MeanGroupSize => (end_rel as f64) < mean_group_size,
					BoundaryRule::OwnGroupSize => true,
				};

				// a slice may never run into the next identifier
				if !below_threshold || end_rel > group_rows {
					continue;
				}

				entries.push(WindowEntry {
					init_abs,
					end_abs: init_abs + lookback,
					init_rel,
					end_rel,
					identifier: identifier.clone(),
					group_count,
				});
			}
		}

		info!(
			"Indexed {} windows of length {} over {} identifiers (mean group size {:.1})",
			entries.len(),
			lookback,
			groups.len(),
			mean_group_size
		);

		Ok(Self {
			entries,
			lookback,
			mean_group_size,
		})
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&WindowEntry> {
		self.entries.get(index)
	}

	pub fn entries(&self) -> &[WindowEntry] {
		&self.entries
	}

	pub fn lookback(&self) -> usize {
		self.lookback
	}

	pub fn mean_group_size(&self) -> f64 {
		self.mean_group_size
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::formatter::{frame_columns, ELECTRICITY_COLUMNS};

	fn frame_of(groups: &[(&str, usize)]) -> Frame {
		let mut frame = Frame::new(frame_columns(&ELECTRICITY_COLUMNS));
		let width = frame.width();

		for (identifier, rows) in groups {
			for row in 0..*rows {
				frame.push_row(identifier, &vec![row as f32; width]);
			}
		}

		frame
	}

	fn assert_windows_fit(frame: &Frame, index: &WindowIndex) {
		for entry in index.entries() {
			assert_eq!(entry.end_abs - entry.init_abs, index.lookback());
			assert!(entry.end_abs <= frame.len());
			assert!(frame.identifiers()[entry.init_abs..entry.end_abs]
				.iter()
				.all(|id| *id == entry.identifier));
		}
	}

	#[test]
	fn roles_resolve_against_frame() {
		let frame = frame_of(&[("MT_001", 1)]);
		let roles = ColumnRoles::resolve(&ELECTRICITY_COLUMNS, &frame).unwrap();

		assert_eq!(roles.identifier, "id");
		assert_eq!(roles.time, 0);
		assert_eq!(roles.target, 1);
		// power_usage, hour, day_of_week, hours_from_start, categorical_id
		assert_eq!(roles.inputs, vec![1, 2, 3, 0, 4]);
	}

	#[test]
	fn mean_group_size_bounds_relative_end() {
		let frame = frame_of(&[("A", 6), ("B", 4)]);
		let index = WindowIndex::build(&frame, 3, BoundaryRule::MeanGroupSize).unwrap();

		assert_eq!(index.mean_group_size(), 5.0);

		let offsets: Vec<(usize, usize, usize, usize)> = index
			.entries()
			.iter()
			.map(|entry| (entry.init_abs, entry.end_abs, entry.init_rel, entry.end_rel))
			.collect();

		assert_eq!(offsets, vec![(0, 3, 0, 3), (1, 4, 1, 4), (6, 9, 0, 3), (7, 10, 1, 4)]);
		assert!(index.entries().iter().all(|entry| (entry.end_rel as f64) < index.mean_group_size()));
		assert_eq!(index.entries()[0].group_count, 4);
		assert_eq!(index.entries()[2].group_count, 2);
		assert_windows_fit(&frame, &index);
	}

	#[test]
	fn short_groups_never_leak_into_the_next_identifier() {
		let frame = frame_of(&[("A", 2), ("B", 10)]);
		let index = WindowIndex::build(&frame, 3, BoundaryRule::MeanGroupSize).unwrap();

		assert!(index.entries().iter().all(|entry| entry.identifier == "B"));
		assert_eq!(index.entries()[0].group_count, 8);
		assert_windows_fit(&frame, &index);
	}

	#[test]
	fn own_group_size_keeps_every_full_window() {
		let frame = frame_of(&[("A", 6), ("B", 4)]);
		let index = WindowIndex::build(&frame, 3, BoundaryRule::OwnGroupSize).unwrap();

		assert_eq!(index.len(), 4 + 2);
		assert_windows_fit(&frame, &index);
	}

	#[test]
	fn interleaved_identifiers_are_rejected() {
		let frame = frame_of(&[("A", 2), ("B", 2), ("A", 2)]);

		assert!(matches!(
			WindowIndex::build(&frame, 1, BoundaryRule::MeanGroupSize),
			Err(ElectricityError::NonContiguousGroup(id)) if id == "A"
		));
	}

	#[test]
	fn empty_frame_has_no_windows() {
		let frame = frame_of(&[]);
		let index = WindowIndex::build(&frame, 3, BoundaryRule::MeanGroupSize).unwrap();

		assert!(index.is_empty());
		assert!(index.get(0).is_none());
	}
}
