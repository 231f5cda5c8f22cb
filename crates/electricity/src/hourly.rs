//! Turns the raw UCI `LD2011_2014.txt` readings into a regular hourly table.
//!
//! The source file is wide: one timestamp column followed by one column per
//! meter, `;` separated with `,` as the decimal mark. Readings are averaged
//! into hourly buckets, each meter is trimmed to the span between its first
//! and last non-zero bucket, and calendar fields are attached to every row.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ElectricityError, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Days from the earliest timestamp used by the published electricity benchmark.
pub const BENCHMARK_FIRST_DAY: i64 = 1096;
pub const BENCHMARK_END_DAY: i64 = 1346;

/// Half-open range of `days_from_start` values kept by [aggregate].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayWindow {
	pub first_day: i64,
	pub end_day: i64,
}

impl DayWindow {
	pub fn new(first_day: i64, end_day: i64) -> Self {
		Self { first_day, end_day }
	}

	pub fn contains(&self, day: i64) -> bool {
		day >= self.first_day && day < self.end_day
	}
}

impl Default for DayWindow {
	fn default() -> Self {
		Self::new(BENCHMARK_FIRST_DAY, BENCHMARK_END_DAY)
	}
}

/// Hourly bucket means for every meter, on one grid shared by all meters.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyGrid {
	pub start: NaiveDateTime,
	pub entities: Vec<String>,
	/// `values[entity][hour]`, `None` where the bucket is empty or averaged to zero.
	pub values: Vec<Vec<Option<f64>>>,
}

impl HourlyGrid {
	pub fn hours(&self) -> usize {
		self.values.first().map(Vec::len).unwrap_or(0)
	}

	pub fn timestamp(&self, hour: usize) -> NaiveDateTime {
		self.start + Duration::hours(hour as i64)
	}

	/// First and last hour holding a reading, if the entity has any.
	pub fn validity_span(&self, entity: usize) -> Option<(usize, usize)> {
		let series = self.values.get(entity)?;
		let first = series.iter().position(Option::is_some)?;
		let last = series.iter().rposition(Option::is_some)?;

		Some((first, last))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRecord {
	pub id: String,
	pub date: NaiveDateTime,
	pub power_usage: f64,
	pub t: f64,
	pub days_from_start: i64,
	pub hour: u32,
	pub day: u32,
	pub day_of_week: u32,
	pub month: u32,
	pub categorical_id: String,
	pub hours_from_start: f64,
	pub categorical_hour: u32,
	pub categorical_day_of_week: u32,
}

#[derive(Default)]
struct Bucket {
	sums: Vec<f64>,
	counts: Vec<u32>,
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
	NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
		.map_err(|_| ElectricityError::Timestamp(raw.to_string()))
}

fn floor_to_hour(timestamp: NaiveDateTime) -> Result<NaiveDateTime> {
	let time = NaiveTime::from_hms_opt(timestamp.hour(), 0, 0)
		.ok_or_else(|| ElectricityError::Timestamp(timestamp.to_string()))?;

	Ok(NaiveDateTime::new(timestamp.date(), time))
}

/// Parses a decimal written with a `,` separator. Empty cells are missing readings.
fn parse_reading(raw: &str) -> Option<std::result::Result<f64, std::num::ParseFloatError>> {
	let raw = raw.trim();
	if raw.is_empty() {
		return None;
	}

	Some(raw.replace(',', ".").parse::<f64>())
}

/// Reads the wide readings file and averages it into hourly buckets.
pub fn read_hourly_grid<R: Read>(reader: R) -> Result<HourlyGrid> {
	let mut reader = csv::ReaderBuilder::new()
		.delimiter(b';')
		.has_headers(true)
		.from_reader(reader);

	let entities: Vec<String> = reader
		.headers()?
		.iter()
		.skip(1)
		.map(|label| label.trim().to_string())
		.collect();

	let mut buckets: BTreeMap<NaiveDateTime, Bucket> = BTreeMap::new();

	for record in reader.records() {
		let record = record?;
		let raw_timestamp = record.get(0).unwrap_or_default();
		let hour = floor_to_hour(parse_timestamp(raw_timestamp)?)?;

		let bucket = buckets.entry(hour).or_insert_with(|| Bucket {
			sums: vec![0.0; entities.len()],
			counts: vec![0; entities.len()],
		});

		for (entity, field) in record.iter().skip(1).enumerate().take(entities.len()) {
			let Some(value) = parse_reading(field) else {
				continue;
			};

			let value = value.map_err(|_| ElectricityError::Reading {
				entity: entities[entity].clone(),
				timestamp: raw_timestamp.to_string(),
				value: field.to_string(),
			})?;

			if value.is_nan() {
				continue;
			}

			bucket.sums[entity] += value;
			bucket.counts[entity] += 1;
		}
	}

	let (Some(start), Some(end)) = (
		buckets.keys().next().copied(),
		buckets.keys().next_back().copied(),
	) else {
		return Ok(HourlyGrid {
			start: NaiveDateTime::default(),
			values: vec![Vec::new(); entities.len()],
			entities,
		});
	};

	let hours = (end - start).num_hours() as usize + 1;
	let mut values = vec![vec![None; hours]; entities.len()];

	for (timestamp, bucket) in &buckets {
		let hour = (*timestamp - start).num_hours() as usize;

		for (entity, series) in values.iter_mut().enumerate() {
			if bucket.counts[entity] == 0 {
				continue;
			}

			let mean = bucket.sums[entity] / bucket.counts[entity] as f64;
			series[hour] = if mean == 0.0 { None } else { Some(mean) };
		}
	}

	debug!("Resampled readings into {} filled buckets spanning {} hours", buckets.len(), hours);

	Ok(HourlyGrid {
		start,
		entities,
		values,
	})
}

/// Trims every entity to its validity span, zero fills the gaps inside it and
/// attaches calendar fields. Only rows inside `window` are returned.
pub fn aggregate(grid: &HourlyGrid, window: DayWindow) -> Vec<HourlyRecord> {
	let earliest = grid.start;
	let mut records = Vec::new();

	for (entity, label) in grid.entities.iter().enumerate() {
		debug!("Processing {}", label);

		let Some((first, last)) = grid.validity_span(entity) else {
			warn!("Entity {} has no valid readings and is dropped", label);
			continue;
		};

		for hour in first..=last {
			let date = grid.timestamp(hour);
			let elapsed = date - earliest;
			let days_from_start = elapsed.num_days();

			if !window.contains(days_from_start) {
				continue;
			}

			let t = elapsed.num_seconds() as f64 / 3600.0;
			let day_of_week = date.weekday().num_days_from_monday();

			records.push(HourlyRecord {
				id: label.clone(),
				date,
				power_usage: grid.values[entity][hour].unwrap_or(0.0),
				t,
				days_from_start,
				hour: date.hour(),
				day: date.day(),
				day_of_week,
				month: date.month(),
				categorical_id: label.clone(),
				hours_from_start: t,
				categorical_hour: date.hour(),
				categorical_day_of_week: day_of_week,
			});
		}
	}

	records
}

pub fn aggregating_to_hourly_data<A: AsRef<Path>>(path: A, window: DayWindow) -> Result<Vec<HourlyRecord>> {
	let file = File::open(path.as_ref())?;
	let grid = read_hourly_grid(BufReader::new(file))?;
	let records = aggregate(&grid, window);

	info!(
		"Aggregated {} hourly rows from {} entities over {} hours",
		records.len(),
		grid.entities.len(),
		grid.hours()
	);

	Ok(records)
}
