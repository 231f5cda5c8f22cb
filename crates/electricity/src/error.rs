use thiserror::Error;

use crate::formatter::InputType;

#[derive(Debug, Error)]
pub enum ElectricityError {
	#[error("Std IO error: {0}")]
	StdIoError(#[from] std::io::Error),
	#[error("CSV error: {0}")]
	Csv(#[from] csv::Error),
	#[error("Zip archive error: {0}")]
	Zip(#[from] zip::result::ZipError),
	#[error("Archive did not contain {0}")]
	MissingArchiveEntry(String),
	#[error("Invalid timestamp {0:?}")]
	Timestamp(String),
	#[error("Invalid reading {value:?} for {entity} at {timestamp}")]
	Reading {
		entity: String,
		timestamp: String,
		value: String,
	},
	#[error("Column {0} not found")]
	MissingColumn(String),
	#[error("Column definition must contain exactly one {0:?} column")]
	ColumnRole(InputType),
	#[error("Rows of identifier {0} are not contiguous")]
	NonContiguousGroup(String),
	#[error("Index {index} out of bounds for dataset of length {len}")]
	IndexOutOfBounds { index: usize, len: usize },
	#[error("No scaler fitted for identifier {0}")]
	MissingScaler(String),
	#[error("Unknown category {value} in column {column}")]
	UnknownCategory { column: String, value: String },
	#[error("Encoder steps ({encoder}) must be smaller than total time steps ({total})")]
	EncoderSteps { encoder: usize, total: usize },
	#[error("Day window [{first_day}, {end_day}) is empty")]
	EmptyDayWindow { first_day: i64, end_day: i64 },
	#[error("Validation boundary ({valid}) must not come after the test boundary ({test})")]
	SplitOrder { valid: i64, test: i64 },
}

pub type Result<T> = std::result::Result<T, ElectricityError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn io_error_message_keeps_the_cause() {
		let err = ElectricityError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "LD2011_2014.txt"));

		assert_eq!(err.to_string(), "Std IO error: LD2011_2014.txt");
	}
}
