use crate::error::{ElectricityError, Result};

/// Row-major feature table with one identifier per row.
///
/// Rows of the same identifier are stored next to each other, which lets a
/// window be read as one contiguous slice of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
	columns: Vec<String>,
	identifiers: Vec<String>,
	values: Vec<f32>,
}

impl Frame {
	pub fn new(columns: Vec<String>) -> Self {
		Self {
			columns,
			identifiers: Vec::new(),
			values: Vec::new(),
		}
	}

	pub fn push_row(&mut self, identifier: &str, row: &[f32]) {
		debug_assert_eq!(row.len(), self.columns.len(), "row width must match the frame columns");

		self.identifiers.push(identifier.to_string());
		self.values.extend_from_slice(row);
	}

	pub fn len(&self) -> usize {
		self.identifiers.len()
	}

	pub fn width(&self) -> usize {
		self.columns.len()
	}

	pub fn column(&self, name: &str) -> Result<usize> {
		self.columns
			.iter()
			.position(|column| column == name)
			.ok_or_else(|| ElectricityError::MissingColumn(name.to_string()))
	}

	pub fn identifiers(&self) -> &[String] {
		&self.identifiers
	}

	pub fn identifier(&self, row: usize) -> &str {
		&self.identifiers[row]
	}

	/// Rows `start..end`, one slice per row.
	pub fn rows(&self, start: usize, end: usize) -> impl Iterator<Item = &[f32]> {
		let width = self.width().max(1);
		self.values[start * self.width()..end * self.width()].chunks(width)
	}

	pub fn value(&self, row: usize, column: usize) -> f32 {
		self.values[row * self.width() + column]
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rows_are_sliced_in_order() {
		let mut frame = Frame::new(vec!["a".to_string(), "b".to_string()]);
		frame.push_row("x", &[1.0, 2.0]);
		frame.push_row("x", &[3.0, 4.0]);
		frame.push_row("y", &[5.0, 6.0]);

		assert_eq!(frame.len(), 3);
		assert_eq!(frame.value(1, 1), 4.0);
		assert_eq!(frame.identifier(2), "y");
		assert_eq!(frame.rows(1, 3).collect::<Vec<_>>(), vec![&[3.0, 4.0][..], &[5.0, 6.0][..]]);
		assert_eq!(frame.column("b").unwrap(), 1);
		assert!(frame.column("c").is_err());
	}
}
