use thiserror::Error;

#[derive(Debug, Error)]
pub enum GestureConfigError {
	#[error("Std IO error: {0}")]
	StdIoError(#[from] std::io::Error),
	#[error("Config could not be loaded: {0}")]
	Load(String),
	#[error("Invalid {field}: {message}")]
	Invalid { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, GestureConfigError>;

pub(crate) fn ensure(condition: bool, field: &str, message: impl Into<String>) -> Result<()> {
	if condition {
		Ok(())
	} else {
		Err(GestureConfigError::Invalid {
			field: field.to_string(),
			message: message.into(),
		})
	}
}

pub(crate) fn is_probability(value: f64) -> bool {
	(0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn io_error_message_keeps_the_cause() {
		let err = GestureConfigError::from(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "config.json"));

		assert_eq!(err.to_string(), "Std IO error: config.json");
	}
}
