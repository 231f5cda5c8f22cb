use burn::config::Config;

use crate::error::{self, ElectricityError};
use crate::formatter::SplitBoundaries;
use crate::hourly::DayWindow;
use crate::index::BoundaryRule;

/// Window geometry and training-loop sizes of the electricity benchmark.
#[derive(Debug, Config)]
pub struct FixedParams {
	#[config(default = 192)]
	pub total_time_steps: usize,
	#[config(default = 168)]
	pub num_encoder_steps: usize,
	#[config(default = 100)]
	pub num_epochs: usize,
	#[config(default = 5)]
	pub early_stopping_patience: usize,
	#[config(default = 5)]
	pub multiprocessing_workers: usize,
}

/// Default hyperparameters handed to the forecasting model.
#[derive(Debug, Config)]
pub struct ModelParams {
	#[config(default = 0.1)]
	pub dropout_rate: f64,
	#[config(default = 160)]
	pub hidden_layer_size: usize,
	#[config(default = 0.001)]
	pub learning_rate: f64,
	#[config(default = 64)]
	pub minibatch_size: usize,
	#[config(default = 0.01)]
	pub max_gradient_norm: f64,
	#[config(default = 4)]
	pub num_heads: usize,
	#[config(default = 1)]
	pub stack_size: usize,
}

#[derive(Debug, Config)]
pub struct ElectricityConfig {
	pub data_folder: String,

	#[config(default = "FixedParams::new()")]
	pub fixed: FixedParams,

	#[config(default = "ModelParams::new()")]
	pub model: ModelParams,

	#[config(default = 1096)]
	pub first_day: i64,

	#[config(default = 1346)]
	pub end_day: i64,

	#[config(default = 1315)]
	pub valid_boundary: i64,

	#[config(default = 1339)]
	pub test_boundary: i64,

	/// Days of history prepended to the validation and test splits.
	#[config(default = 7)]
	pub context_days: i64,

	#[config(default = "BoundaryRule::MeanGroupSize")]
	pub boundary_rule: BoundaryRule,

	#[config(default = 450_000)]
	pub train_samples: usize,

	#[config(default = 50_000)]
	pub valid_samples: usize,

	#[config(default = 42)]
	pub seed: u64,
}

impl ElectricityConfig {
	pub fn day_window(&self) -> DayWindow {
		DayWindow::new(self.first_day, self.end_day)
	}

	pub fn split_boundaries(&self) -> SplitBoundaries {
		SplitBoundaries {
			valid: self.valid_boundary,
			test: self.test_boundary,
			context_days: self.context_days,
		}
	}

	pub fn validate(&self) -> error::Result<()> {
		if self.fixed.num_encoder_steps >= self.fixed.total_time_steps {
			return Err(ElectricityError::EncoderSteps {
				encoder: self.fixed.num_encoder_steps,
				total: self.fixed.total_time_steps,
			});
		}

		if self.first_day >= self.end_day {
			return Err(ElectricityError::EmptyDayWindow {
				first_day: self.first_day,
				end_day: self.end_day,
			});
		}

		if self.valid_boundary > self.test_boundary {
			return Err(ElectricityError::SplitOrder {
				valid: self.valid_boundary,
				test: self.test_boundary,
			});
		}

		Ok(())
	}
}
