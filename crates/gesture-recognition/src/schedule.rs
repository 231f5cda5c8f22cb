use burn::prelude::Config;
use serde::{Deserialize, Serialize};

use crate::error::{self, ensure};

#[derive(Debug, Config)]
pub struct SgdConfig {
	#[config(default = 2e-3)]
	pub lr: f64,
	#[config(default = 0.9)]
	pub momentum: f64,
	#[config(default = 1e-4)]
	pub weight_decay: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradClipMethod {
	Default,
	Adaptive,
}

#[derive(Debug, Config)]
pub struct GradClipConfig {
	#[config(default = "GradClipMethod::Adaptive")]
	pub method: GradClipMethod,
	#[config(default = 0.2)]
	pub clip: f64,
}

/// Keeps everything but `open_layers` frozen for the first `epochs`.
#[derive(Debug, Config)]
pub struct FreezeLayersConfig {
	#[config(default = 5)]
	pub epochs: usize,
	#[config(default = "vec![String::from(\"cls_head\")]")]
	pub open_layers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LrPolicy {
	CustomCos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedPolicy {
	Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmupPolicy {
	Constant,
	Linear,
	Exp,
}

/// Where an epoch falls in the learning rate schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LrPhase {
	Fixed,
	Warmup,
	/// Inside cosine period `period`, `epoch` epochs after its start.
	Cosine { period: usize, epoch: usize },
	Finished,
}

#[derive(Debug, Config)]
pub struct LrScheduleConfig {
	#[config(default = "LrPolicy::CustomCos")]
	pub policy: LrPolicy,
	#[config(default = "vec![55]")]
	pub periods: Vec<usize>,
	#[config(default = 5e-3)]
	pub min_lr_ratio: f64,
	#[config(default = 1.5)]
	pub alpha: f64,
	#[config(default = "FixedPolicy::Constant")]
	pub fixed: FixedPolicy,
	#[config(default = 5)]
	pub fixed_epochs: usize,
	#[config(default = 5.0)]
	pub fixed_ratio: f64,
	#[config(default = "WarmupPolicy::Linear")]
	pub warmup: WarmupPolicy,
	#[config(default = 5)]
	pub warmup_epochs: usize,
	#[config(default = 5e-3)]
	pub warmup_ratio: f64,
}

impl LrScheduleConfig {
	/// Epochs covered by the fixed, warmup and cosine phases together.
	pub fn scheduled_epochs(&self) -> usize {
		self.fixed_epochs + self.warmup_epochs + self.periods.iter().sum::<usize>()
	}

	pub fn phase(&self, epoch: usize) -> LrPhase {
		if epoch < self.fixed_epochs {
			return LrPhase::Fixed;
		}

		let epoch = epoch - self.fixed_epochs;
		if epoch < self.warmup_epochs {
			return LrPhase::Warmup;
		}

		let mut epoch = epoch - self.warmup_epochs;
		for (period, &length) in self.periods.iter().enumerate() {
			if epoch < length {
				return LrPhase::Cosine { period, epoch };
			}
			epoch -= length;
		}

		LrPhase::Finished
	}

	pub fn validate(&self, total_epochs: usize) -> error::Result<()> {
		ensure(!self.periods.is_empty(), "lr_config.periods", "at least one period is required")?;
		ensure(
			self.periods.iter().all(|&period| period > 0),
			"lr_config.periods",
			"periods must be positive",
		)?;
		ensure(
			self.min_lr_ratio > 0.0 && self.min_lr_ratio <= 1.0,
			"lr_config.min_lr_ratio",
			"must lie in (0, 1]",
		)?;
		ensure(
			self.warmup_ratio > 0.0 && self.warmup_ratio <= 1.0,
			"lr_config.warmup_ratio",
			"must lie in (0, 1]",
		)?;
		ensure(self.fixed_ratio > 0.0, "lr_config.fixed_ratio", "must be positive")?;
		ensure(self.alpha > 0.0, "lr_config.alpha", "must be positive")?;
		ensure(
			self.scheduled_epochs() <= total_epochs,
			"lr_config",
			format!(
				"schedule spans {} epochs but training stops after {}",
				self.scheduled_epochs(),
				total_epochs
			),
		)
	}
}
