use burn::prelude::Config;
use serde::{Deserialize, Serialize};

use crate::error::{self, ensure, is_probability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneMode {
	Large,
	Small,
}

impl BackboneMode {
	/// Number of inverted residual blocks in the MobileNetV3 variant.
	pub fn num_blocks(&self) -> usize {
		match self {
			BackboneMode::Large => 15,
			BackboneMode::Small => 11,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropoutDistribution {
	Bernoulli,
	Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginType {
	Cos,
	Arc,
}

#[derive(Debug, Config)]
pub struct DropoutConfig {
	#[config(default = "DropoutDistribution::Gaussian")]
	pub dist: DropoutDistribution,
	#[config(default = 0.1)]
	pub p: f64,
	#[config(default = 0.1)]
	pub mu: f64,
	#[config(default = 0.03)]
	pub sigma: f64,
}

/// MobileNetV3 with separable 3D convolutions.
#[derive(Debug, Config)]
pub struct BackboneConfig {
	#[config(default = 3)]
	pub num_input_layers: usize,
	#[config(default = "BackboneMode::Large")]
	pub mode: BackboneMode,
	pub pretrained: Option<String>,
	#[config(default = false)]
	pub pretrained2d: bool,
	#[config(default = 1.0)]
	pub width_mult: f64,
	#[config(default = 1)]
	pub pool1_stride_t: usize,
	#[config(default = "vec![1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1]")]
	pub temporal_strides: Vec<usize>,
	#[config(default = "vec![5, 3, 3, 3, 3, 5, 5, 3, 3, 5, 3, 3, 3, 3, 3]")]
	pub temporal_kernels: Vec<usize>,
	#[config(default = "vec![true; 15]")]
	pub use_dropout: Vec<bool>,
	#[config(default = true)]
	pub use_temporal_avg_pool: bool,
	#[config(default = false)]
	pub input_bn: bool,
	#[config(default = true)]
	pub out_conv: bool,
	#[config(default = false)]
	pub out_attention: bool,
	#[config(default = "String::from(\"none\")")]
	pub weight_norm: String,
	pub center_conv_weight: Option<String>,
	#[config(default = true)]
	pub internal_dropout: bool,
	#[config(default = "DropoutConfig::new()")]
	pub dropout_cfg: DropoutConfig,
}

impl BackboneConfig {
	pub fn validate(&self) -> error::Result<()> {
		let blocks = self.mode.num_blocks();

		ensure(
			self.temporal_strides.len() == blocks,
			"model.backbone.temporal_strides",
			format!("expected {} entries, got {}", blocks, self.temporal_strides.len()),
		)?;
		ensure(
			self.temporal_kernels.len() == blocks,
			"model.backbone.temporal_kernels",
			format!("expected {} entries, got {}", blocks, self.temporal_kernels.len()),
		)?;
		ensure(
			self.use_dropout.len() == blocks,
			"model.backbone.use_dropout",
			format!("expected {} entries, got {}", blocks, self.use_dropout.len()),
		)?;
		ensure(
			self.temporal_strides.iter().all(|&stride| stride > 0),
			"model.backbone.temporal_strides",
			"strides must be positive",
		)?;
		ensure(
			self.temporal_kernels.iter().all(|&kernel| kernel % 2 == 1),
			"model.backbone.temporal_kernels",
			"kernels must be odd",
		)?;
		ensure(self.num_input_layers > 0, "model.backbone.num_input_layers", "must be positive")?;
		ensure(self.pool1_stride_t > 0, "model.backbone.pool1_stride_t", "must be positive")?;
		ensure(self.width_mult > 0.0, "model.backbone.width_mult", "must be positive")?;
		ensure(is_probability(self.dropout_cfg.p), "model.backbone.dropout_cfg.p", "must lie in [0, 1]")?;
		ensure(self.dropout_cfg.sigma >= 0.0, "model.backbone.dropout_cfg.sigma", "must not be negative")
	}
}

#[derive(Debug, Config)]
pub struct AverageSpatialTemporalConfig {
	#[config(default = 4)]
	pub temporal_size: usize,
	#[config(default = 7)]
	pub spatial_size: usize,
}

/// Aggregates the backbone feature map before the head.
#[derive(Debug, Config)]
pub struct ReducerConfig {
	#[config(default = "vec![AverageSpatialTemporalConfig::new()]")]
	pub modules: Vec<AverageSpatialTemporalConfig>,
}

/// Polynomial decay of the loss scale from `start_scale` to `end_scale`.
#[derive(Debug, Config)]
pub struct PolyScalarScheduler {
	#[config(default = 30.0)]
	pub start_scale: f64,
	#[config(default = 5.0)]
	pub end_scale: f64,
	#[config(default = 1.2)]
	pub power: f64,
	#[config(default = 40.0)]
	pub num_epochs: f64,
}

impl PolyScalarScheduler {
	pub fn scale(&self, epoch: f64) -> f64 {
		let progress = epoch.clamp(0.0, self.num_epochs) / self.num_epochs;

		self.end_scale + (self.start_scale - self.end_scale) * (1.0 - progress).powf(self.power)
	}
}

#[derive(Debug, Config)]
pub struct AmSoftmaxLossConfig {
	#[config(default = "String::from(\"sl\")")]
	pub target_loss: String,
	#[config(default = "PolyScalarScheduler::new()")]
	pub scale_cfg: PolyScalarScheduler,
	#[config(default = false)]
	pub pr_product: bool,
	#[config(default = "MarginType::Cos")]
	pub margin_type: MarginType,
	#[config(default = 0.35)]
	pub margin: f64,
	#[config(default = 0.0)]
	pub gamma: f64,
	#[config(default = 1.0)]
	pub t: f64,
	#[config(default = 0.085)]
	pub conf_penalty_weight: f64,
	#[config(default = "String::from(\"positives\")")]
	pub filter_type: String,
	pub top_k: Option<usize>,
	#[config(default = true)]
	pub enable_class_weighting: bool,
	#[config(default = false)]
	pub enable_adaptive_margins: bool,
}

#[derive(Debug, Config)]
pub struct LocalPushLossConfig {
	#[config(default = 0.1)]
	pub margin: f64,
	#[config(default = 1.0)]
	pub weight: f64,
	#[config(default = true)]
	pub smart_margin: bool,
}

#[derive(Debug, Config)]
pub struct ClsHeadConfig {
	#[config(default = 12)]
	pub num_classes: usize,
	#[config(default = 1)]
	pub temporal_size: usize,
	#[config(default = 1)]
	pub spatial_size: usize,
	pub dropout_ratio: Option<f64>,
	#[config(default = 960)]
	pub in_channels: usize,
	#[config(default = true)]
	pub embedding: bool,
	#[config(default = 256)]
	pub embd_size: usize,
	#[config(default = 1)]
	pub num_centers: usize,
	#[config(default = 10.0)]
	pub st_scale: f64,
	#[config(default = 1.0)]
	pub reg_weight: f64,
	#[config(default = 0.1)]
	pub reg_threshold: f64,
	#[config(default = "AmSoftmaxLossConfig::new()")]
	pub loss_cls: AmSoftmaxLossConfig,
	#[config(default = "LocalPushLossConfig::new()")]
	pub loss_lpush: LocalPushLossConfig,
}

impl ClsHeadConfig {
	pub fn validate(&self) -> error::Result<()> {
		ensure(self.num_classes > 0, "model.cls_head.num_classes", "must be positive")?;
		ensure(self.in_channels > 0, "model.cls_head.in_channels", "must be positive")?;
		ensure(
			!self.embedding || self.embd_size > 0,
			"model.cls_head.embd_size",
			"must be positive when embedding is enabled",
		)?;
		ensure(self.num_centers > 0, "model.cls_head.num_centers", "must be positive")?;

		if let Some(ratio) = self.dropout_ratio {
			ensure(is_probability(ratio), "model.cls_head.dropout_ratio", "must lie in [0, 1]")?;
		}

		let loss = &self.loss_cls;
		ensure(loss.margin >= 0.0, "model.cls_head.loss_cls.margin", "must not be negative")?;
		ensure(
			loss.conf_penalty_weight >= 0.0,
			"model.cls_head.loss_cls.conf_penalty_weight",
			"must not be negative",
		)?;
		if let Some(top_k) = loss.top_k {
			ensure(
				top_k > 0 && top_k <= self.num_classes,
				"model.cls_head.loss_cls.top_k",
				format!("must lie in 1..={}", self.num_classes),
			)?;
		}

		let schedule = &loss.scale_cfg;
		ensure(schedule.num_epochs > 0.0, "model.cls_head.loss_cls.scale_cfg.num_epochs", "must be positive")?;
		ensure(
			schedule.start_scale > 0.0 && schedule.end_scale > 0.0,
			"model.cls_head.loss_cls.scale_cfg",
			"scales must be positive",
		)?;

		ensure(self.loss_lpush.margin >= 0.0, "model.cls_head.loss_lpush.margin", "must not be negative")
	}
}

/// `Recognizer3D`: backbone, reducer and classification head.
#[derive(Debug, Config)]
pub struct RecognizerConfig {
	#[config(default = "BackboneConfig::new()")]
	pub backbone: BackboneConfig,
	#[config(default = "ReducerConfig::new()")]
	pub reducer: ReducerConfig,
	#[config(default = "ClsHeadConfig::new()")]
	pub cls_head: ClsHeadConfig,
}

impl RecognizerConfig {
	pub fn validate(&self) -> error::Result<()> {
		self.backbone.validate()?;

		ensure(!self.reducer.modules.is_empty(), "model.reducer.modules", "at least one module is required")?;
		ensure(
			self.reducer
				.modules
				.iter()
				.all(|module| module.temporal_size > 0 && module.spatial_size > 0),
			"model.reducer.modules",
			"pooling sizes must be positive",
		)?;

		self.cls_head.validate()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::GestureConfigError;

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-9
	}

	#[test]
	fn poly_scale_decays_from_start_to_end() {
		let scheduler = PolyScalarScheduler::new();

		assert!(close(scheduler.scale(0.0), 30.0));
		assert!(close(scheduler.scale(40.0), 5.0));
		assert!(close(scheduler.scale(20.0), 5.0 + 25.0 * 0.5f64.powf(1.2)));
	}

	#[test]
	fn poly_scale_is_clamped_outside_the_schedule() {
		let scheduler = PolyScalarScheduler::new();

		assert!(close(scheduler.scale(65.0), 5.0));
		assert!(close(scheduler.scale(-3.0), 30.0));
	}

	#[test]
	fn template_model_is_valid() {
		let model = RecognizerConfig::new();

		assert!(model.validate().is_ok());
		assert_eq!(model.backbone.temporal_strides.len(), 15);
		assert_eq!(model.cls_head.in_channels, 960);
		assert_eq!(model.cls_head.loss_cls.margin_type, MarginType::Cos);
	}

	#[test]
	fn block_arrays_must_match_the_mode() {
		let backbone = BackboneConfig::new().with_mode(BackboneMode::Small);

		assert!(matches!(
			backbone.validate(),
			Err(GestureConfigError::Invalid { field, .. }) if field == "model.backbone.temporal_strides"
		));
	}

	#[test]
	fn even_temporal_kernel_is_rejected() {
		let mut kernels = BackboneConfig::new().temporal_kernels;
		kernels[3] = 4;
		let backbone = BackboneConfig::new().with_temporal_kernels(kernels);

		assert!(backbone.validate().is_err());
	}

	#[test]
	fn top_k_beyond_classes_is_rejected() {
		let head = ClsHeadConfig::new().with_loss_cls(AmSoftmaxLossConfig::new().with_top_k(Some(13)));

		assert!(matches!(
			head.validate(),
			Err(GestureConfigError::Invalid { field, .. }) if field == "model.cls_head.loss_cls.top_k"
		));
	}
}
