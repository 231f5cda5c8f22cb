use std::collections::BTreeMap;
use std::path::Path;

use burn::prelude::Config;
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{self, ensure, is_probability, GestureConfigError};
use crate::model::RecognizerConfig;
use crate::pipeline::{
	crop_size_of, default_train_pipeline, default_val_pipeline, per_source, sampler_of, validate_pipeline,
	ImgNormConfig, PipelineStep, INPUT_CLIP_LENGTH, INPUT_IMG_SIZE, SOURCE,
};
use crate::schedule::{FreezeLayersConfig, GradClipConfig, LrScheduleConfig, SgdConfig};

#[derive(Debug, Config)]
pub struct SelfChallengingConfig {
	#[config(default = true)]
	pub enable: bool,
	#[config(default = 0.33)]
	pub drop_p: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipMixingMode {
	Logits,
	Embeddings,
}

/// Consistency loss between clips sampled from the same video.
#[derive(Debug, Config)]
pub struct ClipMixingConfig {
	#[config(default = true)]
	pub enable: bool,
	#[config(default = "ClipMixingMode::Logits")]
	pub mode: ClipMixingMode,
	#[config(default = 2)]
	pub num_clips: usize,
	#[config(default = 0.2)]
	pub weight: f64,
}

#[derive(Debug, Config)]
pub struct TrainCfg {
	#[config(default = "SelfChallengingConfig::new()")]
	pub self_challenging: SelfChallengingConfig,
	#[config(default = "ClipMixingConfig::new()")]
	pub clip_mixing: ClipMixingConfig,
}

#[derive(Debug, Config)]
pub struct TestCfg {
	pub average_clips: Option<String>,
}

/// `RawframeDataset` settings shared by every split.
#[derive(Debug, Config)]
pub struct RawframeDatasetConfig {
	#[config(default = "String::from(\"global_crops\")")]
	pub data_subdir: String,
	#[config(default = "String::from(\"{:05d}.jpg\")")]
	pub filename_tmpl: String,
	#[config(default = "String::from(\"hand_kpts\")")]
	pub kpts_subdir: String,
	#[config(default = false)]
	pub load_kpts: bool,
}

#[derive(Debug, Config)]
pub struct TrainDataloaderConfig {
	#[config(default = true)]
	pub drop_last: bool,
}

/// One `RawframeDataset` split.
#[derive(Debug, Config)]
pub struct SplitConfig {
	pub ann_file: String,
	#[config(default = "vec![String::from(SOURCE)]")]
	pub source: Vec<String>,
	pub action_type_file: Option<BTreeMap<String, String>>,
	#[config(default = "default_val_pipeline()")]
	pub pipeline: Vec<PipelineStep>,
	#[config(default = false)]
	pub test_mode: bool,
}

fn default_train_split() -> SplitConfig {
	SplitConfig::new(String::from("train.txt"))
		.with_action_type_file(Some(per_source("action_type_classes.txt")))
		.with_pipeline(default_train_pipeline())
}

fn default_test_split() -> SplitConfig {
	SplitConfig::new(String::from("test.txt")).with_test_mode(true)
}

#[derive(Debug, Config)]
pub struct DataConfig {
	#[config(default = 12)]
	pub videos_per_gpu: usize,
	#[config(default = 3)]
	pub workers_per_gpu: usize,
	#[config(default = "TrainDataloaderConfig::new()")]
	pub train_dataloader: TrainDataloaderConfig,
	#[config(default = "RawframeDatasetConfig::new()")]
	pub shared: RawframeDatasetConfig,
	#[config(default = "default_train_split()")]
	pub train: SplitConfig,
	#[config(default = "default_test_split()")]
	pub val: SplitConfig,
	#[config(default = "default_test_split()")]
	pub test: SplitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	Train,
	Val,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStage {
	pub mode: Mode,
	pub epochs: usize,
}

#[derive(Debug, Config)]
pub struct CheckpointConfig {
	#[config(default = 1)]
	pub interval: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalMetric {
	TopKAccuracy,
	MeanClassAccuracy,
	RankingMeanAveragePrecision,
}

#[derive(Debug, Config)]
pub struct EvaluationConfig {
	#[config(default = 1)]
	pub interval: usize,
	#[config(
		default = "vec![EvalMetric::TopKAccuracy, EvalMetric::MeanClassAccuracy, EvalMetric::RankingMeanAveragePrecision]"
	)]
	pub metrics: Vec<EvalMetric>,
	#[config(default = "vec![1, 5]")]
	pub topk: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogHook {
	TextLoggerHook,
	TensorboardLoggerHook,
}

#[derive(Debug, Config)]
pub struct LogConfig {
	#[config(default = 10)]
	pub interval: usize,
	#[config(default = "vec![LogHook::TextLoggerHook, LogHook::TensorboardLoggerHook]")]
	pub hooks: Vec<LogHook>,
}

#[derive(Debug, Config)]
pub struct DistParams {
	#[config(default = "String::from(\"nccl\")")]
	pub backend: String,
}

/// Everything the external trainer needs to fit the streaming gesture
/// recognizer. `new()` yields the S3D MobileNetV3 template.
#[derive(Debug, Config)]
pub struct GestureRecognitionConfig {
	#[config(default = "String::from(\"data\")")]
	pub root_dir: String,
	pub work_dir: Option<String>,
	#[config(default = "INPUT_IMG_SIZE")]
	pub input_img_size: usize,
	#[config(default = "INPUT_CLIP_LENGTH")]
	pub input_clip_length: usize,
	#[config(default = "vec![String::from(\"cls_head\")]")]
	pub reset_layer_prefixes: Vec<String>,
	pub reset_layer_suffixes: Option<Vec<String>>,
	#[config(default = true)]
	pub enable_mutual_learning: bool,
	#[config(default = "RecognizerConfig::new()")]
	pub model: RecognizerConfig,
	#[config(default = "TrainCfg::new()")]
	pub train_cfg: TrainCfg,
	#[config(default = "TestCfg::new()")]
	pub test_cfg: TestCfg,
	#[config(default = "ImgNormConfig::new()")]
	pub img_norm_cfg: ImgNormConfig,
	#[config(default = "DataConfig::new()")]
	pub data: DataConfig,
	#[config(default = "SgdConfig::new()")]
	pub optimizer: SgdConfig,
	#[config(default = "GradClipConfig::new()")]
	pub grad_clip: GradClipConfig,
	#[config(default = "FreezeLayersConfig::new()")]
	pub params_config: FreezeLayersConfig,
	#[config(default = "LrScheduleConfig::new()")]
	pub lr_config: LrScheduleConfig,
	#[config(default = 65)]
	pub total_epochs: usize,
	#[config(default = "vec![WorkflowStage { mode: Mode::Train, epochs: 1 }]")]
	pub workflow: Vec<WorkflowStage>,
	#[config(default = "CheckpointConfig::new()")]
	pub checkpoint_config: CheckpointConfig,
	#[config(default = "EvaluationConfig::new()")]
	pub evaluation: EvaluationConfig,
	#[config(default = "LogConfig::new()")]
	pub log_config: LogConfig,
	#[config(default = "log::LevelFilter::Info")]
	pub log_level: log::LevelFilter,
	#[config(default = "DistParams::new()")]
	pub dist_params: DistParams,
	pub load_from: Option<String>,
	pub resume_from: Option<String>,
	#[config(default = true)]
	pub find_unused_parameters: bool,
}

impl GestureRecognitionConfig {
	/// Clips sampled per video during training.
	pub fn num_train_clips(&self) -> usize {
		if self.enable_mutual_learning {
			2
		} else {
			1
		}
	}

	pub fn load_validated<P: AsRef<Path>>(path: P) -> error::Result<Self> {
		let config = Self::load(path.as_ref()).map_err(|err| GestureConfigError::Load(err.to_string()))?;
		config.validate()?;

		info!("Loaded config from {}", path.as_ref().display());
		Ok(config)
	}

	pub fn validate(&self) -> error::Result<()> {
		self.model.validate()?;
		self.validate_training()?;
		self.validate_data()?;

		ensure(self.optimizer.lr > 0.0, "optimizer.lr", "must be positive")?;
		ensure(
			(0.0..1.0).contains(&self.optimizer.momentum),
			"optimizer.momentum",
			"must lie in [0, 1)",
		)?;
		ensure(self.optimizer.weight_decay >= 0.0, "optimizer.weight_decay", "must not be negative")?;
		ensure(self.grad_clip.clip > 0.0, "grad_clip.clip", "must be positive")?;

		ensure(self.total_epochs > 0, "total_epochs", "must be positive")?;
		self.lr_config.validate(self.total_epochs)?;
		ensure(
			self.params_config.epochs <= self.total_epochs,
			"params_config.epochs",
			"layers cannot stay frozen past the last epoch",
		)?;

		self.validate_cadence()
	}

	fn validate_training(&self) -> error::Result<()> {
		let challenging = &self.train_cfg.self_challenging;
		ensure(
			is_probability(challenging.drop_p),
			"train_cfg.self_challenging.drop_p",
			"must lie in [0, 1]",
		)?;

		let mixing = &self.train_cfg.clip_mixing;
		if mixing.enable {
			ensure(
				mixing.num_clips == self.num_train_clips(),
				"train_cfg.clip_mixing.num_clips",
				format!("must equal the {} clips sampled per video", self.num_train_clips()),
			)?;
			ensure(mixing.weight >= 0.0, "train_cfg.clip_mixing.weight", "must not be negative")?;
		}

		Ok(())
	}

	fn validate_data(&self) -> error::Result<()> {
		let data = &self.data;
		ensure(data.videos_per_gpu > 0, "data.videos_per_gpu", "must be positive")?;
		ensure(!data.shared.filename_tmpl.is_empty(), "data.shared.filename_tmpl", "must not be empty")?;

		for (name, split, num_clips) in [
			("data.train", &data.train, self.num_train_clips()),
			("data.val", &data.val, 1),
			("data.test", &data.test, 1),
		] {
			ensure(!split.ann_file.is_empty(), &format!("{}.ann_file", name), "must not be empty")?;
			ensure(
				!split.source.is_empty(),
				&format!("{}.source", name),
				"at least one source is required",
			)?;

			let field = format!("{}.pipeline", name);
			validate_pipeline(&split.pipeline, &field)?;

			if let Some((clip_len, clips, test_mode)) = sampler_of(&split.pipeline) {
				ensure(
					clip_len == self.input_clip_length,
					&field,
					format!("sampler clip_len {} differs from input_clip_length", clip_len),
				)?;
				ensure(clips == num_clips, &field, format!("sampler must draw {} clips", num_clips))?;
				ensure(
					test_mode == split.test_mode,
					&field,
					"sampler test_mode differs from the split",
				)?;
			}

			if let Some(crop) = crop_size_of(&split.pipeline) {
				ensure(
					crop == self.input_img_size,
					&field,
					format!("crop size {} differs from input_img_size", crop),
				)?;
			}
		}

		Ok(())
	}

	fn validate_cadence(&self) -> error::Result<()> {
		ensure(!self.workflow.is_empty(), "workflow", "at least one stage is required")?;
		ensure(
			self.workflow.iter().all(|stage| stage.epochs > 0),
			"workflow",
			"stage epochs must be positive",
		)?;
		ensure(self.checkpoint_config.interval > 0, "checkpoint_config.interval", "must be positive")?;
		ensure(self.evaluation.interval > 0, "evaluation.interval", "must be positive")?;
		ensure(!self.evaluation.topk.is_empty(), "evaluation.topk", "must not be empty")?;

		let num_classes = self.model.cls_head.num_classes;
		ensure(
			self.evaluation.topk.iter().all(|&k| k > 0 && k <= num_classes),
			"evaluation.topk",
			format!("entries must lie in 1..={}", num_classes),
		)?;
		ensure(self.log_config.interval > 0, "log_config.interval", "must be positive")
	}
}
