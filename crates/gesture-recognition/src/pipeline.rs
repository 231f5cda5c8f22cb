use std::collections::BTreeMap;

use burn::prelude::Config;
use serde::{Deserialize, Serialize};

use crate::error::{self, ensure, is_probability};

pub const INPUT_CLIP_LENGTH: usize = 8;
pub const INPUT_IMG_SIZE: usize = 224;
pub const TRAIN_NUM_CLIPS: usize = 2;
pub const SOURCE: &str = "common_sign_language";

#[derive(Debug, Config)]
pub struct ImgNormConfig {
	#[config(default = "[123.675, 116.28, 103.53]")]
	pub mean: [f64; 3],
	#[config(default = "[58.395, 57.12, 57.375]")]
	pub std: [f64; 3],
	#[config(default = false)]
	pub to_bgr: bool,
}

/// Share of a sampled clip that must overlap the annotated gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinIntersection {
	#[serde(rename = "static")]
	pub static_gesture: f64,
	pub dynamic: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputFormat {
	#[serde(rename = "NCTHW")]
	Ncthw,
	#[serde(rename = "NCHW")]
	Nchw,
}

/// One named transform of an augmentation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineStep {
	StreamSampleFrames {
		clip_len: usize,
		trg_fps: usize,
		num_clips: usize,
		#[serde(default)]
		temporal_jitter: bool,
		#[serde(default)]
		min_intersection: Option<MinIntersection>,
		/// Share of negative clips; `None` disables negative sampling.
		#[serde(default)]
		neg_prob: Option<f64>,
		#[serde(default)]
		test_mode: bool,
	},
	RawFrameDecode,
	Resize {
		/// `-1` keeps the aspect ratio along that side.
		scale: (i32, i32),
	},
	RandomRotate {
		delta: f64,
		prob: f64,
	},
	RatioPreservingCrop {
		input_size: usize,
		scale_limits: (f64, f64),
		use_kpts: bool,
		sigma_scale: f64,
	},
	CenterCrop {
		crop_size: usize,
	},
	Flip {
		flip_ratio: f64,
	},
	MapFlippedLabels {
		map_file: BTreeMap<String, String>,
	},
	ProbCompose {
		transforms: Vec<PipelineStep>,
		probs: Vec<f64>,
	},
	Empty,
	PhotometricDistortion {
		brightness_range: (f64, f64),
		contrast_range: (f64, f64),
		saturation_range: (f64, f64),
		hue_delta: f64,
	},
	CrossNorm {
		mean_std_file: String,
	},
	Normalize {
		mean: [f64; 3],
		std: [f64; 3],
		to_bgr: bool,
	},
	FormatShape {
		input_format: InputFormat,
		#[serde(default)]
		targets: Vec<String>,
	},
	Collect {
		keys: Vec<String>,
		#[serde(default)]
		meta_keys: Vec<String>,
	},
	ToTensor {
		keys: Vec<String>,
	},
}

impl PipelineStep {
	pub fn name(&self) -> &'static str {
		match self {
			PipelineStep::StreamSampleFrames { .. } => "StreamSampleFrames",
			PipelineStep::RawFrameDecode => "RawFrameDecode",
			PipelineStep::Resize { .. } => "Resize",
			PipelineStep::RandomRotate { .. } => "RandomRotate",
			PipelineStep::RatioPreservingCrop { .. } => "RatioPreservingCrop",
			PipelineStep::CenterCrop { .. } => "CenterCrop",
			PipelineStep::Flip { .. } => "Flip",
			PipelineStep::MapFlippedLabels { .. } => "MapFlippedLabels",
			PipelineStep::ProbCompose { .. } => "ProbCompose",
			PipelineStep::Empty => "Empty",
			PipelineStep::PhotometricDistortion { .. } => "PhotometricDistortion",
			PipelineStep::CrossNorm { .. } => "CrossNorm",
			PipelineStep::Normalize { .. } => "Normalize",
			PipelineStep::FormatShape { .. } => "FormatShape",
			PipelineStep::Collect { .. } => "Collect",
			PipelineStep::ToTensor { .. } => "ToTensor",
		}
	}

	fn validate(&self, field: &str) -> error::Result<()> {
		let field = format!("{}.{}", field, self.name());

		match self {
			PipelineStep::StreamSampleFrames {
				clip_len,
				trg_fps,
				num_clips,
				min_intersection,
				neg_prob,
				..
			} => {
				ensure(*clip_len > 0, &field, "clip_len must be positive")?;
				ensure(*trg_fps > 0, &field, "trg_fps must be positive")?;
				ensure(*num_clips > 0, &field, "num_clips must be positive")?;
				if let Some(overlap) = min_intersection {
					ensure(
						is_probability(overlap.static_gesture) && is_probability(overlap.dynamic),
						&field,
						"min_intersection must lie in [0, 1]",
					)?;
				}
				if let Some(p) = neg_prob {
					ensure(is_probability(*p), &field, "neg_prob must lie in [0, 1]")?;
				}
				Ok(())
			}
			PipelineStep::RandomRotate { delta, prob } => {
				ensure(*delta >= 0.0, &field, "delta must not be negative")?;
				ensure(is_probability(*prob), &field, "prob must lie in [0, 1]")
			}
			PipelineStep::RatioPreservingCrop {
				input_size,
				scale_limits,
				sigma_scale,
				..
			} => {
				let (upper, lower) = *scale_limits;
				ensure(*input_size > 0, &field, "input_size must be positive")?;
				ensure(
					0.0 < lower && lower <= upper && upper <= 1.0,
					&field,
					"scale_limits must satisfy 0 < lower <= upper <= 1",
				)?;
				ensure(*sigma_scale >= 0.0, &field, "sigma_scale must not be negative")
			}
			PipelineStep::CenterCrop { crop_size } => ensure(*crop_size > 0, &field, "crop_size must be positive"),
			PipelineStep::Flip { flip_ratio } => {
				ensure(is_probability(*flip_ratio), &field, "flip_ratio must lie in [0, 1]")
			}
			PipelineStep::ProbCompose { transforms, probs } => {
				ensure(!transforms.is_empty(), &field, "at least one transform is required")?;
				ensure(
					transforms.len() == probs.len(),
					&field,
					format!("{} transforms but {} probs", transforms.len(), probs.len()),
				)?;
				ensure(probs.iter().all(|&p| is_probability(p)), &field, "probs must lie in [0, 1]")?;
				ensure(
					(probs.iter().sum::<f64>() - 1.0).abs() < 1e-6,
					&field,
					"probs must sum to 1",
				)?;
				transforms.iter().try_for_each(|step| step.validate(&field))
			}
			PipelineStep::PhotometricDistortion {
				brightness_range,
				contrast_range,
				saturation_range,
				hue_delta,
			} => {
				ensure(
					brightness_range.0 <= brightness_range.1
						&& contrast_range.0 <= contrast_range.1
						&& saturation_range.0 <= saturation_range.1,
					&field,
					"ranges must be ordered low to high",
				)?;
				ensure(*hue_delta >= 0.0, &field, "hue_delta must not be negative")
			}
			PipelineStep::Normalize { std, .. } => {
				ensure(std.iter().all(|&value| value > 0.0), &field, "std must be positive")
			}
			PipelineStep::Collect { keys, .. } | PipelineStep::ToTensor { keys } => {
				ensure(!keys.is_empty(), &field, "keys must not be empty")
			}
			_ => Ok(()),
		}
	}
}

/// Checks every step and that the pipeline opens with its frame sampler.
pub fn validate_pipeline(steps: &[PipelineStep], field: &str) -> error::Result<()> {
	ensure(
		matches!(steps.first(), Some(PipelineStep::StreamSampleFrames { .. })),
		field,
		"the first step must be StreamSampleFrames",
	)?;

	steps.iter().try_for_each(|step| step.validate(field))
}

/// `(clip_len, num_clips, test_mode)` of the leading sampler.
pub fn sampler_of(steps: &[PipelineStep]) -> Option<(usize, usize, bool)> {
	match steps.first() {
		Some(PipelineStep::StreamSampleFrames {
			clip_len,
			num_clips,
			test_mode,
			..
		}) => Some((*clip_len, *num_clips, *test_mode)),
		_ => None,
	}
}

/// Side length the pipeline crops frames to, if it crops.
pub fn crop_size_of(steps: &[PipelineStep]) -> Option<usize> {
	steps.iter().find_map(|step| match step {
		PipelineStep::RatioPreservingCrop { input_size, .. } => Some(*input_size),
		PipelineStep::CenterCrop { crop_size } => Some(*crop_size),
		_ => None,
	})
}

fn keys(names: &[&str]) -> Vec<String> {
	names.iter().map(|name| name.to_string()).collect()
}

/// One file name per data source.
pub fn per_source(file: &str) -> BTreeMap<String, String> {
	BTreeMap::from([(String::from(SOURCE), String::from(file))])
}

fn normalize(norm: &ImgNormConfig) -> PipelineStep {
	PipelineStep::Normalize {
		mean: norm.mean,
		std: norm.std,
		to_bgr: norm.to_bgr,
	}
}

fn tail(format_targets: &[&str], collected: &[&str]) -> Vec<PipelineStep> {
	vec![
		PipelineStep::FormatShape {
			input_format: InputFormat::Ncthw,
			targets: keys(format_targets),
		},
		PipelineStep::Collect {
			keys: keys(collected),
			meta_keys: Vec::new(),
		},
		PipelineStep::ToTensor { keys: keys(collected) },
	]
}

pub fn default_train_pipeline() -> Vec<PipelineStep> {
	let mut steps = vec![
		PipelineStep::StreamSampleFrames {
			clip_len: INPUT_CLIP_LENGTH,
			trg_fps: 15,
			num_clips: TRAIN_NUM_CLIPS,
			temporal_jitter: true,
			min_intersection: Some(MinIntersection {
				static_gesture: 1.0,
				dynamic: 1.0,
			}),
			neg_prob: None,
			test_mode: false,
		},
		PipelineStep::RawFrameDecode,
		PipelineStep::Resize { scale: (-1, 256) },
		PipelineStep::RandomRotate { delta: 10.0, prob: 0.5 },
		PipelineStep::RatioPreservingCrop {
			input_size: INPUT_IMG_SIZE,
			scale_limits: (1.0, 0.875),
			use_kpts: false,
			sigma_scale: 0.01,
		},
		PipelineStep::Flip { flip_ratio: 0.5 },
		PipelineStep::MapFlippedLabels {
			map_file: per_source("flip_labels_map.txt"),
		},
		PipelineStep::ProbCompose {
			transforms: vec![
				PipelineStep::Empty,
				PipelineStep::PhotometricDistortion {
					brightness_range: (65.0, 190.0),
					contrast_range: (0.6, 1.4),
					saturation_range: (0.7, 1.3),
					hue_delta: 18.0,
				},
				PipelineStep::CrossNorm {
					mean_std_file: String::from("mean_std_list.txt"),
				},
			],
			probs: vec![0.1, 0.45, 0.45],
		},
		normalize(&ImgNormConfig::new()),
	];
	steps.extend(tail(&["imgs"], &["imgs", "label", "dataset_id"]));

	steps
}

pub fn default_val_pipeline() -> Vec<PipelineStep> {
	let mut steps = vec![
		PipelineStep::StreamSampleFrames {
			clip_len: INPUT_CLIP_LENGTH,
			trg_fps: 15,
			num_clips: 1,
			temporal_jitter: false,
			min_intersection: None,
			neg_prob: None,
			test_mode: true,
		},
		PipelineStep::RawFrameDecode,
		PipelineStep::Resize { scale: (-1, 256) },
		PipelineStep::CenterCrop {
			crop_size: INPUT_IMG_SIZE,
		},
		normalize(&ImgNormConfig::new()),
	];
	steps.extend(tail(&[], &["imgs"]));

	steps
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::GestureConfigError;

	fn replace_compose(steps: &mut [PipelineStep], probs: Vec<f64>) {
		for step in steps.iter_mut() {
			if let PipelineStep::ProbCompose { probs: current, .. } = step {
				*current = probs.clone();
			}
		}
	}

	#[test]
	fn template_pipelines_are_valid() {
		assert!(validate_pipeline(&default_train_pipeline(), "data.train.pipeline").is_ok());
		assert!(validate_pipeline(&default_val_pipeline(), "data.val.pipeline").is_ok());
	}

	#[test]
	fn sampler_and_crop_are_found() {
		assert_eq!(sampler_of(&default_train_pipeline()), Some((INPUT_CLIP_LENGTH, TRAIN_NUM_CLIPS, false)));
		assert_eq!(sampler_of(&default_val_pipeline()), Some((INPUT_CLIP_LENGTH, 1, true)));
		assert_eq!(crop_size_of(&default_val_pipeline()), Some(INPUT_IMG_SIZE));
	}

	#[test]
	fn template_pipelines_keep_their_step_parameters() {
		let train = default_train_pipeline();
		let val = default_val_pipeline();

		assert!(matches!(
			&train[0],
			PipelineStep::StreamSampleFrames {
				temporal_jitter: true,
				min_intersection: Some(MinIntersection { static_gesture, dynamic }),
				neg_prob: None,
				..
			} if *static_gesture == 1.0 && *dynamic == 1.0
		));
		assert!(matches!(
			&val[0],
			PipelineStep::StreamSampleFrames {
				temporal_jitter: false,
				min_intersection: None,
				test_mode: true,
				..
			}
		));
		assert!(matches!(
			&train[4],
			PipelineStep::RatioPreservingCrop { sigma_scale, .. } if *sigma_scale == 0.01
		));
		assert_eq!(
			train[6],
			PipelineStep::MapFlippedLabels {
				map_file: per_source("flip_labels_map.txt"),
			}
		);

		let train_tail = &train[train.len() - 3..];
		assert_eq!(
			train_tail[0],
			PipelineStep::FormatShape {
				input_format: InputFormat::Ncthw,
				targets: vec![String::from("imgs")],
			}
		);
		assert_eq!(
			train_tail[2],
			PipelineStep::ToTensor {
				keys: keys(&["imgs", "label", "dataset_id"]),
			}
		);

		let val_tail = &val[val.len() - 3..];
		assert_eq!(
			val_tail,
			&[
				PipelineStep::FormatShape {
					input_format: InputFormat::Ncthw,
					targets: Vec::new(),
				},
				PipelineStep::Collect {
					keys: keys(&["imgs"]),
					meta_keys: Vec::new(),
				},
				PipelineStep::ToTensor { keys: keys(&["imgs"]) },
			]
		);
	}

	#[test]
	fn prob_compose_needs_one_prob_per_transform() {
		let mut steps = default_train_pipeline();
		replace_compose(&mut steps, vec![0.5, 0.5]);

		assert!(matches!(
			validate_pipeline(&steps, "data.train.pipeline"),
			Err(GestureConfigError::Invalid { field, .. }) if field == "data.train.pipeline.ProbCompose"
		));
	}

	#[test]
	fn prob_compose_probs_must_sum_to_one() {
		let mut steps = default_train_pipeline();
		replace_compose(&mut steps, vec![0.2, 0.45, 0.45]);

		assert!(validate_pipeline(&steps, "data.train.pipeline").is_err());
	}

	#[test]
	fn nested_steps_are_checked() {
		let steps = vec![
			default_val_pipeline()[0].clone(),
			PipelineStep::ProbCompose {
				transforms: vec![PipelineStep::Empty, PipelineStep::Flip { flip_ratio: 1.5 }],
				probs: vec![0.5, 0.5],
			},
		];

		assert!(matches!(
			validate_pipeline(&steps, "p"),
			Err(GestureConfigError::Invalid { field, .. }) if field == "p.ProbCompose.Flip"
		));
	}

	#[test]
	fn sampler_must_come_first() {
		let mut steps = default_val_pipeline();
		steps.swap(0, 1);

		assert!(validate_pipeline(&steps, "data.val.pipeline").is_err());
		assert_eq!(sampler_of(&steps), None);
	}
}
