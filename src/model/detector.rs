// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/model/detector.rs - 检测器：预处理、推理、解码
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{
  path::PathBuf,
  time::{Duration, Instant},
};

use image::{Luma, Rgb, imageops};
use ndarray::arr2;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  config::{ConfigError, ModelConfig, ModelKind, SoftmaxMode},
  frame::{ChannelOrder, Frame, gray_to_nchw, rgb_to_chw, rgb_to_gray_bt601, rgb_to_nchw},
  inference::{Inference, InferenceError, Tensor, bind_inputs},
  letterbox::letterbox,
};

use super::{
  Decode, DecodeContext, DecodeError, DetectItem, DetectResult, Decoder, FixedRegions, Model,
  Region, RegionSource, WholeFrame,
};

/// Faster R-CNN 的 BGR 通道均值
const FASTER_RCNN_MEAN_BGR: [f32; 3] = [102.9801, 115.9465, 122.7717];

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("推理后端错误: {0}")]
  Inference(#[from] InferenceError),
  #[error("模型参数错误: {0}")]
  Query(String),
}

/// 单帧检测失败的原因；任何一种都会使该帧不产生输出
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("预处理错误: {0}")]
  Preprocess(String),
  #[error("推理错误: {0}")]
  Inference(#[from] InferenceError),
  #[error("解码错误: {0}")]
  Decode(#[from] DecodeError),
}

pub struct Detector<I> {
  config: ModelConfig,
  decoder: Decoder,
  inference: I,
  regions: Box<dyn RegionSource>,
}

impl<I: Inference> Detector<I> {
  /// 校验配置后构造；配置错误在此处直接失败
  pub fn new(config: ModelConfig, inference: I) -> Result<Self, ModelError> {
    config.validate()?;
    info!(
      "创建检测器: {:?}, 画布 {}x{}, 阈值 {}, 类别数 {}",
      config.kind,
      config.canvas_w,
      config.canvas_h,
      config.threshold,
      config.num_classes()
    );
    debug!("生效配置: {}", config.to_json()?);
    Ok(Self {
      decoder: Decoder::for_kind(config.kind),
      config,
      inference,
      regions: Box::new(WholeFrame),
    })
  }

  pub fn with_regions(mut self, regions: impl RegionSource + 'static) -> Self {
    self.regions = Box::new(regions);
    self
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  /// 对一帧执行完整的检测流程
  pub fn detect(&self, frame: &Frame) -> Result<DetectResult, DetectError> {
    if frame.is_empty() {
      return Err(DetectError::Preprocess(format!(
        "帧 {} 尺寸为空: {}x{}",
        frame.index,
        frame.width(),
        frame.height()
      )));
    }

    let (items, inference_time) = match self.config.kind {
      ModelKind::EmotionFerplus => self.detect_regions(frame)?,
      _ => self.detect_canvas(frame)?,
    };

    debug!(
      "帧 {}: {} 个结果, 推理耗时 {:.2?}",
      frame.index,
      items.len(),
      inference_time
    );

    Ok(DetectResult {
      items: items.into_boxed_slice(),
      image_size: (frame.width(), frame.height()),
      inference_time,
    })
  }

  fn run(&self, tensors: Vec<Tensor>) -> Result<(Vec<Tensor>, Duration), DetectError> {
    let inputs = bind_inputs(&self.inference, tensors)?;
    let now = Instant::now();
    let outputs = self.inference.run(inputs)?;
    Ok((outputs, now.elapsed()))
  }

  fn detect_canvas(&self, frame: &Frame) -> Result<(Vec<DetectItem>, Duration), DetectError> {
    let config = &self.config;
    let pad = config.pad_value;
    let (canvas, params) = letterbox(&frame.image, config.canvas_w, config.canvas_h, Rgb([pad; 3]));

    let tensors = match config.kind {
      ModelKind::TinyYolov2 => vec![Tensor::from(rgb_to_nchw(&canvas, ChannelOrder::Rgb, |_, v| {
        v as f32
      }))],
      ModelKind::Yolov3 => vec![
        Tensor::from(rgb_to_nchw(&canvas, ChannelOrder::Rgb, |_, v| v as f32 / 255.0)),
        // 原图尺寸 [H, W]，模型据此输出原图坐标
        Tensor::from(arr2(&[[frame.height() as f32, frame.width() as f32]])),
      ],
      ModelKind::FasterRcnn => vec![Tensor::from(rgb_to_chw(&canvas, ChannelOrder::Bgr, |c, v| {
        v as f32 - FASTER_RCNN_MEAN_BGR[c]
      }))],
      ModelKind::EmotionFerplus => {
        return Err(DetectError::Preprocess("分类模型需要按区域处理".to_string()));
      }
    };

    let (outputs, elapsed) = self.run(tensors)?;
    let ctx = DecodeContext {
      image_size: (frame.width(), frame.height()),
      letterbox: params,
      region: None,
    };
    let items = self.decoder.decode(config, &outputs, &ctx)?;
    Ok((items, elapsed))
  }

  fn detect_regions(&self, frame: &Frame) -> Result<(Vec<DetectItem>, Duration), DetectError> {
    let config = &self.config;
    let (width, height) = (frame.width(), frame.height());
    let mut items = Vec::new();
    let mut total = Duration::ZERO;

    for region in self.regions.regions(frame) {
      let Some(region) = region.clamp_to(width, height) else {
        debug!("跳过图像外的区域 {:?}", region);
        continue;
      };

      let crop = imageops::crop_imm(&frame.image, region.x, region.y, region.w, region.h).to_image();
      let gray = rgb_to_gray_bt601(&crop);
      let (canvas, params) = letterbox(&gray, config.canvas_w, config.canvas_h, Luma([config.pad_value]));

      let (outputs, elapsed) = self.run(vec![Tensor::from(gray_to_nchw(&canvas))])?;
      total += elapsed;

      let ctx = DecodeContext {
        image_size: (width, height),
        letterbox: params,
        region: Some(region),
      };
      items.extend(self.decoder.decode(config, &outputs, &ctx)?);
    }

    Ok((items, total))
  }
}

impl<I: Inference> Model for Detector<I> {
  type Input = Frame;
  type Output = DetectResult;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}

/// 从模型 URL 构造检测器，例如
/// `tiny-yolov2:///models/tiny_yolov2/model.onnx?threshold=0.3`
pub struct DetectorBuilder {
  kind: ModelKind,
  model_path: PathBuf,
  threshold: Option<f32>,
  config_path: Option<PathBuf>,
  softmax: Option<SoftmaxMode>,
  regions: Vec<Region>,
}

impl FromUrl for DetectorBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let kind = ModelKind::from_scheme(url.scheme())?;
    if url.path().is_empty() {
      return Err(ModelError::Query(format!("模型路径为空: {}", url)));
    }

    let mut builder = DetectorBuilder {
      kind,
      model_path: PathBuf::from(url.path()),
      threshold: None,
      config_path: None,
      softmax: None,
      regions: Vec::new(),
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "threshold" => {
          let threshold = value
            .parse::<f32>()
            .map_err(|e| ModelError::Query(format!("阈值 '{}' 无效: {}", value, e)))?;
          builder.threshold = Some(threshold);
        }
        "config" => builder.config_path = Some(PathBuf::from(value.as_ref())),
        "softmax" => {
          builder.softmax = Some(match value.as_ref() {
            "stable" => SoftmaxMode::Stable,
            "reference" => SoftmaxMode::Reference,
            other => return Err(ModelError::Query(format!("未知的 softmax 方式: {}", other))),
          })
        }
        "region" if kind == ModelKind::EmotionFerplus => {
          builder.regions.push(value.parse().map_err(ModelError::Query)?)
        }
        "region" => {
          return Err(ModelError::Query(format!(
            "区域参数只适用于 {}, 当前模型为 {}",
            ModelKind::EmotionFerplus.scheme(),
            kind.scheme()
          )));
        }
        other => return Err(ModelError::Query(format!("未知参数: {}", other))),
      }
    }

    Ok(builder)
  }
}

impl DetectorBuilder {
  pub fn kind(&self) -> ModelKind {
    self.kind
  }

  pub fn model_path(&self) -> &PathBuf {
    &self.model_path
  }

  /// 预设 + 覆盖文件 + URL 参数，依次生效
  pub fn build_config(&self) -> Result<ModelConfig, ModelError> {
    let mut config = ModelConfig::preset(self.kind);
    if let Some(path) = &self.config_path {
      config = config.with_override_file(path)?;
    }
    if let Some(threshold) = self.threshold {
      config.threshold = threshold;
    }
    if let Some(softmax) = self.softmax {
      config.softmax = softmax;
    }
    Ok(config)
  }

  pub fn build_with<I: Inference>(self, inference: I) -> Result<Detector<I>, ModelError> {
    let config = self.build_config()?;
    let detector = Detector::new(config, inference)?;
    if self.regions.is_empty() {
      Ok(detector)
    } else {
      info!("使用 {} 个固定区域", self.regions.len());
      Ok(detector.with_regions(FixedRegions(self.regions)))
    }
  }

  #[cfg(feature = "onnx")]
  pub fn build(self) -> Result<Detector<crate::inference::OnnxInference>, ModelError> {
    let inference = crate::inference::OnnxInference::load(&self.model_path)?;
    self.build_with(inference)
  }
}
