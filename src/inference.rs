// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/inference.rs - 推理后端接口
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

use ndarray::{ArrayD, Dimension};
use thiserror::Error;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::OnnxInference;

/// 推理输入/输出使用的稠密张量
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
  F32(ArrayD<f32>),
  I64(ArrayD<i64>),
}

impl Tensor {
  pub fn shape(&self) -> &[usize] {
    match self {
      Tensor::F32(array) => array.shape(),
      Tensor::I64(array) => array.shape(),
    }
  }

  pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
    match self {
      Tensor::F32(array) => Some(array),
      Tensor::I64(_) => None,
    }
  }

  /// 取浮点视图，整型张量会被转换
  pub fn to_f32(&self) -> ArrayD<f32> {
    match self {
      Tensor::F32(array) => array.clone(),
      Tensor::I64(array) => array.mapv(|v| v as f32),
    }
  }

  /// 取整型视图，用于索引类输出；浮点值按四舍五入转换
  pub fn to_i64(&self) -> ArrayD<i64> {
    match self {
      Tensor::F32(array) => array.mapv(|v| v.round() as i64),
      Tensor::I64(array) => array.clone(),
    }
  }
}

impl<D: Dimension> From<ndarray::Array<f32, D>> for Tensor {
  fn from(array: ndarray::Array<f32, D>) -> Self {
    Tensor::F32(array.into_dyn())
  }
}

impl<D: Dimension> From<ndarray::Array<i64, D>> for Tensor {
  fn from(array: ndarray::Array<i64, D>) -> Self {
    Tensor::I64(array.into_dyn())
  }
}

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("模型加载错误: {0}")]
  Load(String),
  #[error("推理执行错误: {0}")]
  Run(String),
  #[error("模型输入数量不足: 需要 {expected}, 模型提供 {actual}")]
  InputCount { expected: usize, actual: usize },
  #[error("不支持的输出张量类型: {0}")]
  UnsupportedType(String),
}

/// 推理后端：按名称输入张量，按顺序返回输出张量。调用是阻塞的。
pub trait Inference {
  fn input_names(&self) -> &[String];
  fn run(&self, inputs: Vec<(String, Tensor)>) -> Result<Vec<Tensor>, InferenceError>;
}

/// 将张量按位置与模型输入名称配对
pub fn bind_inputs<I: Inference + ?Sized>(
  inference: &I,
  tensors: Vec<Tensor>,
) -> Result<Vec<(String, Tensor)>, InferenceError> {
  let names = inference.input_names();
  if names.len() < tensors.len() {
    return Err(InferenceError::InputCount {
      expected: tensors.len(),
      actual: names.len(),
    });
  }
  Ok(names.iter().cloned().zip(tensors).collect())
}
