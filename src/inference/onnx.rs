// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/inference/onnx.rs - ONNX Runtime 推理后端
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

use std::{path::Path, sync::Mutex};

use ort::{
  session::Session,
  value::{DynValue, Tensor as OrtTensor},
};
use tracing::{debug, info};

use super::{Inference, InferenceError, Tensor};

pub struct OnnxInference {
  session: Mutex<Session>,
  input_names: Vec<String>,
}

fn run_error(err: ort::Error) -> InferenceError {
  InferenceError::Run(err.to_string())
}

impl OnnxInference {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
    let path = path.as_ref();
    info!("加载 ONNX 模型: {}", path.display());
    let session = Session::builder()
      .and_then(|builder| builder.commit_from_file(path))
      .map_err(|e| InferenceError::Load(format!("{}: {}", path.display(), e)))?;

    for (i, input) in session.inputs.iter().enumerate() {
      debug!("输入[{}] 名称 = {}, 类型 = {:?}", i, input.name, input.input_type);
    }
    let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();
    info!("模型加载完成");

    Ok(Self {
      session: Mutex::new(session),
      input_names,
    })
  }
}

impl Inference for OnnxInference {
  fn input_names(&self) -> &[String] {
    &self.input_names
  }

  fn run(&self, inputs: Vec<(String, Tensor)>) -> Result<Vec<Tensor>, InferenceError> {
    let mut values: Vec<(String, DynValue)> = Vec::with_capacity(inputs.len());
    for (name, tensor) in inputs {
      let value = match tensor {
        Tensor::F32(array) => OrtTensor::from_array(array).map(|t| t.into_dyn()),
        Tensor::I64(array) => OrtTensor::from_array(array).map(|t| t.into_dyn()),
      }
      .map_err(run_error)?;
      values.push((name, value));
    }

    let mut session = self
      .session
      .lock()
      .map_err(|_| InferenceError::Run("推理会话锁已损坏".to_string()))?;
    let outputs = session.run(values).map_err(run_error)?;

    let mut tensors = Vec::with_capacity(outputs.len());
    for index in 0..outputs.len() {
      let value = &outputs[index];
      let tensor = if let Ok(array) = value.try_extract_array::<f32>() {
        Tensor::F32(array.to_owned())
      } else if let Ok(array) = value.try_extract_array::<i64>() {
        Tensor::I64(array.to_owned())
      } else if let Ok(array) = value.try_extract_array::<i32>() {
        Tensor::I64(array.mapv(i64::from))
      } else {
        return Err(InferenceError::UnsupportedType(format!("{:?}", value.dtype())));
      };
      debug!("输出[{}] 形状 = {:?}", index, tensor.shape());
      tensors.push(tensor);
    }

    Ok(tensors)
  }
}
