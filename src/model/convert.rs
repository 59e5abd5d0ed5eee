// 该文件是 Fengfan （风帆） 项目的一部分。
// src/model/convert.rs - 分类流水线转换为 ONNX 计算图
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

use std::path::Path;

use prost::Message;
use tracing::{debug, info};
use tract_onnx::pb::{
  AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto,
  TensorShapeProto, TypeProto, ValueInfoProto, tensor_shape_proto, type_proto,
};

use crate::model::LinearPipeline;

pub const CONVERTED_INPUT_NAME: &str = "float_input";
pub const CONVERTED_OUTPUT_NAME: &str = "probabilities";

const ONNX_IR_VERSION: i64 = 7;
const ONNX_OPSET_VERSION: i64 = 13;
// TensorProto.DataType.FLOAT
const ONNX_FLOAT: i32 = 1;
// AttributeProto.AttributeType.INT
const ONNX_ATTR_INT: i32 = 2;
const BATCH_DIM: &str = "N";

fn dim_param(name: &str) -> tensor_shape_proto::Dimension {
  tensor_shape_proto::Dimension {
    value: Some(tensor_shape_proto::dimension::Value::DimParam(
      name.to_string(),
    )),
    ..Default::default()
  }
}

fn dim_value(value: usize) -> tensor_shape_proto::Dimension {
  tensor_shape_proto::Dimension {
    value: Some(tensor_shape_proto::dimension::Value::DimValue(value as i64)),
    ..Default::default()
  }
}

fn float_value_info(name: &str, width: usize) -> ValueInfoProto {
  ValueInfoProto {
    name: name.to_string(),
    r#type: Some(TypeProto {
      value: Some(type_proto::Value::TensorType(type_proto::Tensor {
        elem_type: ONNX_FLOAT,
        shape: Some(TensorShapeProto {
          dim: vec![dim_param(BATCH_DIM), dim_value(width)],
          ..Default::default()
        }),
        ..Default::default()
      })),
      ..Default::default()
    }),
    ..Default::default()
  }
}

fn float_initializer(name: &str, dims: &[usize], data: Vec<f32>) -> TensorProto {
  TensorProto {
    name: name.to_string(),
    dims: dims.iter().map(|&d| d as i64).collect(),
    data_type: ONNX_FLOAT,
    float_data: data,
    ..Default::default()
  }
}

fn node(op_type: &str, inputs: &[&str], output: &str) -> NodeProto {
  NodeProto {
    name: format!("{}_{}", op_type.to_lowercase(), output),
    op_type: op_type.to_string(),
    input: inputs.iter().map(|s| s.to_string()).collect(),
    output: vec![output.to_string()],
    ..Default::default()
  }
}

/// 把训练好的流水线转换为等价的 ONNX 模型：
/// `X → Sub(mean) → Div(scale) → MatMul(W) → Add(b) → Softmax`，批维度为符号 `N`。
pub fn to_onnx(pipeline: &LinearPipeline) -> ModelProto {
  let d = pipeline.n_features();
  let k = pipeline.n_classes();
  debug!("转换流水线: {} 个特征, {} 个类别", d, k);

  let weights: Vec<f32> = pipeline.weights.iter().flatten().copied().collect();

  let mut softmax = node("Softmax", &["logits"], CONVERTED_OUTPUT_NAME);
  softmax.attribute.push(AttributeProto {
    name: "axis".to_string(),
    r#type: ONNX_ATTR_INT,
    i: 1,
    ..Default::default()
  });

  let graph = GraphProto {
    name: "linear_pipeline".to_string(),
    node: vec![
      node("Sub", &[CONVERTED_INPUT_NAME, "mean"], "centered"),
      node("Div", &["centered", "scale"], "scaled"),
      node("MatMul", &["scaled", "coef"], "linear"),
      node("Add", &["linear", "intercept"], "logits"),
      softmax,
    ],
    initializer: vec![
      float_initializer("mean", &[d], pipeline.mean.clone()),
      float_initializer("scale", &[d], pipeline.scale.clone()),
      float_initializer("coef", &[d, k], weights),
      float_initializer("intercept", &[k], pipeline.bias.clone()),
    ],
    input: vec![float_value_info(CONVERTED_INPUT_NAME, d)],
    output: vec![float_value_info(CONVERTED_OUTPUT_NAME, k)],
    ..Default::default()
  };

  ModelProto {
    ir_version: ONNX_IR_VERSION,
    opset_import: vec![OperatorSetIdProto {
      domain: String::new(),
      version: ONNX_OPSET_VERSION,
      ..Default::default()
    }],
    producer_name: env!("CARGO_PKG_NAME").to_string(),
    producer_version: env!("CARGO_PKG_VERSION").to_string(),
    graph: Some(graph),
    ..Default::default()
  }
}

/// 把 ONNX 模型编码为 protobuf 写入文件，必要时创建父目录
pub fn save_onnx(model: &ModelProto, path: &Path) -> std::io::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }
  let bytes = model.encode_to_vec();
  std::fs::write(path, &bytes)?;
  info!("保存 ONNX 模型到文件: {} ({} 字节)", path.display(), bytes.len());
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pipeline() -> LinearPipeline {
    LinearPipeline {
      mean: vec![0.5, -1.0],
      scale: vec![2.0, 1.0],
      weights: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
      bias: vec![0.1, 0.2, 0.3],
    }
  }

  #[test]
  fn test_graph_layout() {
    let model = to_onnx(&pipeline());
    let graph = model.graph.unwrap();
    let ops: Vec<_> = graph.node.iter().map(|n| n.op_type.as_str()).collect();
    assert_eq!(ops, ["Sub", "Div", "MatMul", "Add", "Softmax"]);
    assert_eq!(graph.input[0].name, CONVERTED_INPUT_NAME);
    assert_eq!(graph.output[0].name, CONVERTED_OUTPUT_NAME);
    assert_eq!(model.opset_import[0].version, ONNX_OPSET_VERSION);
  }

  #[test]
  fn test_coefficients_are_row_major() {
    let graph = to_onnx(&pipeline()).graph.unwrap();
    let coef = graph.initializer.iter().find(|t| t.name == "coef").unwrap();
    assert_eq!(coef.dims, [2, 3]);
    assert_eq!(coef.float_data, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
  }
}
