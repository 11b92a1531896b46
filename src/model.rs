// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  bbox::BBox,
  filter::DetectionFilter,
  nms::Suppression,
};

/// 单个输出层的原始结果，每行一个候选框
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerOutput {
  pub rows: Vec<Vec<f32>>,
}

impl LayerOutput {
  pub fn new(rows: Vec<Vec<f32>>) -> Self {
    Self { rows }
  }
}

/// 一次前向推理的全部输出层
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutput {
  pub layers: Vec<LayerOutput>,
}

impl RawOutput {
  pub fn new(layers: Vec<LayerOutput>) -> Self {
    Self { layers }
  }

  pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
    self
      .layers
      .iter()
      .flat_map(|layer| layer.rows.iter().map(Vec::as_slice))
  }

  pub fn row_count(&self) -> usize {
    self.layers.iter().map(|layer| layer.rows.len()).sum()
  }
}

/// 每行的布局：前 4 列为归一化的 `(cx, cy, w, h)`，类别分数从 `score_offset` 开始
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
  pub score_offset: usize,
}

impl RowLayout {
  /// 4 个框参数后紧跟类别分数
  pub const PLAIN: RowLayout = RowLayout { score_offset: 4 };
  /// Darknet 在框参数后多一列目标置信度，不参与类别选择
  pub const DARKNET: RowLayout = RowLayout { score_offset: 5 };
}

/// 推理适配器：给定一帧，返回所有输出层的原始候选
pub trait Inference {
  type Error;

  fn row_layout(&self) -> RowLayout;
  fn forward(&self, image: &RgbImage) -> Result<RawOutput, Self::Error>;
}

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub bbox: BBox,
  pub confidence: f32,
  pub class_id: usize,
}

/// 一帧中经过抑制后保留的检测，按置信度降序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

/// 推理 + 过滤 + 抑制
pub struct Detector<I> {
  inference: I,
  filter: DetectionFilter,
  suppression: Suppression,
}

impl<I: Inference> Detector<I> {
  pub fn new(inference: I, filter: DetectionFilter, suppression: Suppression) -> Self {
    Self {
      inference,
      filter,
      suppression,
    }
  }

  pub fn inference(&self) -> &I {
    &self.inference
  }
}

impl<I: Inference> Model for Detector<I> {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = I::Error;

  fn infer(&self, image: &RgbImage) -> Result<DetectResult, I::Error> {
    let raw = self.inference.forward(image)?;
    debug!(
      "推理输出 {} 层, 共 {} 个候选",
      raw.layers.len(),
      raw.row_count()
    );

    let filtered = self.filter.apply(
      &raw,
      self.inference.row_layout(),
      image.width(),
      image.height(),
    );
    let kept = self
      .suppression
      .apply(&filtered.boxes, &filtered.confidences);
    debug!("过滤后 {} 个候选, 抑制后保留 {} 个", filtered.len(), kept.len());

    let items = kept
      .into_iter()
      .map(|i| Detection {
        bbox: filtered.boxes[i],
        confidence: filtered.confidences[i],
        class_id: filtered.class_ids[i],
      })
      .collect::<Vec<_>>();

    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayerNameError {
  #[error("输出层索引 {id} 超出范围（共 {count} 层）")]
  OutOfRange { id: i32, count: usize },
  #[error("嵌套的输出层索引为空")]
  EmptyNested,
  #[error("网络没有未连接的输出层")]
  NoOutputs,
}

/// 未连接输出层的索引（1 起始），不同后端返回的形状不同
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutLayerIds {
  /// 每个索引包在单元素数组里
  Nested(Vec<Vec<i32>>),
  /// 一维索引
  Flat(Vec<i32>),
}

impl OutLayerIds {
  /// 构造时检查一次形状：所有元素都是单元素数组时视为嵌套
  pub fn detect(raw: Vec<Vec<i32>>) -> Self {
    if !raw.is_empty() && raw.iter().all(|ids| ids.len() == 1) {
      OutLayerIds::Nested(raw)
    } else {
      OutLayerIds::Flat(raw.into_iter().flatten().collect())
    }
  }
}

/// 把 1 起始的输出层索引解析为层名
pub fn resolve_output_layers(
  layer_names: &[String],
  ids: &OutLayerIds,
) -> Result<Vec<String>, LayerNameError> {
  let flat: Vec<i32> = match ids {
    OutLayerIds::Nested(nested) => nested
      .iter()
      .map(|ids| ids.first().copied().ok_or(LayerNameError::EmptyNested))
      .collect::<Result<_, _>>()?,
    OutLayerIds::Flat(flat) => flat.clone(),
  };

  if flat.is_empty() {
    return Err(LayerNameError::NoOutputs);
  }

  let names = flat
    .into_iter()
    .map(|id| {
      usize::try_from(id - 1)
        .ok()
        .and_then(|idx| layer_names.get(idx))
        .cloned()
        .ok_or(LayerNameError::OutOfRange {
          id,
          count: layer_names.len(),
        })
    })
    .collect::<Result<Vec<_>, _>>()?;

  info!("输出层: {:?}", names);
  Ok(names)
}

#[cfg(feature = "darknet")]
pub mod darknet;

#[cfg(test)]
mod tests {
  use super::*;
  use std::convert::Infallible;

  struct Scripted(RawOutput);

  impl Inference for Scripted {
    type Error = Infallible;

    fn row_layout(&self) -> RowLayout {
      RowLayout::PLAIN
    }

    fn forward(&self, _image: &RgbImage) -> Result<RawOutput, Infallible> {
      Ok(self.0.clone())
    }
  }

  fn names() -> Vec<String> {
    ["conv_0", "yolo_82", "conv_83", "yolo_94", "yolo_106"]
      .iter()
      .map(|s| s.to_string())
      .collect()
  }

  #[test]
  fn nested_and_flat_ids_resolve_to_same_names() {
    let nested = OutLayerIds::detect(vec![vec![2], vec![4], vec![5]]);
    assert!(matches!(nested, OutLayerIds::Nested(_)));
    let flat = OutLayerIds::Flat(vec![2, 4, 5]);

    let expected = vec!["yolo_82", "yolo_94", "yolo_106"];
    assert_eq!(resolve_output_layers(&names(), &nested).unwrap(), expected);
    assert_eq!(resolve_output_layers(&names(), &flat).unwrap(), expected);
  }

  #[test]
  fn detect_flattens_mixed_shapes() {
    let ids = OutLayerIds::detect(vec![vec![2, 4, 5]]);
    assert_eq!(ids, OutLayerIds::Flat(vec![2, 4, 5]));
  }

  #[test]
  fn out_of_range_layer_id_is_an_error() {
    let ids = OutLayerIds::Flat(vec![0]);
    assert_eq!(
      resolve_output_layers(&names(), &ids),
      Err(LayerNameError::OutOfRange { id: 0, count: 5 })
    );
    assert_eq!(
      resolve_output_layers(&names(), &OutLayerIds::Flat(vec![])),
      Err(LayerNameError::NoOutputs)
    );
  }

  #[test]
  fn detector_filters_and_suppresses() {
    // 两个几乎相同的 person 框 + 一个低置信度框
    let raw = RawOutput::new(vec![LayerOutput::new(vec![
      vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.1],
      vec![0.5, 0.5, 0.2, 0.2, 0.7, 0.1],
      vec![0.1, 0.1, 0.1, 0.1, 0.3, 0.2],
    ])]);
    let detector = Detector::new(
      Scripted(raw),
      DetectionFilter::new(0.5),
      Suppression::new(0.5, 0.5),
    );

    let image = RgbImage::new(100, 100);
    let result = detector.infer(&image).unwrap();
    assert_eq!(result.len(), 1);
    let det = result.items[0];
    assert_eq!(det.bbox, BBox::new(40, 40, 20, 20));
    assert_eq!(det.class_id, 0);
    assert!((det.confidence - 0.9).abs() < 1e-6);
  }
}
