// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/filter.rs - 检测结果过滤与坐标还原
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

use tracing::debug;

use crate::{
  bbox::BBox,
  model::{RawOutput, RowLayout},
};

/// 过滤结果：三个等长的并列序列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredDetections {
  pub boxes: Vec<BBox>,
  pub confidences: Vec<f32>,
  pub class_ids: Vec<usize>,
}

impl FilteredDetections {
  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  fn push(&mut self, bbox: BBox, confidence: f32, class_id: usize) {
    self.boxes.push(bbox);
    self.confidences.push(confidence);
    self.class_ids.push(class_id);
  }
}

/// 按类别置信度过滤原始候选，并把归一化坐标还原到像素坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionFilter {
  /// 置信度必须严格大于该值
  pub confidence: f32,
  /// 只保留该类别（在置信度判断之前检查）
  pub only_class: Option<usize>,
}

impl DetectionFilter {
  pub fn new(confidence: f32) -> Self {
    Self {
      confidence,
      only_class: None,
    }
  }

  pub fn with_only_class(mut self, class_id: Option<usize>) -> Self {
    self.only_class = class_id;
    self
  }

  pub fn apply(
    &self,
    raw: &RawOutput,
    layout: RowLayout,
    frame_width: u32,
    frame_height: u32,
  ) -> FilteredDetections {
    let mut out = FilteredDetections::default();

    for row in raw.rows() {
      let Some((class_id, confidence)) = best_class(row, layout) else {
        continue;
      };

      if self.only_class.is_some_and(|only| only != class_id) {
        continue;
      }

      if confidence <= self.confidence {
        continue;
      }

      let bbox = denormalize(row, frame_width, frame_height);
      debug!(
        "候选 class={} conf={:.3} box=({}, {}, {}x{})",
        class_id, confidence, bbox.x, bbox.y, bbox.width, bbox.height
      );
      out.push(bbox, confidence, class_id);
    }

    out
  }
}

/// argmax，分数相同时取第一个
fn best_class(row: &[f32], layout: RowLayout) -> Option<(usize, f32)> {
  if row.len() < 4 {
    return None;
  }
  let scores = row.get(layout.score_offset..)?;
  let mut best: Option<(usize, f32)> = None;
  for (class_id, &score) in scores.iter().enumerate() {
    match best {
      Some((_, max)) if score <= max => {}
      _ => best = Some((class_id, score)),
    }
  }
  best
}

/// `(cx, cy, w, h) * (W, H, W, H)` 截断取整后转成左上角坐标，并裁剪到帧内
fn denormalize(row: &[f32], frame_width: u32, frame_height: u32) -> BBox {
  let (fw, fh) = (frame_width as f64, frame_height as f64);
  let center_x = (row[0] as f64 * fw) as i32;
  let center_y = (row[1] as f64 * fh) as i32;
  let width = (row[2] as f64 * fw) as i32;
  let height = (row[3] as f64 * fh) as i32;

  let x = (center_x as f64 - width as f64 / 2.0) as i32;
  let y = (center_y as f64 - height as f64 / 2.0) as i32;

  BBox::new(x, y, width, height).clamp_to(frame_width, frame_height)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::LayerOutput;

  fn raw(rows: Vec<Vec<f32>>) -> RawOutput {
    RawOutput::new(vec![LayerOutput::new(rows)])
  }

  #[test]
  fn confidence_equal_to_threshold_is_excluded() {
    let filter = DetectionFilter::new(0.5);
    let out = filter.apply(
      &raw(vec![
        vec![0.5, 0.5, 0.2, 0.2, 0.5, 0.1],
        vec![0.5, 0.5, 0.2, 0.2, 0.51, 0.1],
      ]),
      RowLayout::PLAIN,
      100,
      100,
    );
    assert_eq!(out.len(), 1);
    assert_eq!(out.confidences, vec![0.51]);
  }

  #[test]
  fn identity_scale_keeps_normalized_geometry() {
    let filter = DetectionFilter::new(0.5);
    let out = filter.apply(
      &raw(vec![vec![0.0, 0.0, 1.0, 1.0, 0.9]]),
      RowLayout::PLAIN,
      1,
      1,
    );
    // cx=0, w=1 → x = trunc(0 - 0.5) = 0
    assert_eq!(out.boxes, vec![BBox::new(0, 0, 1, 1)]);
  }

  #[test]
  fn rescales_to_pixel_space() {
    let filter = DetectionFilter::new(0.5);
    let out = filter.apply(
      &raw(vec![vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.0, 0.0]]),
      RowLayout::PLAIN,
      100,
      100,
    );
    assert_eq!(out.boxes, vec![BBox::new(40, 40, 20, 20)]);
    assert_eq!(out.class_ids, vec![0]);
  }

  #[test]
  fn darknet_layout_skips_objectness() {
    let filter = DetectionFilter::new(0.5);
    // 目标置信度 0.99 不应被当作类别 0 的分数
    let row = vec![0.5, 0.5, 0.2, 0.2, 0.99, 0.1, 0.8];
    let out = filter.apply(&raw(vec![row]), RowLayout::DARKNET, 200, 100);
    assert_eq!(out.class_ids, vec![1]);
    assert_eq!(out.confidences, vec![0.8]);
    assert_eq!(out.boxes, vec![BBox::new(80, 40, 40, 20)]);
  }

  #[test]
  fn argmax_ties_pick_first_class() {
    let filter = DetectionFilter::new(0.5);
    let out = filter.apply(
      &raw(vec![vec![0.5, 0.5, 0.2, 0.2, 0.7, 0.7]]),
      RowLayout::PLAIN,
      10,
      10,
    );
    assert_eq!(out.class_ids, vec![0]);
  }

  #[test]
  fn only_class_is_checked_before_confidence() {
    let filter = DetectionFilter::new(0.5).with_only_class(Some(0));
    let out = filter.apply(
      &raw(vec![
        vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.1],
        vec![0.5, 0.5, 0.2, 0.2, 0.1, 0.95],
      ]),
      RowLayout::PLAIN,
      100,
      100,
    );
    assert_eq!(out.class_ids, vec![0]);
  }

  #[test]
  fn boxes_are_clamped_to_frame() {
    let filter = DetectionFilter::new(0.5);
    let out = filter.apply(
      &raw(vec![vec![0.0625, 0.9375, 0.2, 0.2, 0.9]]),
      RowLayout::PLAIN,
      100,
      100,
    );
    // 中心 (6, 93)，原始框 (-4, 83, 20, 20)
    assert_eq!(out.boxes, vec![BBox::new(0, 83, 16, 17)]);
  }

  #[test]
  fn short_rows_are_skipped() {
    let filter = DetectionFilter::new(0.5);
    let out = filter.apply(
      &raw(vec![vec![0.5, 0.5, 0.2], vec![0.5, 0.5, 0.2, 0.2]]),
      RowLayout::PLAIN,
      100,
      100,
    );
    assert!(out.is_empty());
  }
}
