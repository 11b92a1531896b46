// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use crate::bbox::BBox;

/// NMS 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Suppression {
  /// 分数必须严格大于该值才参与抑制
  pub score_threshold: f32,
  /// 与已保留框的 IoU 大于该值时被抑制
  pub iou_threshold: f32,
}

impl Suppression {
  pub fn new(score_threshold: f32, iou_threshold: f32) -> Self {
    Self {
      score_threshold,
      iou_threshold,
    }
  }

  pub fn apply(&self, boxes: &[BBox], scores: &[f32]) -> Vec<usize> {
    nms_boxes(boxes, scores, self.score_threshold, self.iou_threshold)
  }
}

/// 贪心 NMS，与类别无关，返回按分数降序排列的保留下标
pub fn nms_boxes(
  boxes: &[BBox],
  scores: &[f32],
  score_threshold: f32,
  iou_threshold: f32,
) -> Vec<usize> {
  let mut candidates: Vec<usize> = (0..boxes.len().min(scores.len()))
    .filter(|&i| scores[i] > score_threshold)
    .collect();

  // 稳定排序，分数相同保持原有顺序
  candidates.sort_by(|&a, &b| {
    scores[b]
      .partial_cmp(&scores[a])
      .unwrap_or(Ordering::Equal)
  });

  let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
  for idx in candidates {
    let keep = kept
      .iter()
      .all(|&k| boxes[k].overlap(&boxes[idx]) <= iou_threshold);
    if keep {
      kept.push(idx);
    }
  }

  kept
}
