// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/args.rs - 命令行公共参数
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

use std::path::PathBuf;

use clap::Args;

use crate::{
  color::{ColorTable, KitColor},
  config::{
    CONFIDENCE, ConfigError, DEFAULT_CONFIG_PATH, DEFAULT_LABELS_PATH, DEFAULT_WEIGHTS_PATH,
    DetectionConfig, ModelPaths, OUTPUT_DIR, SCORE_THRESHOLD,
  },
  output::draw::DEFAULT_FONT_PATH,
};

/// 两个可执行文件共用的参数，默认值与历史常量一致
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
  /// 网络结构描述文件
  #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
  pub config: PathBuf,

  /// 预训练权重文件
  #[arg(long, value_name = "FILE", default_value = DEFAULT_WEIGHTS_PATH)]
  pub weights: PathBuf,

  /// 类别标签文件，每行一个类别名
  #[arg(long, value_name = "FILE", default_value = DEFAULT_LABELS_PATH)]
  pub labels: PathBuf,

  /// 输出目录，不存在时自动创建
  #[arg(long, value_name = "DIR", default_value = OUTPUT_DIR)]
  pub output_dir: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)，严格大于才保留
  #[arg(long, default_value_t = CONFIDENCE, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS 分数阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = SCORE_THRESHOLD, value_name = "THRESHOLD")]
  pub score_threshold: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)，缺省时按模式取 0.5（图片）或 0.2（视频）
  #[arg(long, value_name = "THRESHOLD")]
  pub iou_threshold: Option<f32>,

  /// 绘制标签用的 TrueType 字体
  #[arg(long, value_name = "FILE", default_value = DEFAULT_FONT_PATH)]
  pub font: PathBuf,

  /// 额外启用的球衣颜色（blue、green），可重复
  #[arg(long, value_name = "COLOR")]
  pub enable_color: Vec<KitColor>,
}

impl DetectArgs {
  pub fn model_paths(&self) -> ModelPaths {
    ModelPaths {
      config: self.config.clone(),
      weights: self.weights.clone(),
      labels: self.labels.clone(),
    }
  }

  /// 在模式预设上应用命令行覆盖
  pub fn detection_config(&self, preset: DetectionConfig) -> Result<DetectionConfig, ConfigError> {
    let config = DetectionConfig {
      confidence: self.confidence,
      score_threshold: self.score_threshold,
      iou_threshold: self.iou_threshold.unwrap_or(preset.iou_threshold),
      ..preset
    };
    config.validate()?;
    Ok(config)
  }

  pub fn color_table(&self) -> ColorTable {
    self
      .enable_color
      .iter()
      .fold(ColorTable::kits(), |table, color| table.with_color(*color))
  }
}
