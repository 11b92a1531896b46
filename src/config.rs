// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/config.rs - 检测参数与路径配置
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

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::labels::{LabelError, LabelTable};

/// 类别置信度阈值（严格大于才保留）
pub const CONFIDENCE: f32 = 0.5;
/// NMS 分数阈值
pub const SCORE_THRESHOLD: f32 = 0.5;
/// 图片模式的 NMS IoU 阈值
pub const IMAGE_IOU_THRESHOLD: f32 = 0.5;
/// 视频模式的 NMS IoU 阈值
pub const VIDEO_IOU_THRESHOLD: f32 = 0.2;
/// 输出视频帧率
pub const VIDEO_FPS: u32 = 30;
/// 输出目录
pub const OUTPUT_DIR: &str = "output";
/// 输出文件名后缀
pub const OUTPUT_SUFFIX: &str = "_yolo3";

/// 按单张图片读写的扩展名（小写），输入与输出共用
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

/// 路径扩展名（忽略大小写）是否为图片
pub fn is_image_path(path: &Path) -> bool {
  path
    .extension()
    .map(|ext| ext.to_string_lossy().to_lowercase())
    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub const DEFAULT_CONFIG_PATH: &str = "cfg/yolov3.cfg";
pub const DEFAULT_WEIGHTS_PATH: &str = "weights/yolov3.weights";
pub const DEFAULT_LABELS_PATH: &str = "data/coco.names";

pub const PERSON: &str = "person";
pub const SPORTS_BALL: &str = "sports ball";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("{name} 必须位于 [0, 1] 区间内, 实际为 {value}")]
  OutOfRange { name: &'static str, value: f32 },
  #[error("标签错误: {0}")]
  Label(#[from] LabelError),
}

/// 检测与抑制参数
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
  /// 置信度阈值
  pub confidence: f32,
  /// NMS 分数阈值
  pub score_threshold: f32,
  /// NMS IoU 阈值
  pub iou_threshold: f32,
  /// 过滤阶段只保留的类别（视频模式为 person）
  pub only_class: Option<String>,
  /// 绘制阶段只绘制的类别（图片模式为 person 与 sports ball）
  pub render_classes: Option<Vec<String>>,
}

impl DetectionConfig {
  /// 图片模式预设
  pub fn image() -> Self {
    Self {
      confidence: CONFIDENCE,
      score_threshold: SCORE_THRESHOLD,
      iou_threshold: IMAGE_IOU_THRESHOLD,
      only_class: None,
      render_classes: Some(vec![PERSON.to_string(), SPORTS_BALL.to_string()]),
    }
  }

  /// 视频模式预设
  pub fn video() -> Self {
    Self {
      confidence: CONFIDENCE,
      score_threshold: SCORE_THRESHOLD,
      iou_threshold: VIDEO_IOU_THRESHOLD,
      only_class: Some(PERSON.to_string()),
      render_classes: None,
    }
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, value) in [
      ("confidence", self.confidence),
      ("score_threshold", self.score_threshold),
      ("iou_threshold", self.iou_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange { name, value });
      }
    }
    Ok(())
  }

  /// 把过滤阶段的类别名解析为索引
  pub fn resolve_only_class(&self, labels: &LabelTable) -> Result<Option<usize>, ConfigError> {
    Ok(
      self
        .only_class
        .as_deref()
        .map(|name| labels.resolve(name))
        .transpose()?,
    )
  }

  /// 把绘制阶段的类别名解析为索引
  pub fn resolve_render_classes(
    &self,
    labels: &LabelTable,
  ) -> Result<Option<Vec<usize>>, ConfigError> {
    Ok(
      self
        .render_classes
        .as_ref()
        .map(|names| {
          names
            .iter()
            .map(|name| labels.resolve(name))
            .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?,
    )
  }
}

impl Default for DetectionConfig {
  fn default() -> Self {
    Self::image()
  }
}

/// 模型与标签文件路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
  /// 网络结构描述文件
  pub config: PathBuf,
  /// 预训练权重文件
  pub weights: PathBuf,
  /// 类别标签文件
  pub labels: PathBuf,
}

impl Default for ModelPaths {
  fn default() -> Self {
    Self {
      config: PathBuf::from(DEFAULT_CONFIG_PATH),
      weights: PathBuf::from(DEFAULT_WEIGHTS_PATH),
      labels: PathBuf::from(DEFAULT_LABELS_PATH),
    }
  }
}

/// 输出容器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
  /// 沿用输入图片的扩展名
  Image,
  /// 固定为 mp4
  Mp4,
}

/// 根据输入路径推导输出路径：`<output_dir>/<stem>_yolo3.<ext>`
pub fn output_path_for(input: &Path, output_dir: &Path, container: Container) -> PathBuf {
  let stem = input
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "frame".to_string());

  let ext = match container {
    Container::Mp4 => "mp4".to_string(),
    Container::Image => input
      .extension()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "png".to_string()),
  };

  output_dir.join(format!("{}{}.{}", stem, OUTPUT_SUFFIX, ext))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn presets_follow_mode() {
    let image = DetectionConfig::image();
    assert_eq!(image.iou_threshold, 0.5);
    assert!(image.only_class.is_none());

    let video = DetectionConfig::video();
    assert_eq!(video.iou_threshold, 0.2);
    assert_eq!(video.only_class.as_deref(), Some("person"));
    assert!(video.render_classes.is_none());
  }

  #[test]
  fn validate_rejects_out_of_range() {
    let mut config = DetectionConfig::image();
    assert!(config.validate().is_ok());
    config.iou_threshold = 1.5;
    assert!(matches!(
      config.validate(),
      Err(ConfigError::OutOfRange {
        name: "iou_threshold",
        ..
      })
    ));
  }

  #[test]
  fn resolves_class_names() {
    let labels = LabelTable::parse("person\nbicycle\nsports ball");
    let image = DetectionConfig::image();
    assert_eq!(
      image.resolve_render_classes(&labels).unwrap(),
      Some(vec![0, 2])
    );
    assert_eq!(image.resolve_only_class(&labels).unwrap(), None);
    assert_eq!(
      DetectionConfig::video().resolve_only_class(&labels).unwrap(),
      Some(0)
    );
  }

  #[test]
  fn missing_render_class_is_an_error() {
    let labels = LabelTable::parse("person");
    assert!(DetectionConfig::image().resolve_render_classes(&labels).is_err());
  }

  #[test]
  fn output_path_inserts_suffix() {
    let out = Path::new("output");
    assert_eq!(
      output_path_for(Path::new("images/0a2d9b_9_test.jpg"), out, Container::Image),
      PathBuf::from("output/0a2d9b_9_test_yolo3.jpg")
    );
    assert_eq!(
      output_path_for(Path::new("videos/match.v2.avi"), out, Container::Mp4),
      PathBuf::from("output/match.v2_yolo3.mp4")
    );
  }

  #[test]
  fn image_path_ignores_case() {
    assert!(is_image_path(Path::new("a/shot.TIF")));
    assert!(is_image_path(Path::new("shot.jpeg")));
    assert!(!is_image_path(Path::new("match.mp4")));
    assert!(!is_image_path(Path::new("noext")));
  }
}
