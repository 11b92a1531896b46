// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/bin/detect_image.rs - 单张图片检测与球衣颜色标注
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

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use kitscan::{
  args::DetectArgs,
  config::{Container, DetectionConfig, VIDEO_FPS, output_path_for},
  filter::DetectionFilter,
  input::InputWrapper,
  labels::LabelTable,
  model::{Detector, darknet::DarknetModel},
  nms::Suppression,
  output::{
    OutputWrapper,
    draw::{Painter, RenderStyle},
  },
  task::{OneShotTask, Task},
};

/// 检测图片中的球员与球，并按球衣主色标注
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图片
  #[arg(long, value_name = "IMAGE", default_value = "images/0a2d9b_9_test.jpg")]
  pub input: PathBuf,

  #[command(flatten)]
  pub detect: DetectArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let paths = args.detect.model_paths();
  let config = args.detect.detection_config(DetectionConfig::image())?;

  info!("模型配置: {}", paths.config.display());
  info!("模型权重: {}", paths.weights.display());
  info!("输入图片: {}", args.input.display());

  let labels = Arc::new(
    LabelTable::from_file(&paths.labels)
      .with_context(|| format!("无法加载标签文件 {}", paths.labels.display()))?,
  );
  let only_class = config.resolve_only_class(&labels)?;
  let render_classes = config.resolve_render_classes(&labels)?;

  let model = DarknetModel::load(&paths).context("无法加载 YOLOv3 网络")?;
  let detector = Detector::new(
    model,
    DetectionFilter::new(config.confidence).with_only_class(only_class),
    Suppression::new(config.score_threshold, config.iou_threshold),
  );

  let input = InputWrapper::open(&args.input)
    .with_context(|| format!("无法读取图片 {}", args.input.display()))?;
  let output_path = output_path_for(&args.input, &args.detect.output_dir, Container::Image);
  let output = OutputWrapper::create(&output_path, VIDEO_FPS)?;

  let painter = Painter::new(RenderStyle::Kit, labels)
    .with_colors(args.detect.color_table())
    .with_render_classes(render_classes)
    .with_font_file(&args.detect.font);

  let report = OneShotTask::new(painter).run_task(input, detector, output)?;
  info!(
    "保留 {} 个检测, 绘制 {} 个, 输出: {}",
    report.detections,
    report.annotations,
    output_path.display()
  );

  Ok(())
}
