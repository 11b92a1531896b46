// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
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

//! # GStreamer 视频输入
//!
//! 解码视频文件并逐帧输出 RGB 图像。帧尺寸取自每个 sample 的 caps，
//! 不需要预先知道。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! 在 `Cargo.toml` 中启用 `gstreamer_input` 特性。

use std::path::{Path, PathBuf};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  frame::Frame,
  input::{InputKind, InputSource},
};

const RGB_CHANNELS: usize = 3;
const PREROLL_TIMEOUT_SECS: u64 = 5;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  #[error("视频文件不存在: {0}")]
  FileNotFound(PathBuf),
  /// GStreamer 库错误
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 布尔错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("找不到 appsink 元素")]
  AppSinkNotFound,
  #[error("无法转换为 appsink 元素")]
  AppSinkConversionFailed,
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  #[error("不支持的视频格式: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("状态改变错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

/// 视频文件输入，读取失败或流结束时迭代终止
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  next_index: u64,
  fps: Option<f64>,
  total_frames: Option<u64>,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("无法停止 GStreamer 管道: {}", e);
    }
  }
}

impl GStreamerInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, GStreamerInputError> {
    let path = path.as_ref();
    if !path.is_file() {
      error!("视频文件不存在: {}", path.display());
      return Err(GStreamerInputError::FileNotFound(path.to_path_buf()));
    }

    gst::init()?;

    let description = format!(
      "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false",
      path.display()
    );
    info!("GStreamer 管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("无法创建管道".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    let mut input = GStreamerInput {
      pipeline,
      appsink,
      next_index: 0,
      fps: None,
      total_frames: None,
    };
    input.preroll()?;
    input.pipeline.set_state(gst::State::Playing)?;

    Ok(input)
  }

  // 预卷后查询帧率与时长
  fn preroll(&mut self) -> Result<(), GStreamerInputError> {
    self.pipeline.set_state(gst::State::Paused)?;
    let (result, _, _) = self
      .pipeline
      .state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    result?;

    self.fps = self
      .appsink
      .static_pad("sink")
      .and_then(|pad| pad.current_caps())
      .and_then(|caps| gst_video::VideoInfo::from_caps(&caps).ok())
      .map(|info| info.fps())
      .filter(|fps| fps.numer() > 0 && fps.denom() > 0)
      .map(|fps| fps.numer() as f64 / fps.denom() as f64);

    let duration = self.pipeline.query_duration::<gst::ClockTime>();
    self.total_frames = match (duration, self.fps) {
      (Some(duration), Some(fps)) => Some((duration.seconds_f64() * fps).round() as u64),
      _ => None,
    };

    match self.total_frames {
      Some(total) => info!("视频共 {} 帧, 帧率 {:?}", total, self.fps),
      None => warn!("无法确定视频总帧数"),
    }
    Ok(())
  }

  fn pull_sample(&self) -> Option<gst::Sample> {
    match self.appsink.pull_sample() {
      Ok(sample) => Some(sample),
      Err(_) if self.appsink.is_eos() => {
        info!("视频读取结束, 共 {} 帧", self.next_index);
        None
      }
      Err(e) => {
        error!("读取视频帧失败: {}", e);
        None
      }
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    let timestamp_ms = sample
      .buffer()
      .and_then(|buffer| buffer.pts())
      .map(|pts| pts.mseconds())
      .unwrap_or_default();

    let image = sample_to_image(&sample)
      .map_err(|e| {
        error!("转换视频帧失败: {}", e);
        e
      })
      .ok()?;

    let mut frame = Frame::new(image, self.next_index);
    frame.timestamp_ms = timestamp_ms;
    self.next_index += 1;
    Some(frame)
  }
}

impl InputSource for GStreamerInput {
  fn kind(&self) -> InputKind {
    InputKind::Video
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }

  fn total_frames(&self) -> Option<u64> {
    self.total_frames
  }
}

// 每行可能有对齐填充，按 stride 逐行拷贝
fn sample_to_image(sample: &gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("sample 中没有 buffer".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("sample 中没有 caps".to_string()))?;

  let info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  if info.format() != gst_video::VideoFormat::Rgb {
    return Err(GStreamerInputError::UnsupportedFormat(info.format()));
  }

  let width = info.width() as usize;
  let height = info.height() as usize;
  let stride = info.stride()[0] as usize;
  let offset = info.offset()[0];
  let row_bytes = width * RGB_CHANNELS;

  let map = buffer
    .map_readable()
    .map_err(|e| GStreamerInputError::PipelineError(format!("无法映射 buffer: {}", e)))?;
  let data = map.as_slice();

  let expected = offset + stride * height.saturating_sub(1) + row_bytes;
  if data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(row_bytes * height);
  for y in 0..height {
    let start = offset + y * stride;
    pixels.extend_from_slice(&data[start..start + row_bytes]);
  }

  RgbImage::from_raw(width as u32, height as u32, pixels).ok_or(
    GStreamerInputError::BufferSizeMismatch {
      expected: row_bytes * height,
      actual: data.len(),
    },
  )
}
