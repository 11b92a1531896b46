// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出
//!
//! 把绘制后的帧编码为 MPEG-4 Part 2（mp4v）并封装为 `.mp4`。
//! 编码管道在收到第一帧、确定尺寸后才创建。
//!
//! 编码器 `avenc_mpeg4` 来自 gst-libav：
//!
//! ```bash
//! sudo apt-get install gstreamer1.0-libav gstreamer1.0-plugins-good
//! ```

use std::path::{Path, PathBuf};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::output::OutputWriter;

const RGB_CHANNELS: usize = 3;
const EOS_TIMEOUT_SECS: u64 = 10;

/// GStreamer 视频输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 布尔错误: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("找不到 appsrc 元素")]
  AppSrcNotFound,
  #[error("无法转换为 appsrc 元素")]
  AppSrcConversionFailed,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("状态改变错误: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("无法创建缓冲区")]
  BufferCreationError,
  #[error("帧尺寸不一致: 期望 {expected:?}, 实际 {actual:?}")]
  DimensionMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
  #[error("视频输出已结束")]
  AlreadyFinished,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

struct Encoder {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  info: gst_video::VideoInfo,
}

/// 视频文件输出
pub struct GStreamerVideoOutput {
  path: PathBuf,
  fps: u32,
  encoder: Option<Encoder>,
  frame_count: u64,
  finished: bool,
}

impl GStreamerVideoOutput {
  pub fn new(path: impl AsRef<Path>, fps: u32) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      fps: fps.max(1),
      encoder: None,
      frame_count: 0,
      finished: false,
    }
  }

  pub fn frame_count(&self) -> u64 {
    self.frame_count
  }

  fn start(&self, width: u32, height: u32) -> Result<Encoder, GStreamerVideoOutputError> {
    gst::init()?;

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let description = format!(
      "appsrc name=src ! videoconvert ! avenc_mpeg4 ! mpeg4videoparse ! mp4mux ! filesink location=\"{}\"",
      self.path.display()
    );
    info!("创建视频输出管道: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerVideoOutputError::PipelineError("无法创建管道".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoOutputError::AppSrcConversionFailed)?;

    let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, width, height)
      .fps(gst::Fraction::new(self.fps as i32, 1))
      .build()?;
    let caps = info.to_caps()?;

    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;
    info!(
      "视频输出已初始化: {}x{} @ {} fps -> {}",
      width,
      height,
      self.fps,
      self.path.display()
    );

    Ok(Encoder {
      pipeline,
      appsrc,
      info,
    })
  }

  // 按 caps 的 stride 逐行写入
  fn push_frame(&mut self, image: &RgbImage) -> Result<(), GStreamerVideoOutputError> {
    let Some(encoder) = &self.encoder else {
      return Err(GStreamerVideoOutputError::PipelineError(
        "编码管道未创建".to_string(),
      ));
    };

    let expected = (encoder.info.width(), encoder.info.height());
    if image.dimensions() != expected {
      return Err(GStreamerVideoOutputError::DimensionMismatch {
        expected,
        actual: image.dimensions(),
      });
    }

    let stride = encoder.info.stride()[0] as usize;
    let offset = encoder.info.offset()[0];
    let row_bytes = image.width() as usize * RGB_CHANNELS;

    let mut buffer = gst::Buffer::with_size(encoder.info.size())?;
    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoOutputError::BufferCreationError)?;

      let frame_ns = 1_000_000_000 / self.fps as u64;
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(self.frame_count * frame_ns));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_ns));

      let mut map = buffer_ref
        .map_writable()
        .map_err(|_| GStreamerVideoOutputError::PipelineError("无法映射缓冲区".to_string()))?;
      let data = map.as_mut_slice();
      for (y, row) in image.as_raw().chunks_exact(row_bytes).enumerate() {
        let start = offset + y * stride;
        data[start..start + row_bytes].copy_from_slice(row);
      }
    }

    encoder.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerVideoOutputError::PipelineError(format!("无法推送缓冲区: {:?}", e))
    })?;
    self.frame_count += 1;

    Ok(())
  }

  fn close(encoder: Encoder) -> Result<(), GStreamerVideoOutputError> {
    let eos = encoder.appsrc.end_of_stream();

    let mut outcome = eos
      .map(|_| ())
      .map_err(|e| GStreamerVideoOutputError::PipelineError(format!("无法发送 EOS: {:?}", e)));

    if outcome.is_ok()
      && let Some(bus) = encoder.pipeline.bus()
    {
      let message = bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
        &[gst::MessageType::Eos, gst::MessageType::Error],
      );
      match message.as_ref().map(|msg| msg.view()) {
        Some(gst::MessageView::Error(err)) => {
          outcome = Err(GStreamerVideoOutputError::PipelineError(format!(
            "{} ({:?})",
            err.error(),
            err.debug()
          )));
        }
        Some(_) => {}
        None => warn!("等待 EOS 超时"),
      }
    }

    encoder.pipeline.set_state(gst::State::Null)?;
    outcome
  }
}

impl OutputWriter for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    if self.finished {
      return Err(GStreamerVideoOutputError::AlreadyFinished);
    }

    if self.encoder.is_none() {
      self.encoder = Some(self.start(image.width(), image.height())?);
    }

    self.push_frame(image)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    if self.finished {
      return Ok(());
    }
    self.finished = true;

    let Some(encoder) = self.encoder.take() else {
      warn!("没有写入任何帧, 不生成 {}", self.path.display());
      return Ok(());
    };

    Self::close(encoder).inspect_err(|e| error!("关闭视频输出失败: {}", e))?;
    info!(
      "视频输出已关闭, 共写入 {} 帧: {}",
      self.frame_count,
      self.path.display()
    );
    Ok(())
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    if let Err(e) = self.finish() {
      warn!("丢弃视频输出时关闭失败: {}", e);
    }
  }
}
