// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/task.rs - 图片与视频处理任务
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

use std::{
  sync::mpsc,
  thread,
  time::{Duration, Instant},
};

use anyhow::{anyhow, bail};
use image::RgbImage;
use tracing::{error, info, warn};

use crate::{
  input::InputSource,
  model::{DetectResult, Model},
  output::{OutputWriter, draw::Painter},
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskReport, Self::Error>;
}

/// 任务统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskReport {
  /// 已写出的帧数
  pub frames: u64,
  /// 抑制后保留的检测总数
  pub detections: u64,
  /// 实际绘制的检测总数
  pub annotations: u64,
}

/// 图片模式：读取一帧，检测、绘制并保存
pub struct OneShotTask {
  painter: Painter,
}

impl OneShotTask {
  pub fn new(painter: Painter) -> Self {
    Self { painter }
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: InputSource,
  M: Model<Input = RgbImage, Output = DetectResult, Error = ME>,
  O: OutputWriter<Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, mut output: O) -> Result<TaskReport, Self::Error> {
    info!("开始任务...");
    let mut frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))?;
    info!("图像尺寸: {}x{}x3", frame.width(), frame.height());

    let now = Instant::now();
    let result = model.infer(&frame.image)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let annotations = self.painter.paint(&mut frame.image, &result);
    for annotation in &annotations {
      info!(
        "{}: ({}, {}, {}x{}) 球衣颜色 {}",
        annotation.label,
        annotation.bbox.x,
        annotation.bbox.y,
        annotation.bbox.width,
        annotation.bbox.height,
        annotation.kit.map(|kit| kit.name()).unwrap_or("未知")
      );
    }

    output.write_frame(&frame.image)?;
    output.finish()?;
    info!("任务完成，共绘制 {} 个目标", annotations.len());

    Ok(TaskReport {
      frames: 1,
      detections: result.len() as u64,
      annotations: annotations.len() as u64,
    })
  }
}

/// 视频模式：逐帧检测、绘制并写出，直到输入结束、达到帧数上限或收到中断信号
pub struct ContinuousTask {
  painter: Painter,
  frame_number: Option<usize>,
  interruptible: bool,
}

impl ContinuousTask {
  pub fn new(painter: Painter) -> Self {
    Self {
      painter,
      frame_number: None,
      interruptible: true,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 是否安装 Ctrl-C 处理器
  pub fn with_interrupt(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }

  fn install_interrupt(&self) -> Option<mpsc::Receiver<()>> {
    if !self.interruptible {
      return None;
    }

    let (tx, rx) = mpsc::channel();
    let installed = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_AFTER);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });

    match installed {
      Ok(()) => Some(rx),
      Err(e) => {
        warn!("无法设置 Ctrl-C 处理器: {}", e);
        None
      }
    }
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: InputSource,
  M: Model<Input = RgbImage, Output = DetectResult, Error = ME>,
  O: OutputWriter<Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, mut output: O) -> Result<TaskReport, Self::Error> {
    info!("开始任务...");
    let interrupt = self.install_interrupt();
    let total_frames = input.total_frames();
    let mut report = TaskReport::default();
    let mut dimensions: Option<(u32, u32)> = None;

    let processed = (|| -> anyhow::Result<()> {
      loop {
        if let Some(limit) = self.frame_number
          && report.frames >= limit as u64
        {
          info!("达到指定帧数 {}, 退出任务循环", limit);
          break;
        }
        let Some(mut frame) = input.next() else {
          break;
        };
        let index = report.frames + 1;
        info!("处理第 {} 帧图像", index);

        let size = (frame.width(), frame.height());
        match dimensions {
          None => dimensions = Some(size),
          Some(expected) if expected != size => {
            error!("第 {} 帧尺寸 {:?} 与首帧 {:?} 不一致", index, size, expected);
            bail!("帧尺寸变化: 期望 {:?}, 实际 {:?}", expected, size);
          }
          Some(_) => {}
        }

        let now = Instant::now();
        let result = model.infer(&frame.image)?;
        let inferred = now.elapsed();
        let annotations = self.painter.paint(&mut frame.image, &result);
        output.write_frame(&frame.image)?;
        let elapsed = now.elapsed();

        report.frames = index;
        report.detections += result.len() as u64;
        report.annotations += annotations.len() as u64;
        info!("推理完成，耗时: {:.2?} / {:.2?}", inferred, elapsed);

        if index == 1
          && let Some(total) = total_frames
        {
          info!("单帧耗时 {:.4} 秒", elapsed.as_secs_f64());
          info!("预计总耗时 {:.4} 秒", elapsed.as_secs_f64() * total as f64);
        }

        if interrupt.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
          warn!("中断信号接收，退出任务循环");
          break;
        }
      }
      Ok(())
    })();

    let finished = output.finish();
    processed?;
    finished?;

    info!("任务完成，共处理 {} 帧", report.frames);
    Ok(report)
  }
}
