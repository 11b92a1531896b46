// 该文件是 Kitscan （球衣识别） 项目的一部分。
// tests/pipeline.rs - 图片与视频任务的端到端测试
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
  convert::Infallible,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use image::{Rgb, RgbImage};

use kitscan::{
  config::{Container, DetectionConfig, IMAGE_EXTENSIONS, VIDEO_FPS, output_path_for},
  filter::DetectionFilter,
  frame::Frame,
  input::{ImageFileInput, InputKind, InputSource, InputWrapper},
  labels::LabelTable,
  model::{Detector, Inference, LayerOutput, RawOutput, RowLayout},
  nms::Suppression,
  output::{
    ImageFileOutput, OutputWrapper, OutputWriter,
    draw::{Painter, RenderStyle},
  },
  task::{ContinuousTask, OneShotTask, Task},
};

const GRAY: Rgb<u8> = Rgb([128, 128, 128]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// 每帧都返回同一份原始输出
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

/// 记录调用次数，输出为空
struct Counting(Arc<AtomicUsize>);

impl Inference for Counting {
  type Error = Infallible;

  fn row_layout(&self) -> RowLayout {
    RowLayout::PLAIN
  }

  fn forward(&self, _image: &RgbImage) -> Result<RawOutput, Infallible> {
    self.0.fetch_add(1, Ordering::SeqCst);
    Ok(RawOutput::default())
  }
}

#[derive(Default)]
struct MemorySink {
  frames: Vec<RgbImage>,
  finished: usize,
}

impl OutputWriter for MemorySink {
  type Error = Infallible;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Infallible> {
    self.frames.push(image.clone());
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Infallible> {
    self.finished += 1;
    Ok(())
  }
}

struct FrameSequence {
  frames: std::vec::IntoIter<Frame>,
  total: u64,
}

impl FrameSequence {
  fn new(images: Vec<RgbImage>) -> Self {
    let total = images.len() as u64;
    let frames = images
      .into_iter()
      .enumerate()
      .map(|(i, image)| Frame::new(image, i as u64))
      .collect::<Vec<_>>();
    Self {
      frames: frames.into_iter(),
      total,
    }
  }
}

impl Iterator for FrameSequence {
  type Item = Frame;

  fn next(&mut self) -> Option<Frame> {
    self.frames.next()
  }
}

impl InputSource for FrameSequence {
  fn kind(&self) -> InputKind {
    InputKind::Video
  }

  fn total_frames(&self) -> Option<u64> {
    Some(self.total)
  }
}

fn labels() -> Arc<LabelTable> {
  Arc::new(LabelTable::parse("person\nbicycle\nsports ball\n"))
}

fn person_at_center() -> RawOutput {
  RawOutput::new(vec![LayerOutput::new(vec![
    vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.0, 0.0],
    vec![0.5, 0.5, 0.2, 0.2, 0.4, 0.0, 0.0],
  ])])
}

fn detector(raw: RawOutput, config: &DetectionConfig) -> Detector<Scripted> {
  let labels = labels();
  Detector::new(
    Scripted(raw),
    DetectionFilter::new(config.confidence)
      .with_only_class(config.resolve_only_class(&labels).unwrap()),
    Suppression::new(config.score_threshold, config.iou_threshold),
  )
}

fn kit_painter(config: &DetectionConfig) -> Painter {
  let labels = labels();
  let render = config.resolve_render_classes(&labels).unwrap();
  Painter::new(RenderStyle::Kit, labels).with_render_classes(render)
}

fn red_player() -> RgbImage {
  let mut image = RgbImage::from_pixel(100, 100, GRAY);
  for y in 40..60 {
    for x in 40..60 {
      image.put_pixel(x, y, RED);
    }
  }
  image
}

#[test]
fn image_mode_keeps_and_draws_single_person() {
  let config = DetectionConfig::image();
  let original = red_player();
  let mut sink = MemorySink::default();

  let report = OneShotTask::new(kit_painter(&config))
    .run_task(
      ImageFileInput::from_image(original.clone()),
      detector(person_at_center(), &config),
      &mut sink,
    )
    .unwrap();

  assert_eq!(report.frames, 1);
  assert_eq!(report.detections, 1);
  assert_eq!(report.annotations, 1);
  assert_eq!(sink.finished, 1);
  assert_eq!(sink.frames.len(), 1);

  let drawn = &sink.frames[0];
  assert_ne!(drawn, &original);
  // 矩形右边框 x = 40 + 20
  assert_eq!(drawn.get_pixel(60, 50), &RED);
  assert_eq!(drawn.get_pixel(5, 5), &GRAY);
}

#[test]
fn image_mode_writes_annotated_file() {
  let dir = tempfile::tempdir().unwrap();
  let output_path = output_path_for(
    std::path::Path::new("images/player.png"),
    &dir.path().join("output"),
    Container::Image,
  );
  let config = DetectionConfig::image();

  OneShotTask::new(kit_painter(&config))
    .run_task(
      ImageFileInput::from_image(red_player()),
      detector(person_at_center(), &config),
      ImageFileOutput::new(&output_path),
    )
    .unwrap();

  assert!(output_path.ends_with("output/player_yolo3.png"));
  let saved = image::open(&output_path).unwrap().to_rgb8();
  assert_eq!(saved.dimensions(), (100, 100));
  assert_eq!(saved.get_pixel(60, 50), &RED);
}

#[test]
fn video_without_detections_passes_frames_through() {
  let config = DetectionConfig::video();
  let images: Vec<RgbImage> = (0..3u8)
    .map(|i| RgbImage::from_fn(32, 24, |x, y| Rgb([x as u8, y as u8, i * 40])))
    .collect();
  let mut sink = MemorySink::default();

  let painter = Painter::new(RenderStyle::Shadow, labels());
  let report = ContinuousTask::new(painter)
    .with_interrupt(false)
    .run_task(
      FrameSequence::new(images.clone()),
      detector(RawOutput::default(), &config),
      &mut sink,
    )
    .unwrap();

  assert_eq!(report.frames, 3);
  assert_eq!(report.detections, 0);
  assert_eq!(sink.finished, 1);
  assert_eq!(sink.frames, images);
}

#[test]
fn video_draws_green_shadow_for_people() {
  let config = DetectionConfig::video();
  let mut sink = MemorySink::default();

  let painter = Painter::new(RenderStyle::Shadow, labels());
  let report = ContinuousTask::new(painter)
    .with_interrupt(false)
    .run_task(
      FrameSequence::new(vec![red_player(), red_player()]),
      detector(person_at_center(), &config),
      &mut sink,
    )
    .unwrap();

  assert_eq!(report.frames, 2);
  assert_eq!(report.detections, 2);
  for frame in &sink.frames {
    // 没有矩形
    assert_eq!(frame.get_pixel(60, 50), &GRAY);
    assert!(frame.pixels().any(|p| p == &Rgb([0, 255, 0])));
  }
}

#[test]
fn video_stops_at_frame_limit() {
  let config = DetectionConfig::video();
  let images = vec![RgbImage::from_pixel(8, 8, GRAY); 5];
  let mut sink = MemorySink::default();

  let report = ContinuousTask::new(Painter::new(RenderStyle::Shadow, labels()))
    .with_interrupt(false)
    .with_frame_number(Some(2))
    .run_task(
      FrameSequence::new(images),
      detector(RawOutput::default(), &config),
      &mut sink,
    )
    .unwrap();

  assert_eq!(report.frames, 2);
  assert_eq!(sink.frames.len(), 2);
  assert_eq!(sink.finished, 1);
}

#[test]
fn video_rejects_frame_size_change_but_still_finishes() {
  let config = DetectionConfig::video();
  let images = vec![
    RgbImage::from_pixel(8, 8, GRAY),
    RgbImage::from_pixel(16, 8, GRAY),
    RgbImage::from_pixel(8, 8, GRAY),
  ];
  let mut sink = MemorySink::default();

  let result = ContinuousTask::new(Painter::new(RenderStyle::Shadow, labels()))
    .with_interrupt(false)
    .run_task(
      FrameSequence::new(images),
      detector(RawOutput::default(), &config),
      &mut sink,
    );

  assert!(result.is_err());
  assert_eq!(sink.frames.len(), 1);
  assert_eq!(sink.finished, 1);
}

#[test]
fn zero_frame_limit_processes_nothing() {
  let config = DetectionConfig::video();
  let calls = Arc::new(AtomicUsize::new(0));
  let detector = Detector::new(
    Counting(calls.clone()),
    DetectionFilter::new(config.confidence),
    Suppression::new(config.score_threshold, config.iou_threshold),
  );
  let mut sink = MemorySink::default();

  let report = ContinuousTask::new(Painter::new(RenderStyle::Shadow, labels()))
    .with_interrupt(false)
    .with_frame_number(Some(0))
    .run_task(
      FrameSequence::new(vec![RgbImage::from_pixel(8, 8, GRAY); 3]),
      detector,
      &mut sink,
    )
    .unwrap();

  assert_eq!(report.frames, 0);
  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert!(sink.frames.is_empty());
  assert_eq!(sink.finished, 1);
}

#[test]
fn every_readable_image_extension_can_be_written_back() {
  let dir = tempfile::tempdir().unwrap();
  let config = DetectionConfig::image();

  for ext in IMAGE_EXTENSIONS {
    let input_path = dir.path().join(format!("shot.{}", ext));
    RgbImage::from_pixel(4, 4, GRAY).save(&input_path).unwrap();

    let input = InputWrapper::open(&input_path).unwrap();
    let output_path = output_path_for(&input_path, &dir.path().join("output"), Container::Image);
    let output = OutputWrapper::create(&output_path, VIDEO_FPS)
      .unwrap_or_else(|e| panic!("{}: {}", ext, e));

    OneShotTask::new(kit_painter(&config))
      .run_task(input, detector(RawOutput::default(), &config), output)
      .unwrap();

    let saved = image::open(&output_path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (4, 4), "{}", ext);
  }
}
