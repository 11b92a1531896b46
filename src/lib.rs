// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/lib.rs - 库主文件
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

//! Kitscan：基于 YOLOv3 的球员检测与球衣主色估计。
//!
//! 处理流程由若干纯函数阶段组成：
//!
//! 输入帧 → 推理适配器 → 检测过滤 → 非极大值抑制 → 球衣颜色分类 → 绘制 → 输出
//!
//! 推理、视频解码与编码由外部库负责（见 `darknet`、`gstreamer_input`、
//! `gstreamer_output` 特性），其余阶段不依赖任何原生库，可以独立测试。

pub mod args;
pub mod bbox;
pub mod color;
pub mod config;
pub mod filter;
pub mod frame;
pub mod input;
pub mod labels;
pub mod matcher;
pub mod model;
pub mod nms;
pub mod output;
pub mod task;
