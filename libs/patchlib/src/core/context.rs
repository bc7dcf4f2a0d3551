// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Per-frame execution context.

use super::gpu::{CommandBuffer, GpuDevice, RenderPassDescriptor};
use super::node::NodeId;

/// Timing for one frame, constructed once per execute call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Relative time since execution started, in seconds.
    pub time: f64,
    /// Difference between consecutive execute calls, in seconds.
    pub delta_time: f64,
    /// System absolute time when the frame was requested, in seconds
    /// since the Unix epoch.
    pub system_time: f64,
    /// The frame number being requested.
    pub frame_number: u64,
}

/// Populated only while a bounded-iteration subgraph section is being
/// evaluated; nodes inside the section read it from the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationInfo {
    /// The iterator node responsible for this info, should there be
    /// more than one.
    pub iterator_node: NodeId,
    /// Current iteration index, `0..count`.
    pub index: usize,
    /// Total number of iterations expected this frame.
    pub count: usize,
}

impl IterationInfo {
    /// Normalized progress in `[0, 1]`. With `count` iterations the
    /// final index maps to 1.0; a single iteration reports 0.0.
    pub fn progress(&self) -> f32 {
        if self.count <= 1 {
            0.0
        } else {
            self.index as f32 / (self.count - 1) as f32
        }
    }
}

/// Everything a node may read while executing one frame. Borrowed for
/// the duration of the frame; nodes must not retain the GPU handles
/// past it.
pub struct FrameContext<'a> {
    pub timing: FrameTiming,
    pub device: &'a GpuDevice,
    pub render_pass: &'a RenderPassDescriptor,
    pub command_buffer: &'a CommandBuffer,
    /// Set while inside an iterator node's nested execution.
    pub iteration: Option<IterationInfo>,
    /// Upper bound on iterator fan-out per frame.
    pub max_iterations: usize,
}

impl<'a> FrameContext<'a> {
    pub fn new(
        timing: FrameTiming,
        device: &'a GpuDevice,
        render_pass: &'a RenderPassDescriptor,
        command_buffer: &'a CommandBuffer,
    ) -> Self {
        Self {
            timing,
            device,
            render_pass,
            command_buffer,
            iteration: None,
            max_iterations: 100,
        }
    }
}
