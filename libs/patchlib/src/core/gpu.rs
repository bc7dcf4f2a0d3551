// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Opaque GPU boundary.
//!
//! The engine never draws. It sequences nodes and shuttles values; the
//! actual rendering library sits behind [`SceneRenderer`] and the
//! handle types here. Nodes must not retain the per-frame
//! [`CommandBuffer`] or [`RenderPassDescriptor`] past the frame.

use std::sync::atomic::{AtomicU64, Ordering};

use super::error::Result;
use super::value::{ResourceHandle, TextureHandle};

/// Opaque handle to the GPU device owned by the host document.
///
/// Mints identity for GPU-backed resources. Not serializable; injected
/// out-of-band into document decode (see `DocumentContext`).
#[derive(Debug)]
pub struct GpuDevice {
    name: String,
    next_id: AtomicU64,
}

impl GpuDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mint a fresh resource handle (geometry, material, object, camera).
    pub fn make_resource(&self) -> ResourceHandle {
        ResourceHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            generation: 0,
        }
    }
}

/// Per-frame render pass description handed through the node chain.
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: String,
    /// Target texture, None when rendering to the host's drawable.
    pub target: Option<TextureHandle>,
    /// Target extent in pixels.
    pub extent: (u32, u32),
}

impl RenderPassDescriptor {
    pub fn new(label: impl Into<String>, extent: (u32, u32)) -> Self {
        Self {
            label: label.into(),
            target: None,
            extent,
        }
    }
}

/// Per-frame command buffer handle. Opaque to the engine; consumed by
/// the rendering library behind [`SceneRenderer`].
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    pub id: u64,
    pub label: String,
}

impl CommandBuffer {
    pub fn new(id: u64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// The external rendering library, reduced to its interface boundary:
/// takes a scene object and a camera, encodes draw work into the frame's
/// command buffer, and produces the color texture it rendered into.
pub trait SceneRenderer: Send {
    fn draw(
        &mut self,
        scene: ResourceHandle,
        camera: ResourceHandle,
        pass: &RenderPassDescriptor,
        command_buffer: &CommandBuffer,
    ) -> Result<TextureHandle>;

    fn resize(&mut self, _size: (f32, f32), _scale_factor: f32) {}
}
