// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Pooled GPU texture slots.
//!
//! Render nodes acquire a target texture each frame and release it when
//! the downstream consumer is done with it. Slots are recycled by
//! extent; every acquisition bumps the slot's generation so stale
//! handles from earlier frames never compare equal to the fresh one.

use tracing::trace;

use super::value::TextureHandle;

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u64,
    extent: (u32, u32),
    in_use: bool,
}

#[derive(Debug, Default)]
pub struct TexturePool {
    slots: Vec<Slot>,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a texture of the requested extent, recycling a free
    /// slot when one matches and allocating otherwise.
    pub fn acquire(&mut self, extent: (u32, u32)) -> TextureHandle {
        if let Some((id, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| !s.in_use && s.extent == extent)
        {
            slot.in_use = true;
            slot.generation += 1;
            trace!(id, generation = slot.generation, "recycled texture slot");
            return TextureHandle {
                id: id as u64,
                generation: slot.generation,
            };
        }

        let id = self.slots.len() as u64;
        self.slots.push(Slot {
            generation: 0,
            extent,
            in_use: true,
        });
        trace!(id, ?extent, "allocated texture slot");
        TextureHandle { id, generation: 0 }
    }

    /// Return a texture to the pool. Idempotent: releasing twice, or
    /// releasing a stale-generation handle after the slot was recycled,
    /// is a no-op.
    pub fn release(&mut self, handle: TextureHandle) {
        let Some(slot) = self.slots.get_mut(handle.id as usize) else {
            return;
        };
        if slot.generation == handle.generation && slot.in_use {
            slot.in_use = false;
        }
    }

    /// Number of slots currently handed out.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    /// Total slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
