// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Remote graph editing surface.
//!
//! A transport-agnostic request/response protocol over JSON, intended
//! for agent and tool integrations: enumerate the palette, inspect and
//! edit the live graph, and poll incremental changes by revision. The
//! bridge owns no transport; hosts pump [`RemoteBridge::handle_json`]
//! from whatever channel they expose.

pub mod bridge;
pub mod protocol;

pub use bridge::RemoteBridge;
pub use protocol::{GraphChange, Request, Response};
