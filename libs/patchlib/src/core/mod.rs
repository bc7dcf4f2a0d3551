// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

pub mod context;
pub mod document;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod graph;
pub mod node;
pub mod observability;
pub mod parameter;
pub mod port;
pub mod registry;
pub mod resources;
pub mod tasks;
pub mod value;

pub use context::*;
pub use document::*;
pub use engine::*;
pub use error::*;
pub use gpu::*;
pub use graph::*;
pub use node::*;
pub use observability::*;
pub use parameter::*;
pub use port::*;
pub use registry::*;
pub use resources::*;
pub use tasks::*;
pub use value::*;
