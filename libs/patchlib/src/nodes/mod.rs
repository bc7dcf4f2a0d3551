// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Built-in node types.

pub mod inference;
pub mod math;
pub mod number;
pub mod render;
pub mod subgraph;
pub mod time;

pub use inference::{TextGeneratorNode, TextModel};
pub use math::MathNode;
pub use number::NumberNode;
pub use render::{BasicMaterialNode, BoxGeometryNode, CameraNode, MeshNode, RenderNode};
pub use subgraph::{IteratorInfoNode, IteratorNode, SubgraphNode};
pub use time::TimeNode;
