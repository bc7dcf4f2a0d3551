// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Patchlib: a node-graph execution engine for real-time rendering.
//!
//! A graph of typed nodes runs once per frame on the host's render
//! clock. Values propagate through typed ports only when they change;
//! nodes execute only when dirty. Subgraphs nest, iterators fan a
//! nested section out N times per frame, and the whole graph
//! serializes to a JSON document. A remote bridge exposes the palette
//! and live graph editing to external tools.

#![allow(clippy::type_complexity)]

// Re-exported for macro-generated registration code.
pub use inventory;

pub mod core;
pub mod nodes;
pub mod remote;

pub use core::{
    BackgroundTask, CancellationToken, CommandBuffer, Connection, ConnectionId, DocumentContext,
    EngineConfig, ExecutionMode, FrameContext, FrameTiming, GpuDevice, Graph, GraphDocument,
    IterationInfo, Node, NodeBehavior, NodeDescriptor, NodeId, NodeRegistration, NodeRegistry,
    NodeType, Parameter, ParameterSpec, PatchError, PatchRuntime, Port, PortKind, PortRef,
    PortSet, PortSpec, RegistrationProvider, RenderPassDescriptor, ResourceHandle, Result,
    RuntimeState, SceneRenderer, TextureHandle, TexturePool, TimeMode, Value, ValueType, Widget,
    global_registry,
};
