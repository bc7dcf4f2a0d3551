// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Document persistence.
//!
//! A graph serializes to a [`GraphDocument`]: node identities, types,
//! parameter values, published ports, canvas offsets, and the edge
//! list, with nested documents for subgraphs. Runtime values and GPU
//! handles are never persisted. Decoding needs a [`DocumentContext`]
//! because node factories capture the host's GPU services; a document
//! that references an unknown node type, a duplicate node id, or a
//! dangling connection fails to load as a whole.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{PatchError, Result};
use super::gpu::{GpuDevice, SceneRenderer};
use super::graph::{ConnectionId, Graph};
use super::node::NodeId;
use super::port::PortRef;
use super::registry::NodeRegistry;
use super::resources::TexturePool;
use super::value::Value;

/// Shared host services injected into node construction and document
/// decode. Cheap to clone.
#[derive(Clone)]
pub struct DocumentContext {
    pub device: Arc<GpuDevice>,
    pub renderer: Arc<Mutex<dyn SceneRenderer>>,
    pub texture_pool: Arc<Mutex<TexturePool>>,
}

impl DocumentContext {
    pub fn new(
        device: Arc<GpuDevice>,
        renderer: Arc<Mutex<dyn SceneRenderer>>,
        texture_pool: Arc<Mutex<TexturePool>>,
    ) -> Self {
        Self {
            device,
            renderer,
            texture_pool,
        }
    }

    /// Context wired to a renderer that draws nothing, for tests and
    /// headless use.
    pub fn headless() -> Self {
        struct NullRenderer {
            pool: Arc<Mutex<TexturePool>>,
        }

        impl SceneRenderer for NullRenderer {
            fn draw(
                &mut self,
                _scene: super::value::ResourceHandle,
                _camera: super::value::ResourceHandle,
                pass: &super::gpu::RenderPassDescriptor,
                _command_buffer: &super::gpu::CommandBuffer,
            ) -> Result<super::value::TextureHandle> {
                Ok(self.pool.lock().acquire(pass.extent))
            }
        }

        let pool = Arc::new(Mutex::new(TexturePool::new()));
        Self {
            device: Arc::new(GpuDevice::new("headless")),
            renderer: Arc::new(Mutex::new(NullRenderer { pool: pool.clone() })),
            texture_pool: pool,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::headless()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    pub type_name: String,
    pub display_name: String,
    pub offset: (f32, f32),
    /// Edited parameter values by parameter name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    /// Names of this node's ports published to an enclosing graph.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub published_ports: Vec<String>,
    /// Nested graph for subgraph-like nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_graph: Option<GraphDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDocument {
    pub id: ConnectionId,
    pub from: PortRef,
    pub to: PortRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub name: String,
    pub nodes: Vec<NodeDocument>,
    pub connections: Vec<ConnectionDocument>,
}

impl GraphDocument {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PatchError::Document(format!("failed to encode document: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PatchError::Document(format!("failed to parse document: {e}")))
    }
}

/// Snapshot a graph into its document form.
pub fn encode(graph: &Graph) -> GraphDocument {
    let nodes = graph
        .nodes()
        .iter()
        .map(|node| NodeDocument {
            id: node.id(),
            type_name: node.type_name().to_string(),
            display_name: node.display_name().to_string(),
            offset: node.offset,
            parameters: node
                .parameters()
                .iter()
                .map(|p| (p.name().to_string(), p.value().clone()))
                .collect(),
            published_ports: node
                .ports()
                .iter()
                .filter(|p| p.is_published())
                .map(|p| p.name().to_string())
                .collect(),
            inner_graph: node.inner_graph().map(encode),
        })
        .collect();

    let connections = graph
        .connections()
        .iter()
        .map(|c| ConnectionDocument {
            id: c.id,
            from: c.from.clone(),
            to: c.to.clone(),
        })
        .collect();

    GraphDocument {
        name: graph.name().to_string(),
        nodes,
        connections,
    }
}

/// Rebuild a graph from its document form.
pub fn decode(
    document: &GraphDocument,
    ctx: &DocumentContext,
    registry: &NodeRegistry,
) -> Result<Graph> {
    let mut graph = Graph::new(document.name.clone());
    let mut seen: HashSet<NodeId> = HashSet::new();

    for node_doc in &document.nodes {
        if !seen.insert(node_doc.id) {
            return Err(PatchError::Document(format!(
                "duplicate node id {} in document '{}'",
                node_doc.id, document.name
            )));
        }

        let mut node = registry
            .instantiate(&node_doc.type_name, ctx)
            .map_err(|e| {
                PatchError::Document(format!(
                    "cannot instantiate node type '{}': {e}",
                    node_doc.type_name
                ))
            })?;
        node.set_id(node_doc.id);
        node.set_display_name(&node_doc.display_name);
        node.offset = node_doc.offset;

        for (name, value) in &node_doc.parameters {
            let parameter = node.parameter_mut(name).ok_or_else(|| {
                PatchError::Document(format!(
                    "node '{}' has no parameter '{name}'",
                    node_doc.type_name
                ))
            })?;
            parameter.set_value(value.clone())?;
        }

        if let Some(inner_doc) = &node_doc.inner_graph {
            let inner = decode(inner_doc, ctx, registry)?;
            node.behavior.set_inner_graph(inner)?;
            node.rebuild_published_ports()?;
        }

        for port_name in &node_doc.published_ports {
            let port = node.port_mut(port_name).ok_or_else(|| {
                PatchError::Document(format!(
                    "node '{}' has no port '{port_name}' to publish",
                    node_doc.type_name
                ))
            })?;
            port.set_published(true);
        }

        graph.add_node(node);
    }

    for connection_doc in &document.connections {
        graph
            .connect(connection_doc.from.clone(), connection_doc.to.clone())
            .map_err(|e| {
                PatchError::Document(format!(
                    "cannot restore connection {} -> {}: {e}",
                    connection_doc.from, connection_doc.to
                ))
            })?;
        // Keep the saved identity instead of the freshly minted one.
        if let Some(last) = graph.connections.last_mut() {
            last.id = connection_doc.id;
        }
    }

    debug!(
        name = %document.name,
        nodes = document.nodes.len(),
        connections = document.connections.len(),
        "decoded graph document"
    );
    Ok(graph)
}
