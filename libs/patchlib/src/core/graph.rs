// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Graph topology: nodes plus the connection edge list.
//!
//! Connections are owned here, never by ports. An inlet accepts at most
//! one connection; wiring an occupied inlet replaces the previous edge.
//! Cycles are rejected at connect time, so the execution order is
//! always a valid topological sort.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{PatchError, Result};
use super::node::{Node, NodeId};
use super::port::{PortKind, PortRef};

/// Stable identity of a connection, preserved across save/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Directed edge from an outlet to an inlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub from: PortRef,
    pub to: PortRef,
}

#[derive(Default)]
pub struct Graph {
    name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) connections: Vec<Connection>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Restore saved connection identities during decode and change
    /// replay.
    pub(crate) fn connections_mut(&mut self) -> &mut [Connection] {
        &mut self.connections
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    /// Append a node; declared order is the tie-break for execution
    /// order among nodes with no data dependency.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.push(node);
        id
    }

    /// Remove a node along with every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id() == id)
            .ok_or_else(|| PatchError::NotFound(format!("node {id}")))?;

        let doomed: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|c| c.from.node == id || c.to.node == id)
            .map(|c| c.id)
            .collect();
        for connection_id in doomed {
            // Only the far end of each edge still needs its inlet reset.
            self.disconnect(connection_id);
        }

        Ok(self.nodes.remove(index))
    }

    /// Wire an outlet to an inlet.
    ///
    /// Validates direction and value type, rejects any wiring that
    /// would close a cycle (including multi-hop), and replaces the
    /// inlet's existing connection if it has one. The outlet's current
    /// value is propagated into the inlet immediately so downstream
    /// state is correct before the next frame.
    pub fn connect(&mut self, from: PortRef, to: PortRef) -> Result<ConnectionId> {
        let from_type = {
            let node = self
                .node(from.node)
                .ok_or_else(|| PatchError::NotFound(format!("node {}", from.node)))?;
            let port = node
                .port(&from.port)
                .ok_or_else(|| PatchError::NotFound(format!("port {from}")))?;
            if port.kind() != PortKind::Outlet {
                return Err(PatchError::Port(format!("{from} is not an outlet")));
            }
            port.value_type()
        };

        {
            let node = self
                .node(to.node)
                .ok_or_else(|| PatchError::NotFound(format!("node {}", to.node)))?;
            let port = node
                .port(&to.port)
                .ok_or_else(|| PatchError::NotFound(format!("port {to}")))?;
            if port.kind() != PortKind::Inlet {
                return Err(PatchError::Port(format!("{to} is not an inlet")));
            }
            if port.value_type() != from_type {
                return Err(PatchError::TypeMismatch {
                    expected: port.value_type().to_string(),
                    actual: from_type.to_string(),
                });
            }
        }

        // Re-wiring an identical edge is a no-op.
        if let Some(existing) = self
            .connections
            .iter()
            .find(|c| c.from == from && c.to == to)
        {
            return Ok(existing.id);
        }

        if self.would_cycle(from.node, to.node) {
            return Err(PatchError::CycleDetected(format!(
                "connecting {from} to {to} would close a cycle"
            )));
        }

        if let Some(existing) = self.connections.iter().find(|c| c.to == to).map(|c| c.id) {
            self.disconnect(existing);
        }

        let connection = Connection {
            id: ConnectionId::new(),
            from: from.clone(),
            to: to.clone(),
        };
        let id = connection.id;
        self.connections.push(connection);

        let value = self
            .node(from.node)
            .and_then(|n| n.port(&from.port))
            .and_then(|p| p.value())
            .cloned();
        if let Some(port) = self.node_mut(to.node).and_then(|n| n.port_mut(&to.port)) {
            port.receive(value);
        }

        tracing::debug!(%from, %to, "connected ports");
        Ok(id)
    }

    /// Remove a connection, clearing the inlet and flagging it changed
    /// so the downstream node notices the loss next frame. Returns
    /// whether an edge was actually removed; disconnecting an edge that
    /// does not exist is a no-op reporting `false`.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let Some(index) = self.connections.iter().position(|c| c.id == id) else {
            return false;
        };
        let connection = self.connections.remove(index);

        if let Some(port) = self
            .node_mut(connection.to.node)
            .and_then(|n| n.port_mut(&connection.to.port))
        {
            port.receive(None);
        }

        tracing::debug!(from = %connection.from, to = %connection.to, "disconnected ports");
        true
    }

    /// Connection currently feeding the given inlet, if any.
    pub fn connection_into(&self, inlet: &PortRef) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.to == inlet)
    }

    fn would_cycle(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut dag: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for node in &self.nodes {
            dag.add_node(node.id());
        }
        for connection in &self.connections {
            dag.add_edge(connection.from.node, connection.to.node, ());
        }
        dag.add_edge(from, to, ());
        is_cyclic_directed(&dag)
    }

    /// Indices of `nodes` in execution order: a topological sort of the
    /// connection graph, ties broken by declared order. Disconnected
    /// nodes keep their declared position relative to each other.
    pub(crate) fn execution_order(&self) -> Vec<usize> {
        let index_of: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id(), i))
            .collect();

        let mut indegree = vec![0usize; self.nodes.len()];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for connection in &self.connections {
            let (Some(&from), Some(&to)) = (
                index_of.get(&connection.from.node),
                index_of.get(&connection.to.node),
            ) else {
                continue;
            };
            indegree[to] += 1;
            successors[from].push(to);
        }

        let mut ready: BinaryHeap<Reverse<usize>> = indegree
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for &next in &successors[index] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        // connect() rejects cycles, so every node is reachable.
        debug_assert_eq!(order.len(), self.nodes.len());
        order
    }

    /// True when any node, including nodes of nested graphs, must
    /// execute this frame.
    pub fn needs_execution(&self) -> bool {
        self.nodes.iter().any(|n| n.is_dirty())
    }

    /// Force every node to re-execute next frame, recursing into
    /// nested graphs.
    pub fn mark_dirty(&mut self) {
        for node in &mut self.nodes {
            node.invalidate();
            if let Some(inner) = node.inner_graph_mut() {
                inner.mark_dirty();
            }
        }
    }

    /// Clear every change flag in the graph, recursing into nested
    /// graphs. Called at the end of each frame.
    pub fn mark_clean(&mut self) {
        for node in &mut self.nodes {
            node.mark_clean();
        }
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}
