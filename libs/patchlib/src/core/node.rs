// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Node instances and the behavior trait they delegate to.
//!
//! A [`Node`] is a plain struct owning its ports and parameters; the
//! per-type logic lives behind [`NodeBehavior`]. The graph drives
//! propagation and hands each behavior a [`PortSet`] view over the
//! node's own slots, so behaviors never touch other nodes directly.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::FrameContext;
use super::error::{PatchError, Result};
use super::graph::Graph;
use super::parameter::Parameter;
use super::port::{Port, PortKind};
use super::value::Value;

/// Stable identity of a node instance, preserved across save/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Broad category a node belongs to, used for palette grouping and
/// editor tinting. Carries no execution semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Geometry,
    Material,
    Object,
    Image,
    Parameter,
    Renderer,
    Subgraph,
    Utility,
}

/// Where a node sits in the dataflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Sources values without consuming any (no inlets drive it).
    Provider,
    /// Transforms inlet values into outlet values.
    Processor,
    /// Terminal: consumes values, produces side effects only.
    Consumer,
}

/// How a node relates to frame time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeMode {
    /// Pure function of its inputs.
    None,
    /// Holds internal state but does not consume the clock.
    Idle,
    /// Reads the frame clock; dirty every frame by construction.
    TimeBase,
}

/// Mutable view over one node's ports and parameters, handed to
/// [`NodeBehavior::execute`] for the duration of a frame.
pub struct PortSet<'a> {
    node: NodeId,
    ports: &'a mut Vec<Port>,
    parameters: &'a mut Vec<Parameter>,
}

impl<'a> PortSet<'a> {
    pub(crate) fn new(
        node: NodeId,
        ports: &'a mut Vec<Port>,
        parameters: &'a mut Vec<Parameter>,
    ) -> Self {
        Self {
            node,
            ports,
            parameters,
        }
    }

    /// Identity of the node being executed.
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn inlet_value(&self, name: &str) -> Option<&Value> {
        self.ports
            .iter()
            .find(|p| p.kind() == PortKind::Inlet && p.name() == name)
            .and_then(|p| p.value())
    }

    /// True when the named inlet received a different value this frame.
    pub fn inlet_changed(&self, name: &str) -> bool {
        self.ports
            .iter()
            .find(|p| p.kind() == PortKind::Inlet && p.name() == name)
            .is_some_and(|p| p.value_did_change())
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        self.inlet_value(name).and_then(Value::as_float)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.inlet_value(name).and_then(Value::as_int)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.inlet_value(name).and_then(Value::as_str)
    }

    /// Write a value to the named outlet.
    pub fn send(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        self.outlet_mut(name)?.send(value)
    }

    /// Write a value to the named outlet, marking it changed even when
    /// it compares equal to the previous value.
    pub fn send_forced(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        self.outlet_mut(name)?.send_forced(value)
    }

    fn outlet_mut(&mut self, name: &str) -> Result<&mut Port> {
        self.ports
            .iter_mut()
            .find(|p| p.kind() == PortKind::Outlet && p.name() == name)
            .ok_or_else(|| PatchError::Port(format!("no outlet named '{name}'")))
    }

    /// Clear every outlet as if the node had sent nothing. A previously
    /// set outlet raises its change flag, so downstream nodes see the
    /// loss this frame and withhold their own output in turn.
    pub(crate) fn clear_outlets(&mut self) {
        for port in self.ports.iter_mut() {
            if port.kind() == PortKind::Outlet {
                // Sending None never fails the type check.
                let _ = port.send(None);
            }
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    pub fn parameter_value(&self, name: &str) -> Option<&Value> {
        self.parameter(name).map(|p| p.value())
    }

    pub fn parameter_float(&self, name: &str) -> Option<f32> {
        self.parameter_value(name).and_then(Value::as_float)
    }

    pub fn parameter_int(&self, name: &str) -> Option<i64> {
        self.parameter_value(name).and_then(Value::as_int)
    }

    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameter_value(name).and_then(Value::as_str)
    }
}

/// Per-type logic plugged into a [`Node`].
///
/// `start` and `stop` bracket the runtime lifecycle; `execute` runs
/// once per frame (or once per iteration inside an iterator section).
pub trait NodeBehavior: Send {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, io: &mut PortSet<'_>, ctx: &mut FrameContext<'_>) -> Result<()>;

    fn resize(&mut self, _size: (f32, f32), _scale_factor: f32) {}

    /// Nested graph, for subgraph-like nodes.
    fn inner_graph(&self) -> Option<&Graph> {
        None
    }

    fn inner_graph_mut(&mut self) -> Option<&mut Graph> {
        None
    }

    fn set_inner_graph(&mut self, _graph: Graph) -> Result<()> {
        Err(PatchError::Graph(
            "node does not hold an inner graph".into(),
        ))
    }

    /// True for nodes that must execute every frame regardless of
    /// input changes (iterators, anything sampling external state).
    fn always_dirty(&self) -> bool {
        false
    }
}

/// A node instance in a graph.
pub struct Node {
    id: NodeId,
    type_name: String,
    display_name: String,
    node_type: NodeType,
    execution_mode: ExecutionMode,
    time_mode: TimeMode,
    /// Editor canvas position.
    pub offset: (f32, f32),
    pub selected: bool,
    invalidated: bool,
    pub(crate) ports: Vec<Port>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) behavior: Box<dyn NodeBehavior>,
}

impl Node {
    pub fn new(
        type_name: impl Into<String>,
        display_name: impl Into<String>,
        node_type: NodeType,
        execution_mode: ExecutionMode,
        time_mode: TimeMode,
        ports: Vec<Port>,
        parameters: Vec<Parameter>,
        behavior: Box<dyn NodeBehavior>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            type_name: type_name.into(),
            display_name: display_name.into(),
            node_type,
            execution_mode,
            time_mode,
            offset: (0.0, 0.0),
            selected: false,
            invalidated: false,
            ports,
            parameters,
            behavior,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Restore a saved identity during document decode.
    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = name.into();
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn time_mode(&self) -> TimeMode {
        self.time_mode
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    pub(crate) fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name() == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name() == name)
    }

    /// Publish or unpublish a port to an enclosing graph.
    pub fn set_port_published(&mut self, name: &str, published: bool) -> Result<()> {
        let port = self
            .port_mut(name)
            .ok_or_else(|| PatchError::NotFound(format!("port '{name}'")))?;
        port.set_published(published);
        Ok(())
    }

    pub fn inlets(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.kind() == PortKind::Inlet)
    }

    pub fn outlets(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter().filter(|p| p.kind() == PortKind::Outlet)
    }

    pub fn inner_graph(&self) -> Option<&Graph> {
        self.behavior.inner_graph()
    }

    pub fn inner_graph_mut(&mut self) -> Option<&mut Graph> {
        self.behavior.inner_graph_mut()
    }

    /// Install a nested graph on a subgraph-like node and mirror its
    /// published ports onto this node.
    pub fn set_inner_graph(&mut self, graph: Graph) -> Result<()> {
        self.behavior.set_inner_graph(graph)?;
        self.rebuild_published_ports()
    }

    /// Split borrow for the engine: the behavior executes against a
    /// view over this node's own ports and parameters.
    pub(crate) fn split_for_execute(&mut self) -> (PortSet<'_>, &mut dyn NodeBehavior) {
        (
            PortSet::new(self.id, &mut self.ports, &mut self.parameters),
            self.behavior.as_mut(),
        )
    }

    /// Force re-execution on the next frame even without input changes.
    /// This is how idle nodes get woken.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Whether this node must execute this frame.
    ///
    /// Time-based, always-dirty, and consumer nodes run unconditionally
    /// (a starved terminal node would freeze the presented image);
    /// everything else runs when any inlet or parameter changed since
    /// the last clean pass, or after an explicit invalidation.
    pub fn is_dirty(&self) -> bool {
        if self.invalidated
            || self.time_mode == TimeMode::TimeBase
            || self.execution_mode == ExecutionMode::Consumer
            || self.behavior.always_dirty()
        {
            return true;
        }
        self.ports
            .iter()
            .any(|p| p.kind() == PortKind::Inlet && p.value_did_change())
            || self.parameters.iter().any(|p| p.changed())
    }

    /// Clear all change flags on ports and parameters. Recurses into an
    /// inner graph when present.
    pub fn mark_clean(&mut self) {
        self.invalidated = false;
        for port in &mut self.ports {
            port.clear_changed();
        }
        for parameter in &mut self.parameters {
            parameter.clear_changed();
        }
        if let Some(inner) = self.behavior.inner_graph_mut() {
            inner.mark_clean();
        }
    }

    /// Rebuild the outer-facing proxy ports of a subgraph-like node
    /// from the published ports of its inner graph. Non-proxied ports
    /// are untouched. Published inner ports keep their name on the
    /// outer node, so names must be unique among published ports.
    pub fn rebuild_published_ports(&mut self) -> Result<()> {
        let Some(inner) = self.behavior.inner_graph() else {
            return Ok(());
        };

        let mut proxies: Vec<Port> = Vec::new();
        for inner_node in inner.nodes() {
            for port in inner_node.ports() {
                if !port.is_published() {
                    continue;
                }
                if proxies.iter().any(|p| p.name() == port.name()) {
                    return Err(PatchError::Port(format!(
                        "published port name '{}' is not unique within the subgraph",
                        port.name()
                    )));
                }
                let mut proxy = match port.kind() {
                    PortKind::Inlet => Port::inlet(port.name(), port.label(), port.value_type()),
                    PortKind::Outlet => Port::outlet(port.name(), port.label(), port.value_type()),
                };
                proxy.proxied = true;
                proxies.push(proxy);
            }
        }

        self.ports.retain(|p| !p.proxied);
        self.ports.extend(proxies);
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("display_name", &self.display_name)
            .field("ports", &self.ports.len())
            .finish()
    }
}
