// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Frame execution engine.
//!
//! Single-threaded per frame: nodes run in topological order of the
//! connection graph (declared order breaks ties), values propagate
//! from changed outlets into inlets just before each node runs, and
//! all change flags are cleared once the frame completes. A node whose
//! execute fails has its outlets cleared and the frame continues.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::context::{FrameContext, FrameTiming};
use super::document::DocumentContext;
use super::error::{PatchError, Result};
use super::gpu::{CommandBuffer, RenderPassDescriptor};
use super::graph::Graph;
use super::value::Value;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on iterator fan-out per frame.
    pub max_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_iterations: 100 }
    }
}

/// Lifecycle of a [`PatchRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Inactive,
    Starting,
    Active,
    Paused,
    Stopping,
}

/// Owns a graph and drives it frame by frame on the host's render
/// clock.
pub struct PatchRuntime {
    graph: Graph,
    ctx: DocumentContext,
    config: EngineConfig,
    state: RuntimeState,
    started_at: Option<Instant>,
    last_frame: Option<Instant>,
    /// Accumulated running time, excluding paused spans.
    elapsed: f64,
    frame_number: u64,
}

impl PatchRuntime {
    pub fn new(graph: Graph, ctx: DocumentContext, config: EngineConfig) -> Self {
        Self {
            graph,
            ctx,
            config,
            state: RuntimeState::Inactive,
            started_at: None,
            last_frame: None,
            elapsed: 0.0,
            frame_number: 0,
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn document_context(&self) -> &DocumentContext {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Bring every node behavior up and enter the active state.
    pub fn start(&mut self) -> Result<()> {
        if self.state != RuntimeState::Inactive {
            return Err(PatchError::Configuration(format!(
                "cannot start from state {:?}",
                self.state
            )));
        }
        self.state = RuntimeState::Starting;
        if let Err(e) = start_all(&mut self.graph) {
            self.state = RuntimeState::Inactive;
            return Err(e);
        }
        self.started_at = Some(Instant::now());
        self.last_frame = None;
        self.elapsed = 0.0;
        self.frame_number = 0;
        self.state = RuntimeState::Active;
        info!(graph = %self.graph.name(), "runtime started");
        Ok(())
    }

    /// Tear every node behavior down and return to inactive.
    pub fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, RuntimeState::Active | RuntimeState::Paused) {
            return Err(PatchError::Configuration(format!(
                "cannot stop from state {:?}",
                self.state
            )));
        }
        self.state = RuntimeState::Stopping;
        stop_all(&mut self.graph);
        self.started_at = None;
        self.last_frame = None;
        self.state = RuntimeState::Inactive;
        info!(graph = %self.graph.name(), "runtime stopped");
        Ok(())
    }

    /// Freeze the clock. Frames requested while paused are skipped.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != RuntimeState::Active {
            return Err(PatchError::Configuration(format!(
                "cannot pause from state {:?}",
                self.state
            )));
        }
        self.state = RuntimeState::Paused;
        self.last_frame = None;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.state != RuntimeState::Paused {
            return Err(PatchError::Configuration(format!(
                "cannot resume from state {:?}",
                self.state
            )));
        }
        self.state = RuntimeState::Active;
        Ok(())
    }

    /// Run one frame against the given render target. No-op while
    /// paused; an error while inactive.
    pub fn execute_frame(
        &mut self,
        render_pass: &RenderPassDescriptor,
        command_buffer: &CommandBuffer,
    ) -> Result<()> {
        match self.state {
            RuntimeState::Paused => return Ok(()),
            RuntimeState::Active => {}
            other => {
                return Err(PatchError::Configuration(format!(
                    "cannot execute a frame in state {other:?}"
                )));
            }
        }

        let now = Instant::now();
        let delta_time = self
            .last_frame
            .map(|prev| now.duration_since(prev).as_secs_f64())
            .unwrap_or(0.0);
        self.last_frame = Some(now);
        self.elapsed += delta_time;

        let timing = FrameTiming {
            time: self.elapsed,
            delta_time,
            system_time: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            frame_number: self.frame_number,
        };

        let mut ctx =
            FrameContext::new(timing, self.ctx.device.as_ref(), render_pass, command_buffer);
        ctx.max_iterations = self.config.max_iterations;
        run_pass(&mut self.graph, &mut ctx)?;
        self.graph.mark_clean();
        self.frame_number += 1;
        Ok(())
    }

    /// Add a node, bringing its behavior up first while the runtime is
    /// live so additions and removals trigger the same lifecycle hooks.
    pub fn add_node(&mut self, mut node: super::node::Node) -> Result<super::node::NodeId> {
        if matches!(self.state, RuntimeState::Active | RuntimeState::Paused) {
            node.behavior.start()?;
        }
        Ok(self.graph.add_node(node))
    }

    /// Remove a node, stopping its behavior first while the runtime is
    /// live so in-flight work is cancelled before the node drops.
    pub fn remove_node(&mut self, id: super::node::NodeId) -> Result<()> {
        if matches!(self.state, RuntimeState::Active | RuntimeState::Paused) {
            if let Some(node) = self.graph.node_mut(id) {
                if let Err(e) = node.behavior.stop() {
                    warn!(node = %node.type_name(), error = %e, "node stop failed");
                }
            }
        }
        self.graph.remove_node(id)?;
        Ok(())
    }

    /// Propagate a drawable size change to the renderer and every node.
    pub fn resize(&mut self, size: (f32, f32), scale_factor: f32) {
        self.ctx.renderer.lock().resize(size, scale_factor);
        resize_all(&mut self.graph, size, scale_factor);
        debug!(?size, scale_factor, "resized");
    }

    /// Detach the graph, stopping first if needed.
    pub fn into_graph(mut self) -> Graph {
        if matches!(self.state, RuntimeState::Active | RuntimeState::Paused) {
            let _ = self.stop();
        }
        self.graph
    }
}

fn start_all(graph: &mut Graph) -> Result<()> {
    for node in &mut graph.nodes {
        node.behavior.start()?;
        if let Some(inner) = node.behavior.inner_graph_mut() {
            start_all(inner)?;
        }
    }
    Ok(())
}

// Reverse of declared order so downstream consumers release before the
// producers they borrow from.
fn stop_all(graph: &mut Graph) {
    for node in graph.nodes.iter_mut().rev() {
        if let Some(inner) = node.behavior.inner_graph_mut() {
            stop_all(inner);
        }
        if let Err(e) = node.behavior.stop() {
            warn!(node = %node.type_name(), error = %e, "node stop failed");
        }
    }
}

fn resize_all(graph: &mut Graph, size: (f32, f32), scale_factor: f32) {
    for node in &mut graph.nodes {
        node.behavior.resize(size, scale_factor);
        if let Some(inner) = node.behavior.inner_graph_mut() {
            resize_all(inner, size, scale_factor);
        }
    }
}

/// Run one evaluation pass over a graph. Also the re-entry point for
/// nested graphs: subgraph and iterator behaviors call this against
/// their inner graph with the same frame context.
pub(crate) fn run_pass(graph: &mut Graph, ctx: &mut FrameContext<'_>) -> Result<()> {
    let order = graph.execution_order();

    for index in order {
        propagate_inbound(graph, index);
        refresh_parameter_inlets(graph, index);

        let node = &mut graph.nodes[index];
        if !node.is_dirty() {
            continue;
        }

        let type_name = node.type_name().to_string();
        let (mut io, behavior) = node.split_for_execute();
        if let Err(e) = behavior.execute(&mut io, ctx) {
            warn!(node = %type_name, error = %e, "node execute failed, clearing outlets");
            io.clear_outlets();
        }
    }

    Ok(())
}

/// Copy changed upstream outlet values into this node's inlets.
fn propagate_inbound(graph: &mut Graph, index: usize) {
    let node_id = graph.nodes[index].id();
    let inbound: Vec<(String, Option<Value>)> = graph
        .connections
        .iter()
        .filter(|c| c.to.node == node_id)
        .filter_map(|c| {
            let source = graph.node(c.from.node)?.port(&c.from.port)?;
            source
                .value_did_change()
                .then(|| (c.to.port.clone(), source.value().cloned()))
        })
        .collect();

    let node = &mut graph.nodes[index];
    for (port_name, value) in inbound {
        if let Some(port) = node.port_mut(&port_name) {
            port.receive(value);
        }
    }
}

/// Reconcile parameters with their same-named inlets: an unconnected
/// inlet tracks the edited control value; a connected inlet overrides
/// the control and writes back into it so the UI shows the live value.
fn refresh_parameter_inlets(graph: &mut Graph, index: usize) {
    let node_id = graph.nodes[index].id();
    let connected: Vec<String> = graph
        .connections
        .iter()
        .filter(|c| c.to.node == node_id)
        .map(|c| c.to.port.clone())
        .collect();

    let node = &mut graph.nodes[index];
    let parameters = &mut node.parameters;
    let ports = &mut node.ports;

    for parameter in parameters.iter_mut() {
        let Some(port) = ports.iter_mut().find(|p| {
            p.kind() == super::port::PortKind::Inlet && p.name() == parameter.name()
        }) else {
            continue;
        };

        if connected.iter().any(|name| name == port.name()) {
            if port.value_did_change() {
                if let Some(value) = port.value() {
                    parameter.sync_from_port(value.clone());
                }
            }
        } else if parameter.changed() {
            port.receive(Some(parameter.value().clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Result;
    use crate::core::node::{
        ExecutionMode, Node, NodeBehavior, NodeType, PortSet, TimeMode,
    };
    use crate::core::parameter::Parameter;
    use crate::core::port::{Port, PortRef};
    use crate::core::value::{Value, ValueType};

    struct Doubler;

    impl NodeBehavior for Doubler {
        fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
            let value = io.float("in").map(|v| Value::Float(v * 2.0));
            io.send("out", value)
        }
    }

    struct Source;

    impl NodeBehavior for Source {
        fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
            let value = io.parameter_value("value").cloned();
            io.send("out", value)
        }
    }

    struct Failing;

    impl NodeBehavior for Failing {
        fn execute(&mut self, _io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
            Err(PatchError::Graph("boom".into()))
        }
    }

    fn source_node(value: f32) -> Node {
        Node::new(
            "test.source",
            "Source",
            NodeType::Parameter,
            ExecutionMode::Provider,
            TimeMode::None,
            vec![
                Port::inlet("value", "Value", ValueType::Float),
                Port::outlet("out", "Output", ValueType::Float),
            ],
            vec![Parameter::new("value", "Value", Value::Float(value))],
            Box::new(Source),
        )
    }

    fn doubler_node() -> Node {
        Node::new(
            "test.doubler",
            "Doubler",
            NodeType::Utility,
            ExecutionMode::Processor,
            TimeMode::None,
            vec![
                Port::inlet("in", "Input", ValueType::Float),
                Port::outlet("out", "Output", ValueType::Float),
            ],
            vec![],
            Box::new(Doubler),
        )
    }

    fn runtime_with(graph: Graph) -> PatchRuntime {
        PatchRuntime::new(graph, DocumentContext::headless(), EngineConfig::default())
    }

    fn frame(runtime: &mut PatchRuntime) {
        let pass = RenderPassDescriptor::new("test", (64, 64));
        let buffer = CommandBuffer::new(0, "test");
        runtime.execute_frame(&pass, &buffer).unwrap();
    }

    #[test]
    fn test_state_machine_transitions() {
        let mut runtime = runtime_with(Graph::new("test"));
        assert_eq!(runtime.state(), RuntimeState::Inactive);
        assert!(runtime.stop().is_err());
        assert!(runtime.pause().is_err());

        runtime.start().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Active);
        assert!(runtime.start().is_err());

        runtime.pause().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Paused);
        runtime.resume().unwrap();
        runtime.stop().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Inactive);
    }

    #[test]
    fn test_execute_frame_requires_active_state() {
        let mut runtime = runtime_with(Graph::new("test"));
        let pass = RenderPassDescriptor::new("test", (64, 64));
        let buffer = CommandBuffer::new(0, "test");
        assert!(runtime.execute_frame(&pass, &buffer).is_err());

        runtime.start().unwrap();
        runtime.pause().unwrap();
        // Paused frames are skipped, not errors.
        assert!(runtime.execute_frame(&pass, &buffer).is_ok());
        assert_eq!(runtime.frame_number(), 0);
    }

    #[test]
    fn test_chain_propagates_and_settles() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(source_node(1.0));
        let b = graph.add_node(doubler_node());
        let c = graph.add_node(doubler_node());
        graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "in"))
            .unwrap();
        graph
            .connect(PortRef::new(b, "out"), PortRef::new(c, "in"))
            .unwrap();

        let mut runtime = runtime_with(graph);
        runtime.start().unwrap();
        frame(&mut runtime);

        let out = |rt: &PatchRuntime, id, port: &str| {
            rt.graph().node(id).unwrap().port(port).unwrap().value().cloned()
        };
        assert_eq!(out(&runtime, c, "out"), Some(Value::Float(4.0)));

        // Flags are clean after the frame; a second frame leaves every
        // node untouched (values persist, nothing re-executes).
        assert!(!runtime.graph().node(c).unwrap().is_dirty());
        frame(&mut runtime);
        assert_eq!(out(&runtime, c, "out"), Some(Value::Float(4.0)));

        // Editing the source parameter re-runs the chain next frame.
        runtime
            .graph_mut()
            .node_mut(a)
            .unwrap()
            .parameter_mut("value")
            .unwrap()
            .set_value(Value::Float(3.0))
            .unwrap();
        frame(&mut runtime);
        assert_eq!(out(&runtime, c, "out"), Some(Value::Float(12.0)));
    }

    #[test]
    fn test_failed_node_clears_outlets_and_frame_continues() {
        let mut graph = Graph::new("test");
        let ok = graph.add_node(source_node(5.0));
        let bad = graph.add_node(Node::new(
            "test.failing",
            "Failing",
            NodeType::Utility,
            ExecutionMode::Provider,
            TimeMode::TimeBase,
            vec![Port::outlet("out", "Output", ValueType::Float)],
            vec![],
            Box::new(Failing),
        ));

        let mut runtime = runtime_with(graph);
        runtime.start().unwrap();
        frame(&mut runtime);

        let node = |id| runtime.graph().node(id).unwrap();
        assert_eq!(
            node(ok).port("out").unwrap().value(),
            Some(&Value::Float(5.0))
        );
        assert!(node(bad).port("out").unwrap().value().is_none());
    }

    #[test]
    fn test_upstream_failure_starves_downstream() {
        struct FailsAfter {
            frames_left: u32,
        }

        impl NodeBehavior for FailsAfter {
            fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
                if self.frames_left == 0 {
                    return Err(PatchError::Graph("source went away".into()));
                }
                self.frames_left -= 1;
                io.send("out", Some(Value::Float(5.0)))
            }
        }

        let mut graph = Graph::new("test");
        let flaky = graph.add_node(Node::new(
            "test.flaky",
            "Flaky",
            NodeType::Utility,
            ExecutionMode::Provider,
            TimeMode::TimeBase,
            vec![Port::outlet("out", "Output", ValueType::Float)],
            vec![],
            Box::new(FailsAfter { frames_left: 1 }),
        ));
        let doubler = graph.add_node(doubler_node());
        graph
            .connect(PortRef::new(flaky, "out"), PortRef::new(doubler, "in"))
            .unwrap();

        let mut runtime = runtime_with(graph);
        runtime.start().unwrap();
        frame(&mut runtime);

        let port = |rt: &PatchRuntime, id, name: &str| {
            rt.graph().node(id).unwrap().port(name).unwrap().value().cloned()
        };
        assert_eq!(port(&runtime, doubler, "out"), Some(Value::Float(10.0)));

        // The source fails on the second frame. Its cleared outlet must
        // propagate as an absent input, so the downstream node withholds
        // its own output instead of repeating the stale value.
        frame(&mut runtime);
        assert_eq!(port(&runtime, flaky, "out"), None);
        assert_eq!(port(&runtime, doubler, "in"), None);
        assert_eq!(port(&runtime, doubler, "out"), None);
    }

    #[test]
    fn test_add_node_while_active_starts_behavior() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        struct Flagged {
            started: Arc<AtomicBool>,
        }

        impl NodeBehavior for Flagged {
            fn start(&mut self) -> Result<()> {
                self.started.store(true, Ordering::SeqCst);
                Ok(())
            }

            fn execute(
                &mut self,
                _io: &mut PortSet<'_>,
                _ctx: &mut FrameContext<'_>,
            ) -> Result<()> {
                Ok(())
            }
        }

        let flagged_node = |started: &Arc<AtomicBool>| {
            Node::new(
                "test.flagged",
                "Flagged",
                NodeType::Utility,
                ExecutionMode::Provider,
                TimeMode::None,
                vec![],
                vec![],
                Box::new(Flagged {
                    started: started.clone(),
                }),
            )
        };

        // Inactive: the hook waits for runtime start.
        let started = Arc::new(AtomicBool::new(false));
        let mut runtime = runtime_with(Graph::new("test"));
        runtime.add_node(flagged_node(&started)).unwrap();
        assert!(!started.load(Ordering::SeqCst));

        // Live: the hook fires immediately.
        let started_live = Arc::new(AtomicBool::new(false));
        runtime.start().unwrap();
        runtime.add_node(flagged_node(&started_live)).unwrap();
        assert!(started_live.load(Ordering::SeqCst));
    }

    #[test]
    fn test_resize_reaches_node_behaviors() {
        use std::sync::Arc;

        use parking_lot::Mutex;

        struct Resizable {
            seen: Arc<Mutex<Option<((f32, f32), f32)>>>,
        }

        impl NodeBehavior for Resizable {
            fn execute(
                &mut self,
                _io: &mut PortSet<'_>,
                _ctx: &mut FrameContext<'_>,
            ) -> Result<()> {
                Ok(())
            }

            fn resize(&mut self, size: (f32, f32), scale_factor: f32) {
                *self.seen.lock() = Some((size, scale_factor));
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let mut graph = Graph::new("test");
        graph.add_node(Node::new(
            "test.resizable",
            "Resizable",
            NodeType::Utility,
            ExecutionMode::Provider,
            TimeMode::None,
            vec![],
            vec![],
            Box::new(Resizable { seen: seen.clone() }),
        ));

        let mut runtime = runtime_with(graph);
        runtime.resize((1920.0, 1080.0), 2.0);
        assert_eq!(*seen.lock(), Some(((1920.0, 1080.0), 2.0)));
    }

    #[test]
    fn test_disconnect_between_frames_is_seen_next_frame() {
        let mut graph = Graph::new("test");
        let a = graph.add_node(source_node(1.0));
        let b = graph.add_node(doubler_node());
        let id = graph
            .connect(PortRef::new(a, "out"), PortRef::new(b, "in"))
            .unwrap();

        let mut runtime = runtime_with(graph);
        runtime.start().unwrap();
        frame(&mut runtime);

        assert!(runtime.graph_mut().disconnect(id));
        frame(&mut runtime);

        let inlet = runtime.graph().node(b).unwrap().port("in").unwrap();
        assert!(inlet.value().is_none());
        assert_eq!(
            runtime.graph().node(b).unwrap().port("out").unwrap().value(),
            None
        );
    }
}
