// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Nested graphs: subgraphs and bounded iteration.
//!
//! A subgraph node owns an inner graph and mirrors its published ports
//! as proxies on the outer node. Values shuttle across the boundary at
//! execute time; the inner graph runs with the same frame context. The
//! iterator node additionally runs its inner graph N times per frame,
//! exposing the current index through the context for
//! [`IteratorInfoNode`] to pick up.

use crate::core::engine::run_pass;
use crate::core::{
    DocumentContext, ExecutionMode, FrameContext, Graph, IterationInfo, Node, NodeBehavior,
    NodeDescriptor, NodeRegistration, NodeType, Parameter, ParameterSpec, Port, PortKind, PortSet,
    PortSpec, Result, TimeMode, Value, ValueType, Widget,
};
use crate::register_node_type;

const SUBGRAPH_TYPE: &str = "patch.subgraph";
const ITERATOR_TYPE: &str = "patch.iterator";
const ITERATOR_INFO_TYPE: &str = "patch.iterator-info";

const DEFAULT_ITERATIONS: i64 = 2;

/// Names of published ports of the given kind, with their owning node,
/// in declared order.
fn published_ports(graph: &Graph, kind: PortKind) -> Vec<(crate::core::NodeId, String)> {
    graph
        .nodes()
        .iter()
        .flat_map(|node| {
            node.ports()
                .iter()
                .filter(move |p| p.kind() == kind && p.is_published())
                .map(move |p| (node.id(), p.name().to_string()))
        })
        .collect()
}

/// Copy outer proxy inlet values onto the published inner inlets.
/// With `force` every inlet is refreshed; otherwise only inlets whose
/// outer proxy changed this frame.
fn shuttle_inputs(io: &PortSet<'_>, graph: &mut Graph, force: bool) {
    for (node_id, port_name) in published_ports(graph, PortKind::Inlet) {
        if !force && !io.inlet_changed(&port_name) {
            continue;
        }
        let value = io.inlet_value(&port_name).cloned();
        if let Some(port) = graph.node_mut(node_id).and_then(|n| n.port_mut(&port_name)) {
            port.receive(value);
        }
    }
}

/// Copy changed published inner outlets out to the outer proxies.
/// Forced so downstream sees a change even when a pooled handle
/// compares equal across frames.
fn shuttle_outputs(io: &mut PortSet<'_>, graph: &Graph) -> Result<()> {
    for (node_id, port_name) in published_ports(graph, PortKind::Outlet) {
        let Some(port) = graph.node(node_id).and_then(|n| n.port(&port_name)) else {
            continue;
        };
        if port.value_did_change() {
            io.send_forced(&port_name, port.value().cloned())?;
        }
    }
    Ok(())
}

/// Encapsulates an inner graph behind its published ports.
pub struct SubgraphNode {
    graph: Graph,
}

impl SubgraphNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            SUBGRAPH_TYPE,
            "Subgraph",
            "Encapsulates a nested graph behind its published ports",
            NodeType::Subgraph,
            ExecutionMode::Processor,
            TimeMode::Idle,
        );

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(_ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            SUBGRAPH_TYPE,
            "Subgraph",
            NodeType::Subgraph,
            ExecutionMode::Processor,
            TimeMode::Idle,
            vec![],
            vec![],
            Box::new(SubgraphNode {
                graph: Graph::new("subgraph"),
            }),
        ))
    }
}

impl NodeBehavior for SubgraphNode {
    fn execute(&mut self, io: &mut PortSet<'_>, ctx: &mut FrameContext<'_>) -> Result<()> {
        shuttle_inputs(io, &mut self.graph, false);
        run_pass(&mut self.graph, ctx)?;
        shuttle_outputs(io, &self.graph)
    }

    fn inner_graph(&self) -> Option<&Graph> {
        Some(&self.graph)
    }

    fn inner_graph_mut(&mut self) -> Option<&mut Graph> {
        Some(&mut self.graph)
    }

    fn set_inner_graph(&mut self, graph: Graph) -> Result<()> {
        self.graph = graph;
        Ok(())
    }

    fn always_dirty(&self) -> bool {
        // The outer node must run whenever anything inside wants to.
        self.graph.nodes().iter().any(|n| n.is_dirty())
    }
}

register_node_type!(SubgraphNode);

/// Runs its inner graph a bounded number of times each frame.
///
/// Dirty every frame by design: the iteration count may be driven and
/// the inner section usually samples the iteration index.
pub struct IteratorNode {
    graph: Graph,
}

impl IteratorNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            ITERATOR_TYPE,
            "Iterator",
            "Runs its nested graph N times per frame",
            NodeType::Subgraph,
            ExecutionMode::Processor,
            TimeMode::Idle,
        )
        .with_input(PortSpec::new("iterations", "Iterations", ValueType::Int))
        .with_parameter(ParameterSpec {
            name: "iterations".into(),
            label: "Iterations".into(),
            value_type: ValueType::Int,
            default: Value::Int(DEFAULT_ITERATIONS),
            min: Some(0.0),
            max: Some(100.0),
            step: Some(1.0),
            widget: Widget::Slider,
            options: vec![],
        });

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(_ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            ITERATOR_TYPE,
            "Iterator",
            NodeType::Subgraph,
            ExecutionMode::Processor,
            TimeMode::Idle,
            vec![Port::inlet("iterations", "Iterations", ValueType::Int)],
            vec![
                Parameter::new("iterations", "Iterations", Value::Int(DEFAULT_ITERATIONS))
                    .with_range(0.0, 100.0)
                    .with_step(1.0)
                    .with_widget(Widget::Slider),
            ],
            Box::new(IteratorNode {
                graph: Graph::new("iterator"),
            }),
        ))
    }
}

impl NodeBehavior for IteratorNode {
    fn execute(&mut self, io: &mut PortSet<'_>, ctx: &mut FrameContext<'_>) -> Result<()> {
        let requested = io.int("iterations").unwrap_or(DEFAULT_ITERATIONS).max(0) as usize;
        let count = requested.min(ctx.max_iterations);

        if count == 0 {
            // Nothing ran; published outlets have no value this frame.
            for (_, port_name) in published_ports(&self.graph, PortKind::Outlet) {
                io.send(&port_name, None)?;
            }
            return Ok(());
        }

        let enclosing = ctx.iteration;
        for index in 0..count {
            ctx.iteration = Some(IterationInfo {
                iterator_node: io.node_id(),
                index,
                count,
            });
            shuttle_inputs(io, &mut self.graph, true);
            let result = run_pass(&mut self.graph, ctx);
            if result.is_err() {
                ctx.iteration = enclosing;
                return result;
            }
            if index + 1 < count {
                self.graph.mark_clean();
            }
        }
        ctx.iteration = enclosing;

        shuttle_outputs(io, &self.graph)
    }

    fn inner_graph(&self) -> Option<&Graph> {
        Some(&self.graph)
    }

    fn inner_graph_mut(&mut self) -> Option<&mut Graph> {
        Some(&mut self.graph)
    }

    fn set_inner_graph(&mut self, graph: Graph) -> Result<()> {
        self.graph = graph;
        Ok(())
    }

    fn always_dirty(&self) -> bool {
        true
    }
}

register_node_type!(IteratorNode);

/// Exposes the enclosing iterator's index, count, and progress. Outside
/// an iterator section it reports a single pseudo-iteration.
pub struct IteratorInfoNode;

impl IteratorInfoNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            ITERATOR_INFO_TYPE,
            "Iterator Info",
            "Reports the enclosing iterator's index, count, and progress",
            NodeType::Utility,
            ExecutionMode::Provider,
            TimeMode::Idle,
        )
        .with_output(PortSpec::new("index", "Index", ValueType::Int))
        .with_output(PortSpec::new("count", "Count", ValueType::Int))
        .with_output(PortSpec::new("progress", "Progress", ValueType::Float));

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(_ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            ITERATOR_INFO_TYPE,
            "Iterator Info",
            NodeType::Utility,
            ExecutionMode::Provider,
            TimeMode::Idle,
            vec![
                Port::outlet("index", "Index", ValueType::Int),
                Port::outlet("count", "Count", ValueType::Int),
                Port::outlet("progress", "Progress", ValueType::Float),
            ],
            vec![],
            Box::new(IteratorInfoNode),
        ))
    }
}

impl NodeBehavior for IteratorInfoNode {
    fn execute(&mut self, io: &mut PortSet<'_>, ctx: &mut FrameContext<'_>) -> Result<()> {
        let (index, count, progress) = match ctx.iteration {
            Some(info) => (info.index as i64, info.count as i64, info.progress()),
            None => (0, 1, 0.0),
        };
        io.send("index", Some(Value::Int(index)))?;
        io.send("count", Some(Value::Int(count)))?;
        io.send("progress", Some(Value::Float(progress)))
    }

    fn always_dirty(&self) -> bool {
        // Must re-emit for every iteration of an enclosing iterator.
        true
    }
}

register_node_type!(IteratorInfoNode);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::core::{
        CommandBuffer, EngineConfig, PatchRuntime, PortRef, RenderPassDescriptor,
    };

    /// Test sink that records every value arriving on its inlet.
    struct RecordingSink {
        seen: Arc<Mutex<Vec<Value>>>,
    }

    impl NodeBehavior for RecordingSink {
        fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
            if io.inlet_changed("in") {
                if let Some(value) = io.inlet_value("in") {
                    self.seen.lock().push(value.clone());
                }
            }
            Ok(())
        }
    }

    fn recording_sink(value_type: ValueType) -> (Node, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let node = Node::new(
            "test.recording-sink",
            "Recorder",
            NodeType::Utility,
            ExecutionMode::Consumer,
            TimeMode::None,
            vec![Port::inlet("in", "Input", value_type)],
            vec![],
            Box::new(RecordingSink { seen: seen.clone() }),
        );
        (node, seen)
    }

    fn ctx() -> DocumentContext {
        DocumentContext::headless()
    }

    fn frame(runtime: &mut PatchRuntime) {
        let pass = RenderPassDescriptor::new("test", (64, 64));
        let buffer = CommandBuffer::new(0, "test");
        runtime.execute_frame(&pass, &buffer).unwrap();
    }

    /// Test source that emits its `value` parameter.
    struct ConstSource;

    impl NodeBehavior for ConstSource {
        fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
            let value = io.parameter_value("value").cloned();
            io.send("out", value)
        }
    }

    fn const_source(value: f32) -> Node {
        Node::new(
            "test.const",
            "Const",
            NodeType::Parameter,
            ExecutionMode::Provider,
            TimeMode::None,
            vec![Port::outlet("out", "Output", ValueType::Float)],
            vec![Parameter::new("value", "Value", Value::Float(value))],
            Box::new(ConstSource),
        )
    }

    /// Test processor doubling its published inlet onto its published
    /// outlet.
    struct Doubler;

    impl NodeBehavior for Doubler {
        fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
            let value = io.float("x").map(|v| Value::Float(v * 2.0));
            io.send("y", value)
        }
    }

    fn published_doubler() -> Node {
        let mut node = Node::new(
            "test.doubler",
            "Doubler",
            NodeType::Utility,
            ExecutionMode::Processor,
            TimeMode::None,
            vec![
                Port::inlet("x", "X", ValueType::Float),
                Port::outlet("y", "Y", ValueType::Float),
            ],
            vec![],
            Box::new(Doubler),
        );
        node.port_mut("x").unwrap().set_published(true);
        node.port_mut("y").unwrap().set_published(true);
        node
    }

    #[test]
    fn test_subgraph_shuttles_published_ports() {
        let ctx = ctx();

        let mut inner = Graph::new("inner");
        inner.add_node(published_doubler());

        let mut subgraph = SubgraphNode::build(&ctx).unwrap();
        subgraph.set_inner_graph(inner).unwrap();
        assert!(subgraph.port("x").is_some());
        assert!(subgraph.port("y").is_some());

        let mut outer = Graph::new("outer");
        let source = outer.add_node(const_source(2.0));
        let sub = outer.add_node(subgraph);
        let (sink_node, seen) = recording_sink(ValueType::Float);
        let sink = outer.add_node(sink_node);
        outer
            .connect(PortRef::new(source, "out"), PortRef::new(sub, "x"))
            .unwrap();
        outer
            .connect(PortRef::new(sub, "y"), PortRef::new(sink, "in"))
            .unwrap();

        let mut runtime = PatchRuntime::new(outer, ctx, EngineConfig::default());
        runtime.start().unwrap();
        frame(&mut runtime);

        assert_eq!(*seen.lock(), vec![Value::Float(4.0)]);

        // Settled: a second frame adds nothing.
        frame(&mut runtime);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_duplicate_published_names_are_rejected() {
        let ctx = ctx();

        let mut inner = Graph::new("inner");
        inner.add_node(published_doubler());
        inner.add_node(published_doubler());

        let mut subgraph = SubgraphNode::build(&ctx).unwrap();
        assert!(subgraph.set_inner_graph(inner).is_err());
    }

    #[test]
    fn test_iterator_runs_inner_graph_count_times() {
        let ctx = ctx();

        let mut inner = Graph::new("inner");
        let info = inner.add_node(IteratorInfoNode::build(&ctx).unwrap());
        let (sink_node, seen) = recording_sink(ValueType::Int);
        let sink = inner.add_node(sink_node);
        inner
            .connect(PortRef::new(info, "index"), PortRef::new(sink, "in"))
            .unwrap();

        let mut iterator = IteratorNode::build(&ctx).unwrap();
        iterator.set_inner_graph(inner).unwrap();
        iterator
            .parameter_mut("iterations")
            .unwrap()
            .set_value(Value::Int(3))
            .unwrap();

        let mut outer = Graph::new("outer");
        outer.add_node(iterator);

        let mut runtime = PatchRuntime::new(outer, ctx, EngineConfig::default());
        runtime.start().unwrap();
        frame(&mut runtime);

        assert_eq!(
            *seen.lock(),
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn test_iterator_zero_count_skips_inner_graph() {
        let ctx = ctx();

        let mut inner = Graph::new("inner");
        let info = inner.add_node(IteratorInfoNode::build(&ctx).unwrap());
        let (sink_node, seen) = recording_sink(ValueType::Int);
        let sink = inner.add_node(sink_node);
        inner
            .connect(PortRef::new(info, "index"), PortRef::new(sink, "in"))
            .unwrap();

        let mut iterator = IteratorNode::build(&ctx).unwrap();
        iterator.set_inner_graph(inner).unwrap();
        iterator
            .parameter_mut("iterations")
            .unwrap()
            .set_value(Value::Int(0))
            .unwrap();

        let mut outer = Graph::new("outer");
        outer.add_node(iterator);

        let mut runtime = PatchRuntime::new(outer, ctx, EngineConfig::default());
        runtime.start().unwrap();
        frame(&mut runtime);

        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_iterator_count_is_clamped_by_config() {
        let ctx = ctx();

        let mut inner = Graph::new("inner");
        let info = inner.add_node(IteratorInfoNode::build(&ctx).unwrap());
        let (sink_node, seen) = recording_sink(ValueType::Int);
        let sink = inner.add_node(sink_node);
        inner
            .connect(PortRef::new(info, "index"), PortRef::new(sink, "in"))
            .unwrap();

        let mut iterator = IteratorNode::build(&ctx).unwrap();
        iterator.set_inner_graph(inner).unwrap();
        iterator
            .parameter_mut("iterations")
            .unwrap()
            .set_value(Value::Int(50))
            .unwrap();

        let mut outer = Graph::new("outer");
        outer.add_node(iterator);

        let mut runtime = PatchRuntime::new(
            outer,
            ctx,
            EngineConfig { max_iterations: 4 },
        );
        runtime.start().unwrap();
        frame(&mut runtime);

        assert_eq!(seen.lock().len(), 4);
    }

    #[test]
    fn test_iterator_info_outside_iteration_reports_single_pass() {
        let ctx = ctx();

        let mut graph = Graph::new("test");
        let info = graph.add_node(IteratorInfoNode::build(&ctx).unwrap());

        let mut runtime = PatchRuntime::new(graph, ctx, EngineConfig::default());
        runtime.start().unwrap();
        frame(&mut runtime);

        let node = runtime.graph().node(info).unwrap();
        assert_eq!(node.port("index").unwrap().value(), Some(&Value::Int(0)));
        assert_eq!(node.port("count").unwrap().value(), Some(&Value::Int(1)));
        assert_eq!(
            node.port("progress").unwrap().value(),
            Some(&Value::Float(0.0))
        );
    }
}
