// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! End-to-end tests across the engine, document layer, registry, and
//! built-in node library.

use patchlib::core::document;
use patchlib::nodes::{IteratorNode, MathNode, NumberNode, TimeNode};
use patchlib::{
    CommandBuffer, DocumentContext, EngineConfig, Graph, GraphDocument, NodeRegistry, PatchRuntime,
    PortRef, RenderPassDescriptor, Value,
};

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(NumberNode::registration()).unwrap();
    registry.register(MathNode::registration()).unwrap();
    registry.register(TimeNode::registration()).unwrap();
    registry.register(IteratorNode::registration()).unwrap();
    registry
}

fn frame(runtime: &mut PatchRuntime) {
    let pass = RenderPassDescriptor::new("test", (64, 64));
    let buffer = CommandBuffer::new(0, "test");
    runtime.execute_frame(&pass, &buffer).unwrap();
}

/// Two numbers through a math node, edited live between frames.
#[test]
fn test_arithmetic_patch_follows_edits() {
    let ctx = DocumentContext::headless();
    let registry = registry();

    let mut graph = Graph::new("arithmetic");
    let a = graph.add_node(registry.instantiate("patch.number", &ctx).unwrap());
    let b = graph.add_node(registry.instantiate("patch.number", &ctx).unwrap());
    let math = graph.add_node(registry.instantiate("patch.math", &ctx).unwrap());
    graph
        .connect(PortRef::new(a, "out"), PortRef::new(math, "a"))
        .unwrap();
    graph
        .connect(PortRef::new(b, "out"), PortRef::new(math, "b"))
        .unwrap();

    for (node, value) in [(a, 0.25), (b, 0.5)] {
        graph
            .node_mut(node)
            .unwrap()
            .parameter_mut("value")
            .unwrap()
            .set_value(Value::Float(value))
            .unwrap();
    }

    let mut runtime = PatchRuntime::new(graph, ctx, EngineConfig::default());
    runtime.start().unwrap();
    frame(&mut runtime);

    let result = |rt: &PatchRuntime| {
        rt.graph()
            .node(math)
            .unwrap()
            .port("out")
            .unwrap()
            .value()
            .cloned()
    };
    assert_eq!(result(&runtime), Some(Value::Float(0.75)));

    // Switch the operation; only the math node re-runs.
    runtime
        .graph_mut()
        .node_mut(math)
        .unwrap()
        .parameter_mut("operation")
        .unwrap()
        .set_value(Value::String("multiply".into()))
        .unwrap();
    frame(&mut runtime);
    assert_eq!(result(&runtime), Some(Value::Float(0.125)));

    runtime.stop().unwrap();
}

/// Save, reload, and run: the rebuilt graph behaves like the original.
#[test]
fn test_document_round_trip_preserves_behavior() {
    let ctx = DocumentContext::headless();
    let registry = registry();

    let mut graph = Graph::new("saved");
    let a = graph.add_node(registry.instantiate("patch.number", &ctx).unwrap());
    let math = graph.add_node(registry.instantiate("patch.math", &ctx).unwrap());
    graph
        .connect(PortRef::new(a, "out"), PortRef::new(math, "a"))
        .unwrap();
    graph
        .node_mut(a)
        .unwrap()
        .parameter_mut("value")
        .unwrap()
        .set_value(Value::Float(0.5))
        .unwrap();
    graph.node_mut(math).unwrap().offset = (120.0, 40.0);

    let json = document::encode(&graph).to_json().unwrap();
    let reloaded = document::decode(&GraphDocument::from_json(&json).unwrap(), &ctx, &registry)
        .unwrap();

    assert_eq!(reloaded.name(), "saved");
    assert_eq!(reloaded.nodes().len(), 2);
    assert_eq!(reloaded.connections().len(), 1);
    assert_eq!(
        reloaded.connections()[0].id,
        graph.connections()[0].id
    );
    let restored_math = reloaded.node(math).unwrap();
    assert_eq!(restored_math.offset, (120.0, 40.0));

    let mut runtime = PatchRuntime::new(reloaded, ctx, EngineConfig::default());
    runtime.start().unwrap();
    frame(&mut runtime);
    assert_eq!(
        runtime
            .graph()
            .node(math)
            .unwrap()
            .port("out")
            .unwrap()
            .value(),
        Some(&Value::Float(0.5))
    );
}

/// A document naming an unregistered type fails to load as a whole.
#[test]
fn test_document_with_unknown_type_fails_to_load() {
    let ctx = DocumentContext::headless();
    let registry = registry();

    let mut graph = Graph::new("doomed");
    graph.add_node(registry.instantiate("patch.number", &ctx).unwrap());
    let mut doc = document::encode(&graph);
    doc.nodes[0].type_name = "patch.removed".into();

    assert!(document::decode(&doc, &ctx, &registry).is_err());
}

/// Iterator subgraphs survive persistence, published ports included.
#[test]
fn test_nested_document_round_trip() {
    let ctx = DocumentContext::headless();
    let registry = registry();

    let mut inner = Graph::new("inner");
    let number = inner.add_node(registry.instantiate("patch.number", &ctx).unwrap());
    inner
        .node_mut(number)
        .unwrap()
        .set_port_published("out", true)
        .unwrap();

    let mut iterator = registry.instantiate("patch.iterator", &ctx).unwrap();
    iterator.set_inner_graph(inner).unwrap();

    let mut outer = Graph::new("outer");
    let it = outer.add_node(iterator);

    let doc = document::encode(&outer);
    let reloaded = document::decode(&doc, &ctx, &registry).unwrap();

    let node = reloaded.node(it).unwrap();
    assert!(node.inner_graph().is_some());
    assert!(node.port("out").is_some(), "published proxy port restored");
    assert_eq!(node.inner_graph().unwrap().nodes().len(), 1);
}

/// The global registry picks up the built-in types.
#[test]
fn test_global_registry_contains_builtins() {
    let registry = patchlib::global_registry();
    let registry = registry.lock();

    for type_name in [
        "patch.number",
        "patch.math",
        "patch.time",
        "patch.subgraph",
        "patch.iterator",
        "patch.iterator-info",
        "patch.box-geometry",
        "patch.basic-material",
        "patch.mesh",
        "patch.camera",
        "patch.render",
        "patch.text-generator",
    ] {
        assert!(registry.contains(type_name), "missing {type_name}");
    }
}
