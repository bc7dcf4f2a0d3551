// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Constant number source.

use crate::core::{
    DocumentContext, ExecutionMode, FrameContext, Node, NodeBehavior, NodeDescriptor,
    NodeRegistration, NodeType, Parameter, ParameterSpec, Port, PortSet, PortSpec, Result,
    TimeMode, Value, ValueType, Widget,
};
use crate::register_node_type;

const TYPE_NAME: &str = "patch.number";

/// Emits its edited value. The `value` inlet lets another node drive
/// the number, overriding the control.
pub struct NumberNode;

impl NumberNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            TYPE_NAME,
            "Number",
            "Emits a constant number, editable or driven through its inlet",
            NodeType::Parameter,
            ExecutionMode::Provider,
            TimeMode::None,
        )
        .with_input(PortSpec::new("value", "Value", ValueType::Float))
        .with_output(PortSpec::new("out", "Output", ValueType::Float))
        .with_parameter(ParameterSpec {
            name: "value".into(),
            label: "Value".into(),
            value_type: ValueType::Float,
            default: Value::Float(0.0),
            min: Some(0.0),
            max: Some(1.0),
            step: None,
            widget: Widget::Slider,
            options: vec![],
        });

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(_ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            TYPE_NAME,
            "Number",
            NodeType::Parameter,
            ExecutionMode::Provider,
            TimeMode::None,
            vec![
                Port::inlet("value", "Value", ValueType::Float),
                Port::outlet("out", "Output", ValueType::Float),
            ],
            vec![Parameter::new("value", "Value", Value::Float(0.0)).with_range(0.0, 1.0)],
            Box::new(NumberNode),
        ))
    }
}

impl NodeBehavior for NumberNode {
    fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
        let value = io.inlet_value("value").cloned();
        io.send("out", value)
    }
}

register_node_type!(NumberNode);
