// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Binary arithmetic on floats.

use crate::core::{
    DocumentContext, ExecutionMode, FrameContext, Node, NodeBehavior, NodeDescriptor,
    NodeRegistration, NodeType, Parameter, ParameterSpec, PatchError, Port, PortSet, PortSpec,
    Result, TimeMode, Value, ValueType, Widget,
};
use crate::register_node_type;

const TYPE_NAME: &str = "patch.math";
const OPERATIONS: [&str; 4] = ["add", "subtract", "multiply", "divide"];

/// Applies the selected operation to its two inlets. Missing inputs
/// default to 0.0; division by zero clears the outlet.
pub struct MathNode;

impl MathNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            TYPE_NAME,
            "Math",
            "Adds, subtracts, multiplies, or divides two numbers",
            NodeType::Utility,
            ExecutionMode::Processor,
            TimeMode::None,
        )
        .with_input(PortSpec::new("a", "A", ValueType::Float))
        .with_input(PortSpec::new("b", "B", ValueType::Float))
        .with_output(PortSpec::new("out", "Output", ValueType::Float))
        .with_parameter(ParameterSpec {
            name: "operation".into(),
            label: "Operation".into(),
            value_type: ValueType::String,
            default: Value::String("add".into()),
            min: None,
            max: None,
            step: None,
            widget: Widget::Dropdown,
            options: OPERATIONS.iter().map(|s| s.to_string()).collect(),
        });

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(_ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            TYPE_NAME,
            "Math",
            NodeType::Utility,
            ExecutionMode::Processor,
            TimeMode::None,
            vec![
                Port::inlet("a", "A", ValueType::Float),
                Port::inlet("b", "B", ValueType::Float),
                Port::outlet("out", "Output", ValueType::Float),
            ],
            vec![
                Parameter::new("operation", "Operation", Value::String("add".into()))
                    .with_options(OPERATIONS.iter().map(|s| s.to_string()).collect()),
            ],
            Box::new(MathNode),
        ))
    }
}

impl NodeBehavior for MathNode {
    fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
        let a = io.float("a").unwrap_or(0.0);
        let b = io.float("b").unwrap_or(0.0);
        let operation = io
            .parameter_str("operation")
            .unwrap_or("add")
            .to_string();

        let result = match operation.as_str() {
            "add" => Some(a + b),
            "subtract" => Some(a - b),
            "multiply" => Some(a * b),
            "divide" => {
                if b == 0.0 {
                    None
                } else {
                    Some(a / b)
                }
            }
            other => {
                return Err(PatchError::Configuration(format!(
                    "unknown operation '{other}'"
                )));
            }
        };

        io.send("out", result.map(Value::Float))
    }
}

register_node_type!(MathNode);
