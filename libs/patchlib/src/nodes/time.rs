// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Frame clock source.

use crate::core::{
    DocumentContext, ExecutionMode, FrameContext, Node, NodeBehavior, NodeDescriptor,
    NodeRegistration, NodeType, Port, PortSet, PortSpec, Result, TimeMode, Value, ValueType,
};
use crate::register_node_type;

const TYPE_NAME: &str = "patch.time";

/// Emits the runtime clock every frame. Time-based, so it is dirty by
/// construction and keeps everything downstream animating.
pub struct TimeNode;

impl TimeNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            TYPE_NAME,
            "Time",
            "Emits elapsed time, frame delta, and frame number",
            NodeType::Utility,
            ExecutionMode::Provider,
            TimeMode::TimeBase,
        )
        .with_output(PortSpec::new("time", "Time", ValueType::Float))
        .with_output(PortSpec::new("delta", "Delta", ValueType::Float))
        .with_output(PortSpec::new("frame", "Frame", ValueType::Int));

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(_ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            TYPE_NAME,
            "Time",
            NodeType::Utility,
            ExecutionMode::Provider,
            TimeMode::TimeBase,
            vec![
                Port::outlet("time", "Time", ValueType::Float),
                Port::outlet("delta", "Delta", ValueType::Float),
                Port::outlet("frame", "Frame", ValueType::Int),
            ],
            vec![],
            Box::new(TimeNode),
        ))
    }
}

impl NodeBehavior for TimeNode {
    fn execute(&mut self, io: &mut PortSet<'_>, ctx: &mut FrameContext<'_>) -> Result<()> {
        io.send("time", Some(Value::Float(ctx.timing.time as f32)))?;
        io.send("delta", Some(Value::Float(ctx.timing.delta_time as f32)))?;
        io.send("frame", Some(Value::Int(ctx.timing.frame_number as i64)))
    }
}

register_node_type!(TimeNode);
