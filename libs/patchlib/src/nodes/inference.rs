// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Text generation off the frame loop.
//!
//! Inference latency is unbounded, so the generator node never blocks
//! a frame: a prompt change cancels any in-flight generation and spawns
//! a fresh background task; each frame polls for the newest completion
//! and emits it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::{
    BackgroundTask, CancellationToken, DocumentContext, ExecutionMode, FrameContext, Node,
    NodeBehavior, NodeDescriptor, NodeRegistration, NodeType, Parameter, ParameterSpec, Port,
    PortSet, PortSpec, Result, TimeMode, Value, ValueType, Widget,
};
use crate::register_node_type;

const TYPE_NAME: &str = "patch.text-generator";

/// A text model the generator node can drive. Implementations should
/// poll the token between decoding steps and return early when
/// cancelled.
pub trait TextModel: Send + Sync {
    fn generate(&self, prompt: &str, token: &CancellationToken) -> Result<String>;
}

/// Fallback model used when the host supplies none: echoes the prompt.
/// Keeps documents loadable on machines without an inference backend.
struct EchoModel;

impl TextModel for EchoModel {
    fn generate(&self, prompt: &str, _token: &CancellationToken) -> Result<String> {
        Ok(prompt.to_string())
    }
}

pub struct TextGeneratorNode {
    model: Arc<dyn TextModel>,
    task: Option<BackgroundTask<Result<String>>>,
}

impl TextGeneratorNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            TYPE_NAME,
            "Text Generator",
            "Generates text from a prompt without blocking the frame loop",
            NodeType::Utility,
            ExecutionMode::Processor,
            TimeMode::Idle,
        )
        .with_input(PortSpec::new("prompt", "Prompt", ValueType::String))
        .with_output(PortSpec::new("text", "Text", ValueType::String))
        .with_output(PortSpec::new("status", "Status", ValueType::String))
        .with_parameter(ParameterSpec {
            name: "prompt".into(),
            label: "Prompt".into(),
            value_type: ValueType::String,
            default: Value::String(String::new()),
            min: None,
            max: None,
            step: None,
            widget: Widget::InputField,
            options: vec![],
        });

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(_ctx: &DocumentContext) -> Result<Node> {
        Ok(Self::node_with_model(Arc::new(EchoModel)))
    }

    /// Build the node against a host-provided model.
    pub fn node_with_model(model: Arc<dyn TextModel>) -> Node {
        Node::new(
            TYPE_NAME,
            "Text Generator",
            NodeType::Utility,
            ExecutionMode::Processor,
            TimeMode::Idle,
            vec![
                Port::inlet("prompt", "Prompt", ValueType::String),
                Port::outlet("text", "Text", ValueType::String),
                Port::outlet("status", "Status", ValueType::String),
            ],
            vec![Parameter::new(
                "prompt",
                "Prompt",
                Value::String(String::new()),
            )],
            Box::new(TextGeneratorNode { model, task: None }),
        )
    }

    fn begin_generation(&mut self, prompt: String) -> Result<()> {
        // Supersede any in-flight generation.
        if let Some(mut task) = self.task.take() {
            task.cancel();
        }

        let model = self.model.clone();
        debug!(prompt_len = prompt.len(), "starting text generation");
        self.task = Some(BackgroundTask::spawn("text-generation", move |token, out| {
            let result = model.generate(&prompt, &token);
            if !token.is_cancelled() {
                out.send(result).ok();
            }
        })?);
        Ok(())
    }
}

impl NodeBehavior for TextGeneratorNode {
    fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
        if io.inlet_changed("prompt") {
            match io.string("prompt").map(str::to_owned) {
                Some(prompt) if !prompt.is_empty() => {
                    self.begin_generation(prompt)?;
                    io.send("status", Some(Value::String("generating".into())))?;
                }
                _ => {
                    if let Some(mut task) = self.task.take() {
                        task.cancel();
                    }
                    io.send("text", None)?;
                    io.send("status", Some(Value::String("idle".into())))?;
                }
            }
        }

        let finished = self.task.as_ref().and_then(|task| task.latest());
        if let Some(result) = finished {
            self.task = None;
            match result {
                Ok(text) => {
                    io.send("text", Some(Value::String(text)))?;
                    io.send("status", Some(Value::String("ok".into())))?;
                }
                // Generation failures stay out of the frame loop: the
                // node withholds its text and reports through the
                // status outlet like any other value.
                Err(e) => {
                    warn!(error = %e, "text generation failed");
                    io.send("text", None)?;
                    io.send("status", Some(Value::String(format!("error: {e}"))))?;
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut task) = self.task.take() {
            task.cancel();
        }
        Ok(())
    }

    fn always_dirty(&self) -> bool {
        // Keep polling while a generation is in flight.
        self.task.is_some()
    }
}

register_node_type!(TextGeneratorNode);
