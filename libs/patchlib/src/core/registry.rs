// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Node type registry and introspection descriptors.
//!
//! Node types self-register through `inventory` via the
//! [`register_node_type!`](crate::register_node_type) macro; the global
//! registry collects them lazily on first access. Hosts that want an
//! isolated palette can build a [`NodeRegistry`] by hand instead.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::document::DocumentContext;
use super::error::{PatchError, Result};
use super::node::{ExecutionMode, Node, NodeType, TimeMode};
use super::parameter::Widget;
use super::value::{Value, ValueType};

/// Describes one input or output port of a node type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub label: String,
    pub value_type: ValueType,
}

impl PortSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            value_type,
        }
    }
}

/// Describes one parameter of a node type, including its UI hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub label: String,
    pub value_type: ValueType,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f32>,
    pub widget: Widget,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Introspectable description of a node type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Unique reverse-domain type name, e.g. `patch.math`.
    pub type_name: String,
    /// Human-facing palette label.
    pub label: String,
    pub description: String,
    pub node_type: NodeType,
    pub execution_mode: ExecutionMode,
    pub time_mode: TimeMode,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub parameters: Vec<ParameterSpec>,
}

impl NodeDescriptor {
    pub fn new(
        type_name: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        node_type: NodeType,
        execution_mode: ExecutionMode,
        time_mode: TimeMode,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            label: label.into(),
            description: description.into(),
            node_type,
            execution_mode,
            time_mode,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_input(mut self, spec: PortSpec) -> Self {
        self.inputs.push(spec);
        self
    }

    pub fn with_output(mut self, spec: PortSpec) -> Self {
        self.outputs.push(spec);
        self
    }

    pub fn with_parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }
}

/// Builds a node instance from the host document's shared services.
pub type NodeFactory = fn(&DocumentContext) -> Result<Node>;

#[derive(Clone)]
pub struct NodeRegistration {
    pub descriptor: NodeDescriptor,
    pub factory: NodeFactory,
}

impl NodeRegistration {
    pub fn new(descriptor: NodeDescriptor, factory: NodeFactory) -> Self {
        Self { descriptor, factory }
    }
}

pub trait RegistrationProvider: Sync {
    fn registration(&self) -> NodeRegistration;
}

inventory::collect!(&'static dyn RegistrationProvider);

/// Register a node type for discovery through the global registry. The
/// type must provide an inherent `fn registration() -> NodeRegistration`.
#[macro_export]
macro_rules! register_node_type {
    ($node_type:ty) => {
        const _: () = {
            struct __RegistrationProvider;

            impl $crate::RegistrationProvider for __RegistrationProvider {
                fn registration(&self) -> $crate::NodeRegistration {
                    <$node_type>::registration()
                }
            }

            inventory::submit! {
                &__RegistrationProvider as &dyn $crate::RegistrationProvider
            }
        };
    };
}

pub struct NodeRegistry {
    types: HashMap<String, NodeRegistration>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    pub fn register(&mut self, registration: NodeRegistration) -> Result<()> {
        let name = registration.descriptor.type_name.clone();
        if self.types.contains_key(&name) {
            return Err(PatchError::Configuration(format!(
                "node type '{}' is already registered",
                name
            )));
        }
        self.types.insert(name, registration);
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Option<&NodeRegistration> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// All descriptors, sorted by type name for stable listings.
    pub fn list(&self) -> Vec<NodeDescriptor> {
        let mut descriptors: Vec<NodeDescriptor> = self
            .types
            .values()
            .map(|reg| reg.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        descriptors
    }

    pub fn list_by_category(&self, node_type: NodeType) -> Vec<NodeDescriptor> {
        self.list()
            .into_iter()
            .filter(|d| d.node_type == node_type)
            .collect()
    }

    /// Instantiate a node of the named type.
    pub fn instantiate(&self, type_name: &str, ctx: &DocumentContext) -> Result<Node> {
        let registration = self
            .types
            .get(type_name)
            .ok_or_else(|| PatchError::NotFound(format!("node type '{type_name}'")))?;
        (registration.factory)(ctx)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<Mutex<NodeRegistry>>> = OnceLock::new();

pub fn global_registry() -> Arc<Mutex<NodeRegistry>> {
    GLOBAL_REGISTRY
        .get_or_init(|| {
            let mut registry = NodeRegistry::new();

            for provider in inventory::iter::<&dyn RegistrationProvider> {
                let registration = provider.registration();
                let name = registration.descriptor.type_name.clone();

                if let Err(e) = registry.register(registration) {
                    tracing::warn!("failed to auto-register node type '{}': {}", name, e);
                }
            }

            tracing::info!("auto-registered {} node types", registry.len());
            Arc::new(Mutex::new(registry))
        })
        .clone()
}

pub fn list_node_types() -> Vec<NodeDescriptor> {
    global_registry().lock().list()
}

pub fn is_node_type_registered(type_name: &str) -> bool {
    global_registry().lock().contains(type_name)
}
