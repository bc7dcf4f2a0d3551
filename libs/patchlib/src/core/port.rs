// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Typed, named, directional value slots on a node.
//!
//! Ports hold the current value and a per-frame change flag. The
//! connection topology lives on the [`Graph`](super::graph::Graph) as
//! an edge index; ports themselves never reference other nodes.

use serde::{Deserialize, Serialize};

use super::error::{PatchError, Result};
use super::node::NodeId;
use super::value::{Value, ValueType};

/// Direction of a port. Inlets accept values, outlets publish them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    Inlet,
    Outlet,
}

/// Reference to a port on a specific node, stable across save/load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub port: String,
}

impl PortRef {
    pub fn new(node: NodeId, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    label: String,
    kind: PortKind,
    value_type: ValueType,
    value: Option<Value>,
    changed: bool,
    published: bool,
    /// True for ports mirrored from a subgraph's published inner ports.
    pub(crate) proxied: bool,
}

impl Port {
    pub fn inlet(name: impl Into<String>, label: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, label, PortKind::Inlet, value_type)
    }

    pub fn outlet(
        name: impl Into<String>,
        label: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self::new(name, label, PortKind::Outlet, value_type)
    }

    fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        kind: PortKind,
        value_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            value_type,
            value: None,
            changed: false,
            published: false,
            proxied: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// True iff the value was set to something different this frame, or
    /// a send/propagation was forced.
    pub fn value_did_change(&self) -> bool {
        self.changed
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn set_published(&mut self, published: bool) {
        self.published = published;
    }

    /// Set the current value, marking the change flag when the new
    /// value differs under the port's equality rule. Sending `None`
    /// clears the value and marks changed if it was previously set.
    pub fn send(&mut self, value: Option<Value>) -> Result<()> {
        self.send_internal(value, false)
    }

    /// Like [`send`](Port::send) but marks the change flag even when
    /// the value compares equal. Producer nodes reusing a texture pool
    /// slot need this: identity comparison alone would report "same
    /// texture" while the contents were overwritten.
    pub fn send_forced(&mut self, value: Option<Value>) -> Result<()> {
        self.send_internal(value, true)
    }

    fn send_internal(&mut self, value: Option<Value>, force: bool) -> Result<()> {
        if let Some(v) = &value {
            if v.value_type() != self.value_type {
                return Err(PatchError::TypeMismatch {
                    expected: self.value_type.to_string(),
                    actual: v.value_type().to_string(),
                });
            }
        }

        if force || self.value != value {
            self.value = value;
            self.changed = true;
        }
        Ok(())
    }

    /// Propagation entry point: the graph writes an upstream outlet's
    /// value into this inlet. The change flag is always raised here,
    /// since propagation only runs when the upstream outlet changed.
    pub(crate) fn receive(&mut self, value: Option<Value>) {
        debug_assert_eq!(self.kind, PortKind::Inlet);
        self.value = value;
        self.changed = true;
    }

    pub(crate) fn clear_changed(&mut self) {
        self.changed = false;
    }
}
