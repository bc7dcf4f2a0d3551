// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Wire types for the remote editing protocol.

use serde::{Deserialize, Serialize};

use crate::core::{ConnectionId, NodeId, PortRef, Value};

/// A remote editing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Enumerate the node palette.
    ListNodeTypes,
    /// Full descriptor of one node type.
    GetNodeTypeInfo { type_name: String },
    /// Serialize the current graph.
    GetGraphSnapshot,
    /// Add a node of the given type.
    InstantiateNode {
        type_name: String,
        #[serde(default)]
        display_name: Option<String>,
        #[serde(default)]
        offset: Option<(f32, f32)>,
    },
    /// Remove a node and all its connections.
    DeleteNode { node: NodeId },
    /// Reposition a node on the canvas.
    MoveNode { node: NodeId, offset: (f32, f32) },
    /// Wire an outlet to an inlet.
    ConnectPorts { from: PortRef, to: PortRef },
    /// Unwire whatever feeds the given inlet.
    DisconnectPorts { to: PortRef },
    /// Current value of a parameter.
    ReadParameter { node: NodeId, name: String },
    /// Edit a parameter.
    WriteParameter {
        node: NodeId,
        name: String,
        value: Value,
    },
    /// Changes since a previously observed revision.
    GetGraphChanges { since_revision: u64 },
    /// Apply a batch of changes, rejected wholesale when the graph has
    /// moved past the expected revision.
    ApplyGraphChanges {
        base_revision: u64,
        changes: Vec<GraphChange>,
    },
}

/// One observable mutation of the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphChange {
    NodeAdded {
        node: NodeId,
        type_name: String,
    },
    NodeRemoved {
        node: NodeId,
    },
    NodeMoved {
        node: NodeId,
        offset: (f32, f32),
    },
    Connected {
        id: ConnectionId,
        from: PortRef,
        to: PortRef,
    },
    Disconnected {
        id: ConnectionId,
    },
    ParameterChanged {
        node: NodeId,
        name: String,
        value: Value,
    },
}

/// A change stamped with the revision it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionedChange {
    pub revision: u64,
    #[serde(flatten)]
    pub change: GraphChange,
}

/// A remote editing response. Every success carries the graph revision
/// after the operation, so clients can resume change polling from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok {
        revision: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn ok(revision: u64) -> Self {
        Response::Ok {
            revision,
            data: None,
        }
    }

    pub fn with_data<T: Serialize>(revision: u64, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Response::Ok {
                revision,
                data: Some(value),
            },
            Err(e) => Response::Error {
                message: format!("failed to encode response: {e}"),
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }
}
