// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Request handling against a live runtime.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::core::{NodeRegistry, PatchRuntime, PortRef, document};

use super::protocol::{GraphChange, Request, Response, RevisionedChange};

/// Incremental changes older than this fall off the log; clients that
/// far behind get a full snapshot instead.
const CHANGE_LOG_CAP: usize = 1024;

/// Applies remote requests to a shared runtime and tracks a revision
/// history for incremental sync.
pub struct RemoteBridge {
    runtime: Arc<Mutex<PatchRuntime>>,
    registry: Arc<Mutex<NodeRegistry>>,
    revision: u64,
    log: VecDeque<RevisionedChange>,
}

impl RemoteBridge {
    pub fn new(runtime: Arc<Mutex<PatchRuntime>>, registry: Arc<Mutex<NodeRegistry>>) -> Self {
        Self {
            runtime,
            registry,
            revision: 0,
            log: VecDeque::new(),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Handle one JSON-encoded request, returning the JSON response.
    pub fn handle_json(&mut self, request: &str) -> String {
        let response = match serde_json::from_str::<Request>(request) {
            Ok(request) => self.handle(request),
            Err(e) => Response::error(format!("malformed request: {e}")),
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"status":"error","message":"{e}"}}"#))
    }

    pub fn handle(&mut self, request: Request) -> Response {
        debug!(?request, "remote request");
        match request {
            Request::ListNodeTypes => {
                let descriptors = self.registry.lock().list();
                Response::with_data(self.revision, &descriptors)
            }

            Request::GetNodeTypeInfo { type_name } => {
                let registry = self.registry.lock();
                match registry.get(&type_name) {
                    Some(registration) => {
                        Response::with_data(self.revision, &registration.descriptor)
                    }
                    None => Response::error(format!("unknown node type '{type_name}'")),
                }
            }

            Request::GetGraphSnapshot => {
                let runtime = self.runtime.lock();
                let snapshot = document::encode(runtime.graph());
                Response::with_data(self.revision, &snapshot)
            }

            Request::InstantiateNode {
                type_name,
                display_name,
                offset,
            } => {
                let mut runtime = self.runtime.lock();
                let ctx = runtime.document_context().clone();
                let mut node = match self.registry.lock().instantiate(&type_name, &ctx) {
                    Ok(node) => node,
                    Err(e) => return Response::error(e.to_string()),
                };
                if let Some(name) = display_name {
                    node.set_display_name(name);
                }
                if let Some(offset) = offset {
                    node.offset = offset;
                }
                let id = node.id();
                // Runtime-level add: a node joining a live graph gets
                // its start hook before the next frame touches it.
                if let Err(e) = runtime.add_node(node) {
                    return Response::error(e.to_string());
                }
                drop(runtime);

                self.record(GraphChange::NodeAdded {
                    node: id,
                    type_name,
                });
                Response::with_data(self.revision, &id)
            }

            Request::DeleteNode { node } => {
                let result = self.runtime.lock().remove_node(node);
                match result {
                    Ok(_) => {
                        self.record(GraphChange::NodeRemoved { node });
                        Response::ok(self.revision)
                    }
                    Err(e) => Response::error(e.to_string()),
                }
            }

            Request::MoveNode { node, offset } => {
                let mut runtime = self.runtime.lock();
                match runtime.graph_mut().node_mut(node) {
                    Some(n) => {
                        n.offset = offset;
                        drop(runtime);
                        self.record(GraphChange::NodeMoved { node, offset });
                        Response::ok(self.revision)
                    }
                    None => Response::error(format!("node {node} not found")),
                }
            }

            Request::ConnectPorts { from, to } => {
                let result = self
                    .runtime
                    .lock()
                    .graph_mut()
                    .connect(from.clone(), to.clone());
                match result {
                    Ok(id) => {
                        self.record(GraphChange::Connected { id, from, to });
                        Response::with_data(self.revision, &id)
                    }
                    Err(e) => Response::error(e.to_string()),
                }
            }

            Request::DisconnectPorts { to } => {
                let mut runtime = self.runtime.lock();
                let Some(id) = runtime.graph().connection_into(&to).map(|c| c.id) else {
                    // Nothing feeds the inlet: a no-op, reported as such.
                    return Response::with_data(self.revision, &false);
                };
                runtime.graph_mut().disconnect(id);
                drop(runtime);
                self.record(GraphChange::Disconnected { id });
                Response::with_data(self.revision, &true)
            }

            Request::ReadParameter { node, name } => {
                let runtime = self.runtime.lock();
                let value = runtime
                    .graph()
                    .node(node)
                    .and_then(|n| n.parameter(&name))
                    .map(|p| p.value().clone());
                match value {
                    Some(value) => Response::with_data(self.revision, &value),
                    None => Response::error(format!("no parameter '{name}' on node {node}")),
                }
            }

            Request::WriteParameter { node, name, value } => {
                let mut runtime = self.runtime.lock();
                let Some(parameter) = runtime
                    .graph_mut()
                    .node_mut(node)
                    .and_then(|n| n.parameter_mut(&name))
                else {
                    return Response::error(format!("no parameter '{name}' on node {node}"));
                };
                if let Err(e) = parameter.set_value(value.clone()) {
                    return Response::error(e.to_string());
                }
                drop(runtime);
                self.record(GraphChange::ParameterChanged { node, name, value });
                Response::ok(self.revision)
            }

            Request::GetGraphChanges { since_revision } => {
                let oldest_available = self.revision - self.log.len() as u64;
                if since_revision < oldest_available {
                    // Client is too far behind the retained history.
                    let runtime = self.runtime.lock();
                    let snapshot = document::encode(runtime.graph());
                    return Response::with_data(self.revision, &snapshot);
                }
                let changes: Vec<&RevisionedChange> = self
                    .log
                    .iter()
                    .filter(|c| c.revision > since_revision)
                    .collect();
                Response::with_data(self.revision, &changes)
            }

            Request::ApplyGraphChanges {
                base_revision,
                changes,
            } => {
                if base_revision != self.revision {
                    return Response::error(format!(
                        "stale base revision {base_revision}, graph is at {}",
                        self.revision
                    ));
                }
                for (index, change) in changes.into_iter().enumerate() {
                    if let Err(e) = self.apply_change(&change) {
                        // Earlier changes in the batch stand; the
                        // client re-syncs from the snapshot.
                        return Response::error(format!("change {index} failed: {e}"));
                    }
                    self.record(change);
                }
                Response::ok(self.revision)
            }
        }
    }

    fn apply_change(&mut self, change: &GraphChange) -> crate::core::Result<()> {
        use crate::core::PatchError;

        let mut runtime = self.runtime.lock();
        match change {
            GraphChange::NodeAdded { node, type_name } => {
                if runtime.graph().node(*node).is_some() {
                    return Err(PatchError::Graph(format!("node {node} already exists")));
                }
                let ctx = runtime.document_context().clone();
                let mut instance = self.registry.lock().instantiate(type_name, &ctx)?;
                instance.set_id(*node);
                runtime.add_node(instance)?;
                Ok(())
            }
            GraphChange::NodeRemoved { node } => runtime.remove_node(*node),
            GraphChange::NodeMoved { node, offset } => {
                let node = runtime
                    .graph_mut()
                    .node_mut(*node)
                    .ok_or_else(|| PatchError::NotFound(format!("node {node}")))?;
                node.offset = *offset;
                Ok(())
            }
            GraphChange::Connected { id, from, to } => {
                runtime.graph_mut().connect(from.clone(), to.clone())?;
                if let Some(last) = runtime.graph_mut().connections_mut().last_mut() {
                    last.id = *id;
                }
                Ok(())
            }
            GraphChange::Disconnected { id } => {
                // Re-applying a disconnect the graph no longer has is a
                // harmless no-op.
                runtime.graph_mut().disconnect(*id);
                Ok(())
            }
            GraphChange::ParameterChanged { node, name, value } => {
                let parameter = runtime
                    .graph_mut()
                    .node_mut(*node)
                    .and_then(|n| n.parameter_mut(name))
                    .ok_or_else(|| {
                        PatchError::NotFound(format!("parameter '{name}' on node {node}"))
                    })?;
                parameter.set_value(value.clone())
            }
        }
    }

    fn record(&mut self, change: GraphChange) {
        self.revision += 1;
        self.log.push_back(RevisionedChange {
            revision: self.revision,
            change,
        });
        if self.log.len() > CHANGE_LOG_CAP {
            self.log.pop_front();
        }
    }
}
