// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Port error: {0}")]
    Port(String),

    #[error("Port type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Connection would create a cycle: {0}")]
    CycleDetected(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("GPU operation failed: {0}")]
    Gpu(String),

    #[error("Background task error: {0}")]
    Task(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PatchError>;
