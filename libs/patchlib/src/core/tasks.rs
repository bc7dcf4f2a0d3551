// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Cooperative background work for slow node operations.
//!
//! Nodes that would stall the frame loop (model inference, file
//! loading) run the slow part on a worker thread and poll the latest
//! result during execute. Cancellation is cooperative: the worker
//! checks its token between units of work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use super::error::{PatchError, Result};

/// Shared flag a worker polls to notice cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A worker thread streaming results of type `T` back to the frame
/// loop. Dropping the task cancels and joins the worker.
pub struct BackgroundTask<T: Send + 'static> {
    name: String,
    token: CancellationToken,
    receiver: Receiver<T>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Spawn a named worker. The closure gets the cancellation token
    /// and a sender for results; it should return promptly once the
    /// token is cancelled.
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Result<Self>
    where
        F: FnOnce(CancellationToken, Sender<T>) + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();
        let (sender, receiver) = unbounded();

        let worker_token = token.clone();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || work(worker_token, sender))
            .map_err(|e| PatchError::Task(format!("failed to spawn '{name}': {e}")))?;

        debug!(task = %name, "spawned background task");
        Ok(Self {
            name,
            token,
            receiver,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drain the channel and return the newest result, if any arrived
    /// since the last poll.
    pub fn latest(&self) -> Option<T> {
        self.receiver.try_iter().last()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Cancel and join the worker. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(task = %self.name, "background task panicked");
            }
        }
    }
}

impl<T: Send + 'static> Drop for BackgroundTask<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
