// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{sync::Arc, thread::JoinHandle, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    err::{WorkError, WorkResult},
    op_queue::OperationQueue,
};

/// Control surface shared by every worker handle.
pub trait Handle: Send + Sync {
    fn name(&self) -> &str;

    /// Stops the loop without draining queued commands.
    ///
    /// Sets the stop flag and quits the operation queue, so a worker blocked
    /// waiting for a command wakes up. A command already being handled runs
    /// to completion.
    fn stop(&self);

    fn is_stopped(&self) -> bool;

    /// Whether the loop has exited.
    fn is_finished(&self) -> bool;
}

/// Handle for a worker running on its own thread.
pub struct ThreadHandle<C> {
    name:   String,
    cancel: CancellationToken,
    queue:  Arc<OperationQueue<C>>,
    join:   Option<JoinHandle<()>>,
}

impl<C: Send> ThreadHandle<C> {
    pub(crate) fn new(
        name: String,
        cancel: CancellationToken,
        queue: Arc<OperationQueue<C>>,
        join: JoinHandle<()>,
    ) -> Self {
        ThreadHandle {
            name,
            cancel,
            queue,
            join: Some(join),
        }
    }

    /// Blocks until the worker thread exits.
    pub fn join(mut self) -> WorkResult {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        join.join()
            .map_err(|_| WorkError::fatal(format!("worker thread {} panicked", self.name)))
    }
}

impl<C: Send> Handle for ThreadHandle<C> {
    fn name(&self) -> &str { &self.name }

    fn stop(&self) {
        self.cancel.cancel();
        self.queue.quit();
    }

    fn is_stopped(&self) -> bool { self.cancel.is_cancelled() }

    fn is_finished(&self) -> bool { self.join.as_ref().is_none_or(JoinHandle::is_finished) }
}

/// Handle for a worker running as a task on a tokio runtime.
pub struct TaskHandle<C> {
    name:             String,
    cancel:           CancellationToken,
    queue:            Arc<OperationQueue<C>>,
    join:             tokio::task::JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl<C: Send> TaskHandle<C> {
    pub(crate) fn new(
        name: String,
        cancel: CancellationToken,
        queue: Arc<OperationQueue<C>>,
        join: tokio::task::JoinHandle<()>,
        shutdown_timeout: Duration,
    ) -> Self {
        TaskHandle {
            name,
            cancel,
            queue,
            join,
            shutdown_timeout,
        }
    }

    /// Waits for the task to exit, aborting it after the shutdown timeout.
    pub async fn join(mut self) -> WorkResult {
        match tokio::time::timeout(self.shutdown_timeout, &mut self.join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(WorkError::fatal_with_source(
                format!("worker task {} failed", self.name),
                e,
            )),
            Err(_) => {
                warn!(
                    worker = %self.name,
                    timeout = ?self.shutdown_timeout,
                    "worker did not stop in time, aborting"
                );
                self.join.abort();
                Err(WorkError::fatal(format!(
                    "worker task {} did not stop within {:?}",
                    self.name, self.shutdown_timeout
                )))
            }
        }
    }
}

impl<C: Send> Handle for TaskHandle<C> {
    fn name(&self) -> &str { &self.name }

    fn stop(&self) {
        self.cancel.cancel();
        self.queue.quit();
    }

    fn is_stopped(&self) -> bool { self.cancel.is_cancelled() }

    fn is_finished(&self) -> bool { self.join.is_finished() }
}
