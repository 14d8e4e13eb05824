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

//! One-shot cancellable timers.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancels a scheduled callback. Dropping the token does not cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(CancellationToken);

impl CancelToken {
    pub fn new() -> Self { CancelToken(CancellationToken::new()) }

    pub fn cancel(&self) { self.0.cancel(); }

    pub fn is_cancelled(&self) -> bool { self.0.is_cancelled() }
}

/// Runs a callback once after a delay unless cancelled first.
pub trait Scheduler: Send + Sync + 'static {
    fn schedule_after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> CancelToken;
}

/// [`Scheduler`] backed by a tokio runtime.
///
/// The callback runs on the runtime's blocking pool, so it may block (for
/// example on a full operation queue) without stalling the timer wheel.
#[derive(Debug, Clone)]
pub struct RuntimeScheduler {
    handle: tokio::runtime::Handle,
}

impl RuntimeScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self { RuntimeScheduler { handle } }

    /// Scheduler on the process-wide background runtime.
    ///
    /// # Errors
    /// Fails if the background runtime cannot be built.
    pub fn background() -> courier_common_runtime::Result<Self> {
        let runtime = courier_common_runtime::background_runtime()?;
        Ok(Self::new(runtime.handle().clone()))
    }
}

impl Scheduler for RuntimeScheduler {
    fn schedule_after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> CancelToken {
        let token = CancelToken::new();
        let cancelled = token.0.clone();
        self.handle.spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => {
                    debug!(?delay, "scheduled task cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    if !cancelled.is_cancelled() {
                        let _ = tokio::task::spawn_blocking(task).await;
                    }
                }
            }
        });
        token
    }
}
