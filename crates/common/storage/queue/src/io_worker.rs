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

//! Background writer for large session buffers.
//!
//! A [`Session`](crate::Session) hands its buffer to this thread once it
//! grows past the async write threshold, so disk I/O overlaps with further
//! buffering. Each job carries its own reply channel; the session collects
//! the resulting ENQUEUE operations when it flushes.
//!
//! ```text
//! ┌──────────────┐     crossbeam      ┌──────────────┐               ┌──────────────┐
//! │   Session    │ ──── channel ────► │   IOWorker   │ ────────────► │   data.N     │
//! │  (caller)    │ ◄─── reply ─────── │  (bg thread) │               │              │
//! └──────────────┘                    └──────────────┘               └──────────────┘
//! ```

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender};
use snafu::ResultExt;
use tracing::{debug, error, info};

use crate::{Result, entry::Operation, error::IoSnafu, storage::Storage};

/// A buffered batch of session entries to persist.
pub(crate) struct WriteJob {
    pub items: Vec<Bytes>,
    pub reply: Sender<Result<Vec<Operation>>>,
}

pub(crate) struct IOWorker {
    rx:      Receiver<WriteJob>,
    storage: Arc<Storage>,
}

impl IOWorker {
    pub fn new(rx: Receiver<WriteJob>, storage: Arc<Storage>) -> Self { Self { rx, storage } }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let path = self.storage.config.base_path.clone();
        thread::Builder::new()
            .name("queue-io-worker".into())
            .spawn(move || self.run())
            .context(IoSnafu { path })
    }

    /// Processes jobs until every sender is dropped.
    pub fn run(&self) {
        info!(path = ?self.storage.config.base_path, "IOWorker starting");

        while let Ok(job) = self.rx.recv() {
            let result = self.storage.append(&job.items);
            if let Err(e) = &result {
                error!(error = %e, entries = job.items.len(), "Failed to write session batch");
            }
            if let Err(unclaimed) = job.reply.send(result) {
                // The session is gone; release what it will never commit.
                if let Ok(ops) = unclaimed.into_inner() {
                    debug!(entries = ops.len(), "Releasing unclaimed write");
                    let mut state = self.storage.lock_state();
                    let drained = state.reinstate(&ops);
                    self.storage.remove_drained(&mut state, drained);
                }
            }
        }

        info!(path = ?self.storage.config.base_path, "IOWorker stopped");
    }
}
