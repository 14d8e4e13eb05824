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

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// The two logical queues, each with its own directory and endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Events.
    Track,
    /// People updates.
    Engage,
}

impl QueueKind {
    /// Flush order.
    pub const ALL: [QueueKind; 2] = [QueueKind::Track, QueueKind::Engage];

    pub const fn as_str(self) -> &'static str {
        match self {
            QueueKind::Track => "track",
            QueueKind::Engage => "engage",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Work items for the delivery worker, handled strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Durably append one payload to the track queue.
    EnqueueEvents(Bytes),
    /// Durably append one payload to the engage queue.
    EnqueuePeople(Bytes),
    /// Send everything queued; a no-op while a retry is pending.
    Flush,
    /// Like `Flush` but ignores a pending retry. Issued by the retry timer.
    ForceFlush,
    /// Discard both queues without sending.
    ClearQueue,
    /// Stop the worker once every earlier command has been handled.
    KillThread,
}

impl Command {
    pub fn enqueue(kind: QueueKind, payload: impl Into<Bytes>) -> Self {
        match kind {
            QueueKind::Track => Command::EnqueueEvents(payload.into()),
            QueueKind::Engage => Command::EnqueuePeople(payload.into()),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Command::EnqueueEvents(_) => "enqueue_events",
            Command::EnqueuePeople(_) => "enqueue_people",
            Command::Flush => "flush",
            Command::ForceFlush => "force_flush",
            Command::ClearQueue => "clear_queue",
            Command::KillThread => "kill_thread",
        }
    }
}
