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

use courier_common_storage_queue::QueueError;
use courier_common_worker::WorkError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DeliveryError {
    #[snafu(display("Queue error: {source}"))]
    Queue { source: QueueError },

    #[snafu(display("HTTP transport error: {source}"))]
    Http { source: reqwest::Error },

    #[snafu(display("Failed to encode payload: {source}"))]
    Encode { source: serde_json::Error },

    /// The worker has stopped accepting commands.
    #[snafu(display("Delivery worker is stopped"))]
    Stopped,

    /// Non-blocking submission found the command queue full.
    #[snafu(display("Delivery command queue is full"))]
    Backpressure,

    #[snafu(display("Failed to start delivery worker: {source}"))]
    Spawn { source: WorkError },

    #[snafu(display("Delivery worker did not shut down cleanly: {source}"))]
    Join { source: WorkError },

    #[snafu(display("Runtime error: {source}"))]
    Runtime {
        source: courier_common_runtime::Error,
    },

    #[snafu(display("Invalid delivery options: {reason}"))]
    InvalidOptions { reason: String },
}

pub type Result<T, E = DeliveryError> = std::result::Result<T, E>;
