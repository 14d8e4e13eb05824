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

//! Background delivery of queued payloads to HTTP endpoints.
//!
//! Payloads are written to one of two persistent queues (`track` for
//! events, `engage` for people updates) by a single worker that also sends
//! them in batches. Delivery is at least once: a batch leaves the disk only
//! after the endpoint answers 200; anything else puts it back and arms a
//! retry with exponential backoff.
//!
//! ```rust,no_run
//! use courier_delivery::{Delivery, DeliveryOptions};
//!
//! let delivery = Delivery::start(DeliveryOptions::default())?;
//! delivery.track_value(&serde_json::json!({"event": "app_open"}))?;
//! delivery.flush()?;
//! delivery.shutdown()?;
//! # Ok::<(), courier_delivery::DeliveryError>(())
//! ```

mod command;
mod config;
mod delivery;
mod dispatch;
mod driver;
pub mod encode;
mod error;
pub mod machine;
mod metrics;
pub mod transport;

pub use command::{Command, QueueKind};
pub use config::{DEFAULT_BATCH_SIZE, DEFAULT_COMMAND_CAPACITY, DeliveryOptions};
pub use delivery::Delivery;
pub use dispatch::QueueSet;
pub use error::{DeliveryError, Result};
pub use machine::{Backoff, DeliveryMachine, Effect, Event};
pub use transport::{AsyncHttpTransport, AsyncTransport, BlockingTransport, HttpTransport};
