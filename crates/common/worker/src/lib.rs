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

//! Single-consumer command processing.
//!
//! - [`OperationQueue`]: bounded FIFO with backpressure and a `quit` that
//!   wakes every waiter
//! - [`BlockingWorker`] / [`Worker`]: command handlers with lifecycle hooks
//!   and a periodic tick
//! - [`spawn_thread`] / [`spawn_task`]: the two drivers, one per execution
//!   model
//! - [`Scheduler`]: `schedule_after(delay, fn) -> CancelToken`
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use courier_common_worker::{
//!     BlockingWorker, Flow, OperationQueue, WorkResult, WorkerConfig, spawn_thread,
//! };
//!
//! struct Printer;
//!
//! impl BlockingWorker<&'static str> for Printer {
//!     fn work(&mut self, line: &'static str) -> WorkResult<Flow> {
//!         if line == "bye" {
//!             return Ok(Flow::Stop);
//!         }
//!         println!("{line}");
//!         Ok(Flow::Continue)
//!     }
//! }
//!
//! let queue = Arc::new(OperationQueue::new(16));
//! let handle = spawn_thread(&WorkerConfig::default(), Arc::clone(&queue), Printer).unwrap();
//! queue.enqueue("hello").unwrap();
//! queue.enqueue("bye").unwrap();
//! handle.join().unwrap();
//! ```

mod blocking;
mod config;
mod driver;
mod err;
mod handle;
mod metrics;
mod op_queue;
mod timer;
mod worker;

pub use blocking::BlockingWorker;
pub use config::WorkerConfig;
pub use driver::{spawn_task, spawn_thread};
pub use err::{ErrorSeverity, SubmitError, WorkError, WorkResult};
pub use handle::{Handle, TaskHandle, ThreadHandle};
pub use op_queue::{Dequeued, OperationQueue};
pub use timer::{CancelToken, RuntimeScheduler, Scheduler};
pub use worker::{Flow, Worker};
