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

//! A crash-safe, disk-backed FIFO queue of opaque byte entries.
//!
//! Entries live in numbered data files; every commit is journaled to a
//! transaction log that is replayed on open. See [`Queue`] and [`Session`].

pub mod builder;
pub mod config;
pub mod entry;
pub mod error;
pub mod file;
pub mod path;

mod io_worker;
mod meta;
mod queue;
mod recovery;
mod session;
mod state;
mod storage;
mod txlog;

pub use builder::QueueBuilder;
pub use config::{FlushMode, QueueConfig};
pub use entry::{Operation, OperationType, QueueEntry};
pub use error::{QueueError, Result};
pub use queue::Queue;
pub use session::Session;
