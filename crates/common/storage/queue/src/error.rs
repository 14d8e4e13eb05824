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

use std::{io, path::PathBuf};

use snafu::Snafu;

/// Queue operation errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum QueueError {
    /// Another process (or another handle in this process) owns the directory.
    #[snafu(display("Queue directory {} is locked by another owner", path.display()))]
    LockContention { path: PathBuf },

    #[snafu(display("Queue has been disposed"))]
    Disposed,

    /// The transaction log could not be opened after bounded retries.
    #[snafu(display(
        "Transaction log {} unavailable after {attempts} attempts: {source}",
        path.display()
    ))]
    TransactionLogUnavailable {
        path:     PathBuf,
        attempts: usize,
        source:   io::Error,
    },

    /// Filesystem I/O failure.
    #[snafu(display("IO error on {}: {source}", path.display()))]
    Io { path: PathBuf, source: io::Error },

    /// One or more asynchronous session writes failed.
    #[snafu(display("{count} pending write(s) failed, first error: {source}"))]
    PendingWrites {
        count:  usize,
        source: Box<QueueError>,
    },

    /// An entry does not fit the int32 offsets of the on-disk format.
    #[snafu(display("Entry of {length} bytes at offset {offset} exceeds the data file format"))]
    EntryTooLarge { length: usize, offset: u64 },

    #[snafu(display("Invalid queue configuration: {reason}"))]
    InvalidConfig { reason: String },

    /// The background writer thread is gone.
    #[snafu(display("Queue writer is unavailable"))]
    WriterUnavailable,

    #[snafu(display("Internal error: {message}"))]
    Internal { message: String },
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
