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

use std::path::PathBuf;

use snafu::ensure;

use crate::{Result, error::InvalidConfigSnafu};

/// Default size at which a data file is rolled over.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;
/// Default upper bound of a single read-ahead read.
pub const DEFAULT_READ_AHEAD: u64 = 1024 * 1024;
/// Buffered session bytes above which a write is handed to the writer thread.
pub const DEFAULT_ASYNC_WRITE_THRESHOLD: usize = 64 * 1024;
/// Log size above which trimming is considered.
pub const DEFAULT_TRIM_THRESHOLD: u64 = 32 * 1024 * 1024;
pub const DEFAULT_LOG_OPEN_ATTEMPTS: usize = 10;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub base_path:             PathBuf,
    pub max_file_size:         u64,
    pub flush_mode:            FlushMode,
    pub read_ahead:            u64,
    pub async_write_threshold: usize,
    pub trim_threshold:        u64,
    pub log_open_attempts:     usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_path:             PathBuf::from("./queue_data"),
            max_file_size:         DEFAULT_MAX_FILE_SIZE,
            flush_mode:            FlushMode::Sync,
            read_ahead:            DEFAULT_READ_AHEAD,
            async_write_threshold: DEFAULT_ASYNC_WRITE_THRESHOLD,
            trim_threshold:        DEFAULT_TRIM_THRESHOLD,
            log_open_attempts:     DEFAULT_LOG_OPEN_ATTEMPTS,
        }
    }
}

impl QueueConfig {
    /// Offsets and lengths are stored as int32 on disk, so a data file can
    /// never grow past `i32::MAX`.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_file_size > 0 && self.max_file_size <= i32::MAX as u64,
            InvalidConfigSnafu {
                reason: format!(
                    "max_file_size must be in 1..={}, got {}",
                    i32::MAX,
                    self.max_file_size
                ),
            }
        );
        ensure!(
            self.log_open_attempts > 0,
            InvalidConfigSnafu {
                reason: "log_open_attempts must be at least 1".to_string(),
            }
        );
        Ok(())
    }

    pub(crate) const fn sync_on_commit(&self) -> bool { matches!(self.flush_mode, FlushMode::Sync) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Leave durability to the OS page cache.
    Async,
    /// `fsync` data files, the transaction log and the checkpoint on commit.
    Sync,
}
