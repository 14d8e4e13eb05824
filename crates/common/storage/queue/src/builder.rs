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

use crate::{FlushMode, Queue, QueueConfig, Result};

pub struct QueueBuilder {
    config: QueueConfig,
}

impl QueueBuilder {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            config: QueueConfig {
                base_path: base_path.into(),
                ..Default::default()
            },
        }
    }

    #[must_use]
    pub const fn max_file_size(mut self, size: u64) -> Self {
        self.config.max_file_size = size;
        self
    }

    #[must_use]
    pub const fn flush_mode(mut self, mode: FlushMode) -> Self {
        self.config.flush_mode = mode;
        self
    }

    #[must_use]
    pub const fn read_ahead(mut self, bytes: u64) -> Self {
        self.config.read_ahead = bytes;
        self
    }

    #[must_use]
    pub const fn async_write_threshold(mut self, bytes: usize) -> Self {
        self.config.async_write_threshold = bytes;
        self
    }

    #[must_use]
    pub const fn trim_threshold(mut self, bytes: u64) -> Self {
        self.config.trim_threshold = bytes;
        self
    }

    #[must_use]
    pub const fn log_open_attempts(mut self, attempts: usize) -> Self {
        self.config.log_open_attempts = attempts;
        self
    }

    /// Validates the configuration and opens the queue directory.
    pub fn open(self) -> Result<Queue> {
        self.config.validate()?;
        Queue::open(self.config)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_builder_default_config() {
        let builder = QueueBuilder::new("/tmp/test_queue");
        assert_eq!(builder.config.base_path, PathBuf::from("/tmp/test_queue"));
        assert_eq!(builder.config.max_file_size, 16 * 1024 * 1024);
        assert_eq!(builder.config.async_write_threshold, 64 * 1024);
        assert_eq!(builder.config.log_open_attempts, 10);
    }

    #[test]
    fn test_builder_custom_config() {
        let builder = QueueBuilder::new("/tmp/test_queue")
            .max_file_size(4096)
            .read_ahead(512)
            .async_write_threshold(128)
            .trim_threshold(1024)
            .log_open_attempts(3)
            .flush_mode(FlushMode::Async);

        assert_eq!(builder.config.max_file_size, 4096);
        assert_eq!(builder.config.read_ahead, 512);
        assert_eq!(builder.config.async_write_threshold, 128);
        assert_eq!(builder.config.trim_threshold, 1024);
        assert_eq!(builder.config.log_open_attempts, 3);
        assert_eq!(builder.config.flush_mode, FlushMode::Async);
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let result = QueueBuilder::new(temp_dir.path()).max_file_size(0).open();
        assert!(matches!(result, Err(crate::QueueError::InvalidConfig { .. })));
    }
}
