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

use std::{path::PathBuf, time::Duration};

use courier_common_storage_queue::{FlushMode, QueueBuilder};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::ensure;

use crate::{
    command::QueueKind,
    error::{InvalidOptionsSnafu, Result},
    machine::Backoff,
};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_COMMAND_CAPACITY: usize = 16;

/// Everything the delivery worker needs to know about its queues and
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct DeliveryOptions {
    /// Parent directory of the `track` and `engage` queue directories.
    #[default(PathBuf::from("data"))]
    pub data_dir: PathBuf,

    #[default("http://127.0.0.1:8080/track".to_string())]
    pub track_url: String,

    #[default("http://127.0.0.1:8080/engage".to_string())]
    pub engage_url: String,

    /// Maximum entries per HTTP request.
    #[default(DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Size at which a queue rolls over to a new data file.
    #[default(courier_common_storage_queue::config::DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Period of the automatic flush.
    #[serde(with = "humantime_serde")]
    #[default(Duration::from_secs(60))]
    pub flush_interval: Duration,

    /// Commands that may wait for the worker before producers block.
    #[default(DEFAULT_COMMAND_CAPACITY)]
    pub command_capacity: usize,

    #[serde(with = "humantime_serde")]
    #[default(Duration::from_secs(30))]
    pub request_timeout: Duration,

    /// First retry waits twice this long.
    #[serde(with = "humantime_serde")]
    #[default(Duration::from_secs(60))]
    pub retry_base_delay: Duration,

    #[serde(with = "humantime_serde")]
    #[default(Duration::from_secs(600))]
    pub retry_max_delay: Duration,

    /// fsync data, log and checkpoint on every commit.
    #[default(true)]
    pub sync_writes: bool,
}

impl DeliveryOptions {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.batch_size > 0,
            InvalidOptionsSnafu {
                reason: "batch_size must be at least 1",
            }
        );
        ensure!(
            self.command_capacity > 0,
            InvalidOptionsSnafu {
                reason: "command_capacity must be at least 1",
            }
        );
        ensure!(
            !self.flush_interval.is_zero(),
            InvalidOptionsSnafu {
                reason: "flush_interval must be positive",
            }
        );
        for kind in QueueKind::ALL {
            let url = self.url(kind);
            ensure!(
                url::Url::parse(url).is_ok(),
                InvalidOptionsSnafu {
                    reason: format!("{kind}_url is not a valid URL: {url}"),
                }
            );
        }
        Ok(())
    }

    pub fn url(&self, kind: QueueKind) -> &str {
        match kind {
            QueueKind::Track => &self.track_url,
            QueueKind::Engage => &self.engage_url,
        }
    }

    pub fn queue_dir(&self, kind: QueueKind) -> PathBuf { self.data_dir.join(kind.as_str()) }

    /// Storage settings for one queue, not yet opened.
    pub fn queue_builder(&self, kind: QueueKind) -> QueueBuilder {
        let mode = if self.sync_writes {
            FlushMode::Sync
        } else {
            FlushMode::Async
        };
        QueueBuilder::new(self.queue_dir(kind))
            .max_file_size(self.max_file_size)
            .flush_mode(mode)
    }

    pub const fn backoff(&self) -> Backoff {
        Backoff::new(self.retry_base_delay, self.retry_max_delay)
    }
}
