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

use std::time::Duration;

#[derive(Debug, Clone, bon::Builder)]
pub struct WorkerConfig {
    /// Thread name and metric label.
    #[builder(default = "courier-worker".to_string(), into)]
    name: String,

    /// Period of the `on_tick` hook. No ticks when unset.
    tick_interval: Option<Duration>,

    /// How long an async join waits before aborting the task. Default: 30
    /// seconds.
    #[builder(default = Duration::from_secs(30))]
    shutdown_timeout: Duration,
}

impl WorkerConfig {
    pub fn name(&self) -> &str { &self.name }

    pub fn tick_interval(&self) -> Option<Duration> { self.tick_interval }

    pub fn shutdown_timeout(&self) -> Duration { self.shutdown_timeout }
}

impl Default for WorkerConfig {
    fn default() -> Self { WorkerConfig::builder().build() }
}
