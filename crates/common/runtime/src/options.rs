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

use std::thread::available_parallelism;

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// Retry timers hand their callbacks to the blocking pool, where they may
/// wait on a full command queue.
const DEFAULT_MAX_BLOCKING_THREADS: usize = 16;

/// Sizes of the process-wide runtimes.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Builder, Serialize, Deserialize)]
#[builder(finish_fn = build)]
#[serde(default)]
pub struct GlobalRuntimeOptions {
    /// Drives async HTTP and the cooperative delivery worker.
    #[default(cpu_threads())]
    #[builder(default = cpu_threads())]
    pub network_io_threads: usize,

    /// Drives retry timers.
    #[default(1)]
    #[builder(default = 1)]
    pub background_threads: usize,

    #[default(DEFAULT_MAX_BLOCKING_THREADS)]
    #[builder(default = DEFAULT_MAX_BLOCKING_THREADS)]
    pub max_blocking_threads: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flavor {
    #[default]
    MultiThread,
    /// Runs only while its owner drives it, on the owner's thread.
    CurrentThread,
}

/// Options for a single runtime. Every driver is enabled.
#[derive(Debug, Clone, SmartDefault, Builder)]
#[builder(finish_fn = build)]
pub struct RuntimeOptions {
    #[builder(default)]
    pub flavor: Flavor,

    /// Ignored by current-thread runtimes; defaults to the CPU count.
    pub worker_threads: Option<usize>,

    pub max_blocking_threads: Option<usize>,

    #[default("courier-rt".to_string())]
    #[builder(default = "courier-rt".to_string(), into)]
    pub thread_name: String,
}

pub(crate) fn cpu_threads() -> usize {
    available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
        .max(1)
}
