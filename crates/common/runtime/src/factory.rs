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

use std::sync::atomic::{AtomicUsize, Ordering};

use snafu::ResultExt;
use tokio::runtime::{Builder as TokioBuilder, Runtime};

use crate::{
    error::{self, Result},
    options::{Flavor, RuntimeOptions, cpu_threads},
};

impl RuntimeOptions {
    /// Builds the runtime; its threads are named `{thread_name}-{n}`.
    pub fn create(self) -> Result<Runtime> {
        let mut builder = match self.flavor {
            Flavor::MultiThread => {
                let mut builder = TokioBuilder::new_multi_thread();
                builder.worker_threads(self.worker_threads.unwrap_or_else(cpu_threads).max(1));
                builder
            }
            Flavor::CurrentThread => TokioBuilder::new_current_thread(),
        };
        if let Some(max) = self.max_blocking_threads {
            builder.max_blocking_threads(max.max(1));
        }

        let next = AtomicUsize::new(0);
        let name = self.thread_name;
        builder
            .enable_all()
            .thread_name_fn(move || format!("{name}-{}", next.fetch_add(1, Ordering::Relaxed)));
        builder.build().context(error::BuildSnafu)
    }
}

/// Builds a current-thread runtime for driving cooperative workers from the
/// calling thread.
pub fn create_current_thread_runtime(thread_name: impl Into<String>) -> Result<Runtime> {
    RuntimeOptions::builder()
        .flavor(Flavor::CurrentThread)
        .thread_name(thread_name)
        .build()
        .create()
}
