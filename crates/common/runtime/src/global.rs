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

//! Process-wide runtimes.
//!
//! `background` drives timers and housekeeping tasks, `network_io` drives
//! asynchronous HTTP delivery. Both are created lazily with default options
//! unless [`init_global_runtimes`] ran first.

use std::{future::Future, sync::Arc};

use once_cell::sync::OnceCell;
use snafu::ensure;
use tokio::{runtime::Runtime, task::JoinHandle};

use crate::{
    error::{AlreadyInitializedSnafu, Result},
    options::{GlobalRuntimeOptions, RuntimeOptions},
};

#[derive(Debug)]
struct GlobalRuntimes {
    network_io: Arc<Runtime>,
    background: Arc<Runtime>,
}

static GLOBAL_RUNTIMES: OnceCell<GlobalRuntimes> = OnceCell::new();

fn build_global_runtimes(options: &GlobalRuntimeOptions) -> Result<GlobalRuntimes> {
    let network_io = RuntimeOptions::builder()
        .thread_name("courier-net")
        .worker_threads(options.network_io_threads)
        .max_blocking_threads(options.max_blocking_threads)
        .build()
        .create()?;
    let background = RuntimeOptions::builder()
        .thread_name("courier-bg")
        .worker_threads(options.background_threads)
        .max_blocking_threads(options.max_blocking_threads)
        .build()
        .create()?;

    Ok(GlobalRuntimes {
        network_io: Arc::new(network_io),
        background: Arc::new(background),
    })
}

fn global_runtimes() -> Result<&'static GlobalRuntimes> {
    GLOBAL_RUNTIMES.get_or_try_init(|| build_global_runtimes(&GlobalRuntimeOptions::default()))
}

/// Initialize global runtimes with custom options. Fails if they already
/// exist, including when a default instance was created lazily.
pub fn init_global_runtimes(options: &GlobalRuntimeOptions) -> Result<()> {
    ensure!(GLOBAL_RUNTIMES.get().is_none(), AlreadyInitializedSnafu);
    let runtimes = build_global_runtimes(options)?;
    GLOBAL_RUNTIMES
        .set(runtimes)
        .map_err(|_| AlreadyInitializedSnafu.build())
}

pub fn network_io_runtime() -> Result<Arc<Runtime>> {
    Ok(Arc::clone(&global_runtimes()?.network_io))
}

pub fn background_runtime() -> Result<Arc<Runtime>> {
    Ok(Arc::clone(&global_runtimes()?.background))
}

pub fn block_on_network_io<F>(future: F) -> Result<F::Output>
where
    F: Future,
{
    Ok(network_io_runtime()?.block_on(future))
}

pub fn spawn_background<F>(future: F) -> Result<JoinHandle<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Ok(background_runtime()?.handle().spawn(future))
}
