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

use std::sync::Arc;

use bytes::Bytes;
use courier_common_worker::{
    Handle, OperationQueue, RuntimeScheduler, Scheduler, SubmitError, TaskHandle, ThreadHandle,
    WorkError, WorkerConfig, spawn_task, spawn_thread,
};
use serde::Serialize;
use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    command::{Command, QueueKind},
    config::DeliveryOptions,
    dispatch::{Dispatcher, QueueSet},
    driver::{CooperativeDelivery, ThreadDelivery},
    error::{DeliveryError, EncodeSnafu, JoinSnafu, Result, RuntimeSnafu, SpawnSnafu},
    transport::{AsyncHttpTransport, AsyncTransport, BlockingTransport, HttpTransport},
};

const WORKER_NAME: &str = "courier-delivery";

enum Running {
    Thread(ThreadHandle<Command>),
    Task(TaskHandle<Command>),
}

impl Running {
    fn stop(&self) {
        match self {
            Running::Thread(handle) => handle.stop(),
            Running::Task(handle) => handle.stop(),
        }
    }
}

/// Handle to the delivery worker and its two queues.
///
/// Producers hand payloads over with [`track`](Delivery::track) and
/// [`engage`](Delivery::engage); the worker writes them to disk and sends
/// them in batches every `flush_interval` or on [`flush`](Delivery::flush).
/// Network failures never reach the caller: rejected batches stay queued and
/// are retried with exponential backoff.
pub struct Delivery {
    queues:   Arc<QueueSet>,
    commands: Arc<OperationQueue<Command>>,
    running:  Option<Running>,
}

impl Delivery {
    /// Starts the worker on a dedicated thread with a blocking HTTP client.
    /// Retry timers run on the shared background runtime.
    pub fn start(options: DeliveryOptions) -> Result<Self> {
        let scheduler = RuntimeScheduler::background().context(RuntimeSnafu)?;
        let transport = HttpTransport::new(options.request_timeout);
        Self::start_with(options, transport, Arc::new(scheduler))
    }

    pub fn start_with<T: BlockingTransport>(
        options: DeliveryOptions,
        transport: T,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let (queues, commands, dispatcher) = Self::prepare(&options, scheduler)?;
        let worker = ThreadDelivery::new(dispatcher, transport);
        let handle = spawn_thread(&Self::worker_config(&options), Arc::clone(&commands), worker)
            .context(SpawnSnafu)?;

        info!(data_dir = ?options.data_dir, mode = "thread", "delivery started");
        Ok(Delivery {
            queues,
            commands,
            running: Some(Running::Thread(handle)),
        })
    }

    /// Starts the worker as a task on `runtime`, posting with an async client.
    ///
    /// With a current-thread runtime the worker only advances while the host
    /// drives that runtime, and never blocks it during network I/O.
    pub fn start_cooperative(
        options: DeliveryOptions,
        runtime: &tokio::runtime::Handle,
    ) -> Result<Self> {
        let transport = AsyncHttpTransport::new(options.request_timeout)?;
        let scheduler = RuntimeScheduler::new(runtime.clone());
        Self::start_cooperative_with(options, transport, Arc::new(scheduler), runtime)
    }

    pub fn start_cooperative_with<T: AsyncTransport>(
        options: DeliveryOptions,
        transport: T,
        scheduler: Arc<dyn Scheduler>,
        runtime: &tokio::runtime::Handle,
    ) -> Result<Self> {
        let (queues, commands, dispatcher) = Self::prepare(&options, scheduler)?;
        let worker = CooperativeDelivery::new(dispatcher, transport);
        let handle = spawn_task(
            &Self::worker_config(&options),
            Arc::clone(&commands),
            worker,
            runtime,
        );

        info!(data_dir = ?options.data_dir, mode = "cooperative", "delivery started");
        Ok(Delivery {
            queues,
            commands,
            running: Some(Running::Task(handle)),
        })
    }

    fn prepare(
        options: &DeliveryOptions,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<(Arc<QueueSet>, Arc<OperationQueue<Command>>, Dispatcher)> {
        options.validate()?;
        let queues = Arc::new(QueueSet::open(options)?);
        let commands = Arc::new(OperationQueue::new(options.command_capacity));
        let dispatcher = Dispatcher::new(options, Arc::clone(&queues), scheduler, &commands);
        Ok((queues, commands, dispatcher))
    }

    fn worker_config(options: &DeliveryOptions) -> WorkerConfig {
        WorkerConfig::builder()
            .name(WORKER_NAME)
            .tick_interval(options.flush_interval)
            .build()
    }

    /// Queues an event payload, blocking while the command queue is full.
    pub fn track(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.submit(Command::enqueue(QueueKind::Track, payload))
    }

    /// Queues a people-update payload, blocking while the command queue is
    /// full.
    pub fn engage(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.submit(Command::enqueue(QueueKind::Engage, payload))
    }

    /// Serializes `value` as JSON and queues it as an event.
    pub fn track_value<V: Serialize + ?Sized>(&self, value: &V) -> Result<()> {
        let payload = serde_json::to_vec(value).context(EncodeSnafu)?;
        self.track(payload)
    }

    pub fn engage_value<V: Serialize + ?Sized>(&self, value: &V) -> Result<()> {
        let payload = serde_json::to_vec(value).context(EncodeSnafu)?;
        self.engage(payload)
    }

    /// Requests a flush. Ignored while a retry is pending.
    pub fn flush(&self) -> Result<()> { self.submit(Command::Flush) }

    /// Requests a flush even while a retry is pending.
    pub fn force_flush(&self) -> Result<()> { self.submit(Command::ForceFlush) }

    /// Discards everything queued on both queues.
    pub fn clear(&self) -> Result<()> { self.submit(Command::ClearQueue) }

    pub fn submit(&self, command: Command) -> Result<()> {
        self.commands.enqueue(command).map_err(submit_error)
    }

    /// Submits without waiting; fails with `Backpressure` when full.
    pub fn try_submit(&self, command: Command) -> Result<()> {
        self.commands.try_enqueue(command).map_err(submit_error)
    }

    /// Submits, yielding to the executor while the command queue is full.
    pub async fn submit_async(&self, command: Command) -> Result<()> {
        self.commands
            .enqueue_async(command)
            .await
            .map_err(submit_error)
    }

    /// Entries stored in `kind`'s queue, including ones being sent.
    pub fn depth(&self, kind: QueueKind) -> usize { self.queues.depth(kind) }

    /// Commands waiting for the worker.
    pub fn pending_commands(&self) -> usize { self.commands.len() }

    pub fn is_running(&self) -> bool {
        match &self.running {
            Some(Running::Thread(handle)) => !handle.is_finished(),
            Some(Running::Task(handle)) => !handle.is_finished(),
            None => false,
        }
    }

    /// Stops the worker without handling queued commands.
    ///
    /// Returns immediately; a batch already being posted completes first.
    /// Queued payloads that were not yet written to disk are lost.
    pub fn stop(&self) {
        if let Some(running) = &self.running {
            running.stop();
        }
    }

    /// Stops the worker after every queued command and closes the queues.
    ///
    /// In cooperative mode this only schedules the stop, as waiting here
    /// could block the runtime the worker needs; use
    /// [`shutdown_async`](Delivery::shutdown_async) to wait.
    pub fn shutdown(mut self) -> Result<()> {
        self.request_kill();
        match self.running.take() {
            Some(Running::Thread(handle)) => {
                handle.join().context(JoinSnafu)?;
                self.close()
            }
            Some(Running::Task(_)) | None => Ok(()),
        }
    }

    /// Like [`shutdown`](Delivery::shutdown) but waits in both modes.
    pub async fn shutdown_async(mut self) -> Result<()> {
        self.request_kill();
        match self.running.take() {
            Some(Running::Thread(handle)) => {
                tokio::task::spawn_blocking(move || handle.join())
                    .await
                    .map_err(|e| WorkError::fatal_with_source("delivery join task failed", e))
                    .and_then(|joined| joined)
                    .context(JoinSnafu)?;
            }
            Some(Running::Task(handle)) => handle.join().await.context(JoinSnafu)?,
            None => {}
        }
        self.close()
    }

    fn request_kill(&self) {
        if let Err(SubmitError::Closed(_)) = self.commands.enqueue(Command::KillThread) {
            warn!("delivery worker already stopped");
        }
    }

    fn close(&self) -> Result<()> {
        self.queues.close()?;
        info!("delivery stopped");
        Ok(())
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop();
        }
    }
}

fn submit_error(e: SubmitError<Command>) -> DeliveryError {
    match e {
        SubmitError::Full(_) => DeliveryError::Backpressure,
        SubmitError::Closed(_) => DeliveryError::Stopped,
    }
}
