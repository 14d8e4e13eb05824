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

//! Loops that feed commands from an [`OperationQueue`] to a worker.
//!
//! Both drivers share one contract: commands are handled strictly one at a
//! time in FIFO order, a failing or panicking command is logged and the loop
//! moves on, a fatal error or [`Flow::Stop`] ends the loop, and the queue is
//! quit on exit so late submitters fail instead of blocking.

use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    blocking::BlockingWorker,
    config::WorkerConfig,
    err::{WorkError, WorkResult},
    handle::{TaskHandle, ThreadHandle},
    metrics::{
        WORKER_ACTIVE, WORKER_EXECUTION_DURATION_SECONDS, WORKER_EXECUTION_ERRORS,
        WORKER_EXECUTIONS, WORKER_PANICS, WORKER_STARTED, WORKER_STOPPED, WORKER_TICKS,
    },
    op_queue::{Dequeued, OperationQueue},
    worker::{Flow, Worker},
};

/// Runs `worker` on a dedicated OS thread named after the config.
///
/// # Errors
/// Fails if the thread cannot be spawned.
pub fn spawn_thread<C, W>(
    config: &WorkerConfig,
    queue: Arc<OperationQueue<C>>,
    worker: W,
) -> WorkResult<ThreadHandle<C>>
where
    C: Send + 'static,
    W: BlockingWorker<C>,
{
    let name = config.name().to_string();
    let cancel = CancellationToken::new();
    let tick = config.tick_interval();

    let join = {
        let name = name.clone();
        let cancel = cancel.clone();
        let queue = Arc::clone(&queue);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_blocking(&name, tick, &queue, &cancel, worker))
            .map_err(|e| WorkError::fatal_with_source("failed to spawn worker thread", e))?
    };

    Ok(ThreadHandle::new(name, cancel, queue, join))
}

/// Runs `worker` as a task on `runtime`.
///
/// On a current-thread runtime this is the cooperative model: the worker
/// only makes progress while the owner drives the runtime, and yields at
/// every await point.
pub fn spawn_task<C, W>(
    config: &WorkerConfig,
    queue: Arc<OperationQueue<C>>,
    worker: W,
    runtime: &tokio::runtime::Handle,
) -> TaskHandle<C>
where
    C: Send + 'static,
    W: Worker<C>,
{
    let name = config.name().to_string();
    let cancel = CancellationToken::new();
    let join = runtime.spawn(run_async(
        name.clone(),
        config.tick_interval(),
        Arc::clone(&queue),
        cancel.clone(),
        worker,
    ));
    TaskHandle::new(name, cancel, queue, join, config.shutdown_timeout())
}

struct Ticker {
    every: Duration,
    next:  Instant,
}

impl Ticker {
    fn new(every: Duration) -> Self {
        Ticker {
            every,
            next: Instant::now() + every,
        }
    }

    fn due(&self) -> bool { Instant::now() >= self.next }

    fn reset(&mut self) { self.next = Instant::now() + self.every; }
}

fn run_blocking<C, W>(
    name: &str,
    tick: Option<Duration>,
    queue: &OperationQueue<C>,
    cancel: &CancellationToken,
    mut worker: W,
) where
    C: Send + 'static,
    W: BlockingWorker<C>,
{
    info!(worker = name, ?tick, "worker starting");
    WORKER_STARTED.with_label_values(&[name]).inc();
    WORKER_ACTIVE.with_label_values(&[name]).set(1);

    let started = catch_unwind(AssertUnwindSafe(|| worker.on_start().map(|()| Flow::Continue)));
    if settle(name, "on_start", started) == Flow::Continue {
        let mut ticker = tick.map(Ticker::new);
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(t) = ticker.as_mut()
                && t.due()
            {
                t.reset();
                WORKER_TICKS.with_label_values(&[name]).inc();
                let ticked =
                    catch_unwind(AssertUnwindSafe(|| worker.on_tick().map(|()| Flow::Continue)));
                if settle(name, "on_tick", ticked) == Flow::Stop {
                    break;
                }
                continue;
            }

            let command = match ticker.as_ref() {
                Some(t) => match queue.dequeue_deadline(t.next) {
                    Dequeued::Item(command) => command,
                    Dequeued::TimedOut => continue,
                    Dequeued::Closed => break,
                },
                None => match queue.dequeue() {
                    Some(command) => command,
                    None => break,
                },
            };
            if cancel.is_cancelled() {
                break;
            }

            let start = Instant::now();
            let outcome = catch_unwind(AssertUnwindSafe(|| worker.work(command)));
            record_execution(name, start);
            if settle(name, "work", outcome) == Flow::Stop {
                break;
            }
        }

        let stopped = catch_unwind(AssertUnwindSafe(|| worker.on_shutdown().map(|()| Flow::Continue)));
        settle(name, "on_shutdown", stopped);
    }

    queue.quit();
    info!(worker = name, "worker stopped");
    WORKER_STOPPED.with_label_values(&[name]).inc();
    WORKER_ACTIVE.with_label_values(&[name]).set(0);
}

async fn run_async<C, W>(
    name: String,
    tick: Option<Duration>,
    queue: Arc<OperationQueue<C>>,
    cancel: CancellationToken,
    mut worker: W,
) where
    C: Send + 'static,
    W: Worker<C>,
{
    let name = name.as_str();
    info!(worker = name, ?tick, "worker starting");
    WORKER_STARTED.with_label_values(&[name]).inc();
    WORKER_ACTIVE.with_label_values(&[name]).set(1);

    let started = AssertUnwindSafe(worker.on_start()).catch_unwind().await;
    if settle(name, "on_start", started.map(|r| r.map(|()| Flow::Continue))) == Flow::Continue {
        let mut ticker = tick.map(Ticker::new);
        loop {
            let deadline = ticker.as_ref().map(|t| t.next);
            let command = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = sleep_until(deadline) => None,
                command = queue.dequeue_async() => match command {
                    Some(command) => Some(command),
                    None => break,
                },
            };

            match command {
                None => {
                    if let Some(t) = ticker.as_mut() {
                        t.reset();
                    }
                    WORKER_TICKS.with_label_values(&[name]).inc();
                    let ticked = AssertUnwindSafe(worker.on_tick()).catch_unwind().await;
                    if settle(name, "on_tick", ticked.map(|r| r.map(|()| Flow::Continue)))
                        == Flow::Stop
                    {
                        break;
                    }
                }
                Some(command) => {
                    let start = Instant::now();
                    let outcome = AssertUnwindSafe(worker.work(command)).catch_unwind().await;
                    record_execution(name, start);
                    if settle(name, "work", outcome) == Flow::Stop {
                        break;
                    }
                }
            }
        }

        let stopped = AssertUnwindSafe(worker.on_shutdown()).catch_unwind().await;
        settle(name, "on_shutdown", stopped.map(|r| r.map(|()| Flow::Continue)));
    }

    queue.quit();
    info!(worker = name, "worker stopped");
    WORKER_STOPPED.with_label_values(&[name]).inc();
    WORKER_ACTIVE.with_label_values(&[name]).set(0);
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn record_execution(name: &str, start: Instant) {
    WORKER_EXECUTIONS.with_label_values(&[name]).inc();
    WORKER_EXECUTION_DURATION_SECONDS
        .with_label_values(&[name])
        .observe(start.elapsed().as_secs_f64());
}

/// Maps a hook outcome to what the loop does next.
fn settle(
    name: &str,
    hook: &'static str,
    outcome: Result<WorkResult<Flow>, Box<dyn Any + Send>>,
) -> Flow {
    match outcome {
        Ok(Ok(flow)) => {
            if flow == Flow::Stop {
                debug!(worker = name, hook, "worker requested stop");
            }
            flow
        }
        Ok(Err(e)) if e.is_fatal() => {
            error!(worker = name, hook, error = %e, "fatal worker error");
            WORKER_EXECUTION_ERRORS.with_label_values(&[name]).inc();
            Flow::Stop
        }
        Ok(Err(e)) => {
            warn!(worker = name, hook, error = %e, "worker error");
            WORKER_EXECUTION_ERRORS.with_label_values(&[name]).inc();
            Flow::Continue
        }
        Err(payload) => {
            error!(worker = name, hook, panic = panic_message(payload.as_ref()), "worker panicked");
            WORKER_PANICS.with_label_values(&[name]).inc();
            Flow::Continue
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
