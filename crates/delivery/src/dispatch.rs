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

//! Command handling shared by the thread and cooperative drivers.
//!
//! Everything except the HTTP round trip lives here. A driver asks the
//! [`Dispatcher`] to [`prepare`](Dispatcher::prepare) a command; if that
//! yields a flush, the driver walks the batches with
//! [`next_batch`](Dispatcher::next_batch), posts each body in its own way and
//! hands the outcome back to [`settle`](Dispatcher::settle).

use std::{
    mem,
    sync::{Arc, Weak},
    time::Duration,
};

use bytes::Bytes;
use courier_common_storage_queue::{Queue, Session};
use courier_common_worker::{CancelToken, OperationQueue, Scheduler};
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    command::{Command, QueueKind},
    config::DeliveryOptions,
    encode::encode_batch,
    error::{QueueSnafu, Result},
    machine::{DeliveryMachine, Effect, Event},
    metrics::{
        DELIVERY_BATCHES, DELIVERY_ENTRIES, DELIVERY_FLUSHES_SUPPRESSED, DELIVERY_RETRIES_ARMED,
        QUEUE_DEPTH,
    },
};

/// The track and engage queues, opened side by side under one data dir.
pub struct QueueSet {
    track:  Queue,
    engage: Queue,
}

impl QueueSet {
    pub fn open(options: &DeliveryOptions) -> Result<Self> {
        let track = options
            .queue_builder(QueueKind::Track)
            .open()
            .context(QueueSnafu)?;
        let engage = options
            .queue_builder(QueueKind::Engage)
            .open()
            .context(QueueSnafu)?;
        Ok(QueueSet { track, engage })
    }

    pub const fn get(&self, kind: QueueKind) -> &Queue {
        match kind {
            QueueKind::Track => &self.track,
            QueueKind::Engage => &self.engage,
        }
    }

    pub fn depth(&self, kind: QueueKind) -> usize { self.get(kind).len() }

    /// Durably appends one payload.
    pub fn enqueue(&self, kind: QueueKind, payload: Bytes) -> Result<()> {
        let mut session = self.get(kind).open_session().context(QueueSnafu)?;
        session.enqueue(payload).context(QueueSnafu)?;
        session.flush().context(QueueSnafu)
    }

    /// Discards both queues and returns how many entries were dropped.
    pub fn clear(&self) -> Result<usize> {
        let mut dropped = 0;
        for kind in QueueKind::ALL {
            dropped += self.get(kind).clear().context(QueueSnafu)?;
        }
        Ok(dropped)
    }

    pub fn close(&self) -> Result<()> {
        let track = self.track.close().context(QueueSnafu);
        let engage = self.engage.close().context(QueueSnafu);
        track.and(engage)
    }
}

/// One dequeued, encoded, not yet committed batch.
pub(crate) struct Batch<'q> {
    session: Session<'q>,
    body:    String,
    len:     usize,
}

impl Batch<'_> {
    pub(crate) fn take_body(&mut self) -> String { mem::take(&mut self.body) }
}

/// What a driver must do after [`Dispatcher::prepare`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Done,
    Flush,
    Stop,
}

pub(crate) struct Dispatcher {
    queues:     Arc<QueueSet>,
    machine:    DeliveryMachine,
    batch_size: usize,
    track_url:  String,
    engage_url: String,
    scheduler:  Arc<dyn Scheduler>,
    commands:   Weak<OperationQueue<Command>>,
    retry:      Option<CancelToken>,
}

impl Dispatcher {
    pub(crate) fn new(
        options: &DeliveryOptions,
        queues: Arc<QueueSet>,
        scheduler: Arc<dyn Scheduler>,
        commands: &Arc<OperationQueue<Command>>,
    ) -> Self {
        Dispatcher {
            queues,
            machine: DeliveryMachine::new(options.backoff()),
            batch_size: options.batch_size,
            track_url: options.track_url.clone(),
            engage_url: options.engage_url.clone(),
            scheduler,
            commands: Arc::downgrade(commands),
            retry: None,
        }
    }

    pub(crate) fn queues(&self) -> Arc<QueueSet> { Arc::clone(&self.queues) }

    pub(crate) fn url(&self, kind: QueueKind) -> &str {
        match kind {
            QueueKind::Track => &self.track_url,
            QueueKind::Engage => &self.engage_url,
        }
    }

    /// Handles every command locally except for the network part of a flush.
    pub(crate) fn prepare(&mut self, command: Command) -> Result<Step> {
        match command {
            Command::EnqueueEvents(payload) => self.enqueue(QueueKind::Track, payload),
            Command::EnqueuePeople(payload) => self.enqueue(QueueKind::Engage, payload),
            Command::Flush => Ok(self.begin_flush(false)),
            Command::ForceFlush => Ok(self.begin_flush(true)),
            Command::ClearQueue => {
                let dropped = self.queues.clear()?;
                info!(dropped, "queues cleared");
                self.apply(Event::Cleared);
                self.record_depth();
                Ok(Step::Done)
            }
            Command::KillThread => Ok(Step::Stop),
        }
    }

    fn enqueue(&self, kind: QueueKind, payload: Bytes) -> Result<Step> {
        self.queues.enqueue(kind, payload)?;
        QUEUE_DEPTH
            .with_label_values(&[kind.as_str()])
            .set(gauge(self.queues.depth(kind)));
        Ok(Step::Done)
    }

    fn begin_flush(&mut self, forced: bool) -> Step {
        if self.machine.handle(Event::Flush { forced }).contains(&Effect::SkipFlush) {
            debug!(retry = self.machine.retry_count(), "flush suppressed while backing off");
            DELIVERY_FLUSHES_SUPPRESSED.inc();
            Step::Done
        } else {
            Step::Flush
        }
    }

    /// Number of batches a flush of `kind` may send, fixed at flush start.
    pub(crate) fn batch_count(&self, kind: QueueKind) -> usize {
        self.queues.depth(kind).div_ceil(self.batch_size)
    }

    /// Dequeues up to `batch_size` entries. `None` once the queue is empty.
    pub(crate) fn next_batch<'q>(
        &self,
        queues: &'q QueueSet,
        kind: QueueKind,
    ) -> Result<Option<Batch<'q>>> {
        let mut session = queues.get(kind).open_session().context(QueueSnafu)?;
        let mut payloads = Vec::with_capacity(self.batch_size);
        while payloads.len() < self.batch_size {
            match session.dequeue().context(QueueSnafu)? {
                Some(payload) => payloads.push(payload),
                None => break,
            }
        }
        if payloads.is_empty() {
            return Ok(None);
        }

        let body = encode_batch(&payloads)?;
        Ok(Some(Batch {
            session,
            body,
            len: payloads.len(),
        }))
    }

    /// Commits or reinstates `batch` depending on the POST outcome.
    ///
    /// Returns whether the flush may go on with the next batch.
    pub(crate) fn settle(
        &mut self,
        kind: QueueKind,
        batch: Batch<'_>,
        outcome: Result<u16>,
    ) -> Result<bool> {
        let event = match &outcome {
            Ok(200) => Event::BatchDelivered,
            Ok(status) => {
                warn!(queue = %kind, status, entries = batch.len, "batch rejected");
                Event::BatchRejected
            }
            Err(e) => {
                warn!(queue = %kind, error = %e, entries = batch.len, "batch delivery failed");
                Event::BatchRejected
            }
        };

        let mut batch = Some(batch);
        let mut proceed = true;
        for effect in self.machine.handle(event) {
            match effect {
                Effect::CommitBatch => {
                    if let Some(mut batch) = batch.take() {
                        batch.session.flush().context(QueueSnafu)?;
                        debug!(queue = %kind, entries = batch.len, "batch delivered");
                        DELIVERY_BATCHES
                            .with_label_values(&[kind.as_str(), "delivered"])
                            .inc();
                        DELIVERY_ENTRIES
                            .with_label_values(&[kind.as_str()])
                            .inc_by(batch.len as u64);
                    }
                }
                Effect::ReinstateBatch => {
                    drop(batch.take());
                    DELIVERY_BATCHES
                        .with_label_values(&[kind.as_str(), "rejected"])
                        .inc();
                }
                Effect::CancelRetry => self.cancel_retry(),
                Effect::ArmRetry(delay) => self.arm_retry(delay),
                Effect::AbortFlush => proceed = false,
                Effect::BeginFlush | Effect::SkipFlush => {}
            }
        }
        self.record_depth();
        Ok(proceed)
    }

    /// Cancels the pending retry timer, if any.
    pub(crate) fn shutdown(&mut self) { self.cancel_retry(); }

    fn apply(&mut self, event: Event) {
        for effect in self.machine.handle(event) {
            if effect == Effect::CancelRetry {
                self.cancel_retry();
            }
        }
    }

    fn arm_retry(&mut self, delay: Duration) {
        self.cancel_retry();
        info!(?delay, retry = self.machine.retry_count(), "retry armed");
        DELIVERY_RETRIES_ARMED.inc();

        let commands = Weak::clone(&self.commands);
        let token = self.scheduler.schedule_after(
            delay,
            Box::new(move || {
                if let Some(commands) = commands.upgrade()
                    && let Err(e) = commands.enqueue(Command::ForceFlush)
                {
                    debug!(error = %e, "retry flush dropped");
                }
            }),
        );
        self.retry = Some(token);
    }

    fn cancel_retry(&mut self) {
        if let Some(token) = self.retry.take() {
            token.cancel();
        }
    }

    fn record_depth(&self) {
        for kind in QueueKind::ALL {
            QUEUE_DEPTH
                .with_label_values(&[kind.as_str()])
                .set(gauge(self.queues.depth(kind)));
        }
    }
}

fn gauge(depth: usize) -> i64 { i64::try_from(depth).unwrap_or(i64::MAX) }
