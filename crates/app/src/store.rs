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

//! One-shot operations on the queues of a stopped service.
//!
//! Each call opens both queues, so it fails with a lock error while a
//! service is running on the same `data_dir`.

use bytes::Bytes;
use courier_delivery::{DeliveryOptions, QueueKind, QueueSet};
use snafu::ResultExt;
use tracing::info;

use crate::error::{DeliverySnafu, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display("track: {track}\nengage: {engage}")]
pub struct QueueStats {
    pub track:  usize,
    pub engage: usize,
}

fn with_queues<T>(
    options: &DeliveryOptions,
    f: impl FnOnce(&QueueSet) -> courier_delivery::Result<T>,
) -> Result<T> {
    let queues = QueueSet::open(options).context(DeliverySnafu)?;
    let result = f(&queues);
    let closed = queues.close();
    let value = result.context(DeliverySnafu)?;
    closed.context(DeliverySnafu)?;
    Ok(value)
}

/// Durably appends one payload to `kind`'s queue.
pub fn enqueue(options: &DeliveryOptions, kind: QueueKind, payload: Bytes) -> Result<()> {
    let len = payload.len();
    with_queues(options, |queues| queues.enqueue(kind, payload))?;
    info!(queue = %kind, bytes = len, "payload enqueued");
    Ok(())
}

pub fn stats(options: &DeliveryOptions) -> Result<QueueStats> {
    with_queues(options, |queues| {
        Ok(QueueStats {
            track:  queues.depth(QueueKind::Track),
            engage: queues.depth(QueueKind::Engage),
        })
    })
}

/// Discards both queues, returning the number of dropped entries.
pub fn clear(options: &DeliveryOptions) -> Result<usize> {
    let dropped = with_queues(options, QueueSet::clear)?;
    info!(dropped, "queues cleared");
    Ok(dropped)
}
