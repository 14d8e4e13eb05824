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

//! Flush and retry decisions, free of I/O.
//!
//! Both drivers feed the same [`DeliveryMachine`] and carry out the effects
//! it returns, so suppression, retry counting and backoff are decided in one
//! place.

use std::time::Duration;

/// Exponential backoff: `min(base * 2^retries, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max:  Duration,
}

impl Backoff {
    pub const fn new(base: Duration, max: Duration) -> Self { Backoff { base, max } }

    /// Delay before retry number `retries` (1-based).
    pub fn delay(&self, retries: u32) -> Duration {
        let factor = 1_u32.checked_shl(retries).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A flush was requested; `forced` ignores a pending retry.
    Flush { forced: bool },
    /// The endpoint answered 200.
    BatchDelivered,
    /// Any other status or a transport failure.
    BatchRejected,
    /// Both queues were discarded.
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Ignore this flush request.
    SkipFlush,
    /// Start sending batches.
    BeginFlush,
    /// Commit the in-flight batch, removing it from disk.
    CommitBatch,
    /// Put the in-flight batch back at the head of its queue.
    ReinstateBatch,
    /// Cancel any armed retry timer.
    CancelRetry,
    /// Cancel any armed retry timer, then arm a new one.
    ArmRetry(Duration),
    /// Send nothing more in this flush.
    AbortFlush,
}

#[derive(Debug, Clone)]
pub struct DeliveryMachine {
    backoff:     Backoff,
    retry_count: u32,
}

impl DeliveryMachine {
    pub const fn new(backoff: Backoff) -> Self {
        DeliveryMachine {
            backoff,
            retry_count: 0,
        }
    }

    /// Consecutive rejected batches since the last success.
    pub const fn retry_count(&self) -> u32 { self.retry_count }

    pub const fn is_backing_off(&self) -> bool { self.retry_count > 0 }

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Flush { forced: false } if self.is_backing_off() => vec![Effect::SkipFlush],
            Event::Flush { .. } => vec![Effect::BeginFlush],
            Event::BatchDelivered => {
                let was_backing_off = self.is_backing_off();
                self.retry_count = 0;
                if was_backing_off {
                    vec![Effect::CancelRetry, Effect::CommitBatch]
                } else {
                    vec![Effect::CommitBatch]
                }
            }
            Event::BatchRejected => {
                self.retry_count = self.retry_count.saturating_add(1);
                vec![
                    Effect::ReinstateBatch,
                    Effect::ArmRetry(self.backoff.delay(self.retry_count)),
                    Effect::AbortFlush,
                ]
            }
            Event::Cleared => {
                self.retry_count = 0;
                vec![Effect::CancelRetry]
            }
        }
    }
}
