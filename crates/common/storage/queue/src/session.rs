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

//! Transactional unit of work over a [`Queue`].

use std::mem;

use bytes::Bytes;
use crossbeam::channel::{Receiver, bounded};
use tracing::debug;

use crate::{
    Queue, QueueError, Result,
    entry::{Operation, OperationType},
    io_worker::WriteJob,
};

/// Groups enqueues and dequeues into one durable commit.
///
/// Enqueued bytes are buffered and only become visible once [`flush`]
/// returns. Dropping a session without flushing reinstates its dequeues
/// and discards its enqueues. A session is meant for one caller at a time.
///
/// [`flush`]: Session::flush
pub struct Session<'q> {
    queue:      &'q Queue,
    buffer:     Vec<Bytes>,
    buffered:   usize,
    pending:    Vec<Receiver<Result<Vec<Operation>>>>,
    operations: Vec<Operation>,
}

impl<'q> Session<'q> {
    pub(crate) const fn new(queue: &'q Queue) -> Self {
        Self {
            queue,
            buffer: Vec::new(),
            buffered: 0,
            pending: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Buffers one entry. Large buffers are written in the background.
    pub fn enqueue(&mut self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        self.buffered += data.len();
        self.buffer.push(data);
        if self.buffered > self.queue.config().async_write_threshold {
            self.write_async()?;
        }
        Ok(())
    }

    /// Takes the head entry. `None` means the queue has nothing left for
    /// this session.
    pub fn dequeue(&mut self) -> Result<Option<Bytes>> {
        let Some(entry) = self.queue.checkout()? else {
            return Ok(None);
        };
        self.operations.push(entry.operation(OperationType::Dequeue));
        Ok(entry.data)
    }

    /// Waits for background writes, writes what is still buffered and
    /// commits everything since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        self.wait_for_pending()?;
        if !self.buffer.is_empty() {
            let items = self.take_buffer();
            let ops = self.queue.storage().append(&items)?;
            self.operations.extend(ops);
        }
        self.queue.commit(&self.operations)?;
        self.operations.clear();
        Ok(())
    }

    fn take_buffer(&mut self) -> Vec<Bytes> {
        self.buffered = 0;
        mem::take(&mut self.buffer)
    }

    fn write_async(&mut self) -> Result<()> {
        let items = self.take_buffer();
        let (reply, rx) = bounded(1);
        self.queue.submit_write(WriteJob { items, reply })?;
        self.pending.push(rx);
        Ok(())
    }

    fn wait_for_pending(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for rx in self.pending.drain(..) {
            match rx.recv() {
                Ok(Ok(ops)) => self.operations.extend(ops),
                Ok(Err(e)) => failures.push(e),
                Err(_) => failures.push(QueueError::WriterUnavailable),
            }
        }
        let count = failures.len();
        match failures.into_iter().next() {
            None => Ok(()),
            Some(first) => Err(QueueError::PendingWrites {
                count,
                source: Box::new(first),
            }),
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        // Background writes must be collected before they can be released.
        let _ = self.wait_for_pending();
        if !self.operations.is_empty() {
            debug!(
                operations = self.operations.len(),
                "Reinstating uncommitted session"
            );
            self.queue.reinstate(&self.operations);
        }
    }
}
