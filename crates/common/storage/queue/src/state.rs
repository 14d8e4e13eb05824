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

//! In-memory view of a queue: live entries, in-flight entries and per-file
//! reference counts.

use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::entry::{Operation, OperationType, QueueEntry};

#[derive(Debug, Default)]
pub(crate) struct EntryState {
    /// Entries in dequeue order.
    pub entries:      VecDeque<QueueEntry>,
    /// Entries handed out by an uncommitted dequeue.
    pub checked_out:  Vec<QueueEntry>,
    /// Committed, not yet consumed entries per data file.
    count_per_file:   HashMap<u32, usize>,
    /// Entries written by sessions that have not committed yet, per data file.
    /// Keeps a file alive while an enqueue into it is still in flight.
    pending_per_file: HashMap<u32, usize>,
}

impl EntryState {
    pub fn with_entries(entries: VecDeque<QueueEntry>) -> Self {
        let mut count_per_file = HashMap::new();
        for entry in &entries {
            *count_per_file.entry(entry.file_number).or_insert(0) += 1;
        }
        Self {
            entries,
            count_per_file,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize { self.entries.len() + self.checked_out.len() }

    pub fn live_count(&self, file_number: u32) -> usize {
        self.count_per_file.get(&file_number).copied().unwrap_or(0)
            + self.pending_per_file.get(&file_number).copied().unwrap_or(0)
    }

    /// Marks freshly written, uncommitted entries so their file survives
    /// until the owning session commits or aborts.
    pub fn pin(&mut self, ops: &[Operation]) {
        for op in ops {
            *self.pending_per_file.entry(op.file_number).or_insert(0) += 1;
        }
    }

    /// Applies committed operations and returns files that no longer hold
    /// any live entry.
    pub fn apply(&mut self, ops: &[Operation]) -> Vec<u32> {
        let mut drained = Vec::new();
        for op in ops {
            let entry = QueueEntry::from(op);
            match op.kind {
                OperationType::Enqueue => {
                    self.unpin_one(op.file_number);
                    *self.count_per_file.entry(op.file_number).or_insert(0) += 1;
                    self.entries.push_back(entry);
                }
                OperationType::Dequeue => {
                    if !self.take_checked_out(&entry) && !self.remove_live(&entry) {
                        warn!(?entry, "Committed dequeue of an unknown entry");
                        continue;
                    }
                    if self.release(op.file_number) {
                        drained.push(op.file_number);
                    }
                }
                OperationType::Reinstate => {
                    self.take_checked_out(&entry);
                    self.entries.push_front(entry);
                }
            }
        }
        drained
    }

    /// Undoes an aborted session: its dequeues go back to the head in their
    /// original order and its written enqueues are released.
    pub fn reinstate(&mut self, ops: &[Operation]) -> Vec<u32> {
        let mut drained = Vec::new();
        for op in ops.iter().rev() {
            match op.kind {
                OperationType::Dequeue => {
                    let entry = QueueEntry::from(op);
                    self.take_checked_out(&entry);
                    self.entries.push_front(entry);
                }
                OperationType::Enqueue => {
                    self.unpin_one(op.file_number);
                    if self.live_count(op.file_number) == 0 {
                        drained.push(op.file_number);
                    }
                }
                OperationType::Reinstate => {}
            }
        }
        drained
    }

    /// Drops all bookkeeping for a deleted file.
    pub fn forget_file(&mut self, file_number: u32) {
        self.count_per_file.remove(&file_number);
        self.pending_per_file.remove(&file_number);
    }

    fn take_checked_out(&mut self, entry: &QueueEntry) -> bool {
        match self.checked_out.iter().position(|e| e == entry) {
            Some(i) => {
                self.checked_out.remove(i);
                true
            }
            None => false,
        }
    }

    fn remove_live(&mut self, entry: &QueueEntry) -> bool {
        match self.entries.iter().position(|e| e == entry) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    fn unpin_one(&mut self, file_number: u32) {
        if let Some(pending) = self.pending_per_file.get_mut(&file_number) {
            *pending = pending.saturating_sub(1);
            if *pending == 0 {
                self.pending_per_file.remove(&file_number);
            }
        }
    }

    /// Returns true when the file just lost its last live entry.
    fn release(&mut self, file_number: u32) -> bool {
        if let Some(count) = self.count_per_file.get_mut(&file_number) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.count_per_file.remove(&file_number);
            }
        }
        self.live_count(file_number) == 0
    }
}
