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

//! State shared between a [`Queue`](crate::Queue) and its writer thread.
//!
//! Lock order is writer, then the queue's transaction log lock, then
//! entries. The cursor mutex is a leaf and is never held while taking
//! another lock.

use std::{fs, io::ErrorKind};

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use snafu::ensure;
use tracing::{debug, warn};

use crate::{
    QueueConfig, Result,
    entry::{Operation, OperationType, QueueEntry},
    error::EntryTooLargeSnafu,
    file::{DataFile, read_span},
    meta::Checkpoint,
    path::data_file_path,
    state::EntryState,
};

pub(crate) struct Storage {
    pub config: QueueConfig,
    /// Open handle of the data file named by `cursor`.
    writer:     Mutex<Option<DataFile>>,
    cursor:     Mutex<Checkpoint>,
    state:      Mutex<EntryState>,
}

impl Storage {
    pub fn new(config: QueueConfig, state: EntryState, cursor: Checkpoint) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            cursor: Mutex::new(cursor),
            state: Mutex::new(state),
        }
    }

    pub fn cursor(&self) -> Checkpoint { *self.cursor.lock() }

    pub fn lock_state(&self) -> MutexGuard<'_, EntryState> { self.state.lock() }

    /// Writes `items` back to back at the append cursor and returns their
    /// ENQUEUE operations. The entries are pinned but stay invisible until
    /// the operations are committed. Rolls to the next data file once the
    /// current one has grown past the configured maximum.
    ///
    /// A failed roll after a successful write does not fail the append; the
    /// roll is retried before the next write.
    pub fn append(&self, items: &[Bytes]) -> Result<Vec<Operation>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut writer = self.writer.lock();
        let current = self.cursor();
        if current.position >= self.config.max_file_size {
            Self::roll(&self.config, &mut writer, &self.cursor, current.file_number)?;
        }
        let Checkpoint {
            file_number,
            position,
        } = self.cursor();

        let mut ops = Vec::with_capacity(items.len());
        let mut offset = position;
        for item in items {
            let (Ok(start), Ok(length)) = (i32::try_from(offset), i32::try_from(item.len())) else {
                return EntryTooLargeSnafu {
                    length: item.len(),
                    offset,
                }
                .fail();
            };
            ensure!(
                start.checked_add(length).is_some(),
                EntryTooLargeSnafu {
                    length: item.len(),
                    offset,
                }
            );
            ops.push(Operation::new(
                OperationType::Enqueue,
                file_number,
                start.unsigned_abs(),
                length.unsigned_abs(),
            ));
            offset += item.len() as u64;
        }

        let file = match writer.take() {
            Some(file) => file,
            None => DataFile::open_or_create(
                data_file_path(&self.config.base_path, file_number),
                self.config.max_file_size,
            )?,
        };
        let file = writer.insert(file);
        let end = file.write_at(position, items)?;
        file.flush(self.config.flush_mode)?;

        self.state.lock().pin(&ops);
        *self.cursor.lock() = Checkpoint {
            file_number,
            position: end,
        };

        if end >= self.config.max_file_size
            && let Err(e) = Self::roll(&self.config, &mut writer, &self.cursor, file_number)
        {
            warn!(file_number, error = %e, "Failed to roll over data file");
        }
        Ok(ops)
    }

    fn roll(
        config: &QueueConfig,
        writer: &mut Option<DataFile>,
        cursor: &Mutex<Checkpoint>,
        previous: u32,
    ) -> Result<()> {
        let next = previous + 1;
        *writer = None;
        *writer = Some(DataFile::open_or_create(
            data_file_path(&config.base_path, next),
            config.max_file_size,
        )?);
        *cursor.lock() = Checkpoint {
            file_number: next,
            position:    0,
        };
        debug!(from = previous, to = next, "Rolled over to new data file");
        Ok(())
    }

    /// Pops the head entry into the checked-out set, loading its bytes (and
    /// those of contiguous followers) when needed. The disk read runs
    /// without the entry lock held.
    pub fn checkout(&self) -> Result<Option<QueueEntry>> {
        let (mut entry, span) = {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.pop_front() else {
                return Ok(None);
            };
            state.checked_out.push(QueueEntry {
                data: None,
                ..entry.clone()
            });
            let span = entry
                .data
                .is_none()
                .then(|| self.read_ahead_span(&state, &entry));
            (entry, span)
        };

        if let Some((base, end)) = span {
            let bytes = match self.read_file_span(entry.file_number, base, end) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.state
                        .lock()
                        .reinstate(&[entry.operation(OperationType::Dequeue)]);
                    return Err(e);
                }
            };
            entry.data = Some(bytes.slice(..entry.length as usize));
            self.attach_read_ahead(entry.file_number, base, end, &bytes);
        }
        Ok(Some(entry))
    }

    /// Byte range covering the head entry and the entries sitting directly
    /// behind it in the same file, up to the read-ahead cap.
    fn read_ahead_span(&self, state: &EntryState, head: &QueueEntry) -> (u64, u64) {
        let base = u64::from(head.start);
        let limit = self.config.read_ahead.max(u64::from(head.length));

        let mut end = head.end();
        for next in &state.entries {
            if next.file_number != head.file_number
                || u64::from(next.start) != end
                || next.data.is_some()
                || next.end() - base > limit
            {
                break;
            }
            end = next.end();
        }
        (base, end)
    }

    fn read_file_span(&self, file_number: u32, base: u64, end: u64) -> Result<Bytes> {
        read_span(
            &data_file_path(&self.config.base_path, file_number),
            base,
            usize::try_from(end - base).unwrap_or(usize::MAX),
        )
    }

    /// Hands read-ahead bytes to the entries still waiting at the head.
    /// Entries taken by other sessions during the read are skipped.
    fn attach_read_ahead(&self, file_number: u32, base: u64, end: u64, bytes: &Bytes) {
        let mut state = self.state.lock();
        let followers = state.entries.iter_mut().take_while(|next| {
            next.file_number == file_number && u64::from(next.start) >= base && next.end() <= end
        });
        for next in followers {
            if next.data.is_none() {
                let offset = (u64::from(next.start) - base) as usize;
                next.data = Some(bytes.slice(offset..offset + next.length as usize));
            }
        }
    }

    /// Deletes data files that lost their last live entry, except the one
    /// currently receiving appends.
    pub fn remove_drained(&self, state: &mut EntryState, files: Vec<u32>) {
        if files.is_empty() {
            return;
        }
        let current = self.cursor().file_number;
        for number in files {
            if number == current || state.live_count(number) > 0 {
                continue;
            }
            let path = data_file_path(&self.config.base_path, number);
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = ?path, "Deleted drained data file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = ?path, error = %e, "Failed to delete drained data file"),
            }
            state.forget_file(number);
        }
    }

    /// Flushes and closes the current data file handle.
    pub fn close_writer(&self) -> Result<()> {
        if let Some(mut file) = self.writer.lock().take() {
            file.flush(self.config.flush_mode)?;
        }
        Ok(())
    }
}
