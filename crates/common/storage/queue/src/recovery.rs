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

//! Recovery logic for reopening a queue directory.
//!
//! Scans `meta.state` and replays `transaction.log` to rebuild the live
//! entry list and the append cursor. Replay stops at the first incomplete
//! transaction; the caller rewrites the log when that happens.

use std::{
    collections::{HashSet, VecDeque},
    fs,
    io::ErrorKind,
    path::Path,
};

use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    QueueConfig, Result,
    entry::{Operation, OperationType, QueueEntry},
    error::IoSnafu,
    meta::{Checkpoint, read_checkpoint},
    path::{data_file_path, meta_file_path, scan_data_files, transaction_log_path},
    state::EntryState,
    txlog::decode_log,
};

/// Information recovered from disk for initializing a queue.
#[derive(Debug)]
pub(crate) struct Recovered {
    pub state:      EntryState,
    /// Where the next append goes.
    pub cursor:     Checkpoint,
    /// The log had a torn tail and must be rewritten.
    pub needs_trim: bool,
    /// Size of the valid part of the log.
    pub log_len:    u64,
}

pub(crate) fn recover(config: &QueueConfig) -> Result<Recovered> {
    let base = &config.base_path;
    let checkpoint = read_checkpoint(&meta_file_path(base));

    let log_path = transaction_log_path(base);
    let bytes = match fs::read(&log_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e).context(IoSnafu { path: log_path }),
    };
    let replay = decode_log(&bytes);

    let ops = replay.transactions.iter().flatten();
    let cursor = advance_cursor(checkpoint, ops.clone());
    let entries = replay_operations(ops);

    info!(
        path = ?base,
        transactions = replay.transactions.len(),
        entries = entries.len(),
        file_number = cursor.file_number,
        position = cursor.position,
        truncated = replay.truncated,
        "Recovered queue state"
    );

    Ok(Recovered {
        state:      EntryState::with_entries(entries),
        cursor,
        needs_trim: replay.truncated,
        log_len:    replay.valid_len as u64,
    })
}

/// Rebuilds the live entry list. Replay is idempotent: an entry that is
/// already live is not enqueued twice and an unknown dequeue is skipped.
fn replay_operations<'a>(ops: impl Iterator<Item = &'a Operation>) -> VecDeque<QueueEntry> {
    let mut entries = VecDeque::new();
    let mut live = HashSet::new();

    for op in ops {
        let entry = QueueEntry::from(op);
        match op.kind {
            OperationType::Enqueue => {
                if live.insert(entry.clone()) {
                    entries.push_back(entry);
                }
            }
            OperationType::Dequeue => {
                if !live.remove(&entry) {
                    warn!(?entry, "Skipping dequeue of unknown entry during replay");
                    continue;
                }
                if entries.front() == Some(&entry) {
                    entries.pop_front();
                } else if let Some(i) = entries.iter().position(|e| e == &entry) {
                    entries.remove(i);
                }
            }
            OperationType::Reinstate => {
                if live.insert(entry.clone()) {
                    entries.push_front(entry);
                }
            }
        }
    }
    entries
}

/// The checkpoint is only written after a commit lands in the log, so the
/// log can know about bytes the checkpoint does not. Never hand out an
/// offset that a replayed entry already occupies.
fn advance_cursor<'a>(
    checkpoint: Checkpoint,
    ops: impl Iterator<Item = &'a Operation>,
) -> Checkpoint {
    ops.filter(|op| op.kind == OperationType::Enqueue)
        .map(|op| Checkpoint {
            file_number: op.file_number,
            position:    QueueEntry::from(op).end(),
        })
        .fold(checkpoint, |cursor, end| {
            if (end.file_number, end.position) > (cursor.file_number, cursor.position) {
                end
            } else {
                cursor
            }
        })
}

/// Deletes data files older than the current one that hold no live entry.
pub(crate) fn remove_orphaned_files(
    base: &Path,
    state: &EntryState,
    current_file: u32,
) -> Result<usize> {
    let mut removed = 0;
    for number in scan_data_files(base)? {
        if number < current_file && state.live_count(number) == 0 {
            let path = data_file_path(base, number);
            fs::remove_file(&path).context(IoSnafu { path: &path })?;
            debug!(path = ?path, "Removed orphaned data file");
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use std::{fs::File, path::PathBuf};

    use tempfile::TempDir;
    use test_case::test_case;

    use super::*;
    use crate::{meta::write_checkpoint, txlog::encode_transaction};

    fn enqueue(file: u32, start: u32, length: u32) -> Operation {
        Operation::new(OperationType::Enqueue, file, start, length)
    }

    fn dequeue(file: u32, start: u32, length: u32) -> Operation {
        Operation::new(OperationType::Dequeue, file, start, length)
    }

    struct TestFixture {
        _temp_dir: TempDir,
        config:    QueueConfig,
    }

    impl TestFixture {
        fn new() -> Self {
            let temp_dir = TempDir::new().unwrap();
            let config = QueueConfig {
                base_path: temp_dir.path().to_path_buf(),
                ..Default::default()
            };
            Self {
                _temp_dir: temp_dir,
                config,
            }
        }

        fn log_path(&self) -> PathBuf { transaction_log_path(&self.config.base_path) }

        fn write_log(&self, transactions: &[&[Operation]]) -> Vec<u8> {
            let mut buf = Vec::new();
            for ops in transactions {
                encode_transaction(ops, &mut buf);
            }
            fs::write(self.log_path(), &buf).unwrap();
            buf
        }

        fn starts(recovered: &Recovered) -> Vec<u32> {
            recovered.state.entries.iter().map(|e| e.start).collect()
        }
    }

    #[test]
    fn test_recover_empty_directory() {
        let fixture = TestFixture::new();
        let recovered = recover(&fixture.config).unwrap();

        assert_eq!(recovered.state.len(), 0);
        assert_eq!(recovered.cursor, Checkpoint::default());
        assert!(!recovered.needs_trim);
    }

    #[test]
    fn test_recover_replays_enqueues_and_dequeues() {
        let fixture = TestFixture::new();
        fixture.write_log(&[
            &[enqueue(0, 0, 4), enqueue(0, 4, 4), enqueue(0, 8, 4)],
            &[dequeue(0, 0, 4)],
        ]);

        let recovered = recover(&fixture.config).unwrap();
        assert_eq!(TestFixture::starts(&recovered), vec![4, 8]);
        assert_eq!(recovered.state.live_count(0), 2);
        assert!(!recovered.needs_trim);
    }

    #[test]
    fn test_recover_stops_at_torn_transaction() {
        let fixture = TestFixture::new();
        let full = fixture.write_log(&[&[enqueue(0, 0, 4)], &[enqueue(0, 4, 4)]]);
        fs::write(fixture.log_path(), &full[..full.len() - 3]).unwrap();

        let recovered = recover(&fixture.config).unwrap();
        assert_eq!(TestFixture::starts(&recovered), vec![0]);
        assert!(recovered.needs_trim);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let fixture = TestFixture::new();
        let ops = [enqueue(0, 0, 4), enqueue(0, 4, 4)];
        fixture.write_log(&[&ops, &ops]);

        let recovered = recover(&fixture.config).unwrap();
        assert_eq!(TestFixture::starts(&recovered), vec![0, 4]);
    }

    #[test_case(Checkpoint { file_number: 0, position: 0 }, Checkpoint { file_number: 1, position: 12 } ; "log ahead of checkpoint")]
    #[test_case(Checkpoint { file_number: 1, position: 64 }, Checkpoint { file_number: 1, position: 64 } ; "checkpoint ahead of log")]
    #[test_case(Checkpoint { file_number: 2, position: 0 }, Checkpoint { file_number: 2, position: 0 } ; "checkpoint in later file")]
    fn test_cursor_never_moves_backwards(checkpoint: Checkpoint, expected: Checkpoint) {
        let fixture = TestFixture::new();
        write_checkpoint(&meta_file_path(&fixture.config.base_path), checkpoint, false).unwrap();
        fixture.write_log(&[&[enqueue(0, 0, 8), enqueue(1, 0, 12)]]);

        let recovered = recover(&fixture.config).unwrap();
        assert_eq!(recovered.cursor, expected);
    }

    #[test]
    fn test_remove_orphaned_files() {
        let fixture = TestFixture::new();
        let base = &fixture.config.base_path;
        for n in 0..4 {
            File::create(data_file_path(base, n)).unwrap();
        }
        let state = EntryState::with_entries([QueueEntry::new(1, 0, 4)].into());

        let removed = remove_orphaned_files(base, &state, 2).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(scan_data_files(base).unwrap(), vec![1, 2, 3]);
    }
}
