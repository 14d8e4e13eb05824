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

//! Main queue struct and lifecycle management.
//!
//! The [`Queue`] owns one directory. Opening it takes the directory lock,
//! replays the transaction log and starts the background writer thread.
//! All reads and writes go through short-lived [`Session`]s.
//!
//! ## Usage
//!
//! ```ignore
//! let queue = QueueBuilder::new("/path/to/queue").open()?;
//!
//! let mut session = queue.open_session()?;
//! session.enqueue(&b"hello"[..])?;
//! session.flush()?;
//!
//! let mut session = queue.open_session()?;
//! let payload = session.dequeue()?;
//! session.flush()?; // commit, otherwise the entry is reinstated on drop
//! ```

use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use backon::{BlockingRetryable, ExponentialBuilder};
use crossbeam::channel::{Sender, unbounded};
use fd_lock::RwLock;
use parking_lot::Mutex;
use snafu::{ResultExt, ensure};
use tracing::{debug, error, info, warn};

use crate::{
    QueueConfig, Result,
    entry::{Operation, OperationType, QueueEntry},
    error::{
        DisposedSnafu, InternalSnafu, IoSnafu, LockContentionSnafu,
        TransactionLogUnavailableSnafu, WriterUnavailableSnafu,
    },
    io_worker::{IOWorker, WriteJob},
    meta::write_checkpoint,
    path::{lock_file_path, meta_file_path, transaction_log_path, write_atomically},
    recovery::{Recovered, recover, remove_orphaned_files},
    session::Session,
    storage::Storage,
    txlog::{encode_transaction, transaction_size},
};

/// Entries dequeued per commit while clearing.
const CLEAR_BATCH: usize = 1024;

struct TransactionLog {
    path: PathBuf,
    /// Bytes known to hold complete transactions.
    len:  u64,
}

/// A persistent FIFO queue of opaque byte entries.
///
/// The queue is thread-safe; share it behind an `Arc` and open one session
/// per unit of work.
pub struct Queue {
    storage:  Arc<Storage>,
    txlog:    Mutex<TransactionLog>,
    /// Held for the lifetime of the queue, `None` once closed.
    lock:     Mutex<Option<RwLock<File>>>,
    disposed: AtomicBool,
    io_tx:    Mutex<Option<Sender<WriteJob>>>,
    io_join:  Mutex<Option<JoinHandle<()>>>,
}

impl Queue {
    /// Opens (or creates) the queue directory named by `config.base_path`.
    ///
    /// Fails with [`QueueError::LockContention`](crate::QueueError) if the
    /// directory is already open elsewhere.
    pub fn open(config: QueueConfig) -> Result<Self> {
        config.validate()?;
        let base = config.base_path.clone();
        std::fs::create_dir_all(&base).context(IoSnafu { path: &base })?;

        let lock = acquire_lock(&base)?;
        let Recovered {
            state,
            cursor,
            needs_trim,
            log_len,
        } = recover(&config)?;

        if let Err(e) = remove_orphaned_files(&base, &state, cursor.file_number) {
            warn!(path = ?base, error = %e, "Failed to remove orphaned data files");
        }

        let storage = Arc::new(Storage::new(config, state, cursor));
        let (io_tx, io_rx) = unbounded();
        let queue = Self {
            storage:  storage.clone(),
            txlog:    Mutex::new(TransactionLog {
                path: transaction_log_path(&base),
                len:  log_len,
            }),
            lock:     Mutex::new(Some(lock)),
            disposed: AtomicBool::new(false),
            io_tx:    Mutex::new(Some(io_tx)),
            io_join:  Mutex::new(None),
        };

        {
            let mut log = queue.txlog.lock();
            if needs_trim {
                queue.trim_log(&mut log)?;
            }
            queue.checkpoint()?;
        }

        *queue.io_join.lock() = Some(IOWorker::new(io_rx, storage).spawn()?);

        info!(
            path = ?base,
            entries = queue.len(),
            file_number = cursor.file_number,
            position = cursor.position,
            "Queue opened"
        );
        Ok(queue)
    }

    /// Starts a unit of work.
    pub fn open_session(&self) -> Result<Session<'_>> {
        self.ensure_open()?;
        Ok(Session::new(self))
    }

    /// Number of entries in the queue, including ones checked out by
    /// uncommitted sessions.
    #[must_use]
    pub fn len(&self) -> usize { self.storage.lock_state().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Dequeues and commits until no entry is left, returning how many were
    /// discarded. Entries checked out by other open sessions are untouched.
    pub fn clear(&self) -> Result<usize> {
        let mut cleared = 0;
        loop {
            let mut session = self.open_session()?;
            let mut batch = 0;
            while batch < CLEAR_BATCH && session.dequeue()?.is_some() {
                batch += 1;
            }
            if batch == 0 {
                debug!(path = ?self.path(), cleared, "Queue cleared");
                return Ok(cleared);
            }
            session.flush()?;
            cleared += batch;
        }
    }

    #[must_use]
    pub fn config(&self) -> &QueueConfig { &self.storage.config }

    #[must_use]
    pub fn path(&self) -> &Path { &self.storage.config.base_path }

    /// Writes a trimmed log and the checkpoint, stops the writer thread and
    /// releases the directory lock. Later calls are no-ops; dropping the
    /// queue closes it as well.
    pub fn close(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(path = ?self.path(), "Closing queue");

        self.io_tx.lock().take();
        let joined = match self.io_join.lock().take() {
            Some(handle) => handle.join().map_err(|_| {
                InternalSnafu {
                    message: "IO worker thread panicked".to_string(),
                }
                .build()
            }),
            None => Ok(()),
        };

        let flushed = {
            let mut log = self.txlog.lock();
            self.storage
                .close_writer()
                .and_then(|()| self.trim_log(&mut log))
                .and_then(|()| self.checkpoint())
        };

        self.lock.lock().take();
        info!(path = ?self.path(), "Queue closed");
        joined.and(flushed)
    }

    pub(crate) fn storage(&self) -> &Storage { &self.storage }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        ensure!(!self.disposed.load(Ordering::SeqCst), DisposedSnafu);
        Ok(())
    }

    pub(crate) fn checkout(&self) -> Result<Option<QueueEntry>> {
        self.ensure_open()?;
        self.storage.checkout()
    }

    pub(crate) fn submit_write(&self, job: WriteJob) -> Result<()> {
        let io_tx = self.io_tx.lock();
        let tx = io_tx.as_ref().ok_or_else(|| WriterUnavailableSnafu.build())?;
        ensure!(tx.send(job).is_ok(), WriterUnavailableSnafu);
        Ok(())
    }

    /// Makes `ops` durable: log append, in-memory apply, then checkpoint.
    ///
    /// An `Err` means nothing was committed. Once the log record is written
    /// the operations are applied, and a failed trim or checkpoint is only
    /// logged: the next commit retries both and replay does not depend on
    /// either.
    pub(crate) fn commit(&self, ops: &[Operation]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;

        let mut log = self.txlog.lock();
        let mut record = Vec::with_capacity(transaction_size(ops.len()));
        encode_transaction(ops, &mut record);
        self.append_log(&mut log, &record)?;

        {
            let mut state = self.storage.lock_state();
            let drained = state.apply(ops);
            self.storage.remove_drained(&mut state, drained);
        }

        if let Err(e) = self.maybe_trim(&mut log) {
            warn!(path = ?log.path, error = %e, "Failed to trim transaction log after commit");
        }
        if let Err(e) = self.checkpoint() {
            warn!(path = ?self.path(), error = %e, "Failed to write checkpoint after commit");
        }
        Ok(())
    }

    /// Returns the dequeues of an abandoned session to the head of the
    /// queue and releases its uncommitted writes.
    pub(crate) fn reinstate(&self, ops: &[Operation]) {
        let mut state = self.storage.lock_state();
        let drained = state.reinstate(ops);
        self.storage.remove_drained(&mut state, drained);
    }

    fn append_log(&self, log: &mut TransactionLog, record: &[u8]) -> Result<()> {
        let mut file = self.open_log(&log.path)?;
        let written = file.write_all(record).and_then(|()| {
            if self.storage.config.sync_on_commit() {
                file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            // Cut the record so a failed commit never replays and later
            // appends stay reachable.
            if let Err(truncate) = file.set_len(log.len) {
                warn!(path = ?log.path, error = %truncate, "Failed to truncate torn log record");
            }
            return Err(e).context(IoSnafu { path: &log.path });
        }
        log.len += record.len() as u64;
        Ok(())
    }

    fn open_log(&self, path: &Path) -> Result<File> {
        let attempts = self.storage.config.log_open_attempts;
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(500))
            .with_max_times(attempts.saturating_sub(1));

        (|| OpenOptions::new().create(true).append(true).open(path))
            .retry(backoff)
            .sleep(std::thread::sleep)
            .notify(|err, delay| {
                warn!(path = ?path, error = %err, ?delay, "Retrying transaction log open");
            })
            .call()
            .context(TransactionLogUnavailableSnafu { path, attempts })
    }

    /// Trims when the log is large and mostly made of consumed history.
    fn maybe_trim(&self, log: &mut TransactionLog) -> Result<()> {
        let optimal = transaction_size(self.len()) as u64;
        if log.len > self.storage.config.trim_threshold && log.len > optimal * 2 {
            self.trim_log(log)?;
        }
        Ok(())
    }

    /// Rewrites the log as a single transaction enqueuing every live entry.
    fn trim_log(&self, log: &mut TransactionLog) -> Result<()> {
        let ops: Vec<Operation> = {
            let state = self.storage.lock_state();
            state
                .checked_out
                .iter()
                .chain(state.entries.iter())
                .map(|entry| entry.operation(OperationType::Enqueue))
                .collect()
        };

        let mut record = Vec::new();
        if !ops.is_empty() {
            encode_transaction(&ops, &mut record);
        }
        write_atomically(&log.path, &record, self.storage.config.sync_on_commit())?;
        info!(
            path = ?log.path,
            before = log.len,
            after = record.len(),
            entries = ops.len(),
            "Trimmed transaction log"
        );
        log.len = record.len() as u64;
        Ok(())
    }

    /// Callers hold the transaction log lock, which serializes checkpoints.
    fn checkpoint(&self) -> Result<()> {
        write_checkpoint(
            &meta_file_path(self.path()),
            self.storage.cursor(),
            self.storage.config.sync_on_commit(),
        )
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!(path = ?self.path(), error = %e, "Failed to close queue");
        }
    }
}

/// Takes the exclusive lock on `<base>/lock`.
fn acquire_lock(base: &Path) -> Result<RwLock<File>> {
    let path = lock_file_path(base);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .context(IoSnafu { path: &path })?;

    let mut lock = RwLock::new(file);
    match lock.try_write() {
        // The lock is released when the file handle closes, which happens
        // when the queue drops the `RwLock`.
        Ok(guard) => std::mem::forget(guard),
        Err(e) if e.kind() == ErrorKind::WouldBlock => {
            return LockContentionSnafu { path: base }.fail();
        }
        Err(e) => return Err(e).context(IoSnafu { path }),
    }
    Ok(lock)
}
