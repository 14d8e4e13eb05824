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

use std::{fs, path::Path, sync::Arc, thread};

use bytes::Bytes;
use courier_common_storage_queue::{FlushMode, Queue, QueueBuilder, QueueError};
use tempfile::TempDir;
use test_case::test_case;

const START_MARKER_LEN: usize = 16;

fn open(path: &Path) -> Queue {
    QueueBuilder::new(path)
        .max_file_size(1024 * 1024)
        .flush_mode(FlushMode::Sync)
        .open()
        .unwrap()
}

fn enqueue(queue: &Queue, items: &[String]) {
    let mut session = queue.open_session().unwrap();
    for item in items {
        session.enqueue(item.clone()).unwrap();
    }
    session.flush().unwrap();
}

fn drain(queue: &Queue) -> Vec<String> {
    let mut session = queue.open_session().unwrap();
    let mut out = Vec::new();
    while let Some(data) = session.dequeue().unwrap() {
        out.push(String::from_utf8(data.to_vec()).unwrap());
    }
    session.flush().unwrap();
    out
}

fn messages(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("message-{i:04}")).collect()
}

/// Copies the queue files as they are on disk right now, which is what a
/// process killed at this instant leaves behind.
fn crash_image(from: &Path) -> TempDir {
    let image = TempDir::new().unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name();
        if name != "lock" {
            fs::copy(entry.path(), image.path().join(name)).unwrap();
        }
    }
    image
}

#[test]
fn test_fifo_order() {
    let temp_dir = TempDir::new().unwrap();
    let queue = open(temp_dir.path());

    for chunk in messages(0..100).chunks(7) {
        enqueue(&queue, chunk);
    }

    assert_eq!(queue.len(), 100);
    assert_eq!(drain(&queue), messages(0..100));
    assert!(queue.is_empty());
}

#[test]
fn test_durability_across_crash() {
    let temp_dir = TempDir::new().unwrap();
    let queue = open(temp_dir.path());
    enqueue(&queue, &messages(0..3));

    let image = crash_image(temp_dir.path());
    let recovered = open(image.path());

    assert_eq!(recovered.len(), 3);
    assert_eq!(drain(&recovered), messages(0..3));
    drop(queue);
}

#[test]
fn test_durability_across_clean_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let queue = open(temp_dir.path());
        enqueue(&queue, &messages(0..10));
        let mut session = queue.open_session().unwrap();
        for _ in 0..4 {
            session.dequeue().unwrap();
        }
        session.flush().unwrap();
    }

    let queue = open(temp_dir.path());
    assert_eq!(drain(&queue), messages(4..10));
}

#[test]
fn test_uncommitted_dequeue_is_reinstated() {
    let temp_dir = TempDir::new().unwrap();
    let queue = open(temp_dir.path());
    enqueue(&queue, &messages(0..2));

    {
        let mut session = queue.open_session().unwrap();
        let first = session.dequeue().unwrap().unwrap();
        assert_eq!(first, "message-0000".as_bytes());
    }

    let mut session = queue.open_session().unwrap();
    assert_eq!(session.dequeue().unwrap().unwrap(), "message-0000".as_bytes());
}

#[test]
fn test_uncommitted_dequeue_survives_crash() {
    let temp_dir = TempDir::new().unwrap();
    let queue = open(temp_dir.path());
    enqueue(&queue, &messages(0..2));

    let mut session = queue.open_session().unwrap();
    session.dequeue().unwrap();
    let image = crash_image(temp_dir.path());
    drop(session);

    let recovered = open(image.path());
    assert_eq!(drain(&recovered), messages(0..2));
}

#[test]
fn test_recovery_is_idempotent_at_transaction_boundary() {
    let temp_dir = TempDir::new().unwrap();
    let queue = open(temp_dir.path());
    enqueue(&queue, &messages(0..2));
    let boundary = fs::metadata(temp_dir.path().join("transaction.log"))
        .unwrap()
        .len();
    enqueue(&queue, &messages(2..4));

    let image = crash_image(temp_dir.path());
    let log = image.path().join("transaction.log");
    let bytes = fs::read(&log).unwrap();
    fs::write(&log, &bytes[..usize::try_from(boundary).unwrap()]).unwrap();

    let first = {
        let queue = open(image.path());
        queue.len()
    };
    let recovered = open(image.path());
    assert_eq!(first, 2);
    assert_eq!(recovered.len(), 2);
    assert_eq!(drain(&recovered), messages(0..2));
}

#[test_case(1 ; "inside start marker")]
#[test_case(START_MARKER_LEN + 2 ; "inside operation count")]
#[test_case(START_MARKER_LEN + 4 + 9 ; "inside first operation")]
#[test_case(usize::MAX ; "inside end marker")]
fn test_truncated_log_recovers_last_complete_transaction(cut_into_last: usize) {
    let temp_dir = TempDir::new().unwrap();
    let queue = open(temp_dir.path());
    enqueue(&queue, &messages(0..3));
    let boundary = usize::try_from(
        fs::metadata(temp_dir.path().join("transaction.log"))
            .unwrap()
            .len(),
    )
    .unwrap();
    enqueue(&queue, &messages(3..5));

    let image = crash_image(temp_dir.path());
    let log = image.path().join("transaction.log");
    let bytes = fs::read(&log).unwrap();
    let cut = boundary + cut_into_last.min(bytes.len() - boundary - 1);
    fs::write(&log, &bytes[..cut]).unwrap();

    let recovered = open(image.path());
    assert_eq!(recovered.len(), 3);

    // The torn tail is rewritten away on open.
    let healed = fs::read(&log).unwrap();
    assert!(healed.len() < cut);

    enqueue(&recovered, &messages(5..6));
    let mut expected = messages(0..3);
    expected.extend(messages(5..6));
    assert_eq!(drain(&recovered), expected);
}

#[test]
fn test_file_rollover() {
    let temp_dir = TempDir::new().unwrap();
    let queue = QueueBuilder::new(temp_dir.path())
        .max_file_size(100)
        .open()
        .unwrap();
    let payloads: Vec<String> = (0..5).map(|i| format!("{i}").repeat(40)).collect();

    for payload in &payloads[..2] {
        enqueue(&queue, std::slice::from_ref(payload));
    }
    assert!(temp_dir.path().join("data.0").exists());
    assert!(!temp_dir.path().join("data.1").exists());

    // 120 bytes crosses the 100 byte limit once.
    enqueue(&queue, std::slice::from_ref(&payloads[2]));
    assert!(temp_dir.path().join("data.1").exists());
    assert!(!temp_dir.path().join("data.2").exists());

    for payload in &payloads[3..] {
        enqueue(&queue, std::slice::from_ref(payload));
    }
    assert_eq!(drain(&queue), payloads);
}

#[test]
fn test_large_session_uses_background_writes() {
    let temp_dir = TempDir::new().unwrap();
    let queue = QueueBuilder::new(temp_dir.path())
        .async_write_threshold(1024)
        .max_file_size(16 * 1024)
        .open()
        .unwrap();
    let payloads: Vec<String> = (0..200).map(|i| format!("{i:0>300}")).collect();

    enqueue(&queue, &payloads);
    drop(queue);

    let queue = open(temp_dir.path());
    assert_eq!(drain(&queue), payloads);
}

#[test]
fn test_concurrent_producers() {
    let temp_dir = TempDir::new().unwrap();
    let queue = Arc::new(open(temp_dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let mut session = queue.open_session().unwrap();
                    session.enqueue(Bytes::from(format!("{t}-{i}"))).unwrap();
                    session.flush().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let drained = drain(&queue);
    assert_eq!(drained.len(), 100);
    for t in 0..4 {
        let order: Vec<&String> = drained
            .iter()
            .filter(|m| m.starts_with(&format!("{t}-")))
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("{t}-{i}")).collect();
        assert_eq!(order, expected.iter().collect::<Vec<_>>());
    }
}

#[test]
fn test_lock_contention() {
    let temp_dir = TempDir::new().unwrap();
    let queue = open(temp_dir.path());

    let err = QueueBuilder::new(temp_dir.path()).open().err().unwrap();
    assert!(matches!(err, QueueError::LockContention { .. }));

    drop(queue);
    assert!(QueueBuilder::new(temp_dir.path()).open().is_ok());
}

#[test_case(8 ; "dequeue drains a rolled over file")]
#[test_case(1024 * 1024 ; "single data file")]
fn test_failed_checkpoint_keeps_commit(max_file_size: u64) {
    let temp_dir = TempDir::new().unwrap();
    let queue = QueueBuilder::new(temp_dir.path())
        .max_file_size(max_file_size)
        .open()
        .unwrap();
    enqueue(&queue, &["0123456789".to_string()]);
    enqueue(&queue, &["abc".to_string()]);

    // Shadow the checkpoint's temporary file so every checkpoint write fails.
    let meta_tmp = temp_dir.path().join("meta.tmp");
    fs::create_dir(&meta_tmp).unwrap();

    let mut session = queue.open_session().unwrap();
    assert_eq!(session.dequeue().unwrap().unwrap(), &b"0123456789"[..]);
    session.flush().unwrap();
    drop(session);

    assert_eq!(queue.len(), 1);
    if max_file_size == 8 {
        assert!(!temp_dir.path().join("data.0").exists());
    }
    {
        let mut session = queue.open_session().unwrap();
        assert_eq!(session.dequeue().unwrap().unwrap(), &b"abc"[..]);
    }
    assert!(queue.close().is_err());

    fs::remove_dir(&meta_tmp).unwrap();
    let queue = open(temp_dir.path());
    assert_eq!(queue.len(), 1);
    assert_eq!(drain(&queue), vec!["abc".to_string()]);
}

#[test]
fn test_failed_background_writes_are_reported_at_flush() {
    let temp_dir = TempDir::new().unwrap();
    let queue = QueueBuilder::new(temp_dir.path())
        .async_write_threshold(4)
        .open()
        .unwrap();
    let data_file = temp_dir.path().join("data.0");
    fs::create_dir(&data_file).unwrap();

    let mut session = queue.open_session().unwrap();
    session.enqueue("first background write").unwrap();
    session.enqueue("second background write").unwrap();
    let err = session.flush().unwrap_err();
    assert!(matches!(err, QueueError::PendingWrites { count: 2, .. }));
    assert!(queue.is_empty());

    fs::remove_dir(&data_file).unwrap();
    session.enqueue("retried").unwrap();
    session.flush().unwrap();
    drop(session);

    assert_eq!(queue.len(), 1);
    assert_eq!(drain(&queue), vec!["retried".to_string()]);
}

#[test]
fn test_unavailable_log_fails_commit_after_bounded_retries() {
    let temp_dir = TempDir::new().unwrap();
    let queue = QueueBuilder::new(temp_dir.path())
        .log_open_attempts(3)
        .open()
        .unwrap();
    enqueue(&queue, &messages(0..2));

    let log = temp_dir.path().join("transaction.log");
    fs::remove_file(&log).unwrap();
    fs::create_dir(&log).unwrap();

    {
        let mut session = queue.open_session().unwrap();
        assert_eq!(session.dequeue().unwrap().unwrap(), b"message-0000"[..]);
        let err = session.flush().unwrap_err();
        assert!(matches!(
            err,
            QueueError::TransactionLogUnavailable { attempts: 3, .. }
        ));
        assert_eq!(queue.len(), 2);
    }

    {
        let mut session = queue.open_session().unwrap();
        assert_eq!(session.dequeue().unwrap().unwrap(), b"message-0000"[..]);
    }

    fs::remove_dir(&log).unwrap();
    drop(queue);
    let queue = open(temp_dir.path());
    assert_eq!(drain(&queue), messages(0..2));
}
