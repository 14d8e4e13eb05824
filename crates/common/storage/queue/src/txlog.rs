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

#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

//! Binary framing of the transaction log.
//!
//! Every commit appends one self-delimiting record, all integers
//! little-endian:
//!
//! ```text
//! ┌──────────────┬────────────┬─────────────────────────────────┬──────────────┐
//! │ START (16B)  │ count i32  │ count × operation (17B each)    │  END (16B)   │
//! └──────────────┴────────────┴─────────────────────────────────┴──────────────┘
//!
//! operation = separator i32 | type u8 | file i32 | start i32 | length i32
//! ```
//!
//! The markers are fixed GUIDs stored in mixed-endian GUID byte order. A
//! record is only applied when both markers and every operation were read,
//! so a torn append at the tail is detected and dropped.

use tracing::warn;
use uuid::{Uuid, uuid};

use crate::entry::{Operation, OperationType};

pub(crate) const START_MARKER: Uuid = uuid!("b75bfb12-93bb-42b6-acb1-a897239ea3a5");
pub(crate) const END_MARKER: Uuid = uuid!("866c9705-4456-4e9d-b452-3146b3bfa4ce");
pub(crate) const OPERATION_SEPARATOR: i32 = 0x42FE_BCA1;

const MARKER_SIZE: usize = 16;
const COUNT_SIZE: usize = 4;
pub(crate) const OPERATION_SIZE: usize = 4 + 1 + 4 + 4 + 4;

/// Encoded size of a transaction holding `op_count` operations.
pub(crate) const fn transaction_size(op_count: usize) -> usize {
    MARKER_SIZE + COUNT_SIZE + op_count * OPERATION_SIZE + MARKER_SIZE
}

/// Appends one framed transaction to `buf`.
pub(crate) fn encode_transaction(ops: &[Operation], buf: &mut Vec<u8>) {
    buf.reserve(transaction_size(ops.len()));
    buf.extend_from_slice(&START_MARKER.to_bytes_le());
    buf.extend_from_slice(&(ops.len() as i32).to_le_bytes());
    for op in ops {
        buf.extend_from_slice(&OPERATION_SEPARATOR.to_le_bytes());
        buf.push(op.kind as u8);
        buf.extend_from_slice(&(op.file_number as i32).to_le_bytes());
        buf.extend_from_slice(&(op.start as i32).to_le_bytes());
        buf.extend_from_slice(&(op.length as i32).to_le_bytes());
    }
    buf.extend_from_slice(&END_MARKER.to_bytes_le());
}

/// Result of scanning a transaction log.
#[derive(Debug, Default)]
pub(crate) struct Replay {
    pub transactions: Vec<Vec<Operation>>,
    /// Bytes covered by complete transactions.
    pub valid_len:    usize,
    /// Set when trailing bytes did not form a complete transaction.
    pub truncated:    bool,
}

/// Decodes every complete transaction, stopping at the first torn or
/// corrupt record.
pub(crate) fn decode_log(bytes: &[u8]) -> Replay {
    let mut replay = Replay::default();
    while replay.valid_len < bytes.len() {
        match decode_transaction(&bytes[replay.valid_len..]) {
            Some((ops, consumed)) => {
                replay.transactions.push(ops);
                replay.valid_len += consumed;
            }
            None => {
                warn!(
                    offset = replay.valid_len,
                    trailing = bytes.len() - replay.valid_len,
                    "Discarding incomplete transaction log tail"
                );
                replay.truncated = true;
                break;
            }
        }
    }
    replay
}

fn decode_transaction(buf: &[u8]) -> Option<(Vec<Operation>, usize)> {
    let mut reader = Reader { buf, pos: 0 };

    if reader.take(MARKER_SIZE)? != START_MARKER.to_bytes_le() {
        return None;
    }
    let count = usize::try_from(reader.i32()?).ok()?;
    // Reject counts the remaining bytes cannot possibly satisfy before
    // allocating for them.
    if count.checked_mul(OPERATION_SIZE)? > reader.remaining() {
        return None;
    }

    let mut ops = Vec::with_capacity(count);
    for _ in 0..count {
        if reader.i32()? != OPERATION_SEPARATOR {
            return None;
        }
        let kind = OperationType::try_from(reader.u8()?).ok()?;
        let file_number = u32::try_from(reader.i32()?).ok()?;
        let start = u32::try_from(reader.i32()?).ok()?;
        let length = u32::try_from(reader.i32()?).ok()?;
        ops.push(Operation::new(kind, file_number, start, length));
    }

    if reader.take(MARKER_SIZE)? != END_MARKER.to_bytes_le() {
        return None;
    }
    Some((ops, reader.pos))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn remaining(&self) -> usize { self.buf.len() - self.pos }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let bytes = self.buf.get(self.pos..self.pos.checked_add(n)?)?;
        self.pos += n;
        Some(bytes)
    }

    fn u8(&mut self) -> Option<u8> { self.take(1).map(|b| b[0]) }

    fn i32(&mut self) -> Option<i32> {
        self.take(4)
            .and_then(|b| b.try_into().ok())
            .map(i32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn enqueue(file: u32, start: u32, length: u32) -> Operation {
        Operation::new(OperationType::Enqueue, file, start, length)
    }

    fn two_transactions() -> (Vec<u8>, usize) {
        let mut buf = Vec::new();
        encode_transaction(&[enqueue(0, 0, 5), enqueue(0, 5, 7)], &mut buf);
        let first = buf.len();
        encode_transaction(
            &[Operation::new(OperationType::Dequeue, 0, 0, 5)],
            &mut buf,
        );
        (buf, first)
    }

    #[test]
    fn test_marker_byte_layout() {
        // GUID byte order: first three groups little-endian, the rest as-is.
        assert_eq!(
            START_MARKER.to_bytes_le(),
            [
                0x12, 0xfb, 0x5b, 0xb7, 0xbb, 0x93, 0xb6, 0x42, 0xac, 0xb1, 0xa8, 0x97, 0x23, 0x9e,
                0xa3, 0xa5
            ]
        );
    }

    #[test]
    fn test_record_layout() {
        let mut buf = Vec::new();
        encode_transaction(&[enqueue(2, 16, 9)], &mut buf);

        assert_eq!(buf.len(), transaction_size(1));
        assert_eq!(&buf[16..20], &1i32.to_le_bytes());
        assert_eq!(&buf[20..24], &OPERATION_SEPARATOR.to_le_bytes());
        assert_eq!(buf[24], 1);
        assert_eq!(&buf[25..29], &2i32.to_le_bytes());
        assert_eq!(&buf[29..33], &16i32.to_le_bytes());
        assert_eq!(&buf[33..37], &9i32.to_le_bytes());
        assert_eq!(&buf[37..], &END_MARKER.to_bytes_le());
    }

    #[test]
    fn test_decode_complete_log() {
        let (buf, _) = two_transactions();
        let replay = decode_log(&buf);

        assert!(!replay.truncated);
        assert_eq!(replay.valid_len, buf.len());
        assert_eq!(replay.transactions.len(), 2);
        assert_eq!(replay.transactions[0], vec![enqueue(0, 0, 5), enqueue(0, 5, 7)]);
        assert_eq!(replay.transactions[1][0].kind, OperationType::Dequeue);
    }

    #[test]
    fn test_truncation_at_every_offset() {
        let (buf, first) = two_transactions();

        for cut in 0..buf.len() {
            let replay = decode_log(&buf[..cut]);
            let expected = usize::from(cut >= first);
            assert_eq!(replay.transactions.len(), expected, "cut at {cut}");
            assert_eq!(replay.valid_len, if cut >= first { first } else { 0 });
            assert_eq!(replay.truncated, cut != 0 && cut != first, "cut at {cut}");
        }
    }

    #[test_case(0 ; "start marker")]
    #[test_case(20 ; "operation separator")]
    #[test_case(24 ; "operation type")]
    #[test_case(40 ; "end marker")]
    fn test_corrupt_byte_discards_record(offset: usize) {
        let mut buf = Vec::new();
        encode_transaction(&[enqueue(0, 0, 1)], &mut buf);
        let corrupt_at = offset.min(buf.len() - 1);
        buf[corrupt_at] ^= 0xff;

        let replay = decode_log(&buf);
        assert!(replay.transactions.is_empty());
        assert!(replay.truncated);
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn test_oversized_count_is_rejected() {
        let mut buf = START_MARKER.to_bytes_le().to_vec();
        buf.extend_from_slice(&i32::MAX.to_le_bytes());
        let replay = decode_log(&buf);
        assert!(replay.truncated);
        assert!(replay.transactions.is_empty());
    }
}
