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

//! Entry and operation types shared by the engine, sessions and the
//! transaction log.

use std::hash::{Hash, Hasher};

use bytes::Bytes;

/// A span of bytes inside a numbered data file.
///
/// `data` is only populated once the entry has been read into memory, so
/// identity is the `(file_number, start, length)` triple alone.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub file_number: u32,
    pub start:       u32,
    pub length:      u32,
    pub data:        Option<Bytes>,
}

impl QueueEntry {
    #[must_use]
    pub const fn new(file_number: u32, start: u32, length: u32) -> Self {
        Self {
            file_number,
            start,
            length,
            data: None,
        }
    }

    /// Offset one past the last byte of this entry.
    #[must_use]
    pub const fn end(&self) -> u64 { self.start as u64 + self.length as u64 }

    pub(crate) const fn operation(&self, kind: OperationType) -> Operation {
        Operation {
            kind,
            file_number: self.file_number,
            start: self.start,
            length: self.length,
        }
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.file_number == other.file_number
            && self.start == other.start
            && self.length == other.length
    }
}

impl Eq for QueueEntry {}

impl Hash for QueueEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.file_number.hash(state);
        self.start.hash(state);
        self.length.hash(state);
    }
}

impl From<&Operation> for QueueEntry {
    fn from(op: &Operation) -> Self { Self::new(op.file_number, op.start, op.length) }
}

/// Operation type tag as stored in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationType {
    Enqueue   = 1,
    Dequeue   = 2,
    Reinstate = 3,
}

impl TryFrom<u8> for OperationType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Enqueue),
            2 => Ok(Self::Dequeue),
            3 => Ok(Self::Reinstate),
            other => Err(other),
        }
    }
}

/// The durable unit recorded in the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    pub kind:        OperationType,
    pub file_number: u32,
    pub start:       u32,
    pub length:      u32,
}

impl Operation {
    #[must_use]
    pub const fn new(kind: OperationType, file_number: u32, start: u32, length: u32) -> Self {
        Self {
            kind,
            file_number,
            start,
            length,
        }
    }
}
