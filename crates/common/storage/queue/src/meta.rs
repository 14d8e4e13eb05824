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

#![allow(clippy::cast_possible_wrap)]

//! The `meta.state` checkpoint: where the next append goes.
//!
//! Layout is an int32 file number followed by an int64 byte position, both
//! little-endian.

use std::{fs, io::ErrorKind, path::Path};

use tracing::{debug, warn};

use crate::{Result, path::write_atomically};

const META_SIZE: usize = 4 + 8;

/// Append cursor persisted after every commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub file_number: u32,
    pub position:    u64,
}

impl Checkpoint {
    fn encode(self) -> [u8; META_SIZE] {
        let mut buf = [0u8; META_SIZE];
        buf[..4].copy_from_slice(&(self.file_number as i32).to_le_bytes());
        buf[4..].copy_from_slice(&(self.position as i64).to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < META_SIZE {
            return None;
        }
        let file_number = i32::from_le_bytes(buf[..4].try_into().ok()?);
        let position = i64::from_le_bytes(buf[4..META_SIZE].try_into().ok()?);
        Some(Self {
            file_number: u32::try_from(file_number).ok()?,
            position:    u64::try_from(position).ok()?,
        })
    }
}

/// Reads the checkpoint, falling back to a fresh cursor when the file is
/// missing or unreadable.
pub(crate) fn read_checkpoint(path: &Path) -> Checkpoint {
    match fs::read(path) {
        Ok(buf) => Checkpoint::decode(&buf).unwrap_or_else(|| {
            warn!(path = ?path, len = buf.len(), "Ignoring malformed checkpoint");
            Checkpoint::default()
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = ?path, "No checkpoint, starting fresh");
            Checkpoint::default()
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to read checkpoint, starting fresh");
            Checkpoint::default()
        }
    }
}

pub(crate) fn write_checkpoint(path: &Path, checkpoint: Checkpoint, sync: bool) -> Result<()> {
    write_atomically(path, &checkpoint.encode(), sync)
}
