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

//! Data file handles.
//!
//! New data files are pre-sized to the configured maximum to reduce
//! fragmentation; the append cursor, not the file length, marks the end of
//! written data.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use bytes::{Bytes, BytesMut};
use snafu::ResultExt;

use crate::{FlushMode, Result, error::IoSnafu};

/// The data file currently receiving appends.
pub struct DataFile {
    file: File,
    path: PathBuf,
}

impl DataFile {
    /// Opens `path` for writing, creating it pre-sized to `size` bytes when
    /// it does not exist yet.
    pub fn open_or_create<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .context(IoSnafu { path: &path })?;
        let len = file.metadata().context(IoSnafu { path: &path })?.len();
        if len == 0 {
            file.set_len(size).context(IoSnafu { path: &path })?;
        }
        Ok(Self { file, path })
    }

    /// Writes `chunks` back to back starting at `offset` and returns the
    /// offset following the last byte.
    pub fn write_at(&mut self, offset: u64, chunks: &[Bytes]) -> Result<u64> {
        self.file
            .seek(SeekFrom::Start(offset))
            .context(IoSnafu { path: &self.path })?;
        let mut position = offset;
        for chunk in chunks {
            self.file
                .write_all(chunk)
                .context(IoSnafu { path: &self.path })?;
            position += chunk.len() as u64;
        }
        Ok(position)
    }

    pub fn flush(&mut self, mode: FlushMode) -> Result<()> {
        self.file.flush().context(IoSnafu { path: &self.path })?;
        if mode == FlushMode::Sync {
            self.file.sync_data().context(IoSnafu { path: &self.path })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

/// Reads `len` bytes at `offset` from the data file at `path`.
pub fn read_span(path: &Path, offset: u64, len: usize) -> Result<Bytes> {
    let mut file = File::open(path).context(IoSnafu { path })?;
    file.seek(SeekFrom::Start(offset))
        .context(IoSnafu { path })?;
    let mut buf = BytesMut::zeroed(len);
    file.read_exact(&mut buf).context(IoSnafu { path })?;
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_create_presizes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.0");

        let file = DataFile::open_or_create(&path, 4096).unwrap();
        assert_eq!(file.path(), path);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
    }

    #[test]
    fn test_reopen_keeps_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.0");

        let mut file = DataFile::open_or_create(&path, 64).unwrap();
        let end = file
            .write_at(0, &[Bytes::from_static(b"hello"), Bytes::from_static(b"world")])
            .unwrap();
        assert_eq!(end, 10);
        file.flush(FlushMode::Sync).unwrap();
        drop(file);

        let mut file = DataFile::open_or_create(&path, 64).unwrap();
        file.write_at(10, &[Bytes::from_static(b"!")]).unwrap();
        file.flush(FlushMode::Async).unwrap();

        assert_eq!(read_span(&path, 0, 11).unwrap(), Bytes::from_static(b"helloworld!"));
        assert_eq!(read_span(&path, 5, 5).unwrap(), Bytes::from_static(b"world"));
    }

    #[test]
    fn test_read_past_end_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.0");
        std::fs::write(&path, b"abc").unwrap();

        assert!(read_span(&path, 2, 4).is_err());
    }
}
