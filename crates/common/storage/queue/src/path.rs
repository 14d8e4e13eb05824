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

//! File layout of a queue directory.
//!
//! ```text
//! <dir>/lock              exclusive-access sentinel
//! <dir>/meta.state        checkpoint of the append cursor
//! <dir>/transaction.log   operation journal
//! <dir>/data.<N>          payload files
//! ```

use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use snafu::ResultExt;

use crate::{Result, error::IoSnafu};

pub const LOCK_FILE: &str = "lock";
pub const META_FILE: &str = "meta.state";
pub const TRANSACTION_LOG_FILE: &str = "transaction.log";
const DATA_FILE_PREFIX: &str = "data.";

pub fn lock_file_path<P: AsRef<Path>>(base: P) -> PathBuf { base.as_ref().join(LOCK_FILE) }

pub fn meta_file_path<P: AsRef<Path>>(base: P) -> PathBuf { base.as_ref().join(META_FILE) }

pub fn transaction_log_path<P: AsRef<Path>>(base: P) -> PathBuf {
    base.as_ref().join(TRANSACTION_LOG_FILE)
}

/// Returns full path to a data file: `base/data.N`.
pub fn data_file_path<P: AsRef<Path>>(base: P, file_number: u32) -> PathBuf {
    base.as_ref()
        .join(format!("{DATA_FILE_PREFIX}{file_number}"))
}

/// Parses the number out of a `data.N` file name.
pub fn parse_data_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(DATA_FILE_PREFIX)?.parse().ok()
}

/// Lists the numbers of all `data.N` files in the directory, ascending.
pub fn scan_data_files<P: AsRef<Path>>(base: P) -> Result<Vec<u32>> {
    let base = base.as_ref();
    let mut numbers = Vec::new();
    for entry in fs::read_dir(base).context(IoSnafu { path: base })? {
        let entry = entry.context(IoSnafu { path: base })?;
        if let Some(number) = entry.file_name().to_str().and_then(parse_data_file_name) {
            numbers.push(number);
        }
    }
    numbers.sort_unstable();
    Ok(numbers)
}

/// Replaces `path` with `contents` through a temporary sibling and a rename,
/// so readers observe either the old or the new file.
pub(crate) fn write_atomically(path: &Path, contents: &[u8], sync: bool) -> Result<()> {
    let tmp = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)
        .context(IoSnafu { path: &tmp })?;
    file.write_all(contents).context(IoSnafu { path: &tmp })?;
    if sync {
        file.sync_all().context(IoSnafu { path: &tmp })?;
    }
    drop(file);
    fs::rename(&tmp, path).context(IoSnafu { path })?;
    if sync && let Some(parent) = path.parent() {
        // Persist the rename itself.
        File::open(parent)
            .and_then(|dir| dir.sync_all())
            .context(IoSnafu { path: parent })?;
    }
    Ok(())
}
