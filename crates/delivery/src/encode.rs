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

//! Request body for a batch: `data=<base64(JSON array)>`, form-encoded.

use base64::{Engine, prelude::BASE64_STANDARD};
use bytes::Bytes;
use serde_json::value::RawValue;
use snafu::ResultExt;

use crate::error::{EncodeSnafu, Result};

pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Encodes payloads as one JSON array.
///
/// A payload that is valid JSON is embedded as-is; anything else is
/// embedded as a JSON string of its (lossily decoded) UTF-8 text.
pub fn encode_batch(payloads: &[Bytes]) -> Result<String> {
    let items = payloads
        .iter()
        .map(|payload| match serde_json::from_slice::<Box<RawValue>>(payload) {
            Ok(raw) => Ok(raw),
            Err(_) => serde_json::value::to_raw_value(&String::from_utf8_lossy(payload)),
        })
        .collect::<Result<Vec<_>, _>>()
        .context(EncodeSnafu)?;
    let json = serde_json::to_vec(&items).context(EncodeSnafu)?;

    Ok(url::form_urlencoded::Serializer::new(String::new())
        .append_pair("data", &BASE64_STANDARD.encode(json))
        .finish())
}
