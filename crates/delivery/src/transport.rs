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

//! HTTP egress. Success is exactly status 200; the caller decides.

use std::time::Duration;

use once_cell::unsync::OnceCell;
use reqwest::header::CONTENT_TYPE;
use snafu::ResultExt;

use crate::{
    encode,
    error::{HttpSnafu, Result},
};

/// Posts a batch body and reports the response status.
///
/// Used by the thread driver, so implementations may block.
pub trait BlockingTransport: Send + 'static {
    fn post(&mut self, url: &str, body: String) -> Result<u16>;
}

/// Posts a batch body without blocking the executor.
#[async_trait::async_trait]
pub trait AsyncTransport: Send + 'static {
    async fn post(&mut self, url: &str, body: String) -> Result<u16>;
}

/// Blocking reqwest client, built on first use on the worker thread.
#[derive(Debug)]
pub struct HttpTransport {
    timeout: Duration,
    client:  OnceCell<reqwest::blocking::Client>,
}

impl HttpTransport {
    pub const fn new(timeout: Duration) -> Self {
        HttpTransport {
            timeout,
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .context(HttpSnafu)
        })
    }
}

impl BlockingTransport for HttpTransport {
    fn post(&mut self, url: &str, body: String) -> Result<u16> {
        let response = self
            .client()?
            .post(url)
            .header(CONTENT_TYPE, encode::CONTENT_TYPE)
            .body(body)
            .send()
            .context(HttpSnafu)?;
        Ok(response.status().as_u16())
    }
}

/// Async reqwest client for the cooperative driver.
#[derive(Debug, Clone)]
pub struct AsyncHttpTransport {
    client: reqwest::Client,
}

impl AsyncHttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(HttpSnafu)?;
        Ok(AsyncHttpTransport { client })
    }
}

#[async_trait::async_trait]
impl AsyncTransport for AsyncHttpTransport {
    async fn post(&mut self, url: &str, body: String) -> Result<u16> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, encode::CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .context(HttpSnafu)?;
        Ok(response.status().as_u16())
    }
}
