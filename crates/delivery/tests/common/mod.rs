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

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use base64::{Engine, prelude::BASE64_STANDARD};
use courier_common_worker::{CancelToken, Scheduler};
use courier_delivery::{AsyncTransport, BlockingTransport, DeliveryOptions, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;

pub struct Fixture {
    pub options: DeliveryOptions,
    _temp_dir:   TempDir,
}

impl Fixture {
    pub fn new(batch_size: usize) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let options = DeliveryOptions {
            data_dir: temp_dir.path().to_path_buf(),
            batch_size,
            flush_interval: Duration::from_secs(3600),
            sync_writes: false,
            ..Default::default()
        };
        Fixture {
            options,
            _temp_dir: temp_dir,
        }
    }
}

/// Decodes a `data=<base64(JSON array)>` request body.
pub fn decode_body(body: &str) -> Vec<Value> {
    let (key, data) = url::form_urlencoded::parse(body.as_bytes()).next().unwrap();
    assert_eq!(key, "data");
    serde_json::from_slice(&BASE64_STANDARD.decode(data.as_bytes()).unwrap()).unwrap()
}

#[derive(Debug, Clone)]
pub struct Request {
    pub url:   String,
    pub items: Vec<Value>,
}

/// Answers with scripted statuses, then 200, and records every request.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    statuses: Arc<Mutex<VecDeque<u16>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedTransport {
    pub fn answering(statuses: &[u16]) -> Self {
        let transport = Self::default();
        transport.statuses.lock().extend(statuses);
        transport
    }

    pub fn requests(&self) -> Vec<Request> { self.requests.lock().clone() }

    pub fn request_count(&self) -> usize { self.requests.lock().len() }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.requests.lock().iter().map(|r| r.items.len()).collect()
    }

    fn answer(&self, url: &str, body: &str) -> u16 {
        self.requests.lock().push(Request {
            url:   url.to_string(),
            items: decode_body(body),
        });
        self.statuses.lock().pop_front().unwrap_or(200)
    }
}

impl BlockingTransport for ScriptedTransport {
    fn post(&mut self, url: &str, body: String) -> Result<u16> { Ok(self.answer(url, &body)) }
}

#[async_trait::async_trait]
impl AsyncTransport for ScriptedTransport {
    async fn post(&mut self, url: &str, body: String) -> Result<u16> {
        tokio::task::yield_now().await;
        Ok(self.answer(url, &body))
    }
}

struct Armed {
    delay: Duration,
    token: CancelToken,
    task:  Option<Box<dyn FnOnce() + Send>>,
}

/// Records timers instead of running them; tests fire them by hand.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    armed: Arc<Mutex<Vec<Armed>>>,
}

impl ManualScheduler {
    pub fn delays(&self) -> Vec<Duration> { self.armed.lock().iter().map(|a| a.delay).collect() }

    pub fn armed_count(&self) -> usize { self.armed.lock().len() }

    /// Timers armed and not cancelled.
    pub fn live_count(&self) -> usize {
        self.armed
            .lock()
            .iter()
            .filter(|a| !a.token.is_cancelled())
            .count()
    }

    /// Runs the most recent timer unless it was cancelled.
    pub fn fire_last(&self) -> bool {
        let task = {
            let mut armed = self.armed.lock();
            let Some(last) = armed.last_mut() else {
                return false;
            };
            if last.token.is_cancelled() {
                return false;
            }
            last.task.take()
        };
        task.map(|task| task()).is_some()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> CancelToken {
        let token = CancelToken::new();
        self.armed.lock().push(Armed {
            delay,
            token: token.clone(),
            task: Some(task),
        });
        token
    }
}

pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

pub async fn wait_until_async(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
