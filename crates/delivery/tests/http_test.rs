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

mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU16, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use axum_test::TestServer;
use common::{Fixture, ManualScheduler, decode_body, wait_until_async};
use courier_delivery::{Delivery, HttpTransport, QueueKind, QueueSet, encode};
use parking_lot::Mutex;
use serde_json::{Value, json};

#[derive(Clone)]
struct Ingest {
    status:   Arc<AtomicU16>,
    received: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl Ingest {
    fn answering(status: u16) -> Self {
        Ingest {
            status:   Arc::new(AtomicU16::new(status)),
            received: Arc::default(),
        }
    }

    fn received(&self) -> Vec<(String, Vec<Value>)> { self.received.lock().clone() }
}

async fn ingest(
    State(state): State<Ingest>,
    axum::extract::OriginalUri(uri): axum::extract::OriginalUri,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        encode::CONTENT_TYPE
    );
    state
        .received
        .lock()
        .push((uri.path().to_string(), decode_body(&body)));
    StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap()
}

fn create_test_server(state: Ingest) -> TestServer {
    let app = Router::new()
        .route("/track", post(ingest))
        .route("/engage", post(ingest))
        .with_state(state);

    TestServer::builder()
        .http_transport()
        .try_build(app)
        .expect("failed to create test server")
}

fn endpoint(server: &TestServer, path: &str) -> String {
    let base = server
        .server_address()
        .expect("server should have HTTP address")
        .to_string();
    format!("{}/{path}", base.trim_end_matches('/'))
}

fn options_for(fixture: &Fixture, server: &TestServer) -> courier_delivery::DeliveryOptions {
    let mut options = fixture.options.clone();
    options.track_url = endpoint(server, "track");
    options.engage_url = endpoint(server, "engage");
    options.request_timeout = Duration::from_secs(5);
    options
}

fn stored(fixture: &Fixture, kind: QueueKind) -> usize {
    let queues = QueueSet::open(&fixture.options).unwrap();
    let depth = queues.depth(kind);
    queues.close().unwrap();
    depth
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_thread_mode_posts_form_encoded_batches() {
    let state = Ingest::answering(200);
    let server = create_test_server(state.clone());
    let fixture = Fixture::new(2);
    let delivery = Delivery::start_with(
        options_for(&fixture, &server),
        HttpTransport::new(Duration::from_secs(5)),
        Arc::new(ManualScheduler::default()),
    )
    .unwrap();

    delivery.track_value(&json!({ "event": "a" })).unwrap();
    delivery.track_value(&json!({ "event": "b" })).unwrap();
    delivery.track_value(&json!({ "event": "c" })).unwrap();
    delivery.engage_value(&json!({ "$set": { "x": 1 } })).unwrap();
    delivery.flush().unwrap();
    delivery.shutdown_async().await.unwrap();

    assert_eq!(state.received(), vec![
        ("/track".to_string(), vec![
            json!({ "event": "a" }),
            json!({ "event": "b" })
        ]),
        ("/track".to_string(), vec![json!({ "event": "c" })]),
        ("/engage".to_string(), vec![json!({ "$set": { "x": 1 } })]),
    ]);
    assert_eq!(stored(&fixture, QueueKind::Track), 0);
    assert_eq!(stored(&fixture, QueueKind::Engage), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_error_keeps_entries() {
    let state = Ingest::answering(500);
    let server = create_test_server(state.clone());
    let fixture = Fixture::new(50);
    let scheduler = ManualScheduler::default();
    let delivery = Delivery::start_with(
        options_for(&fixture, &server),
        HttpTransport::new(Duration::from_secs(5)),
        Arc::new(scheduler.clone()),
    )
    .unwrap();

    delivery.track_value(&json!({ "event": "a" })).unwrap();
    delivery.flush().unwrap();
    wait_until_async("retry to be armed", || scheduler.armed_count() == 1).await;

    state.status.store(200, Ordering::SeqCst);
    delivery.force_flush().unwrap();
    delivery.shutdown_async().await.unwrap();

    assert_eq!(state.received().len(), 2);
    assert_eq!(scheduler.live_count(), 0);
    assert_eq!(stored(&fixture, QueueKind::Track), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_endpoint_arms_retry() {
    let fixture = Fixture::new(50);
    let mut options = fixture.options.clone();
    options.track_url = "http://127.0.0.1:1/track".to_string();
    let scheduler = ManualScheduler::default();
    let delivery = Delivery::start_with(
        options,
        HttpTransport::new(Duration::from_secs(2)),
        Arc::new(scheduler.clone()),
    )
    .unwrap();

    delivery.track("offline").unwrap();
    delivery.flush().unwrap();
    wait_until_async("retry to be armed", || scheduler.armed_count() == 1).await;
    delivery.shutdown_async().await.unwrap();

    assert_eq!(scheduler.delays(), vec![Duration::from_secs(120)]);
    assert_eq!(stored(&fixture, QueueKind::Track), 1);
}

#[tokio::test]
async fn test_cooperative_mode_posts_with_async_client() {
    let state = Ingest::answering(200);
    let server = create_test_server(state.clone());
    let fixture = Fixture::new(50);
    let delivery =
        Delivery::start_cooperative(options_for(&fixture, &server), &tokio::runtime::Handle::current())
            .unwrap();

    for n in 0..3 {
        let payload = serde_json::to_vec(&json!({ "n": n })).unwrap();
        delivery
            .submit_async(courier_delivery::Command::enqueue(QueueKind::Track, payload))
            .await
            .unwrap();
    }
    delivery
        .submit_async(courier_delivery::Command::Flush)
        .await
        .unwrap();
    delivery.shutdown_async().await.unwrap();

    assert_eq!(state.received(), vec![(
        "/track".to_string(),
        vec![json!({ "n": 0 }), json!({ "n": 1 }), json!({ "n": 2 })]
    )]);
    assert_eq!(stored(&fixture, QueueKind::Track), 0);
}
