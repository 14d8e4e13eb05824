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

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use courier_common_worker::{
    BlockingWorker, Flow, Handle, OperationQueue, SubmitError, WorkError, WorkResult, Worker,
    WorkerConfig, spawn_task, spawn_thread,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cmd {
    Record(u32),
    Fail,
    Fatal,
    Panic,
    Quit,
}

#[derive(Clone, Default)]
struct Probe {
    seen:     Arc<Mutex<Vec<u32>>>,
    ticks:    Arc<AtomicUsize>,
    shutdown: Arc<AtomicUsize>,
}

struct Recorder {
    probe: Probe,
}

impl Recorder {
    fn handle(&mut self, cmd: Cmd) -> WorkResult<Flow> {
        match cmd {
            Cmd::Record(n) => self.probe.seen.lock().push(n),
            Cmd::Fail => return Err(WorkError::transient("flaky")),
            Cmd::Fatal => return Err(WorkError::fatal("broken")),
            Cmd::Panic => panic!("command exploded"),
            Cmd::Quit => return Ok(Flow::Stop),
        }
        Ok(Flow::Continue)
    }
}

impl BlockingWorker<Cmd> for Recorder {
    fn work(&mut self, cmd: Cmd) -> WorkResult<Flow> { self.handle(cmd) }

    fn on_tick(&mut self) -> WorkResult {
        self.probe.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_shutdown(&mut self) -> WorkResult {
        self.probe.shutdown.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Worker<Cmd> for Recorder {
    async fn work(&mut self, cmd: Cmd) -> WorkResult<Flow> {
        tokio::task::yield_now().await;
        self.handle(cmd)
    }

    async fn on_tick(&mut self) -> WorkResult {
        self.probe.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_shutdown(&mut self) -> WorkResult {
        self.probe.shutdown.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn recorder() -> (Recorder, Probe) {
    let probe = Probe::default();
    (
        Recorder {
            probe: probe.clone(),
        },
        probe,
    )
}

#[test]
fn test_thread_processes_in_order_until_stop() {
    let (worker, probe) = recorder();
    let queue = Arc::new(OperationQueue::new(4));
    let handle = spawn_thread(&WorkerConfig::default(), Arc::clone(&queue), worker).unwrap();

    for cmd in [Cmd::Record(1), Cmd::Fail, Cmd::Record(2), Cmd::Panic, Cmd::Record(3), Cmd::Quit] {
        queue.enqueue(cmd).unwrap();
    }
    handle.join().unwrap();

    assert_eq!(*probe.seen.lock(), vec![1, 2, 3]);
    assert_eq!(probe.shutdown.load(Ordering::SeqCst), 1);
    assert!(matches!(
        queue.enqueue(Cmd::Record(4)),
        Err(SubmitError::Closed(_))
    ));
}

#[test]
fn test_thread_fatal_error_stops_loop() {
    let (worker, probe) = recorder();
    let queue = Arc::new(OperationQueue::new(4));
    let handle = spawn_thread(&WorkerConfig::default(), Arc::clone(&queue), worker).unwrap();

    queue.enqueue(Cmd::Fatal).unwrap();
    handle.join().unwrap();
    assert!(probe.seen.lock().is_empty());
    assert_eq!(probe.shutdown.load(Ordering::SeqCst), 1);
}

#[test]
fn test_thread_stop_wakes_idle_worker() {
    let (worker, probe) = recorder();
    let queue = Arc::new(OperationQueue::new(4));
    let handle = spawn_thread(&WorkerConfig::default(), Arc::clone(&queue), worker).unwrap();

    std::thread::sleep(Duration::from_millis(20));
    handle.stop();
    assert!(handle.is_stopped());
    handle.join().unwrap();
    assert_eq!(probe.shutdown.load(Ordering::SeqCst), 1);
}

#[test]
fn test_thread_ticks_under_sustained_traffic() {
    let (worker, probe) = recorder();
    let config = WorkerConfig::builder()
        .name("ticker")
        .tick_interval(Duration::from_millis(20))
        .build();
    let queue = Arc::new(OperationQueue::new(4));
    let handle = spawn_thread(&config, Arc::clone(&queue), worker).unwrap();

    for n in 0..30 {
        queue.enqueue(Cmd::Record(n)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
    }
    queue.enqueue(Cmd::Quit).unwrap();
    handle.join().unwrap();

    assert_eq!(probe.seen.lock().len(), 30);
    assert!(probe.ticks.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_task_matches_thread_semantics() {
    let (worker, probe) = recorder();
    let queue = Arc::new(OperationQueue::new(2));
    let handle = spawn_task(
        &WorkerConfig::default(),
        Arc::clone(&queue),
        worker,
        &tokio::runtime::Handle::current(),
    );

    for cmd in [Cmd::Record(1), Cmd::Fail, Cmd::Panic, Cmd::Record(2), Cmd::Quit] {
        queue.enqueue_async(cmd).await.unwrap();
    }
    handle.join().await.unwrap();

    assert_eq!(*probe.seen.lock(), vec![1, 2]);
    assert_eq!(probe.shutdown.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_task_ticks_and_stops() {
    let (worker, probe) = recorder();
    let config = WorkerConfig::builder()
        .tick_interval(Duration::from_millis(10))
        .build();
    let queue = Arc::new(OperationQueue::new(2));
    let handle = spawn_task(
        &config,
        Arc::clone(&queue),
        worker,
        &tokio::runtime::Handle::current(),
    );

    tokio::time::sleep(Duration::from_millis(60)).await;
    handle.stop();
    handle.join().await.unwrap();

    assert!(probe.ticks.load(Ordering::SeqCst) >= 2);
    assert_eq!(probe.shutdown.load(Ordering::SeqCst), 1);
}

#[test]
fn test_task_on_current_thread_runtime_advances_only_when_driven() {
    let runtime = courier_common_runtime::create_current_thread_runtime("coop").unwrap();
    let (worker, probe) = recorder();
    let queue = Arc::new(OperationQueue::new(4));
    let handle = spawn_task(
        &WorkerConfig::default(),
        Arc::clone(&queue),
        worker,
        runtime.handle(),
    );

    queue.try_enqueue(Cmd::Record(7)).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(probe.seen.lock().is_empty());

    runtime.block_on(async {
        queue.enqueue_async(Cmd::Quit).await.unwrap();
        handle.join().await.unwrap();
    });
    assert_eq!(*probe.seen.lock(), vec![7]);
}
