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

use crate::{err::WorkResult, worker::Flow};

/// Command handler that owns a dedicated OS thread.
///
/// Unlike [`Worker`](crate::Worker), every hook may block: the thread driver
/// calls them directly and nothing else runs on that thread.
///
/// ```rust
/// use courier_common_worker::{BlockingWorker, Flow, WorkResult};
///
/// struct Sum(u64);
///
/// impl BlockingWorker<u64> for Sum {
///     fn work(&mut self, n: u64) -> WorkResult<Flow> {
///         self.0 += n;
///         Ok(Flow::Continue)
///     }
/// }
/// ```
pub trait BlockingWorker<C: Send + 'static>: Send + 'static {
    fn on_start(&mut self) -> WorkResult { Ok(()) }

    fn work(&mut self, command: C) -> WorkResult<Flow>;

    fn on_tick(&mut self) -> WorkResult { Ok(()) }

    fn on_shutdown(&mut self) -> WorkResult { Ok(()) }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    struct TestBlockingWorker {
        counter: Arc<AtomicUsize>,
    }

    impl BlockingWorker<()> for TestBlockingWorker {
        fn on_start(&mut self) -> WorkResult {
            self.counter.store(1, Ordering::SeqCst);
            Ok(())
        }

        fn work(&mut self, (): ()) -> WorkResult<Flow> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Continue)
        }

        fn on_shutdown(&mut self) -> WorkResult {
            self.counter.store(999, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_blocking_worker_hooks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut worker = TestBlockingWorker {
            counter: Arc::clone(&counter),
        };

        fn assert_send<T: Send>(_: &T) {}
        assert_send(&worker);

        worker.on_start().unwrap();
        worker.work(()).unwrap();
        worker.on_tick().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        worker.on_shutdown().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 999);
    }
}
