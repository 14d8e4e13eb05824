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

//! Bounded FIFO of commands shared by producers and a single worker.
//!
//! Producers block while the queue is full and the consumer blocks while it
//! is empty. [`OperationQueue::quit`] wakes every waiter, sync or async, so
//! shutdown never deadlocks. The async entry points exist for the cooperative
//! driver, where blocking the executor thread is not an option.

use std::{collections::VecDeque, time::Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use crate::err::SubmitError;

/// Outcome of a bounded wait on the queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued<T> {
    Item(T),
    TimedOut,
    Closed,
}

struct State<T> {
    items: VecDeque<T>,
    quit:  bool,
}

pub struct OperationQueue<T> {
    state:     Mutex<State<T>>,
    capacity:  usize,
    not_empty: Condvar,
    not_full:  Condvar,
    readable:  Notify,
    writable:  Notify,
}

impl<T> OperationQueue<T> {
    /// Creates a queue holding at most `capacity` commands (minimum one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        OperationQueue {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                quit:  false,
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn len(&self) -> usize { self.state.lock().items.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn is_closed(&self) -> bool { self.state.lock().quit }

    /// Appends `item`, blocking while the queue is full.
    pub fn enqueue(&self, item: T) -> Result<(), SubmitError<T>> {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && !state.quit {
            self.not_full.wait(&mut state);
        }
        if state.quit {
            return Err(SubmitError::Closed(item));
        }
        state.items.push_back(item);
        drop(state);
        self.wake_readers();
        Ok(())
    }

    /// Appends `item` only if there is room right now.
    pub fn try_enqueue(&self, item: T) -> Result<(), SubmitError<T>> {
        let mut state = self.state.lock();
        if state.quit {
            return Err(SubmitError::Closed(item));
        }
        if state.items.len() >= self.capacity {
            return Err(SubmitError::Full(item));
        }
        state.items.push_back(item);
        drop(state);
        self.wake_readers();
        Ok(())
    }

    /// Appends `item`, yielding to the executor while the queue is full.
    pub async fn enqueue_async(&self, mut item: T) -> Result<(), SubmitError<T>> {
        loop {
            let writable = self.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            match self.try_enqueue(item) {
                Err(SubmitError::Full(back)) => {
                    item = back;
                    writable.await;
                }
                other => return other,
            }
        }
    }

    /// Removes the head, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue has been quit.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if state.quit {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.wake_writers();
                return Some(item);
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Removes the head, waiting no later than `deadline`.
    pub fn dequeue_deadline(&self, deadline: Instant) -> Dequeued<T> {
        let mut state = self.state.lock();
        loop {
            if state.quit {
                return Dequeued::Closed;
            }
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.wake_writers();
                return Dequeued::Item(item);
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                return if state.quit {
                    Dequeued::Closed
                } else {
                    state.items.pop_front().map_or(Dequeued::TimedOut, |item| {
                        self.not_full.notify_one();
                        self.writable.notify_one();
                        Dequeued::Item(item)
                    })
                };
            }
        }
    }

    /// Removes the head without waiting.
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();
        if state.quit {
            return None;
        }
        let item = state.items.pop_front();
        drop(state);
        if item.is_some() {
            self.wake_writers();
        }
        item
    }

    /// Removes the head, yielding to the executor while the queue is empty.
    pub async fn dequeue_async(&self) -> Option<T> {
        loop {
            let readable = self.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.quit {
                    return None;
                }
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.wake_writers();
                    return Some(item);
                }
            }
            readable.await;
        }
    }

    /// Closes the queue and wakes every blocked producer and consumer.
    ///
    /// Commands still queued are dropped with the queue.
    pub fn quit(&self) {
        self.state.lock().quit = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    fn wake_readers(&self) {
        self.not_empty.notify_one();
        self.readable.notify_one();
    }

    fn wake_writers(&self) {
        self.not_full.notify_one();
        self.writable.notify_one();
    }
}
