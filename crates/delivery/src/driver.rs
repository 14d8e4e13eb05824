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

//! The delivery worker, once per execution model.
//!
//! [`ThreadDelivery`] posts with a blocking transport on its own thread;
//! [`CooperativeDelivery`] awaits an async transport so the executor it
//! shares stays responsive. The loops are identical apart from that call.

use courier_common_worker::{BlockingWorker, Flow, WorkError, WorkResult, Worker};

use crate::{
    command::{Command, QueueKind},
    dispatch::{Dispatcher, Step},
    error::{DeliveryError, Result},
    transport::{AsyncTransport, BlockingTransport},
};

fn dispatch_error(command: &'static str, e: DeliveryError) -> WorkError {
    WorkError::transient_with_source(format!("{command} failed"), e)
}

pub(crate) struct ThreadDelivery<T> {
    dispatcher: Dispatcher,
    transport:  T,
}

impl<T: BlockingTransport> ThreadDelivery<T> {
    pub(crate) const fn new(dispatcher: Dispatcher, transport: T) -> Self {
        ThreadDelivery {
            dispatcher,
            transport,
        }
    }

    fn flush(&mut self) -> Result<()> {
        let queues = self.dispatcher.queues();
        for kind in QueueKind::ALL {
            for _ in 0..self.dispatcher.batch_count(kind) {
                let Some(mut batch) = self.dispatcher.next_batch(&queues, kind)? else {
                    break;
                };
                let outcome = self
                    .transport
                    .post(self.dispatcher.url(kind), batch.take_body());
                if !self.dispatcher.settle(kind, batch, outcome)? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

impl<T: BlockingTransport> BlockingWorker<Command> for ThreadDelivery<T> {
    fn work(&mut self, command: Command) -> WorkResult<Flow> {
        let name = command.name();
        let step = self
            .dispatcher
            .prepare(command)
            .map_err(|e| dispatch_error(name, e))?;
        match step {
            Step::Done => Ok(Flow::Continue),
            Step::Flush => {
                self.flush().map_err(|e| dispatch_error(name, e))?;
                Ok(Flow::Continue)
            }
            Step::Stop => Ok(Flow::Stop),
        }
    }

    fn on_tick(&mut self) -> WorkResult { self.work(Command::Flush).map(|_| ()) }

    fn on_shutdown(&mut self) -> WorkResult {
        self.dispatcher.shutdown();
        Ok(())
    }
}

pub(crate) struct CooperativeDelivery<T> {
    dispatcher: Dispatcher,
    transport:  T,
}

impl<T: AsyncTransport> CooperativeDelivery<T> {
    pub(crate) const fn new(dispatcher: Dispatcher, transport: T) -> Self {
        CooperativeDelivery {
            dispatcher,
            transport,
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let queues = self.dispatcher.queues();
        for kind in QueueKind::ALL {
            for _ in 0..self.dispatcher.batch_count(kind) {
                let Some(mut batch) = self.dispatcher.next_batch(&queues, kind)? else {
                    break;
                };
                let outcome = self
                    .transport
                    .post(self.dispatcher.url(kind), batch.take_body())
                    .await;
                if !self.dispatcher.settle(kind, batch, outcome)? {
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<T: AsyncTransport> Worker<Command> for CooperativeDelivery<T> {
    async fn work(&mut self, command: Command) -> WorkResult<Flow> {
        let name = command.name();
        let step = self
            .dispatcher
            .prepare(command)
            .map_err(|e| dispatch_error(name, e))?;
        match step {
            Step::Done => Ok(Flow::Continue),
            Step::Flush => {
                self.flush().await.map_err(|e| dispatch_error(name, e))?;
                Ok(Flow::Continue)
            }
            Step::Stop => Ok(Flow::Stop),
        }
    }

    async fn on_tick(&mut self) -> WorkResult { self.work(Command::Flush).await.map(|_| ()) }

    async fn on_shutdown(&mut self) -> WorkResult {
        self.dispatcher.shutdown();
        Ok(())
    }
}
