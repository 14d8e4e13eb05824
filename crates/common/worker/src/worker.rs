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

use crate::err::WorkResult;

/// What the driver should do after a command has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Command handler driven on an async executor.
///
/// The driver pulls commands from an [`OperationQueue`](crate::OperationQueue)
/// one at a time and awaits `work` before taking the next, so
/// implementations never see concurrent calls. `on_tick` fires every
/// `tick_interval` measured from the previous tick.
#[async_trait::async_trait]
pub trait Worker<C: Send + 'static>: Send + 'static {
    /// Called once before the first command.
    async fn on_start(&mut self) -> WorkResult { Ok(()) }

    /// Handles one command.
    async fn work(&mut self, command: C) -> WorkResult<Flow>;

    async fn on_tick(&mut self) -> WorkResult { Ok(()) }

    /// Called once after the loop exits, whatever the reason.
    async fn on_shutdown(&mut self) -> WorkResult { Ok(()) }
}
