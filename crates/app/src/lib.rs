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

mod error;
mod settings;
pub mod store;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use courier_common_telemetry as telemetry;
use courier_delivery::{Command, Delivery};
pub use error::{AppError, Result};
pub use settings::{ENV_PREFIX, Mode, Settings};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DeliverySnafu, LoggingSnafu};

/// Name used for log file prefixes.
pub const APP_NAME: &str = "courier";

/// The long-running delivery service.
pub struct App {
    settings:           Settings,
    running:            Arc<AtomicBool>,
    cancellation_token: CancellationToken,
}

/// Handle for controlling a running application
#[derive(Clone)]
pub struct AppHandle {
    running:            Arc<AtomicBool>,
    cancellation_token: CancellationToken,
}

impl AppHandle {
    /// Gracefully shutdown the application
    pub fn shutdown(&self) {
        info!("Initiating graceful shutdown");
        self.cancellation_token.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    pub async fn wait_for_shutdown(&self) { self.cancellation_token.cancelled().await; }
}

impl App {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        App {
            settings,
            running: Arc::new(AtomicBool::new(false)),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub const fn settings(&self) -> &Settings { &self.settings }

    #[must_use]
    pub fn handle(&self) -> AppHandle {
        AppHandle {
            running:            Arc::clone(&self.running),
            cancellation_token: self.cancellation_token.clone(),
        }
    }

    /// Installs logging and the panic hook, then serves until Ctrl-C,
    /// SIGTERM or [`AppHandle::shutdown`].
    ///
    /// Must be called from within a tokio runtime; in cooperative mode that
    /// runtime also drives the delivery worker.
    pub async fn run(self) -> Result<()> {
        let _guards =
            telemetry::init_global_logging(APP_NAME, &self.settings.logging).context(LoggingSnafu)?;
        telemetry::set_panic_hook();
        self.serve().await
    }

    /// Sends everything queued once, bypassing any retry backoff, and exits.
    pub async fn flush_once(self) -> Result<()> {
        let _guards =
            telemetry::init_global_logging(APP_NAME, &self.settings.logging).context(LoggingSnafu)?;
        let delivery = self.start_delivery()?;
        delivery
            .submit_async(Command::ForceFlush)
            .await
            .context(DeliverySnafu)?;
        delivery.shutdown_async().await.context(DeliverySnafu)
    }

    async fn serve(self) -> Result<()> {
        let delivery = self.start_delivery()?;
        self.running.store(true, Ordering::SeqCst);
        info!(
            mode = %self.settings.mode,
            data_dir = %self.settings.delivery.data_dir.display(),
            "courier started"
        );

        shutdown_signal(self.cancellation_token.clone()).await;

        self.running.store(false, Ordering::SeqCst);
        info!(
            track = delivery.depth(courier_delivery::QueueKind::Track),
            engage = delivery.depth(courier_delivery::QueueKind::Engage),
            "shutting down delivery"
        );
        delivery.shutdown_async().await.context(DeliverySnafu)?;
        info!("courier shutdown complete");
        Ok(())
    }

    fn start_delivery(&self) -> Result<Delivery> {
        let options = self.settings.delivery.clone();
        match self.settings.mode {
            Mode::Thread => Delivery::start(options),
            Mode::Cooperative => {
                Delivery::start_cooperative(options, &tokio::runtime::Handle::current())
            }
        }
        .context(DeliverySnafu)
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
        () = token.cancelled() => { info!("Received shutdown signal"); },
    }
}
