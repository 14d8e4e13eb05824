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

//! Logging setup built on `tracing-subscriber`.
//!
//! [`init_global_logging`] installs a registry with up to three layers: a
//! stdout layer, an hourly rolling file layer and an error-only rolling file
//! layer. Every writer goes through `tracing_appender::non_blocking`, so the
//! returned [`WorkerGuard`]s must outlive the application.

use std::{
    env,
    io::IsTerminal,
    sync::{Mutex, Once},
};

use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize, de};
use smart_default::SmartDefault;
use snafu::{ResultExt, Snafu};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter, layer::SubscriberExt};

/// Deserializes a string value, using `Default::default()` if the string is
/// empty.
///
/// Environment overrides such as `COURIER__LOGGING__LOG_FORMAT=` arrive as
/// empty strings; those mean "use the default".
///
/// # Errors
/// Returns an error if the non-empty string is not a valid `T`.
pub fn empty_string_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let s = String::deserialize(deserializer)?;
    if s.is_empty() {
        Ok(T::default())
    } else {
        T::deserialize(de::value::StrDeserializer::new(&s)).map_err(|e: de::value::Error| {
            de::Error::custom(format!("invalid value, expect empty string, err: {e}"))
        })
    }
}

/// The default directory name for log files when file logging is enabled.
pub const DEFAULT_LOGGING_DIR: &str = "logs";

/// Default log level filter when neither `level` nor `RUST_LOG` is set.
const DEFAULT_LOG_TARGETS: &str = "info";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoggingError {
    #[snafu(display("failed to initialize rolling file appender at {dir}"))]
    Appender {
        dir:    String,
        source: tracing_appender::rolling::InitError,
    },

    #[snafu(display("invalid log level filter '{level}'"))]
    InvalidLevel {
        level:  String,
        source: filter::ParseError,
    },

    #[snafu(display("failed to bridge `log` records into tracing"))]
    LogBridge { source: tracing_log::log::SetLoggerError },

    #[snafu(display("failed to install the global tracing subscriber"))]
    SetGlobal {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
}

pub type Result<T, E = LoggingError> = std::result::Result<T, E>;

/// Configuration options for the logging system.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, SmartDefault, Builder)]
#[serde(default)]
pub struct LoggingOptions {
    /// Directory for log files.
    ///
    /// When non-empty, log files are created here with hourly rotation. When
    /// empty, only stdout logging is used.
    #[default = ""]
    #[builder(default, into)]
    pub dir: String,

    /// Log level filter string, e.g. `"info"` or `"debug,reqwest=warn"`.
    ///
    /// Falls back to `RUST_LOG` and then to `"info"`.
    #[builder(into)]
    pub level: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_default")]
    #[builder(default)]
    pub log_format: LogFormat,

    /// Maximum number of rotated log files to retain per prefix.
    #[default = 720]
    #[builder(default = 720)]
    pub max_log_files: usize,

    /// Whether to write to stdout in addition to files.
    #[default = true]
    #[builder(default = true)]
    pub append_stdout: bool,
}

/// Available log output formats.
#[derive(
    Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize, Default, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One JSON object per event, with the current span attached.
    Json,

    /// Human-readable text.
    #[default]
    Text,
}

/// Initialize stdout logging with default options.
///
/// # Errors
/// See [`init_global_logging`].
pub fn init_tracing_subscriber(app_name: &str) -> Result<Vec<WorkerGuard>> {
    init_global_logging(app_name, &LoggingOptions::default())
}

/// Initialize logging for unit tests.
///
/// Logs go to `UNITTEST_LOG_DIR` (default `/tmp/__unittest_logs`) filtered by
/// `UNITTEST_LOG_LEVEL`. Safe to call from every test; only the first call
/// does anything.
pub fn init_default_ut_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let dir =
            env::var("UNITTEST_LOG_DIR").unwrap_or_else(|_| "/tmp/__unittest_logs".to_string());
        let level = env::var("UNITTEST_LOG_LEVEL")
            .unwrap_or_else(|_| "debug,hyper=warn,hyper_util=warn,reqwest=warn,h2=info".to_string());
        let opts = LoggingOptions {
            dir: dir.clone(),
            level: Some(level),
            append_stdout: false,
            ..Default::default()
        };

        match init_global_logging("unittest", &opts) {
            Ok(guards) => {
                if let Ok(mut g) = GLOBAL_UT_LOG_GUARD.lock() {
                    *g = Some(guards);
                }
                tracing::info!("logs dir = {}", dir);
            }
            Err(e) => eprintln!("unit test logging disabled: {e}"),
        }
    });
}

/// Keeps the unit test writers alive for the whole test binary.
static GLOBAL_UT_LOG_GUARD: Mutex<Option<Vec<WorkerGuard>>> = Mutex::new(None);

/// Initialize the global tracing subscriber.
///
/// Only the first call installs anything; later calls return an empty guard
/// list. `app_name` becomes the file prefix of the rolling logs.
///
/// # Errors
/// Fails when the log directory cannot be prepared, the level filter does not
/// parse, or another global subscriber is already installed.
pub fn init_global_logging(app_name: &str, opts: &LoggingOptions) -> Result<Vec<WorkerGuard>> {
    static START: Once = Once::new();
    let mut result = Ok(Vec::new());
    START.call_once(|| result = install(app_name, opts));
    result
}

fn install(app_name: &str, opts: &LoggingOptions) -> Result<Vec<WorkerGuard>> {
    let mut guards = vec![];

    let level = opts
        .level
        .clone()
        .or_else(|| env::var(EnvFilter::DEFAULT_ENV).ok())
        .unwrap_or_else(|| DEFAULT_LOG_TARGETS.to_string());
    let targets = level
        .parse::<filter::Targets>()
        .context(InvalidLevelSnafu { level: level.clone() })?;

    let stdout_logging_layer = if opts.append_stdout {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(guard);
        let ansi = std::io::stdout().is_terminal();

        Some(match opts.log_format {
            LogFormat::Json => tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(ansi)
                .boxed(),
        })
    } else {
        None
    };

    let (file_logging_layer, err_file_logging_layer) = if opts.dir.is_empty() {
        (None, None)
    } else {
        let appender = rolling_appender(&opts.dir, app_name, opts.max_log_files)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        let file_layer = match opts.log_format {
            LogFormat::Json => tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(false)
                .boxed(),
        };

        let err_appender =
            rolling_appender(&opts.dir, &format!("{app_name}-err"), opts.max_log_files)?;
        let (writer, guard) = tracing_appender::non_blocking(err_appender);
        guards.push(guard);
        let err_layer = match opts.log_format {
            LogFormat::Json => tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
            LogFormat::Text => tracing_subscriber::fmt::Layer::new()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter::LevelFilter::ERROR)
                .boxed(),
        };

        (Some(file_layer), Some(err_layer))
    };

    let subscriber = Registry::default()
        .with(targets)
        .with(stdout_logging_layer)
        .with(file_logging_layer)
        .with(err_file_logging_layer);

    LogTracer::init().context(LogBridgeSnafu)?;
    tracing::subscriber::set_global_default(subscriber).context(SetGlobalSnafu)?;

    Ok(guards)
}

fn rolling_appender(dir: &str, prefix: &str, max_files: usize) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(max_files)
        .build(dir)
        .context(AppenderSnafu { dir })
}
