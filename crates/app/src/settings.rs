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

//! Layered process settings.
//!
//! Sources are merged in order, later ones winning: built-in defaults, an
//! optional TOML file, then `COURIER__*` environment variables where `__`
//! separates nesting levels, e.g. `COURIER__DELIVERY__BATCH_SIZE=20`.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use courier_common_runtime::GlobalRuntimeOptions;
use courier_common_telemetry::LoggingOptions;
use courier_delivery::DeliveryOptions;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use crate::error::{LoadSettingsSnafu, MissingSettingsSnafu, Result};

pub const ENV_PREFIX: &str = "COURIER";

/// Execution model of the delivery worker.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Dedicated OS thread with a blocking HTTP client.
    #[default]
    #[display("thread")]
    Thread,
    /// Task on the network runtime with an async HTTP client.
    #[display("cooperative")]
    Cooperative,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode:     Mode,
    pub logging:  LoggingOptions,
    pub runtime:  GlobalRuntimeOptions,
    pub delivery: DeliveryOptions,
}

impl Settings {
    /// Loads settings from `path` (if given) and the process environment.
    ///
    /// A `path` that does not exist is an error rather than silently falling
    /// back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            ensure!(path.is_file(), MissingSettingsSnafu { path });
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder
            .add_source(env.separator("__").try_parsing(true))
            .build()
            .and_then(Config::try_deserialize)
            .context(LoadSettingsSnafu)
    }
}
