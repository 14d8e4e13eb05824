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

use std::path::PathBuf;

use courier_common_telemetry::LoggingError;
use courier_delivery::DeliveryError;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("failed to load settings"))]
    LoadSettings { source: config::ConfigError },

    #[snafu(display("settings file {} does not exist", path.display()))]
    MissingSettings { path: PathBuf },

    #[snafu(display("failed to initialize logging"))]
    Logging { source: LoggingError },

    #[snafu(display("delivery failed"))]
    Delivery { source: DeliveryError },
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
