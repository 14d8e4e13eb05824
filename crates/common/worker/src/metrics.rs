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

use std::sync::LazyLock;

use prometheus::{
    HistogramVec, IntCounterVec, IntGaugeVec, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec,
};

pub const WORKER_LABEL: &str = "worker";

pub static WORKER_STARTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_worker_started_total",
        "Total number of workers started",
        &[WORKER_LABEL]
    )
    .unwrap()
});

pub static WORKER_STOPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_worker_stopped_total",
        "Total number of workers stopped",
        &[WORKER_LABEL]
    )
    .unwrap()
});

pub static WORKER_ACTIVE: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "courier_worker_active",
        "Whether the worker loop is running (1) or not (0)",
        &[WORKER_LABEL]
    )
    .unwrap()
});

pub static WORKER_EXECUTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_worker_executions_total",
        "Total number of commands handled",
        &[WORKER_LABEL]
    )
    .unwrap()
});

pub static WORKER_EXECUTION_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_worker_execution_errors_total",
        "Total number of hooks that returned an error",
        &[WORKER_LABEL]
    )
    .unwrap()
});

pub static WORKER_PANICS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_worker_panics_total",
        "Total number of hooks that panicked",
        &[WORKER_LABEL]
    )
    .unwrap()
});

pub static WORKER_TICKS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_worker_ticks_total",
        "Total number of tick hooks fired",
        &[WORKER_LABEL]
    )
    .unwrap()
});

pub static WORKER_EXECUTION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "courier_worker_execution_duration_seconds",
        "Command handling duration in seconds",
        &[WORKER_LABEL]
    )
    .unwrap()
});
