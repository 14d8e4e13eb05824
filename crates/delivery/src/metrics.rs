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
    IntCounter, IntCounterVec, IntGaugeVec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec,
};

pub const QUEUE_LABEL: &str = "queue";
pub const OUTCOME_LABEL: &str = "outcome";

pub static DELIVERY_BATCHES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_delivery_batches_total",
        "Batches sent, by queue and outcome",
        &[QUEUE_LABEL, OUTCOME_LABEL]
    )
    .unwrap()
});

pub static DELIVERY_ENTRIES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "courier_delivery_entries_total",
        "Entries committed after a successful delivery",
        &[QUEUE_LABEL]
    )
    .unwrap()
});

pub static DELIVERY_RETRIES_ARMED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "courier_delivery_retries_armed_total",
        "Retry timers armed after a rejected batch"
    )
    .unwrap()
});

pub static DELIVERY_FLUSHES_SUPPRESSED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "courier_delivery_flushes_suppressed_total",
        "Flush requests ignored while a retry was pending"
    )
    .unwrap()
});

pub static QUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "courier_queue_depth",
        "Entries waiting in each queue",
        &[QUEUE_LABEL]
    )
    .unwrap()
});
