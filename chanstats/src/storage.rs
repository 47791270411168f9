// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Cumulative cells backing the measurement registry.
//!
//! Every cell only ever grows (or, for last-value gauges, gets overwritten). Reading a cell never
//! resets it: turning totals into per-period increments is the job of the aggregation map.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use metrics_024::{CounterFn, GaugeFn, HistogramFn};
use metrics_util_020::registry::Storage;

/// Monotonic integer total
#[derive(Debug, Default)]
pub struct CounterCell(AtomicU64);

impl CounterCell {
    /// Add `value` to the total
    pub fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    /// The current total
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl CounterFn for CounterCell {
    fn increment(&self, value: u64) {
        self.add(value);
    }

    fn absolute(&self, value: u64) {
        self.0.fetch_max(value, Ordering::Relaxed);
    }
}

/// Floating-point value stored as raw bits. Used both as a running sum and as a last value.
#[derive(Debug, Default)]
pub struct GaugeCell(AtomicU64);

impl GaugeCell {
    /// Add `value` to the stored amount
    pub fn add(&self, value: f64) {
        // the closure always returns Some, so the update cannot fail
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }

    /// Overwrite the stored amount
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// The stored amount
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl GaugeFn for GaugeCell {
    fn increment(&self, value: f64) {
        self.add(value);
    }

    fn decrement(&self, value: f64) {
        self.add(-value);
    }

    fn set(&self, value: f64) {
        GaugeCell::set(self, value);
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MeanState {
    count: u64,
    sum: f64,
}

/// Cumulative sample count and sample sum, from which a mean is derived per period
#[derive(Debug, Default)]
pub struct MeanCell(Mutex<MeanState>);

impl MeanCell {
    /// Record one sample
    pub fn record(&self, value: f64) {
        let mut state = self.0.lock().unwrap();
        state.count += 1;
        state.sum += value;
    }

    /// Cumulative `(count, sum)`
    pub fn get(&self) -> (u64, f64) {
        let state = *self.0.lock().unwrap();
        (state.count, state.sum)
    }
}

impl HistogramFn for MeanCell {
    fn record(&self, value: f64) {
        MeanCell::record(self, value);
    }
}

/// [`Storage`] handing out cumulative cells for every metric kind
#[derive(Debug, Default, Clone, Copy)]
pub struct CumulativeStorage;

impl<K> Storage<K> for CumulativeStorage {
    type Counter = Arc<CounterCell>;
    type Gauge = Arc<GaugeCell>;
    type Histogram = Arc<MeanCell>;

    fn counter(&self, _: &K) -> Self::Counter {
        Arc::new(CounterCell::default())
    }

    fn gauge(&self, _: &K) -> Self::Gauge {
        Arc::new(GaugeCell::default())
    }

    fn histogram(&self, _: &K) -> Self::Histogram {
        Arc::new(MeanCell::default())
    }
}
