// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The measurement registry: cumulative totals per `(statistic, tag set)`.

use std::sync::Arc;

use chanstats_core::{Aggregation, ExportRow, Measurement, RawValue, StatKind};
use metrics_024::{Counter, Gauge, Histogram, KeyName, Metadata, Recorder, SharedString, Unit};
use metrics_util_020::registry::Registry;

use crate::{storage::CumulativeStorage, tags::TagContext};

/// Cumulative totals for every `(statistic, tag set)` recorded so far.
///
/// Each [`StatKind`] is backed by the cell matching its [`Aggregation`]: counts by a counter,
/// sums and last values by a gauge, means by a histogram keeping sample count and sum. The same
/// cells back the handles returned through [`StatsRecorder`], so `metrics` macro calls and
/// [`MeasureRegistry::record`] feed the same totals.
pub struct MeasureRegistry {
    registry: Registry<metrics_024::Key, CumulativeStorage>,
}

impl std::fmt::Debug for MeasureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasureRegistry").finish_non_exhaustive()
    }
}

impl Default for MeasureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasureRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            registry: Registry::new(CumulativeStorage),
        }
    }

    /// Add `measurements` to the totals of the identity in `ctx`
    pub fn record(&self, ctx: &TagContext, measurements: &[Measurement]) {
        for m in measurements {
            let key = ctx.metric_key(m.stat);
            match m.stat.aggregation() {
                Aggregation::Count => self
                    .registry
                    .get_or_create_counter(key, |c| c.add(m.value.as_u64())),
                Aggregation::Sum => self
                    .registry
                    .get_or_create_gauge(key, |g| g.add(m.value.as_f64())),
                Aggregation::LastValue => self
                    .registry
                    .get_or_create_gauge(key, |g| g.set(m.value.as_f64())),
                Aggregation::Mean => self
                    .registry
                    .get_or_create_histogram(key, |h| h.record(m.value.as_f64())),
            }
        }
    }

    /// Read every cumulative total as an [`ExportRow`]. Totals are left untouched.
    ///
    /// Gauges named after a last-value statistic export as [`RawValue::LastValue`]; every other
    /// gauge exports as a running [`RawValue::Sum`].
    pub fn export(&self) -> Vec<ExportRow> {
        let mut rows = Vec::new();
        self.registry.visit_counters(|key, counter| {
            rows.push(row(key, RawValue::Count(counter.get())));
        });
        self.registry.visit_gauges(|key, gauge| {
            let value = match StatKind::from_name(key.name()).map(StatKind::aggregation) {
                Some(Aggregation::LastValue) => RawValue::LastValue(gauge.get()),
                _ => RawValue::Sum(gauge.get()),
            };
            rows.push(row(key, value));
        });
        self.registry.visit_histograms(|key, histogram| {
            let (count, sum) = histogram.get();
            rows.push(row(key, RawValue::Mean { count, sum }));
        });
        rows
    }
}

fn row(key: &metrics_024::Key, value: RawValue) -> ExportRow {
    ExportRow {
        tags: key
            .labels()
            .map(|l| (l.key().to_owned(), l.value().to_owned()))
            .collect(),
        stat: key.name().to_owned(),
        value,
    }
}

/// A [`metrics_024::Recorder`] writing into a [`MeasureRegistry`].
///
/// Record with the `metrics` macros using a [`StatKind`] name and the identity tag names
/// (`node`, `client_id`, `channel`, `group`, `kind`, `sub_kind`) as labels. Use `counter!` for
/// count statistics, `gauge!` (`increment` for sums, `set` for last values) and `histogram!`
/// for means. Metrics under other names are kept by the registry but dropped by aggregation.
#[derive(Debug, Clone)]
pub struct StatsRecorder(pub(crate) Arc<MeasureRegistry>);

impl Recorder for StatsRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
    }

    fn register_counter(&self, key: &metrics_024::Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.0.registry.get_or_create_counter(key, Clone::clone))
    }

    fn register_gauge(&self, key: &metrics_024::Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.0.registry.get_or_create_gauge(key, Clone::clone))
    }

    fn register_histogram(&self, key: &metrics_024::Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.0.registry.get_or_create_histogram(key, Clone::clone))
    }
}
