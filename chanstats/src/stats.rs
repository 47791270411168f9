// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chanstats_aggregation::{AggregationMap, Snapshot};
use chanstats_core::{Item, Key, RecordError};

use crate::{
    config::StatsBuilder,
    dispatch::{Dispatcher, Job},
    exporter::{ExportCycle, Exporter},
    registry::{MeasureRegistry, StatsRecorder},
    tags::TagContext,
};

/// A statistics context: measurement registry, aggregation map, fan-out workers and the
/// periodic exporter.
///
/// Observations recorded through the context accumulate as cumulative totals in the registry.
/// Every export pass (periodic, or [`Stats::export_now`]) hands those totals to the aggregation
/// map, and [`Stats::snapshot`] returns what changed since the previous snapshot.
///
/// Cloning is cheap and shares the context. Worker and exporter threads stop when the last
/// clone (and the last [`crate::RecordSet`] using it) is dropped; jobs still queued are recorded
/// first.
///
/// ```
/// use chanstats::{Item, Key, Stats};
///
/// let stats = Stats::builder().internal_exporter(false).build();
/// let key = Key::new("node_1", "client_1", "orders", "", "publish", "");
/// stats.record(&key, &Item { msg_count: 2.0, ..Default::default() }).unwrap();
///
/// stats.export_now();
/// assert_eq!(stats.snapshot().get(&key).unwrap().total_msg_count, 2.0);
/// assert!(stats.snapshot().is_empty());
/// ```
#[derive(Clone)]
pub struct Stats(Arc<Inner>);

struct Inner {
    node: String,
    fanout_chunk: usize,
    cycle: Arc<ExportCycle>,
    // declared before the dispatcher so its thread is joined first on drop
    exporter: Option<Exporter>,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stats")
            .field("node", &self.0.node)
            .field("fanout_chunk", &self.0.fanout_chunk)
            .field("internal_exporter", &self.0.exporter.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    /// Create a context with the [`StatsBuilder`] defaults
    pub fn new() -> Self {
        StatsBuilder::new().build()
    }

    /// Start configuring a context
    pub fn builder() -> StatsBuilder {
        StatsBuilder::new()
    }

    pub(crate) fn from_builder(builder: StatsBuilder) -> Self {
        let registry = Arc::new(MeasureRegistry::new());
        let map = Arc::new(AggregationMap::new());
        let cycle = Arc::new(ExportCycle::new(
            registry.clone(),
            map,
            builder.log_rows,
        ));
        let dispatcher = Dispatcher::new(
            registry,
            builder.workers,
            builder.queue_capacity,
            &builder.thread_name,
        );
        let exporter = builder.internal_exporter.then(|| {
            Exporter::spawn(
                cycle.clone(),
                builder.export_interval,
                &builder.thread_name,
            )
        });
        tracing::info!(
            node = %builder.node,
            workers = builder.workers,
            export_interval = ?builder.export_interval,
            internal_exporter = builder.internal_exporter,
            "started statistics context"
        );
        Self(Arc::new(Inner {
            node: builder.node,
            fanout_chunk: builder.fanout_chunk,
            cycle,
            exporter,
            dispatcher,
        }))
    }

    /// The node name used by the report helpers
    pub fn node(&self) -> &str {
        &self.0.node
    }

    /// Validate the tags of `key` and build its recording context
    pub fn tag_context(&self, key: &Key) -> Result<TagContext, RecordError> {
        TagContext::new(key)
    }

    /// Record `item` against `key` on the calling thread.
    ///
    /// Fails if a tag value of `key` is invalid; nothing is recorded in that case.
    pub fn record(&self, key: &Key, item: &Item) -> Result<(), RecordError> {
        let ctx = TagContext::new(key)?;
        self.record_with(&ctx, item);
        Ok(())
    }

    /// Record several items against `key`, validating its tags once
    pub fn record_all(&self, key: &Key, items: &[Item]) -> Result<(), RecordError> {
        let ctx = TagContext::new(key)?;
        for item in items {
            self.record_with(&ctx, item);
        }
        Ok(())
    }

    /// Record `item` against an already validated context
    pub fn record_with(&self, ctx: &TagContext, item: &Item) {
        self.0.cycle.registry.record(ctx, &item.measurements());
    }

    /// Record `item` against every context in `contexts` on the worker pool.
    ///
    /// The contexts are split in chunks of at most `fanout_chunk`, one job per chunk.
    pub(crate) fn fan_out(&self, contexts: Arc<[TagContext]>, item: &Item) {
        let measurements = item.measurements();
        if measurements.is_empty() || contexts.is_empty() {
            return;
        }
        let measurements = Arc::new(measurements);
        let chunk = self.0.fanout_chunk;
        let mut start = 0;
        while start < contexts.len() {
            let end = contexts.len().min(start + chunk);
            self.0.dispatcher.dispatch(Job::new(
                contexts.clone(),
                start..end,
                measurements.clone(),
            ));
            start = end;
        }
    }

    /// Block until every fan-out job dispatched so far has been recorded
    pub fn flush(&self) {
        self.0.dispatcher.flush();
    }

    /// Run one export pass now, returning the number of rows handed to the aggregation map.
    ///
    /// Does not wait for queued fan-out jobs; call [`Stats::flush`] first for that.
    pub fn export_now(&self) -> usize {
        self.0.cycle.run()
    }

    /// Consume everything exported since the previous snapshot.
    ///
    /// Only totals handed over by an export pass are visible: observations recorded after the
    /// last pass show up in a later snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.0.cycle.map.snapshot()
    }

    /// A [`metrics_024::Recorder`] feeding this context's registry
    pub fn recorder(&self) -> StatsRecorder {
        StatsRecorder(self.0.cycle.registry.clone())
    }
}
