// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::Stats;

/// Builder for a [`Stats`] context.
///
/// ```
/// use std::time::Duration;
/// use chanstats::StatsBuilder;
///
/// let stats = StatsBuilder::new()
///     .node("node_1")
///     .export_interval(Duration::from_secs(10))
///     .workers(4)
///     .build();
/// assert_eq!(stats.node(), "node_1");
/// ```
#[derive(Debug, Clone)]
pub struct StatsBuilder {
    pub(crate) node: String,
    pub(crate) export_interval: Duration,
    pub(crate) internal_exporter: bool,
    pub(crate) workers: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) fanout_chunk: usize,
    pub(crate) thread_name: String,
    pub(crate) log_rows: bool,
}

impl Default for StatsBuilder {
    fn default() -> Self {
        Self {
            node: String::new(),
            export_interval: Duration::from_secs(5),
            internal_exporter: true,
            workers: 2,
            queue_capacity: 1024,
            fanout_chunk: 256,
            thread_name: "chanstats".to_owned(),
            log_rows: false,
        }
    }
}

impl StatsBuilder {
    /// Create a builder with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Node name stamped on identities built by the report helpers. Defaults to empty.
    pub fn node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    /// How often the exporter thread hands cumulative totals to the aggregation map.
    ///
    /// Defaults to 5 seconds. A snapshot only sees what was exported before it, so this bounds
    /// how stale a snapshot can be. Use [`Stats::export_now`] to force a pass.
    pub fn export_interval(mut self, interval: Duration) -> Self {
        assert!(!interval.is_zero(), "export interval must be positive");
        self.export_interval = interval;
        self
    }

    /// Whether to run the periodic exporter thread. Defaults to `true`.
    ///
    /// Without it, totals only reach the aggregation map through [`Stats::export_now`].
    pub fn internal_exporter(mut self, enabled: bool) -> Self {
        self.internal_exporter = enabled;
        self
    }

    /// Number of threads recording record-set fan-out. Defaults to 2.
    pub fn workers(mut self, workers: usize) -> Self {
        assert!(workers > 0, "at least one worker is required");
        self.workers = workers;
        self
    }

    /// Number of fan-out jobs that can wait for a worker. Defaults to 1024.
    ///
    /// When the queue is full, the recording thread runs the job itself. Nothing is dropped.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        self.queue_capacity = capacity;
        self
    }

    /// Largest number of identities recorded by one fan-out job. Defaults to 256.
    pub fn fanout_chunk(mut self, chunk: usize) -> Self {
        assert!(chunk > 0, "fan-out chunk must be positive");
        self.fanout_chunk = chunk;
        self
    }

    /// Prefix of the worker and exporter thread names. Defaults to `chanstats`.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty());
        self.thread_name = name;
        self
    }

    /// Log every exported row at `debug` level. Defaults to `false`.
    pub fn log_rows(mut self, enabled: bool) -> Self {
        self.log_rows = enabled;
        self
    }

    /// Build the context, starting its worker and exporter threads
    pub fn build(self) -> Stats {
        Stats::from_builder(self)
    }
}
