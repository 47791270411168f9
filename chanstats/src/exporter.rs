// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Periodic hand-over of cumulative totals from the registry to the aggregation map.

use std::{
    sync::{
        Arc, Mutex,
        mpsc::{self, RecvTimeoutError},
    },
    thread,
    time::Duration,
};

use chanstats_aggregation::AggregationMap;

use crate::registry::MeasureRegistry;

/// One export pass: read every total from the registry and insert it into the map
#[derive(Debug)]
pub(crate) struct ExportCycle {
    pub(crate) registry: Arc<MeasureRegistry>,
    pub(crate) map: Arc<AggregationMap>,
    log_rows: bool,
    // Passes must not interleave: inserting an older total after a newer one would make the
    // delta aggregators count the difference twice.
    running: Mutex<()>,
}

impl ExportCycle {
    pub(crate) fn new(
        registry: Arc<MeasureRegistry>,
        map: Arc<AggregationMap>,
        log_rows: bool,
    ) -> Self {
        Self {
            registry,
            map,
            log_rows,
            running: Mutex::new(()),
        }
    }

    /// Run one pass, returning the number of rows handed over
    pub(crate) fn run(&self) -> usize {
        let _running = self.running.lock().unwrap();
        let rows = self.registry.export();
        for row in &rows {
            if self.log_rows {
                tracing::debug!(
                    stat = %row.stat,
                    tags = ?row.tags,
                    value = ?row.value,
                    "exported row"
                );
            }
            self.map.insert_row(row);
        }
        tracing::trace!(rows = rows.len(), "export pass complete");
        rows.len()
    }
}

/// Background thread running an [`ExportCycle`] every interval until dropped
pub(crate) struct Exporter {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Exporter {
    pub(crate) fn spawn(cycle: Arc<ExportCycle>, interval: Duration, thread_name: &str) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let name = format!("{thread_name}-exporter");
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let span = tracing::span!(
                    tracing::Level::TRACE,
                    "statistics exporter",
                    exporter = %name,
                    ?interval
                );
                let _enter = span.enter();
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            cycle.run();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("statistics exporter stopped");
            })
            .expect("failed to spawn statistics exporter");
        Self {
            stop: Some(stop),
            handle: Some(handle),
        }
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        // dropping the sender disconnects the channel and wakes the thread
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("statistics exporter panicked");
            }
        }
    }
}
