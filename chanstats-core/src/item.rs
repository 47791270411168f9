// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use smallvec::SmallVec;

use crate::{Measurement, StatKind, StatValue};

/// Measurements of a single [`Item`]. At most one per [`StatKind`].
pub type Measurements = SmallVec<[Measurement; StatKind::COUNT]>;

/// One observation against an identity.
///
/// Fields left at their default (zero, or `None`) were not observed and produce no measurement.
/// Integer fields produce a single measurement carrying the whole value, so an item with
/// `errors: 3` adds 3 to the cumulative error count.
///
/// ```
/// use chanstats_core::{Item, StatKind};
///
/// let item = Item {
///     msg_count: 2.0,
///     errors: 1,
///     ..Default::default()
/// };
/// let stats: Vec<_> = item.measurements().iter().map(|m| m.stat).collect();
/// assert_eq!(stats, [StatKind::MsgCount, StatKind::Errors]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    /// Number of messages
    pub msg_count: f64,
    /// Size of the messages, in bytes
    pub msg_size: f64,
    /// Number of cache hits
    pub cache_hits: u64,
    /// Number of cache misses
    pub cache_misses: u64,
    /// Number of errors
    pub errors: u64,
    /// Latency of the operation
    pub latency: Duration,
    /// Time of this update
    pub last_update: Option<SystemTime>,
}

impl Item {
    /// The measurements this item records. Only strictly positive values are included.
    pub fn measurements(&self) -> Measurements {
        let mut ms = Measurements::new();
        if self.msg_count > 0.0 {
            ms.push(Measurement::new(
                StatKind::MsgCount,
                StatValue::Float(self.msg_count),
            ));
        }
        if self.msg_size > 0.0 {
            ms.push(Measurement::new(
                StatKind::MsgSize,
                StatValue::Float(self.msg_size),
            ));
        }
        if self.cache_hits > 0 {
            ms.push(Measurement::new(
                StatKind::CacheHits,
                StatValue::Int(self.cache_hits),
            ));
        }
        if self.cache_misses > 0 {
            ms.push(Measurement::new(
                StatKind::CacheMiss,
                StatValue::Int(self.cache_misses),
            ));
        }
        if self.errors > 0 {
            ms.push(Measurement::new(
                StatKind::Errors,
                StatValue::Int(self.errors),
            ));
        }
        if self.latency > Duration::ZERO {
            ms.push(Measurement::new(
                StatKind::Latency,
                StatValue::Float(self.latency.as_nanos() as f64 / 1e6),
            ));
        }
        if let Some(millis) = self.last_update.and_then(unix_millis) {
            ms.push(Measurement::new(
                StatKind::LastUpdate,
                StatValue::Float(millis as f64),
            ));
        }
        ms
    }
}

fn unix_millis(time: SystemTime) -> Option<u64> {
    let millis = time.duration_since(UNIX_EPOCH).ok()?.as_millis();
    u64::try_from(millis).ok().filter(|ms| *ms > 0)
}
