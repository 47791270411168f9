// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The closed set of statistics tracked per identity

use std::fmt;

/// How the cumulative values of a statistic are accumulated and turned into per-period values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregation {
    /// Integer counter, reported as the increment since the last period
    Count,
    /// Floating-point sum, reported as the increment since the last period
    Sum,
    /// Gauge, reported as its latest value
    LastValue,
    /// `(count, sum)` pair, reported as the mean of the samples added since the last period
    Mean,
}

/// A statistic tracked for every identity.
///
/// Each kind is bound to a metric name, a unit and an [`Aggregation`]. The names are what the
/// measurement registry exports, and [`StatKind::from_name`] is the only place they are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatKind {
    /// Number of messages
    MsgCount,
    /// Total size of messages, in bytes
    MsgSize,
    /// Number of cache hits
    CacheHits,
    /// Number of cache misses
    CacheMiss,
    /// Number of errors
    Errors,
    /// Latency of requests, in milliseconds
    Latency,
    /// Unix time of the last update, in milliseconds
    LastUpdate,
}

impl StatKind {
    /// Number of statistic kinds
    pub const COUNT: usize = 7;

    /// Every statistic kind, in declaration order
    pub const ALL: [StatKind; Self::COUNT] = [
        StatKind::MsgCount,
        StatKind::MsgSize,
        StatKind::CacheHits,
        StatKind::CacheMiss,
        StatKind::Errors,
        StatKind::Latency,
        StatKind::LastUpdate,
    ];

    /// Metric name of this statistic
    pub const fn name(self) -> &'static str {
        match self {
            StatKind::MsgCount => "total_messages",
            StatKind::MsgSize => "total_message_size",
            StatKind::CacheHits => "total_cache_hits",
            StatKind::CacheMiss => "total_cache_miss",
            StatKind::Errors => "total_errors",
            StatKind::Latency => "total_latency",
            StatKind::LastUpdate => "last_update",
        }
    }

    /// Resolve a metric name. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<StatKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Unit of the recorded values
    pub const fn unit(self) -> &'static str {
        match self {
            StatKind::MsgCount | StatKind::CacheHits | StatKind::CacheMiss | StatKind::Errors => {
                "1"
            }
            StatKind::MsgSize => "By",
            StatKind::Latency | StatKind::LastUpdate => "ms",
        }
    }

    /// Human-readable description
    pub const fn description(self) -> &'static str {
        match self {
            StatKind::MsgCount => "count the number of messages",
            StatKind::MsgSize => "sum the size of messages",
            StatKind::CacheHits => "count the number of requests with cache hits",
            StatKind::CacheMiss => "count the number of requests with cache miss",
            StatKind::Errors => "count the number of errors",
            StatKind::Latency => "mean latency of requests",
            StatKind::LastUpdate => "unix time of the last update",
        }
    }

    /// How this statistic is aggregated
    pub const fn aggregation(self) -> Aggregation {
        match self {
            StatKind::MsgCount | StatKind::MsgSize => Aggregation::Sum,
            StatKind::CacheHits | StatKind::CacheMiss | StatKind::Errors => Aggregation::Count,
            StatKind::Latency => Aggregation::Mean,
            StatKind::LastUpdate => Aggregation::LastValue,
        }
    }

    /// Position of this kind in [`StatKind::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
