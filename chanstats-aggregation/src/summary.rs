//! Per-identity and global rollups built during a snapshot pass

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chanstats_core::{Key, StatKind, StatValue};
use hashbrown::HashSet;
use serde::Serialize;

fn average(total: f64, count: f64) -> f64 {
    if count > 0.0 { total / count } else { 0.0 }
}

fn error_rate(errors: u64, count: f64) -> f64 {
    if count > 0.0 {
        errors as f64 / count * 100.0
    } else {
        0.0
    }
}

fn cache_hits_ratio(hits: u64, misses: u64) -> f64 {
    let lookups = hits + misses;
    if lookups > 0 {
        hits as f64 / lookups as f64
    } else {
        0.0
    }
}

/// Per-period rollup of one identity
///
/// Values are the increments seen during a single snapshot pass, not running totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSummary {
    /// Node field of the identity
    pub node: String,
    /// Channel field of the identity
    pub channel: String,
    /// Group field of the identity
    pub group: String,
    /// Client id field of the identity
    pub client_id: String,
    /// Kind, joined with the sub-kind as `kind_subkind` when present
    pub kind: String,
    /// Messages in this period
    pub total_msg_count: f64,
    /// Bytes of messages in this period
    pub total_msg_size: f64,
    /// `total_msg_size / total_msg_count`
    pub avg_msg_size: f64,
    /// Cache hits in this period
    pub total_cache_hits: u64,
    /// Cache misses in this period
    pub total_cache_miss: u64,
    /// `hits / (hits + misses)`
    pub cache_hits_ratio: f64,
    /// Errors in this period
    pub total_errors: u64,
    /// Mean latency of this period, in milliseconds
    pub avg_latency: f64,
    /// `100 - error_rate`
    pub success_rate: f64,
    /// Errors per hundred messages
    pub error_rate: f64,
    /// Unix time of the last update, in milliseconds. Zero if none was reported.
    pub last_updated_unix: u64,
    /// Time of the last update
    pub last_update_time: Option<SystemTime>,
}

impl ChannelSummary {
    /// An empty summary for `key`
    pub fn new(key: &Key) -> Self {
        Self {
            node: key.node().to_owned(),
            channel: key.channel().to_owned(),
            group: key.group().to_owned(),
            client_id: key.client_id().to_owned(),
            kind: key.kind_label(),
            total_msg_count: 0.0,
            total_msg_size: 0.0,
            avg_msg_size: 0.0,
            total_cache_hits: 0,
            total_cache_miss: 0,
            cache_hits_ratio: 0.0,
            total_errors: 0,
            avg_latency: 0.0,
            success_rate: 0.0,
            error_rate: 0.0,
            last_updated_unix: 0,
            last_update_time: None,
        }
    }

    /// Set the field for `stat` and recompute the derived ratios
    pub fn apply(&mut self, stat: StatKind, value: StatValue) {
        match stat {
            StatKind::MsgCount => self.total_msg_count = value.as_f64(),
            StatKind::MsgSize => self.total_msg_size = value.as_f64(),
            StatKind::CacheHits => self.total_cache_hits = value.as_u64(),
            StatKind::CacheMiss => self.total_cache_miss = value.as_u64(),
            StatKind::Errors => self.total_errors = value.as_u64(),
            StatKind::Latency => self.avg_latency = value.as_f64(),
            StatKind::LastUpdate => {
                let millis = value.as_u64();
                self.last_updated_unix = millis;
                self.last_update_time = Some(UNIX_EPOCH + Duration::from_millis(millis));
            }
        }
        self.recompute();
    }

    /// Recompute averages, rates and ratios from the totals
    pub fn recompute(&mut self) {
        self.avg_msg_size = average(self.total_msg_size, self.total_msg_count);
        self.error_rate = error_rate(self.total_errors, self.total_msg_count);
        self.success_rate = 100.0 - self.error_rate;
        self.cache_hits_ratio = cache_hits_ratio(self.total_cache_hits, self.total_cache_miss);
    }
}

/// Rollup across all identities of a snapshot pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Node of the first identity that carried one
    pub node: String,
    /// Messages across all identities
    pub total_msg_count: f64,
    /// Bytes of messages across all identities
    pub total_msg_size: f64,
    /// `total_msg_size / total_msg_count`
    pub avg_msg_size: f64,
    /// Cache hits across all identities
    pub total_cache_hits: u64,
    /// Cache misses across all identities
    pub total_cache_miss: u64,
    /// `hits / (hits + misses)`
    pub cache_hits_ratio: f64,
    /// Errors across all identities
    pub total_errors: u64,
    /// Unweighted mean of the latencies of the identities that reported one
    pub avg_latency: f64,
    /// Distinct non-empty channels seen in the pass
    pub total_active_channels: u64,
    /// Distinct non-empty client ids seen in the pass
    pub total_active_clients: u64,
    /// `100 - error_rate`
    pub success_rate: f64,
    /// Errors per hundred messages
    pub error_rate: f64,
    /// Most recent update across all identities, unix milliseconds
    pub last_updated_unix: u64,
}

/// Folds [`ChannelSummary`]s into a [`Summary`]
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    summary: Summary,
    channels: HashSet<String>,
    clients: HashSet<String>,
    latency_total: f64,
    latency_reports: u64,
}

impl SummaryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one identity's rollup into the running totals
    pub fn add(&mut self, cs: &ChannelSummary) -> &mut Self {
        let s = &mut self.summary;
        if s.node.is_empty() {
            s.node.clone_from(&cs.node);
        }
        s.total_msg_count += cs.total_msg_count;
        s.total_msg_size += cs.total_msg_size;
        s.total_errors += cs.total_errors;
        s.total_cache_hits += cs.total_cache_hits;
        s.total_cache_miss += cs.total_cache_miss;
        s.avg_msg_size = average(s.total_msg_size, s.total_msg_count);
        s.error_rate = error_rate(s.total_errors, s.total_msg_count);
        s.success_rate = 100.0 - s.error_rate;
        s.cache_hits_ratio = cache_hits_ratio(s.total_cache_hits, s.total_cache_miss);
        s.last_updated_unix = s.last_updated_unix.max(cs.last_updated_unix);

        if cs.avg_latency > 0.0 {
            self.latency_total += cs.avg_latency;
            self.latency_reports += 1;
            s.avg_latency = average(self.latency_total, self.latency_reports as f64);
        }
        if !cs.channel.is_empty() && !self.channels.contains(cs.channel.as_str()) {
            self.channels.insert(cs.channel.clone());
            s.total_active_channels += 1;
        }
        if !cs.client_id.is_empty() && !self.clients.contains(cs.client_id.as_str()) {
            self.clients.insert(cs.client_id.clone());
            s.total_active_clients += 1;
        }
        self
    }

    /// The summary so far
    pub fn finish(self) -> Summary {
        let mut summary = self.summary;
        if summary.total_msg_count <= 0.0 {
            summary.success_rate = 100.0;
        }
        summary
    }
}

/// The raw per-identity values of a snapshot pass, without derived ratios
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Node field of the identity
    pub node: String,
    /// Channel field of the identity
    pub channel: String,
    /// Group field of the identity
    pub group: String,
    /// Client id field of the identity
    pub client_id: String,
    /// Kind, joined with the sub-kind as `kind_subkind` when present
    pub kind: String,
    /// Messages
    pub msg_count: f64,
    /// Bytes of messages
    pub msg_size: f64,
    /// Cache hits
    pub cache_hit: u64,
    /// Cache misses
    pub cache_miss: u64,
    /// Errors
    pub errors: u64,
    /// Mean latency, in milliseconds
    pub latency: f64,
    /// Unix time of the last update, in milliseconds
    pub last_update: u64,
}

impl From<&ChannelSummary> for Metric {
    fn from(cs: &ChannelSummary) -> Self {
        Self {
            node: cs.node.clone(),
            channel: cs.channel.clone(),
            group: cs.group.clone(),
            client_id: cs.client_id.clone(),
            kind: cs.kind.clone(),
            msg_count: cs.total_msg_count,
            msg_size: cs.total_msg_size,
            cache_hit: cs.total_cache_hits,
            cache_miss: cs.total_cache_miss,
            errors: cs.total_errors,
            latency: cs.avg_latency,
            last_update: cs.last_updated_unix,
        }
    }
}
