//! Registry of aggregators keyed by identity and statistic

use std::{collections::HashMap, sync::Mutex};

use chanstats_core::{ExportRow, Key, RawValue, StatKind};

use crate::{
    aggregator::{Aggregate, Aggregator},
    summary::{ChannelSummary, Metric, Summary, SummaryBuilder},
};

/// Maps `(identity, statistic)` to its [`Aggregator`].
///
/// A single lock guards the whole map, so an insert never interleaves with the read-then-clear
/// sequence of a [`AggregationMap::snapshot`] and every touched value is consumed exactly once.
///
/// Aggregators are created on first insert and never evicted: memory grows with the number of
/// distinct `(identity, statistic)` pairs ever inserted.
///
/// ```
/// use chanstats_aggregation::AggregationMap;
/// use chanstats_core::{Key, RawValue};
///
/// let map = AggregationMap::new();
/// let key = Key::new("node", "client", "orders", "", "publish", "");
/// map.insert(key.clone(), "total_messages", RawValue::Sum(2.0));
///
/// let snapshot = map.snapshot();
/// assert_eq!(snapshot.get(&key).unwrap().total_msg_count, 2.0);
/// assert!(map.snapshot().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct AggregationMap {
    aggregators: Mutex<hashbrown::HashMap<(Key, StatKind), Aggregator>>,
}

impl AggregationMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cumulative value for the statistic named `stat_name`.
    ///
    /// Names that are not a [`StatKind`] name are dropped without creating an aggregator.
    pub fn insert(&self, key: Key, stat_name: &str, value: RawValue) {
        match StatKind::from_name(stat_name) {
            Some(stat) => self.insert_stat(key, stat, value),
            None => tracing::trace!(stat = stat_name, ?key, "dropping unrecognized statistic"),
        }
    }

    /// Insert a cumulative value for `stat`
    pub fn insert_stat(&self, key: Key, stat: StatKind, value: RawValue) {
        let mut aggregators = self.aggregators.lock().unwrap();
        aggregators
            .entry((key, stat))
            .or_insert_with(|| Aggregator::for_stat(stat))
            .insert(value);
    }

    /// Insert one exported row, building its identity from the row tags
    pub fn insert_row(&self, row: &ExportRow) {
        self.insert(Key::from_tags(row.tag_pairs()), &row.stat, row.value);
    }

    /// Consume every touched aggregator and roll the values up per identity and globally.
    ///
    /// The result is a diff: identities with nothing new since the previous snapshot are absent,
    /// and a second call without intervening inserts returns an empty snapshot.
    pub fn snapshot(&self) -> Snapshot {
        let mut channels: HashMap<String, ChannelSummary> = HashMap::new();
        {
            let mut aggregators = self.aggregators.lock().unwrap();
            for ((key, stat), aggregator) in aggregators.iter_mut() {
                if !aggregator.is_touched() {
                    continue;
                }
                let value = aggregator.consume();
                match channels.get_mut(key.as_str()) {
                    Some(summary) => summary.apply(*stat, value),
                    None => {
                        let mut summary = ChannelSummary::new(key);
                        summary.apply(*stat, value);
                        channels.insert(key.to_string(), summary);
                    }
                }
            }
        }

        let mut builder = SummaryBuilder::new();
        for summary in channels.values() {
            builder.add(summary);
        }
        tracing::debug!(identities = channels.len(), "built statistics snapshot");
        Snapshot {
            channels,
            summary: builder.finish(),
        }
    }

    /// Number of live aggregators
    pub fn len(&self) -> usize {
        self.aggregators.lock().unwrap().len()
    }

    /// Whether no aggregator was ever created
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The result of one snapshot pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Per-identity rollups, keyed by the encoded [`Key`]
    pub channels: HashMap<String, ChannelSummary>,
    /// Rollup across all identities of the pass
    pub summary: Summary,
}

impl Snapshot {
    /// The rollup for `key`, if it changed during the pass
    pub fn get(&self, key: &Key) -> Option<&ChannelSummary> {
        self.channels.get(key.as_str())
    }

    /// Whether no identity changed
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of identities that changed
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Raw per-identity values, keyed by the encoded [`Key`]
    pub fn metrics(&self) -> HashMap<String, Metric> {
        self.channels
            .iter()
            .map(|(key, summary)| (key.clone(), Metric::from(summary)))
            .collect()
    }
}
