#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod aggregator;
pub mod map;
pub mod summary;

pub use aggregator::{Aggregate, Aggregator};
pub use map::{AggregationMap, Snapshot};
pub use summary::{ChannelSummary, Metric, Summary, SummaryBuilder};
