// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod dispatch;
mod exporter;
mod rate_limit;
pub mod registry;
pub mod report;
mod set;
mod stats;
pub mod storage;
mod tags;

pub use chanstats_aggregation::{ChannelSummary, Metric, Snapshot, Summary};
pub use chanstats_core::{Item, Key, RecordError, StatKind};

pub use crate::config::StatsBuilder;
pub use crate::registry::{MeasureRegistry, StatsRecorder};
pub use crate::report::{KIND_PUBLISH, KIND_PUBLISH_PERSISTENCE};
pub use crate::set::RecordSet;
pub use crate::stats::Stats;
pub use crate::tags::TagContext;
