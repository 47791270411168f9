// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::error::RecordError;
pub use crate::item::{Item, Measurements};
pub use crate::key::{FIELD_COUNT, KEY_DELIMITER, Key, TAG_NAMES};
pub use crate::stat::{Aggregation, StatKind};
pub use crate::value::{ExportRow, Measurement, RawValue, StatValue};

mod error;
mod item;
pub mod key;
pub mod stat;
pub mod value;
