// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// The error cases for recording an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A key field can't be used as a tag value
    InvalidTagValue {
        /// Name of the offending tag
        tag: &'static str,
        /// The rejected value
        value: String,
    },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTagValue { tag, value } => {
                write!(f, "invalid value {value:?} for tag `{tag}`")
            }
        }
    }
}

impl std::error::Error for RecordError {}
