// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Values flowing between recording, export and aggregation

use crate::StatKind;

/// A single numeric value, either an integer count or a floating-point amount
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    /// Integer value
    Int(u64),
    /// Floating-point value
    Float(f64),
}

impl StatValue {
    /// The value as a float. Integers above 2^53 lose precision.
    pub fn as_f64(self) -> f64 {
        match self {
            StatValue::Int(v) => v as f64,
            StatValue::Float(v) => v,
        }
    }

    /// The value as an integer, truncating floats and clamping negatives to zero
    pub fn as_u64(self) -> u64 {
        match self {
            StatValue::Int(v) => v,
            StatValue::Float(v) => v as u64,
        }
    }
}

/// A named measurement produced from an [`crate::Item`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Which statistic this measures
    pub stat: StatKind,
    /// The measured amount
    pub value: StatValue,
}

impl Measurement {
    /// Create a new measurement
    pub fn new(stat: StatKind, value: StatValue) -> Self {
        Self { stat, value }
    }
}

/// A cumulative value handed over by the measurement registry once per export period
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    /// Cumulative integer count
    Count(u64),
    /// Cumulative floating-point sum
    Sum(f64),
    /// Latest gauge value
    LastValue(f64),
    /// Cumulative number of samples and their cumulative sum
    Mean {
        /// Number of samples
        count: u64,
        /// Sum of the samples
        sum: f64,
    },
}

/// One row of an export: a tag set, the metric name and its cumulative value
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    /// `(tag name, tag value)` pairs
    pub tags: Vec<(String, String)>,
    /// Metric name, normally one of the [`StatKind`] names
    pub stat: String,
    /// Cumulative value
    pub value: RawValue,
}

impl ExportRow {
    /// Tags as borrowed pairs, suitable for [`crate::Key::from_tags`]
    pub fn tag_pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.tags
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}
