// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chanstats_core::{Key, RecordError, StatKind};
use metrics_024::Label;

/// A validated [`Key`] together with the registry key of every [`StatKind`] recorded under it.
///
/// Building a context checks the tag values once. Afterwards recording against it never fails,
/// and cloning it is a reference count bump.
#[derive(Debug, Clone)]
pub struct TagContext {
    key: Key,
    metric_keys: Arc<[metrics_024::Key; StatKind::COUNT]>,
}

impl TagContext {
    /// Validate the tags of `key` and precompute its registry keys.
    ///
    /// Empty fields are left out of the tag set.
    pub fn new(key: &Key) -> Result<Self, RecordError> {
        key.check_tags()?;
        let labels: Vec<Label> = key
            .tags()
            .map(|(name, value)| Label::new(name, value.to_owned()))
            .collect();
        let metric_keys =
            StatKind::ALL.map(|stat| metrics_024::Key::from_parts(stat.name(), labels.clone()));
        Ok(Self {
            key: key.clone(),
            metric_keys: Arc::new(metric_keys),
        })
    }

    /// The identity this context records under
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Registry key for `stat` under this identity
    pub fn metric_key(&self, stat: StatKind) -> &metrics_024::Key {
        &self.metric_keys[stat.index()]
    }
}
