// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use chanstats_core::{Item, Key, RecordError};

use crate::{Stats, tags::TagContext};

/// A named, mutable set of identities that every recorded [`Item`] fans out to.
///
/// Membership changes take effect for records started after the change. Records run on the
/// [`Stats`] worker pool; call [`Stats::flush`] to wait for them.
///
/// ```
/// use chanstats::{Item, Key, RecordSet, Stats};
///
/// let stats = Stats::builder().internal_exporter(false).build();
/// let subscribers = RecordSet::new("subscribers", &stats);
/// let a = Key::new("node_1", "client_a", "orders", "", "subscribe", "");
/// let b = Key::new("node_1", "client_b", "orders", "", "subscribe", "");
/// subscribers.add([a.clone(), b.clone()]).remove([b]);
///
/// subscribers.record(&Item { msg_count: 1.0, ..Default::default() }).unwrap();
/// stats.flush();
/// stats.export_now();
/// let snapshot = stats.snapshot();
/// assert_eq!(snapshot.len(), 1);
/// assert!(snapshot.get(&a).is_some());
/// ```
#[derive(Debug)]
pub struct RecordSet {
    name: String,
    stats: Stats,
    members: RwLock<Members>,
}

#[derive(Debug)]
struct Members {
    contexts: BTreeMap<Key, Result<TagContext, RecordError>>,
    // valid contexts, rebuilt on every membership change and shared with in-flight jobs
    valid: Arc<[TagContext]>,
    first_error: Option<RecordError>,
}

impl Members {
    fn rebuild(&mut self) {
        self.valid = self
            .contexts
            .values()
            .filter_map(|ctx| ctx.as_ref().ok().cloned())
            .collect();
        self.first_error = self
            .contexts
            .values()
            .find_map(|ctx| ctx.as_ref().err().cloned());
    }
}

impl RecordSet {
    /// Create an empty set recording into `stats`
    pub fn new(name: impl Into<String>, stats: &Stats) -> Self {
        Self {
            name: name.into(),
            stats: stats.clone(),
            members: RwLock::new(Members {
                contexts: BTreeMap::new(),
                valid: Arc::from(Vec::new()),
                first_error: None,
            }),
        }
    }

    /// Add `keys` to the set. Keys already present are kept as they are.
    ///
    /// A key with an invalid tag value is still a member, but recording to it fails: see
    /// [`RecordSet::record`].
    pub fn add(&self, keys: impl IntoIterator<Item = Key>) -> &Self {
        let mut members = self.members.write().unwrap();
        for key in keys {
            if !members.contexts.contains_key(&key) {
                let ctx = TagContext::new(&key);
                if let Err(err) = &ctx {
                    tracing::debug!(
                        set = %self.name,
                        ?key,
                        %err,
                        "record set member has invalid tags"
                    );
                }
                members.contexts.insert(key, ctx);
            }
        }
        members.rebuild();
        self
    }

    /// Remove `keys` from the set. Absent keys are ignored.
    pub fn remove(&self, keys: impl IntoIterator<Item = Key>) -> &Self {
        let mut members = self.members.write().unwrap();
        for key in keys {
            members.contexts.remove(&key);
        }
        members.rebuild();
        self
    }

    /// Record `item` against every member.
    ///
    /// Valid members are always recorded. If some member has invalid tags, the error of the first
    /// such member (in key order) is returned after the others were dispatched.
    pub fn record(&self, item: &Item) -> Result<(), RecordError> {
        let (valid, first_error) = {
            let members = self.members.read().unwrap();
            (members.valid.clone(), members.first_error.clone())
        };
        self.stats.fan_out(valid, item);
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of members, including those with invalid tags
    pub fn len(&self) -> usize {
        self.members.read().unwrap().contexts.len()
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is a member
    pub fn contains(&self, key: &Key) -> bool {
        self.members.read().unwrap().contexts.contains_key(key)
    }
}
