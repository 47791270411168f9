// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Shorthands for the observations a message broker reports most often.
//!
//! Every helper stamps `last_update` with the current time and builds identities with the
//! node configured on the [`Stats`] context.

use std::{sync::Arc, time::SystemTime};

use chanstats_core::{Item, Key, RecordError};

use crate::{Stats, tags::TagContext};

/// Kind label of publish observations
pub const KIND_PUBLISH: &str = "publish";
/// Kind label of persisted publish observations
pub const KIND_PUBLISH_PERSISTENCE: &str = "publish_persistence";

impl Stats {
    fn report(
        &self,
        client_id: &str,
        channel: &str,
        kind: &str,
        item: Item,
    ) -> Result<(), RecordError> {
        let key = Key::new(self.node(), client_id, channel, "", kind, "");
        self.record(&key, &item)
    }

    /// Record `msg_count` messages totalling `msg_size` bytes published by `client_id` on `channel`
    pub fn report_publish(
        &self,
        client_id: &str,
        channel: &str,
        msg_count: f64,
        msg_size: f64,
    ) -> Result<(), RecordError> {
        self.report(client_id, channel, KIND_PUBLISH, messages(msg_count, msg_size))
    }

    /// Record one failed publish by `client_id` on `channel`
    pub fn report_publish_error(&self, client_id: &str, channel: &str) -> Result<(), RecordError> {
        self.report(client_id, channel, KIND_PUBLISH, one_error())
    }

    /// Like [`Stats::report_publish`], for publishes with persistence
    pub fn report_publish_persistence(
        &self,
        client_id: &str,
        channel: &str,
        msg_count: f64,
        msg_size: f64,
    ) -> Result<(), RecordError> {
        self.report(
            client_id,
            channel,
            KIND_PUBLISH_PERSISTENCE,
            messages(msg_count, msg_size),
        )
    }

    /// Like [`Stats::report_publish_error`], for publishes with persistence
    pub fn report_publish_persistence_error(
        &self,
        client_id: &str,
        channel: &str,
    ) -> Result<(), RecordError> {
        self.report(client_id, channel, KIND_PUBLISH_PERSISTENCE, one_error())
    }

    /// Record a delivery of `msg_count` messages totalling `msg_size` bytes to every subscriber
    /// identity in `keys`.
    ///
    /// The fan-out runs on the worker pool. Subscribers with invalid tags are skipped and the
    /// first such error is returned once the others are dispatched.
    pub fn report_message_subscribe<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a Key>,
        msg_count: f64,
        msg_size: f64,
    ) -> Result<(), RecordError> {
        let mut first_error = None;
        let contexts: Vec<TagContext> = keys
            .into_iter()
            .filter_map(|key| match TagContext::new(key) {
                Ok(ctx) => Some(ctx),
                Err(err) => {
                    first_error.get_or_insert(err);
                    None
                }
            })
            .collect();
        self.fan_out(Arc::from(contexts), &messages(msg_count, msg_size));
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn messages(msg_count: f64, msg_size: f64) -> Item {
    Item {
        msg_count,
        msg_size,
        last_update: Some(SystemTime::now()),
        ..Default::default()
    }
}

fn one_error() -> Item {
    Item {
        errors: 1,
        last_update: Some(SystemTime::now()),
        ..Default::default()
    }
}
