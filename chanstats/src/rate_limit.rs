// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Lets one caller through per interval, across all threads.
///
/// Used for warnings on hot paths (a saturated dispatch queue) that would otherwise repeat for
/// every record call. The first call always passes.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    epoch: Instant,
    interval: Duration,
    next_allowed_secs: AtomicU64,
}

impl RateLimiter {
    pub(crate) fn new(interval: Duration) -> Self {
        assert!(
            interval >= Duration::from_secs(1),
            "only second-level granularity supported for rate limiting"
        );
        Self {
            epoch: Instant::now(),
            interval,
            next_allowed_secs: AtomicU64::new(u64::MIN),
        }
    }

    /// Whether the caller may act now. At most one caller per interval gets `true`.
    pub(crate) fn allow(&self) -> bool {
        let now = self.epoch.elapsed();
        let next = self.next_allowed_secs.load(Ordering::Relaxed);
        if next > now.as_secs() {
            return false;
        }
        let new_next = now
            .checked_add(self.interval)
            .unwrap_or(Duration::MAX)
            .as_secs();
        self.next_allowed_secs
            .compare_exchange(next, new_next, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }
}
