// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Bounded worker pool recording fan-out work off the caller's thread.

use std::{
    collections::BTreeSet,
    ops::Range,
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use chanstats_core::Measurements;
use crossbeam_queue::ArrayQueue;
use crossbeam_utils::sync::{Parker, Unparker};

use crate::{rate_limit::RateLimiter, registry::MeasureRegistry, tags::TagContext};

// workers wake up at least this often even if nobody unparks them
const IDLE_PARK: Duration = Duration::from_millis(50);

/// Record one item's measurements against a slice of tag contexts
pub(crate) struct Job {
    contexts: Arc<[TagContext]>,
    range: Range<usize>,
    measurements: Arc<Measurements>,
    ticket: u64,
}

impl Job {
    pub(crate) fn new(
        contexts: Arc<[TagContext]>,
        range: Range<usize>,
        measurements: Arc<Measurements>,
    ) -> Self {
        Self {
            contexts,
            range,
            measurements,
            ticket: 0,
        }
    }

    fn run(&self, registry: &MeasureRegistry) {
        for ctx in &self.contexts[self.range.clone()] {
            registry.record(ctx, &self.measurements);
        }
    }
}

#[derive(Default)]
struct Tickets {
    next: u64,
    in_flight: BTreeSet<u64>,
}

/// Jobs dispatched but not finished yet, by dispatch order
#[derive(Default)]
struct Pending {
    tickets: Mutex<Tickets>,
    finished: Condvar,
}

impl Pending {
    fn start(&self) -> u64 {
        let mut tickets = self.tickets.lock().unwrap();
        let ticket = tickets.next;
        tickets.next += 1;
        tickets.in_flight.insert(ticket);
        ticket
    }

    fn finish(&self, ticket: u64) {
        let mut tickets = self.tickets.lock().unwrap();
        let oldest = tickets.in_flight.first() == Some(&ticket);
        tickets.in_flight.remove(&ticket);
        // waiters only care about the oldest unfinished ticket
        if oldest {
            self.finished.notify_all();
        }
    }

    /// Wait until every ticket handed out before this call has finished
    fn wait_started(&self) {
        let mut tickets = self.tickets.lock().unwrap();
        let horizon = tickets.next;
        while tickets
            .in_flight
            .first()
            .is_some_and(|oldest| *oldest < horizon)
        {
            tickets = self.finished.wait(tickets).unwrap();
        }
    }
}

struct Shared {
    queue: ArrayQueue<Job>,
    registry: Arc<MeasureRegistry>,
    pending: Pending,
    shutdown: AtomicBool,
}

impl Shared {
    fn drain(&self) {
        while let Some(job) = self.queue.pop() {
            job.run(&self.registry);
            self.pending.finish(job.ticket);
        }
    }
}

/// A fixed set of worker threads draining a bounded job queue.
///
/// When the queue is full the dispatching thread runs the job itself, so a burst of fan-out
/// work slows callers down instead of spawning unbounded work or dropping measurements.
/// Dropping the dispatcher runs every queued job and joins the workers.
pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    unparkers: Vec<Unparker>,
    next_worker: AtomicUsize,
    workers: Vec<thread::JoinHandle<()>>,
    saturated: RateLimiter,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<MeasureRegistry>,
        workers: usize,
        capacity: usize,
        thread_name: &str,
    ) -> Self {
        assert!(workers > 0, "dispatcher needs at least one worker");
        assert!(capacity > 0, "dispatch queue capacity must be positive");
        let shared = Arc::new(Shared {
            queue: ArrayQueue::new(capacity),
            registry,
            pending: Pending::default(),
            shutdown: AtomicBool::new(false),
        });

        let mut unparkers = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let parker = Parker::new();
            unparkers.push(parker.unparker().clone());
            let name = format!("{thread_name}-worker-{i}");
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_worker(&shared, &parker, &name))
                .expect("failed to spawn dispatch worker");
            handles.push(handle);
        }

        Self {
            shared,
            unparkers,
            next_worker: AtomicUsize::new(0),
            workers: handles,
            saturated: RateLimiter::new(Duration::from_secs(1)),
        }
    }

    /// Hand `job` to a worker, or run it on the calling thread if the queue is full
    pub(crate) fn dispatch(&self, mut job: Job) {
        job.ticket = self.shared.pending.start();
        match self.shared.queue.push(job) {
            Ok(()) => {
                let next = self.next_worker.fetch_add(1, Ordering::Relaxed);
                self.unparkers[next % self.unparkers.len()].unpark();
            }
            Err(job) => {
                if self.saturated.allow() {
                    tracing::warn!(
                        capacity = self.shared.queue.capacity(),
                        "statistics dispatch queue is full, recording on the calling thread"
                    );
                }
                job.run(&self.shared.registry);
                self.shared.pending.finish(job.ticket);
            }
        }
    }

    /// Block until every job dispatched before this call has been recorded.
    ///
    /// Jobs dispatched concurrently or afterwards are not waited for.
    pub(crate) fn flush(&self) {
        self.shared.pending.wait_started();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for unparker in &self.unparkers {
            unparker.unpark();
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("statistics dispatch worker panicked");
            }
        }
        // anything a worker raced past on its way out
        self.shared.drain();
    }
}

fn run_worker(shared: &Shared, parker: &Parker, name: &str) {
    let span = tracing::span!(
        tracing::Level::TRACE,
        "statistics dispatch worker",
        worker = name
    );
    let _enter = span.enter();
    loop {
        shared.drain();
        if shared.shutdown.load(Ordering::Acquire) {
            shared.drain();
            tracing::debug!("dispatch worker shut down");
            return;
        }
        parker.park_timeout(IDLE_PARK);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert2::check;
    use chanstats_core::{Item, Key, RawValue};

    use super::*;

    fn contexts(n: usize) -> Arc<[TagContext]> {
        (0..n)
            .map(|i| TagContext::new(&Key::new("n", &format!("client_{i}"), "ch", "", "", "")))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
            .into()
    }

    fn errors(count: u64) -> Arc<Measurements> {
        let item = Item {
            errors: count,
            ..Default::default()
        };
        Arc::new(item.measurements())
    }

    fn total_errors(registry: &MeasureRegistry) -> u64 {
        registry
            .export()
            .iter()
            .map(|row| match row.value {
                RawValue::Count(v) => v,
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn flush_waits_for_queued_jobs() {
        let registry = Arc::new(MeasureRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone(), 2, 64, "test");
        let contexts = contexts(10);
        for _ in 0..20 {
            dispatcher.dispatch(Job::new(contexts.clone(), 0..5, errors(1)));
            dispatcher.dispatch(Job::new(contexts.clone(), 5..10, errors(1)));
        }
        dispatcher.flush();
        check!(total_errors(&registry) == 200);
    }

    #[test]
    fn full_queue_runs_on_caller() {
        let registry = Arc::new(MeasureRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone(), 1, 1, "test");
        let contexts = contexts(3);
        for _ in 0..500 {
            dispatcher.dispatch(Job::new(contexts.clone(), 0..3, errors(2)));
        }
        dispatcher.flush();
        check!(total_errors(&registry) == 3_000);
    }

    #[test]
    fn flush_ignores_jobs_dispatched_by_other_threads() {
        let registry = Arc::new(MeasureRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), 2, 64, "test"));
        let stop = Arc::new(AtomicBool::new(false));

        let busy = {
            let dispatcher = dispatcher.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let contexts = contexts(50);
                while !stop.load(Ordering::Relaxed) {
                    dispatcher.dispatch(Job::new(contexts.clone(), 0..50, errors(1)));
                }
            })
        };

        let (done, flushed) = std::sync::mpsc::channel();
        let own = {
            let dispatcher = dispatcher.clone();
            thread::spawn(move || {
                let contexts = contexts(1);
                for _ in 0..10 {
                    dispatcher.dispatch(Job::new(contexts.clone(), 0..1, errors(1)));
                }
                dispatcher.flush();
                let _ = done.send(());
            })
        };

        let result = flushed.recv_timeout(Duration::from_secs(30));
        stop.store(true, Ordering::Relaxed);
        busy.join().unwrap();
        own.join().unwrap();
        check!(result.is_ok());
    }

    #[test]
    fn drop_runs_queued_jobs() {
        let registry = Arc::new(MeasureRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone(), 1, 1024, "test");
        let contexts = contexts(1);
        for _ in 0..100 {
            dispatcher.dispatch(Job::new(contexts.clone(), 0..1, errors(1)));
        }
        drop(dispatcher);
        check!(total_errors(&registry) == 100);
    }
}
