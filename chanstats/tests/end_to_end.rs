// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, UNIX_EPOCH};

use assert2::{check, let_assert};
use assert_approx_eq::assert_approx_eq;
use chanstats::{Item, Key, Metric, RecordError, RecordSet, Stats};
use rstest::rstest;

const ODD_CHANNEL: &str = "some_channel_*,|,>%$#*Q1";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn stats() -> Stats {
    init_tracing();
    Stats::builder().internal_exporter(false).build()
}

fn at_millis(millis: u64) -> Option<std::time::SystemTime> {
    Some(UNIX_EPOCH + Duration::from_millis(millis))
}

fn metric(key: &Key, values: Metric) -> Metric {
    Metric {
        node: key.node().to_owned(),
        channel: key.channel().to_owned(),
        group: key.group().to_owned(),
        client_id: key.client_id().to_owned(),
        kind: key.kind_label(),
        ..values
    }
}

fn values(msg_count: f64, msg_size: f64, hits: u64, misses: u64, errors: u64) -> Metric {
    Metric {
        node: String::new(),
        channel: String::new(),
        group: String::new(),
        client_id: String::new(),
        kind: String::new(),
        msg_count,
        msg_size,
        cache_hit: hits,
        cache_miss: misses,
        errors,
        latency: 0.0,
        last_update: 0,
    }
}

#[rstest]
#[case::message_count(
    Key::new("node_1", "client_1", "", "", "", ""),
    Item { msg_count: 2.0, ..Default::default() },
    values(2.0, 0.0, 0, 0, 0),
)]
#[case::message_size(
    Key::new("node_2", "client_2", ODD_CHANNEL, "", "", ""),
    Item { msg_size: 100.0, ..Default::default() },
    values(0.0, 100.0, 0, 0, 0),
)]
#[case::cache_and_errors(
    Key::new("node_2", "client_2", ODD_CHANNEL, "q1", "", ""),
    Item { cache_hits: 2, cache_misses: 3, errors: 4, ..Default::default() },
    values(0.0, 0.0, 2, 3, 4),
)]
#[case::latency_and_last_update(
    Key::new("node_2", "client_2", ODD_CHANNEL, "q1", "publish", "subscribe"),
    Item {
        cache_hits: 2,
        cache_misses: 3,
        errors: 4,
        latency: Duration::from_millis(2),
        last_update: at_millis(1000),
        ..Default::default()
    },
    Metric { latency: 2.0, last_update: 1000, ..values(0.0, 0.0, 2, 3, 4) },
)]
fn single_key_single_item(#[case] key: Key, #[case] item: Item, #[case] expected: Metric) {
    let stats = stats();
    stats.record(&key, &item).unwrap();
    stats.export_now();

    let metrics = stats.snapshot().metrics();
    check!(metrics.len() == 1);
    check!(metrics[key.as_str()] == metric(&key, expected));
    check!(stats.snapshot().is_empty());
}

#[test]
fn single_key_multiple_items() {
    let stats = stats();
    let key = Key::new("node_1", "client_multi_1", "some_channel", "", "publish", "");
    let items = [
        Item {
            msg_count: 1.0,
            msg_size: 50.0,
            cache_hits: 1,
            cache_misses: 3,
            errors: 2,
            latency: Duration::from_millis(2),
            last_update: at_millis(8000),
        },
        Item {
            msg_count: 3.0,
            msg_size: 150.0,
            cache_hits: 4,
            cache_misses: 2,
            errors: 1,
            latency: Duration::from_millis(3),
            last_update: at_millis(10_000),
        },
    ];
    stats.record_all(&key, &items).unwrap();
    stats.export_now();

    let snapshot = stats.snapshot();
    let cs = snapshot.get(&key).unwrap();
    check!(cs.total_msg_count == 4.0);
    check!(cs.total_msg_size == 200.0);
    check!(cs.avg_msg_size == 50.0);
    check!(cs.total_cache_hits == 5);
    check!(cs.total_cache_miss == 5);
    check!(cs.cache_hits_ratio == 0.5);
    check!(cs.total_errors == 3);
    check!(cs.error_rate == 75.0);
    check!(cs.success_rate == 25.0);
    assert_approx_eq!(cs.avg_latency, 2.5);
    check!(cs.last_updated_unix == 10_000);
    check!(cs.kind == "publish");

    check!(snapshot.summary.total_msg_count == 4.0);
    check!(snapshot.summary.error_rate == 75.0);
    check!(snapshot.summary.total_active_channels == 1);
    check!(snapshot.summary.total_active_clients == 1);

    check!(stats.snapshot().is_empty());
}

#[test]
fn unexported_observations_wait_for_the_next_pass() {
    let stats = stats();
    let key = Key::new("node_1", "client_1", "orders", "", "publish", "");
    let item = Item {
        msg_count: 1.0,
        ..Default::default()
    };
    stats.record(&key, &item).unwrap();
    check!(stats.snapshot().is_empty());

    stats.export_now();
    stats.record(&key, &item).unwrap();
    check!(stats.snapshot().get(&key).unwrap().total_msg_count == 1.0);

    stats.export_now();
    check!(stats.snapshot().get(&key).unwrap().total_msg_count == 1.0);
}

#[test]
fn record_set_follows_membership() {
    let stats = stats();
    let keys = [
        Key::new("node_1", "client_set_1", "", "", "", ""),
        Key::new("node_2", "client_set_2", ODD_CHANNEL, "", "", ""),
        Key::new("node_2", "client_set_2", ODD_CHANNEL, "q1", "", ""),
        Key::new("node_2", "client_set_2", ODD_CHANNEL, "q1", "publish", "subscribe"),
    ];
    let items = [
        (2.0, 100.0, 2, 3, 4, 10_000, 10_000),
        (3.0, 200.0, 4, 5, 6, 1_000, 11_000),
        (3.0, 200.0, 4, 5, 6, 1_000, 12_000),
    ]
    .map(
        |(msg_count, msg_size, cache_hits, cache_misses, errors, latency, last_update)| Item {
            msg_count,
            msg_size,
            cache_hits,
            cache_misses,
            errors,
            latency: Duration::from_millis(latency),
            last_update: at_millis(last_update),
        },
    );
    let expected = |item: &Item| Metric {
        latency: item.latency.as_millis() as f64,
        last_update: item
            .last_update
            .unwrap()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64,
        ..values(
            item.msg_count,
            item.msg_size,
            item.cache_hits,
            item.cache_misses,
            item.errors,
        )
    };

    let set = RecordSet::new("set_1", &stats);
    set.add(keys.iter().cloned());

    for (pass, item) in items.iter().enumerate() {
        if pass == 2 {
            set.remove([keys[0].clone()]);
        }
        set.record(item).unwrap();
        stats.flush();
        stats.export_now();

        let metrics = stats.snapshot().metrics();
        let members = if pass == 2 { &keys[1..] } else { &keys[..] };
        check!(metrics.len() == members.len());
        for key in members {
            check!(metrics[key.as_str()] == metric(key, expected(item)));
        }
    }
}

#[test]
fn removed_identity_is_not_recorded() {
    let stats = stats();
    let keys: Vec<_> = (1..=3)
        .map(|i| Key::new("node_1", &format!("client_{i}"), "orders", "", "subscribe", ""))
        .collect();
    let set = RecordSet::new("subscribers", &stats);
    set.add(keys.clone()).remove([keys[1].clone()]);
    set.record(&Item {
        msg_count: 1.0,
        ..Default::default()
    })
    .unwrap();
    stats.flush();
    stats.export_now();

    let snapshot = stats.snapshot();
    check!(snapshot.len() == 2);
    check!(snapshot.get(&keys[0]).is_some());
    check!(snapshot.get(&keys[1]).is_none());
    check!(snapshot.get(&keys[2]).is_some());
}

#[test]
fn large_set_under_backpressure() {
    init_tracing();
    let stats = Stats::builder()
        .internal_exporter(false)
        .workers(1)
        .queue_capacity(1)
        .fanout_chunk(7)
        .build();
    let set = RecordSet::new("wide", &stats);
    set.add((0..500).map(|i| Key::new("node_1", &format!("client_{i}"), "orders", "", "", "")));
    for _ in 0..10 {
        set.record(&Item {
            errors: 1,
            ..Default::default()
        })
        .unwrap();
    }
    stats.flush();
    stats.export_now();

    let snapshot = stats.snapshot();
    check!(snapshot.len() == 500);
    check!(snapshot.summary.total_errors == 5_000);
    check!(snapshot.channels.values().all(|cs| cs.total_errors == 10));
}

#[test]
fn invalid_tag_is_reported() {
    let stats = stats();
    let key = Key::new("node_1", "client_1", &"c".repeat(256), "", "", "");
    let_assert!(Err(err) = stats.record(&key, &Item { errors: 1, ..Default::default() }));
    let_assert!(RecordError::InvalidTagValue { tag, .. } = &err);
    check!(*tag == "channel");
    check!(err.to_string().contains("channel"));
}

#[test]
fn clones_share_one_context() {
    let stats = stats();
    let set = RecordSet::new("s", &stats);
    set.add([Key::new("n", "c", "", "", "", "")]);
    for _ in 0..100 {
        set.record(&Item {
            cache_hits: 1,
            ..Default::default()
        })
        .unwrap();
    }
    let other = stats.clone();
    drop(set);
    drop(stats);
    other.flush();
    other.export_now();
    check!(other.snapshot().summary.total_cache_hits == 100);
}

#[test]
fn punctuation_in_fields_keeps_identity() {
    let stats = stats();
    let key = Key::new("node_1", "client#|", "orders", "", "publish", "");
    let other = Key::new("node_1", "client", "|#orders", "", "publish", "");
    stats.record(&key, &Item { errors: 1, ..Default::default() }).unwrap();
    stats.record(&other, &Item { errors: 2, ..Default::default() }).unwrap();
    stats.export_now();

    let snapshot = stats.snapshot();
    check!(snapshot.len() == 2);
    let cs = snapshot.get(&key).unwrap();
    check!(cs.client_id == "client#|");
    check!(cs.channel == "orders");
    check!(cs.total_errors == 1);
    check!(snapshot.get(&other).unwrap().total_errors == 2);
}
