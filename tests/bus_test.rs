use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;
use serde_json::json;

use graphbus::bus::{EventBus, Flow, MetadataOverrides, NameGuard, SubscribeOptions};

/// Shared log that callbacks append to.
fn recorder() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(log: &Arc<Mutex<Vec<String>>>, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ── Delivery ──────────────────────────────────────────────────────

#[test]
fn publish_without_subscribers_still_records_history() {
    let bus = EventBus::default();
    let report = bus.publish("dataset.uploaded", json!({"datasetId": "d1"}));
    assert_eq!(report.delivered, 0);
    assert!(report.errors.is_empty());
    assert!(!report.cancelled);

    let history = bus.history(None, None);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, report.event.id);
}

#[test]
fn exact_and_wildcard_subscribers_both_receive() {
    let bus = EventBus::default();
    let log = recorder();
    for pattern in ["graph.node.selected", "graph.*.selected", "graph.**", "node.*"] {
        let log = Arc::clone(&log);
        bus.subscribe(
            pattern,
            move |_, _| {
                push(&log, pattern);
                Ok(())
            },
            SubscribeOptions::default(),
        );
    }

    let report = bus.publish("graph.node.selected", json!({"nodeId": "n1"}));
    assert_eq!(report.delivered, 3);
    assert_eq!(
        entries(&log),
        vec!["graph.node.selected", "graph.*.selected", "graph.**"]
    );
}

#[test]
fn wildcard_law() {
    let bus = EventBus::default();
    let single = Arc::new(AtomicUsize::new(0));
    let rest = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&single);
    bus.subscribe(
        "a.*.c",
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::default(),
    );
    let counter = Arc::clone(&rest);
    bus.subscribe(
        "a.**",
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::default(),
    );

    for name in ["a.b.c", "a.b.d.c", "a.c", "a", "a.b"] {
        bus.publish(name, json!({}));
    }
    assert_eq!(single.load(Ordering::SeqCst), 1);
    assert_eq!(rest.load(Ordering::SeqCst), 5);
}

#[test]
fn priority_law_with_stable_ties() {
    let bus = EventBus::default();
    let log = recorder();
    for (index, priority) in [5, 1, 5, 0].into_iter().enumerate() {
        let log = Arc::clone(&log);
        bus.subscribe(
            "x.y",
            move |_, _| {
                push(&log, format!("sub{index}"));
                Ok(())
            },
            SubscribeOptions::priority(priority),
        );
    }

    bus.publish("x.y", json!({}));
    assert_eq!(entries(&log), vec!["sub0", "sub2", "sub1", "sub3"]);
}

#[test]
fn priority_applies_across_exact_and_wildcard_patterns() {
    let bus = EventBus::default();
    let log = recorder();
    let subs = [("x.*", 0, "wild-low"), ("x.y", 1, "exact"), ("x.**", 9, "wild-high")];
    for (pattern, priority, label) in subs {
        let log = Arc::clone(&log);
        bus.subscribe(
            pattern,
            move |_, _| {
                push(&log, label);
                Ok(())
            },
            SubscribeOptions::priority(priority),
        );
    }

    bus.publish("x.y", json!({}));
    assert_eq!(entries(&log), vec!["wild-high", "exact", "wild-low"]);
}

#[test]
fn subscriber_errors_are_collected_and_delivery_continues() {
    let bus = EventBus::default();
    let log = recorder();
    let failing = bus.subscribe(
        "job.done",
        |_, _| bail!("subscriber exploded"),
        SubscribeOptions::priority(10),
    );
    let sink = Arc::clone(&log);
    bus.subscribe(
        "job.done",
        move |_, _| {
            push(&sink, "after");
            Ok(())
        },
        SubscribeOptions::default(),
    );

    let report = bus.publish("job.done", json!({}));
    assert_eq!(report.delivered, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].subscription_id, failing);
    assert_eq!(report.errors[0].error.to_string(), "subscriber exploded");
    assert!(!report.is_clean());
    assert_eq!(entries(&log), vec!["after"]);
    assert_eq!(bus.history(None, None).len(), 1);
}

#[test]
fn filtered_out_subscribers_are_skipped_silently() {
    let bus = EventBus::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    bus.subscribe(
        "node.selected",
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::default().with_filter(|e| e.payload_str("nodeId") == Some("keep")),
    );

    let skipped = bus.publish("node.selected", json!({"nodeId": "drop"}));
    assert_eq!(skipped.delivered, 0);
    assert!(skipped.errors.is_empty());

    let kept = bus.publish("node.selected", json!({"nodeId": "keep"}));
    assert_eq!(kept.delivered, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ── Once ──────────────────────────────────────────────────────────

#[test]
fn once_law() {
    let bus = EventBus::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    bus.subscribe_once(
        "graph.created",
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::default().with_filter(|e| e.payload["graphType"] == "force"),
    );

    // Filtered-out publishes do not consume it.
    bus.publish("graph.created", json!({"graphType": "tree"}));
    assert_eq!(bus.subscriber_count(), 1);

    bus.publish("graph.created", json!({"graphType": "force"}));
    bus.publish("graph.created", json!({"graphType": "force"}));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count(), 0);
    assert!(bus.patterns().is_empty());
}

#[test]
fn once_is_consumed_even_when_the_callback_fails() {
    let bus = EventBus::default();
    bus.subscribe_once("a.b", |_, _| bail!("nope"), SubscribeOptions::default());

    let first = bus.publish("a.b", json!({}));
    assert_eq!(first.errors.len(), 1);
    let second = bus.publish("a.b", json!({}));
    assert!(second.errors.is_empty());
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn once_is_not_redelivered_by_a_nested_publish() {
    let bus = EventBus::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    bus.subscribe_once(
        "loop.tick",
        move |_, bus| {
            counter.fetch_add(1, Ordering::SeqCst);
            bus.publish("loop.tick", json!({}));
            Ok(())
        },
        SubscribeOptions::default(),
    );

    bus.publish("loop.tick", json!({}));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ── Reentrancy ────────────────────────────────────────────────────

#[test]
fn snapshot_ignores_unsubscribes_made_during_delivery() {
    let bus = EventBus::default();
    let log = recorder();

    let victim_log = Arc::clone(&log);
    let victim = bus.subscribe(
        "tick",
        move |_, _| {
            push(&victim_log, "victim");
            Ok(())
        },
        SubscribeOptions::default(),
    );
    let killer_log = Arc::clone(&log);
    let victim_key = victim.to_string();
    bus.subscribe(
        "tick",
        move |_, bus| {
            push(&killer_log, "killer");
            bus.unsubscribe(&victim_key);
            Ok(())
        },
        SubscribeOptions::priority(1),
    );

    bus.publish("tick", json!({}));
    assert_eq!(entries(&log), vec!["killer", "victim"]);

    bus.publish("tick", json!({}));
    assert_eq!(entries(&log), vec!["killer", "victim", "killer"]);
}

#[test]
fn snapshot_ignores_subscribes_made_during_delivery() {
    let bus = EventBus::default();
    let log = recorder();
    let outer = Arc::clone(&log);
    bus.subscribe_once(
        "tick",
        move |_, bus| {
            let inner = Arc::clone(&outer);
            bus.subscribe(
                "tick",
                move |_, _| {
                    push(&inner, "late");
                    Ok(())
                },
                SubscribeOptions::priority(-1),
            );
            push(&outer, "first");
            Ok(())
        },
        SubscribeOptions::default(),
    );

    bus.publish("tick", json!({}));
    assert_eq!(entries(&log), vec!["first"]);
    bus.publish("tick", json!({}));
    assert_eq!(entries(&log), vec!["first", "late"]);
}

#[test]
fn nested_publish_completes_before_outer_records() {
    let bus = EventBus::default();
    bus.subscribe(
        "outer",
        |event, bus| {
            let report = bus.publish_with(
                "inner",
                json!({}),
                MetadataOverrides::default()
                    .with_correlation_id(event.metadata.correlation_id.clone()),
            );
            assert_eq!(report.delivered, 0);
            Ok(())
        },
        SubscribeOptions::default(),
    );

    let report = bus.publish("outer", json!({}));
    assert_eq!(report.delivered, 1);

    let names: Vec<String> = bus.history(None, None).iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec!["inner", "outer"]);
    let history = bus.history(None, None);
    assert_eq!(
        history[0].metadata.correlation_id,
        history[1].metadata.correlation_id
    );
}

// ── Middleware ────────────────────────────────────────────────────

#[test]
fn middleware_cancel_blocks_delivery_and_history() {
    let bus = EventBus::default();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    bus.subscribe(
        "**",
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        SubscribeOptions::default(),
    );
    bus.use_middleware_fn(|event, _| {
        Ok(if event.name.starts_with("secret.") {
            Flow::Cancel
        } else {
            Flow::Continue
        })
    });

    let blocked = bus.publish("secret.plan", json!({}));
    assert!(blocked.cancelled);
    assert_eq!(blocked.delivered, 0);
    assert!(blocked.middleware_error.is_none());

    let allowed = bus.publish("public.plan", json!({}));
    assert!(!allowed.cancelled);
    assert_eq!(allowed.delivered, 1);

    let names: Vec<String> = bus.history(None, None).iter().map(|e| e.name.clone()).collect();
    assert_eq!(names, vec!["public.plan"]);
}

#[test]
fn middleware_runs_in_registration_order_and_short_circuits() {
    let bus = EventBus::default();
    let log = recorder();
    for (label, flow) in [("m1", Flow::Continue), ("m2", Flow::Cancel), ("m3", Flow::Continue)] {
        let log = Arc::clone(&log);
        bus.use_middleware_fn(move |_, _| {
            push(&log, label);
            Ok(flow)
        });
    }

    assert!(bus.publish("a.b", json!({})).cancelled);
    assert_eq!(entries(&log), vec!["m1", "m2"]);
}

#[test]
fn failing_middleware_cancels_and_reports() {
    let bus = EventBus::default();
    bus.use_middleware_fn(|_, _| bail!("audit log unavailable"));

    let report = bus.publish("a.b", json!({}));
    assert!(report.cancelled);
    assert_eq!(
        report.middleware_error.unwrap().to_string(),
        "audit log unavailable"
    );
    assert!(bus.history(None, None).is_empty());
}

#[test]
fn name_guard_rejects_malformed_names() {
    let bus = EventBus::default();
    bus.use_middleware(NameGuard);
    assert!(bus.publish("graph..node", json!({})).cancelled);
    assert!(!bus.publish("graph.node.added", json!({})).cancelled);
}

// ── Unsubscribe ───────────────────────────────────────────────────

#[test]
fn unsubscribe_by_id_removes_only_that_subscription() {
    let bus = EventBus::default();
    let a = bus.subscribe("a.b", |_, _| Ok(()), SubscribeOptions::default());
    bus.subscribe("a.b", |_, _| Ok(()), SubscribeOptions::default());

    assert!(bus.unsubscribe(a.as_str()));
    assert_eq!(bus.subscriber_count(), 1);
    assert!(!bus.unsubscribe(a.as_str()));
}

#[test]
fn unsubscribe_by_exact_pattern_removes_the_whole_registration() {
    let bus = EventBus::default();
    bus.subscribe("a.b", |_, _| Ok(()), SubscribeOptions::default());
    bus.subscribe("a.b", |_, _| Ok(()), SubscribeOptions::default());
    bus.subscribe("a.c", |_, _| Ok(()), SubscribeOptions::default());

    assert!(bus.unsubscribe("a.b"));
    assert_eq!(bus.patterns(), vec!["a.c".to_string()]);
}

#[test]
fn unsubscribe_by_wildcard_sweeps_matching_patterns() {
    let bus = EventBus::default();
    for pattern in ["graph.node.selected", "graph.created", "graph.*", "dataset.uploaded"] {
        bus.subscribe(pattern, |_, _| Ok(()), SubscribeOptions::default());
    }

    assert!(bus.unsubscribe("graph.**"));
    assert_eq!(bus.patterns(), vec!["dataset.uploaded".to_string()]);
    assert!(!bus.unsubscribe("nothing.*"));
}

#[test]
fn unsubscribe_unknown_returns_false() {
    let bus = EventBus::default();
    assert!(!bus.unsubscribe("sub_999"));
    assert!(!bus.unsubscribe("a.b"));
}

// ── History ───────────────────────────────────────────────────────

#[test]
fn history_is_bounded_fifo() {
    let bus = EventBus::new(100);
    for i in 0..103 {
        bus.publish("tick", json!({ "i": i }));
    }
    let history = bus.history(None, None);
    assert_eq!(history.len(), 100);
    assert_eq!(history[0].payload["i"], 3);
    assert_eq!(history[99].payload["i"], 102);
}

#[test]
fn history_filters_by_exact_name_and_limit() {
    let bus = EventBus::default();
    for i in 0..5 {
        bus.publish("a.b", json!({ "i": i }));
        bus.publish("a.c", json!({ "i": i }));
    }

    let only_b = bus.history(Some("a.b"), None);
    assert_eq!(only_b.len(), 5);
    assert!(only_b.iter().all(|e| e.name == "a.b"));

    let last_two = bus.history(Some("a.b"), Some(2));
    assert_eq!(last_two[0].payload["i"], 3);
    assert_eq!(last_two[1].payload["i"], 4);

    // Wildcards are not interpreted for history queries.
    assert!(bus.history(Some("a.*"), None).is_empty());

    bus.clear_history();
    assert!(bus.history(None, None).is_empty());
}

#[test]
fn supplied_metadata_is_kept() {
    let bus = EventBus::default();
    let report = bus.publish_with(
        "dataset.uploaded",
        json!({}),
        MetadataOverrides {
            id: Some("evt-fixed".to_string()),
            source: Some("upload-form".to_string()),
            correlation_id: Some("req-7".to_string()),
            timestamp: Some(1_700_000_000_000),
        },
    );
    let event = &report.event;
    assert_eq!(event.id, "evt-fixed");
    assert_eq!(event.metadata.source.as_deref(), Some("upload-form"));
    assert_eq!(event.metadata.correlation_id, "req-7");
    assert_eq!(event.metadata.timestamp, 1_700_000_000_000);
}
