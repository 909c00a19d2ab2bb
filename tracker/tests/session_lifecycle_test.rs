//! Integration tests for the full session lifecycle.
//!
//! These tests drive the pipeline the way the daemon does: record events
//! into the aggregator, detach the session, validate, finalize, dispatch,
//! and flush the offline queue against a mock ingestion endpoint.

use std::cell::Cell;

use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use codepulse_tracker::aggregator::EventAggregator;
use codepulse_tracker::clock::{ClockError, ClockSource, NowTimes};
use codepulse_tracker::dispatch::{Dispatch, DispatchError, DispatchRouter, OfflineStore};
use codepulse_tracker::finalizer::finalize;
use codepulse_tracker::sender::HttpBatchSender;
use codepulse_tracker::store::FileOfflineStore;
use codepulse_tracker::types::{EditorEvent, EnvironmentInfo, EventKind, ProjectIdentity};
use codepulse_tracker::validator::has_signal;

// ============================================================================
// Helper Functions
// ============================================================================

/// Deterministic clock advancing 10 seconds per reading, offset +1h local.
struct StepClock {
    next: Cell<i64>,
}

impl StepClock {
    fn starting_at(utc: i64) -> Self {
        Self {
            next: Cell::new(utc),
        }
    }
}

impl ClockSource for StepClock {
    fn now(&self) -> Result<NowTimes, ClockError> {
        let utc = self.next.get();
        self.next.set(utc + 10);
        Ok(NowTimes {
            utc,
            local: utc + 3600,
        })
    }

    fn timezone(&self) -> Result<String, ClockError> {
        Ok("Europe/London".to_string())
    }
}

fn test_env() -> EnvironmentInfo {
    EnvironmentInfo {
        plugin_id: 2,
        version: "0.1.0".to_string(),
        os: "linux".to_string(),
    }
}

fn test_project(directory: &str) -> ProjectIdentity {
    ProjectIdentity {
        directory: directory.to_string(),
        name: None,
        identifier: directory.to_string(),
        resource: serde_json::json!({}),
    }
}

fn event(file: &str, kind: EventKind) -> EditorEvent {
    EditorEvent {
        file: file.to_string(),
        kind,
        lines_added: 0,
        lines_removed: 0,
    }
}

fn create_test_store() -> (TempDir, FileOfflineStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = FileOfflineStore::new(dir.path().join("offline.json"));
    (dir, store)
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn session_is_aggregated_queued_and_flushed() {
    let mut aggregator = EventAggregator::new(StepClock::starting_at(1000), test_env());
    let project = test_project("/home/user/proj");

    // Two typed events and a paste on one file, plus a focus-only file.
    aggregator
        .record(&project, &event("src/main.rs", EventKind::Typed))
        .unwrap();
    aggregator
        .record(&project, &event("src/main.rs", EventKind::Typed))
        .unwrap();
    aggregator
        .record(&project, &event("src/lib.rs", EventKind::Pasted))
        .unwrap();
    aggregator
        .record(&project, &event("README.md", EventKind::Focused))
        .unwrap();

    // Session-close trigger: detach, validate, finalize.
    let mut payload = aggregator.take("/home/user/proj").expect("live session");
    assert!(aggregator.is_empty());
    assert!(has_signal(&mut payload));

    let clock = StepClock::starting_at(2000);
    let finalized = finalize(&payload, &clock).unwrap();
    assert_eq!(finalized.keystrokes, 3);
    assert_eq!(finalized.start, 1000);
    assert_eq!(finalized.end, 2000);
    assert_eq!(finalized.timezone, "Europe/London");

    // Dispatch with immediate=false durably queues the payload.
    let server = MockServer::start().await;
    let (_dir, store) = create_test_store();
    let router = DispatchRouter::new(
        HttpBatchSender::new(server.uri(), Some("secret".to_string())),
        store,
    );

    let dispatch = router.send(finalized, false).await.unwrap();
    assert_eq!(dispatch, Dispatch::Queued);
    assert_eq!(router.store().load().unwrap().len(), 1);

    // The periodic flush drains the queue as one wire-shaped batch.
    Mock::given(method("POST"))
        .and(path("/data/batch"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(serde_json::json!([{
            "keystrokes": 3,
            "pluginId": 2,
            "timezone": "Europe/London",
            "project": {"directory": "/home/user/proj"},
            "source": {"src/main.rs": {"add": 2}}
        }])))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let flushed = router.store().flush(router.sender()).await.unwrap();
    assert_eq!(flushed, 1);
    assert!(router.store().load().unwrap().is_empty());
}

#[tokio::test]
async fn focus_only_session_is_discarded_before_dispatch() {
    let mut aggregator = EventAggregator::new(StepClock::starting_at(1000), test_env());
    let project = test_project("/home/user/proj");

    aggregator
        .record(&project, &event("README.md", EventKind::Focused))
        .unwrap();

    let mut payload = aggregator.take("/home/user/proj").unwrap();

    // No keystrokes, no counted activity: nothing worth transmitting, and
    // the dead entry is pruned during the scan.
    assert!(!has_signal(&mut payload));
    assert!(payload.source.is_empty());
}

#[tokio::test]
async fn immediate_dispatch_posts_single_element_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data/batch"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut aggregator = EventAggregator::new(StepClock::starting_at(1000), test_env());
    let project = test_project("/p");
    aggregator
        .record(&project, &event("a.ts", EventKind::Typed))
        .unwrap();

    let mut payload = aggregator.take("/p").unwrap();
    assert!(has_signal(&mut payload));
    let finalized = finalize(&payload, &StepClock::starting_at(2000)).unwrap();

    let (_dir, store) = create_test_store();
    let router = DispatchRouter::new(HttpBatchSender::new(server.uri(), None), store);

    let dispatch = router.send(finalized, true).await.unwrap();
    assert_eq!(dispatch, Dispatch::Sent);
    // Dispatch totality: sent means not queued.
    assert!(router.store().load().unwrap().is_empty());
}

#[tokio::test]
async fn failed_immediate_send_falls_back_to_durable_queue() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut aggregator = EventAggregator::new(StepClock::starting_at(1000), test_env());
    let project = test_project("/p");
    aggregator
        .record(&project, &event("a.ts", EventKind::Typed))
        .unwrap();

    let mut payload = aggregator.take("/p").unwrap();
    assert!(has_signal(&mut payload));
    let finalized = finalize(&payload, &StepClock::starting_at(2000)).unwrap();

    let (_dir, store) = create_test_store();
    let router = DispatchRouter::new(HttpBatchSender::new(server.uri(), None), store);

    // The router surfaces the failure with the payload; the caller queues
    // it, as the daemon does.
    let err = router.send(finalized.clone(), true).await.expect_err("500");
    match err {
        DispatchError::Transport { payload, .. } => {
            router.send(*payload, false).await.unwrap();
        }
        DispatchError::Store { .. } => panic!("wrong variant"),
    }

    let queued = router.store().load().unwrap();
    assert_eq!(queued, vec![finalized]);
}

#[tokio::test]
async fn unflushed_queue_survives_endpoint_outage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut aggregator = EventAggregator::new(StepClock::starting_at(1000), test_env());
    let project = test_project("/p");
    aggregator
        .record(&project, &event("a.ts", EventKind::Typed))
        .unwrap();
    let mut payload = aggregator.take("/p").unwrap();
    assert!(has_signal(&mut payload));
    let finalized = finalize(&payload, &StepClock::starting_at(2000)).unwrap();

    let (_dir, store) = create_test_store();
    store.append(&finalized).unwrap();
    let sender = HttpBatchSender::new(server.uri(), None);

    // First flush hits the outage: queue stays durable on disk.
    assert!(store.flush(&sender).await.is_err());
    assert_eq!(store.load().unwrap().len(), 1);

    // Next flush delivers and truncates.
    let flushed = store.flush(&sender).await.unwrap();
    assert_eq!(flushed, 1);
    assert!(store.load().unwrap().is_empty());
}

#[tokio::test]
async fn detached_session_never_sees_later_events() {
    let mut aggregator = EventAggregator::new(StepClock::starting_at(1000), test_env());
    let project = test_project("/p");

    aggregator
        .record(&project, &event("a.ts", EventKind::Typed))
        .unwrap();
    let detached = aggregator.take("/p").unwrap();

    // An event arriving while the detached payload is mid-finalization
    // starts a fresh session instead of mutating the old one.
    aggregator
        .record(&project, &event("b.ts", EventKind::Typed))
        .unwrap();

    assert_eq!(detached.keystrokes, 1);
    assert!(!detached.source.contains_key("b.ts"));
    let fresh = aggregator.session("/p").unwrap();
    assert_eq!(fresh.keystrokes, 1);
    assert!(!fresh.source.contains_key("a.ts"));
}
