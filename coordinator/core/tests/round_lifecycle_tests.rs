// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use fedaurora_core::application::coordinator::{
    CoordinatorSettings, RoundCoordinator, SubmissionRequest,
};
use fedaurora_core::application::distributor::Distributor;
use fedaurora_core::domain::events::RoundEvent;
use fedaurora_core::domain::parameters::ParameterTree;
use fedaurora_core::domain::repository::GlobalModelStore;
use fedaurora_core::domain::round::{RoundError, RoundState};
use fedaurora_core::infrastructure::event_bus::{EventBus, EventReceiver};
use fedaurora_core::infrastructure::http_push::HttpModelPush;
use fedaurora_core::infrastructure::model_store::{FileGlobalModelStore, InMemoryGlobalModelStore};
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn coordinator_with(
    store: Arc<dyn GlobalModelStore>,
    settings: CoordinatorSettings,
) -> Arc<RoundCoordinator> {
    let push = HttpModelPush::new("/receive_model", Duration::from_secs(2)).unwrap();
    Arc::new(RoundCoordinator::new(
        Distributor::new(Arc::new(push)),
        store,
        EventBus::new(256),
        settings,
    ))
}

fn coordinator() -> Arc<RoundCoordinator> {
    coordinator_with(
        Arc::new(InMemoryGlobalModelStore::new()),
        CoordinatorSettings::default(),
    )
}

fn tree(value: serde_json::Value) -> ParameterTree {
    serde_json::from_value(value).unwrap()
}

fn request(id: &str, address: &str, parameters: serde_json::Value) -> SubmissionRequest {
    SubmissionRequest {
        participant_id: id.to_string(),
        callback_address: address.to_string(),
        parameters: tree(parameters),
    }
}

/// Drain events until the round completes, returning `(delivered, failed)`.
async fn wait_for_complete(events: &mut EventReceiver) -> (usize, usize) {
    timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(RoundEvent::Complete {
                delivered, failed, ..
            }) = events.recv().await
            {
                return (delivered, failed);
            }
        }
    })
    .await
    .expect("round did not complete in time")
}

#[tokio::test]
async fn test_two_participants_receive_the_average() {
    let mut server = mockito::Server::new_async().await;
    let delivery = server
        .mock("POST", "/receive_model")
        .match_body(Matcher::Json(json!({"w": [4.0, 6.0]})))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let coordinator = coordinator();
    let mut events = coordinator.events().subscribe();

    coordinator.start_round(2).unwrap();
    coordinator
        .submit(request("a", &server.url(), json!({"w": [2.0, 4.0]})))
        .unwrap();
    let receipt = coordinator
        .submit(request("b", &server.url(), json!({"w": [6.0, 8.0]})))
        .unwrap();
    assert_eq!((receipt.received, receipt.expected), (2, 2));
    assert!(receipt.quorum.is_some());

    assert_eq!(wait_for_complete(&mut events).await, (2, 0));
    delivery.assert_async().await;

    let status = coordinator.status();
    assert_eq!(status.state, RoundState::Complete);
    let model = coordinator.global_model().unwrap();
    assert_eq!(model.parameters, tree(json!({"w": [4.0, 6.0]})));
    assert_eq!(model.participants, 2);
    assert_eq!(coordinator.aggregation_runs(), 1);
}

#[tokio::test]
async fn test_resubmission_replaces_without_counting_twice() {
    let mut server = mockito::Server::new_async().await;
    let delivery = server
        .mock("POST", "/receive_model")
        .match_body(Matcher::Json(json!({"w": [2.0]})))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let coordinator = coordinator();
    let mut events = coordinator.events().subscribe();
    coordinator.start_round(2).unwrap();

    coordinator
        .submit(request("a", &server.url(), json!({"w": [100.0]})))
        .unwrap();
    let receipt = coordinator
        .submit(request("a", &server.url(), json!({"w": [1.0]})))
        .unwrap();
    assert!(receipt.replaced);
    assert_eq!(receipt.received, 1);
    assert_eq!(coordinator.status().state, RoundState::Collecting);

    coordinator
        .submit(request("b", &server.url(), json!({"w": [3.0]})))
        .unwrap();

    wait_for_complete(&mut events).await;
    delivery.assert_async().await;
}

#[tokio::test]
async fn test_shape_mismatch_is_rejected_and_round_keeps_collecting() {
    let coordinator = coordinator();
    coordinator.start_round(2).unwrap();
    coordinator
        .submit(request("a", "http://a.local", json!({"w": [1.0, 2.0]})))
        .unwrap();

    let err = coordinator
        .submit(request("b", "http://b.local", json!({"w": [1.0, 2.0, 3.0]})))
        .unwrap_err();
    match err {
        RoundError::ShapeMismatch(mismatch) => assert_eq!(mismatch.path, "$.w"),
        other => panic!("expected shape mismatch, got {:?}", other),
    }

    let status = coordinator.status();
    assert_eq!(status.state, RoundState::Collecting);
    assert_eq!(status.received, 1);
}

#[tokio::test]
async fn test_submission_outside_collecting_is_rejected() {
    let coordinator = coordinator();
    let err = coordinator
        .submit(request("a", "http://a.local", json!([1.0])))
        .unwrap_err();
    assert_eq!(err, RoundError::RoundNotCollecting(RoundState::Idle));
    assert_eq!(coordinator.status().received, 0);
}

#[tokio::test]
async fn test_unreachable_participant_is_reported_not_fatal() {
    let mut server = mockito::Server::new_async().await;
    let delivery = server
        .mock("POST", "/receive_model")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let coordinator = coordinator();
    let mut events = coordinator.events().subscribe();
    coordinator.start_round(3).unwrap();

    coordinator
        .submit(request("a", &server.url(), json!([1.0])))
        .unwrap();
    coordinator
        .submit(request("b", "http://127.0.0.1:1", json!([2.0])))
        .unwrap();
    coordinator
        .submit(request("c", &server.url(), json!([3.0])))
        .unwrap();

    let mut failures = Vec::new();
    let outcome = timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(RoundEvent::DistributionFailed { participant_id, .. }) => {
                    failures.push(participant_id)
                }
                Ok(RoundEvent::Complete {
                    delivered, failed, ..
                }) => return (delivered, failed),
                _ => {}
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(outcome, (2, 1));
    assert_eq!(failures, vec!["b".to_string()]);
    assert_eq!(coordinator.status().state, RoundState::Complete);
    delivery.assert_async().await;

    let report = coordinator.last_delivery_report().unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.failed_addresses(), vec!["http://127.0.0.1:1"]);
}

#[tokio::test]
async fn test_rejecting_participant_counts_as_failed() {
    let mut server = mockito::Server::new_async().await;
    let _rejected = server
        .mock("POST", "/receive_model")
        .with_status(500)
        .create_async()
        .await;

    let coordinator = coordinator();
    let mut events = coordinator.events().subscribe();
    coordinator.start_round(1).unwrap();
    coordinator
        .submit(request("a", &server.url(), json!({"b": 1.0})))
        .unwrap();

    assert_eq!(wait_for_complete(&mut events).await, (0, 1));
    assert_eq!(coordinator.status().state, RoundState::Complete);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_trigger_exactly_one_aggregation() {
    const PARTICIPANTS: usize = 64;
    const SURPLUS: usize = 8;

    let mut server = mockito::Server::new_async().await;
    let delivery = server
        .mock("POST", "/receive_model")
        .with_status(200)
        .expect(PARTICIPANTS)
        .create_async()
        .await;

    let coordinator = coordinator();
    let mut events = coordinator.events().subscribe();
    coordinator.start_round(PARTICIPANTS as i64).unwrap();

    // more submitters than expected race for the last slots
    let url = server.url();
    let handles: Vec<_> = (0..PARTICIPANTS + SURPLUS)
        .map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let url = url.clone();
            tokio::spawn(async move {
                let result =
                    coordinator.submit(request(&format!("p{}", i), &url, json!([i as f64, 1.0])));
                (i, result)
            })
        })
        .collect();

    let mut quorum_holders = 0;
    let mut accepted = Vec::new();
    let mut turned_away = 0;
    for handle in handles {
        match handle.await.unwrap() {
            (i, Ok(receipt)) => {
                if receipt.quorum.is_some() {
                    quorum_holders += 1;
                }
                accepted.push(i);
            }
            (_, Err(RoundError::RoundNotCollecting(_))) => turned_away += 1,
            (_, Err(e)) => panic!("unexpected rejection: {}", e),
        }
    }
    assert_eq!(quorum_holders, 1);
    assert_eq!(accepted.len(), PARTICIPANTS);
    assert_eq!(turned_away, SURPLUS);

    assert_eq!(wait_for_complete(&mut events).await, (PARTICIPANTS, 0));
    assert_eq!(coordinator.aggregation_runs(), 1);
    delivery.assert_async().await;

    let mean = accepted.iter().sum::<usize>() as f64 / PARTICIPANTS as f64;
    assert_eq!(
        coordinator.global_model().unwrap().parameters,
        ParameterTree::from(vec![mean, 1.0])
    );

    // late arrivals after quorum are rejected
    let late = coordinator
        .submit(request("late", &url, json!([0.0, 0.0])))
        .unwrap_err();
    assert!(matches!(late, RoundError::RoundNotCollecting(_)));
    assert_eq!(coordinator.aggregation_runs(), 1);
}

#[tokio::test]
async fn test_reset_returns_to_idle_and_discards_submissions() {
    let coordinator = coordinator();
    let mut events = coordinator.events().subscribe();
    coordinator.start_round(3).unwrap();
    coordinator
        .submit(request("a", "http://a.local", json!([1.0])))
        .unwrap();

    coordinator.reset();
    coordinator.reset();

    let status = coordinator.status();
    assert_eq!(status.state, RoundState::Idle);
    assert_eq!((status.received, status.expected), (0, 0));
    assert!(coordinator.participants().is_empty());

    let mut saw_reset = false;
    while let Ok(event) = events.try_recv() {
        saw_reset |= matches!(event, RoundEvent::Reset { .. });
    }
    assert!(saw_reset);

    // a fresh round accepts a different shape
    coordinator.start_round(2).unwrap();
    coordinator
        .submit(request("a", "http://a.local", json!({"w": [1.0, 2.0]})))
        .unwrap();
    assert_eq!(coordinator.status().received, 1);
}

#[tokio::test]
async fn test_start_round_validation() {
    let coordinator = coordinator();
    assert_eq!(coordinator.start_round(0), Err(RoundError::InvalidExpectedCount(0)));
    assert_eq!(coordinator.start_round(-3), Err(RoundError::InvalidExpectedCount(-3)));
    assert_eq!(coordinator.status().state, RoundState::Idle);

    coordinator.start_round(2).unwrap();
    assert_eq!(
        coordinator.start_round(3),
        Err(RoundError::RoundInProgress(RoundState::Collecting))
    );
    assert_eq!(coordinator.status().expected, 2);
}

#[tokio::test]
async fn test_auto_reset_after_completion() {
    let mut server = mockito::Server::new_async().await;
    let _delivery = server
        .mock("POST", "/receive_model")
        .with_status(200)
        .create_async()
        .await;

    let coordinator = coordinator_with(
        Arc::new(InMemoryGlobalModelStore::new()),
        CoordinatorSettings {
            auto_reset_on_complete: true,
        },
    );
    let mut events = coordinator.events().subscribe();
    coordinator.start_round(1).unwrap();
    coordinator
        .submit(request("a", &server.url(), json!([5.0])))
        .unwrap();

    wait_for_complete(&mut events).await;
    timeout(Duration::from_secs(5), async {
        while !matches!(events.recv().await, Ok(RoundEvent::Reset { .. })) {}
    })
    .await
    .unwrap();

    assert_eq!(coordinator.status().state, RoundState::Idle);
    // the model and the report survive the reset
    assert!(coordinator.global_model().is_some());
    assert!(coordinator.last_delivery_report().is_some());
    coordinator.start_round(1).unwrap();
}

#[tokio::test]
async fn test_global_model_persists_across_restart() {
    let mut server = mockito::Server::new_async().await;
    let _delivery = server
        .mock("POST", "/receive_model")
        .with_status(200)
        .create_async()
        .await;
    let dir = tempfile::tempdir().unwrap();

    let first = coordinator_with(
        Arc::new(FileGlobalModelStore::new(dir.path())),
        CoordinatorSettings::default(),
    );
    let mut events = first.events().subscribe();
    first.start_round(2).unwrap();
    first
        .submit(request("a", &server.url(), json!({"w": [2.0, 4.0]})))
        .unwrap();
    first
        .submit(request("b", &server.url(), json!({"w": [6.0, 8.0]})))
        .unwrap();
    wait_for_complete(&mut events).await;

    let restarted = coordinator_with(
        Arc::new(FileGlobalModelStore::new(dir.path())),
        CoordinatorSettings::default(),
    );
    assert!(restarted.global_model().is_none());
    assert!(restarted.restore_global_model().await.unwrap());

    let model = restarted.global_model().unwrap();
    assert_eq!(model.parameters, tree(json!({"w": [4.0, 6.0]})));
    assert_eq!(restarted.status().state, RoundState::Idle);
}
