mod common;

use std::time::Duration;

use serde_json::json;

use loopback_call::config::{BandwidthConfig, StatsConfig};
use loopback_call::endpoint::{EndpointEvent, Role};
use loopback_call::negotiation::NegotiationState;
use loopback_call::session::{SessionOrchestrator, SessionRequest};
use loopback_call::stats::StatsUpdate;

use common::{candidate, local_stream, new_log, snapshot, Call, SpyFactory, SpyRewriter};

fn fast_stats() -> StatsConfig {
    StatsConfig {
        poll_interval_ms: 20,
        ..StatsConfig::default()
    }
}

async fn drain(mut updates: tokio::sync::mpsc::UnboundedReceiver<StatsUpdate>) -> Vec<StatsUpdate> {
    let mut received = Vec::new();
    while let Some(update) = updates.recv().await {
        received.push(update);
    }
    received
}

#[tokio::test]
async fn teardown_is_idempotent_and_ordered() {
    let log = new_log();
    let orchestrator = SessionOrchestrator::new(
        SpyFactory::new(log.clone()),
        SpyRewriter::new(log.clone()),
        fast_stats(),
    );
    let stream = local_stream();
    let session = orchestrator
        .start(SessionRequest {
            bandwidth: BandwidthConfig::uncapped(),
            local_stream: stream.clone(),
        })
        .await
        .expect("session to start");
    let updates = session.take_stats_updates().expect("updates receiver");
    assert!(session.take_stats_updates().is_none());
    assert!(session.controls().hang_up);

    session.teardown().await;
    let calls_after_first = log.lock().len();
    session.teardown().await;
    assert_eq!(log.lock().len(), calls_after_first);

    let calls = log.lock().clone();
    let closes: Vec<_> = calls
        .iter()
        .filter(|call| matches!(call, Call::Close(_)))
        .cloned()
        .collect();
    assert_eq!(closes, vec![Call::Close(Role::Initiator), Call::Close(Role::Responder)]);

    let first_close = calls
        .iter()
        .position(|call| matches!(call, Call::Close(_)))
        .unwrap();
    assert!(calls[first_close..]
        .iter()
        .all(|call| matches!(call, Call::Close(_))));
    assert!(calls[..first_close].contains(&Call::GetStats(Role::Responder)));

    assert!(stream.tracks().iter().all(|track| track.is_stopped()));
    assert!(!session.is_active());
    assert_eq!(session.state(), NegotiationState::Closed);
    let controls = session.controls();
    assert!(!controls.hang_up);
    assert!(controls.acquire_media);

    let received = drain(updates).await;
    let last: Vec<_> = received.iter().filter(|update| update.last).collect();
    assert_eq!(last.len(), 2);
    assert!(received.last().map_or(false, |update| update.last));
}

#[tokio::test]
async fn sampler_reports_receiver_and_skips_failed_sender() {
    let log = new_log();
    let factory = SpyFactory::with(log.clone(), |endpoint| {
        endpoint.set_stats(snapshot(json!([
            { "id": "T01", "timestamp": 1.0, "type": "transport", "selectedCandidatePairId": "CP1" },
            { "id": "CP1", "timestamp": 1.0, "type": "candidate-pair", "remoteCandidateId": "R1" },
            { "id": "R1", "timestamp": 1.0, "type": "remote-candidate", "address": "10.0.0.5", "port": 5000 },
        ])));
    });
    let orchestrator = SessionOrchestrator::new(factory, SpyRewriter::new(log.clone()), fast_stats());
    let session = orchestrator
        .start(SessionRequest {
            bandwidth: BandwidthConfig::uncapped(),
            local_stream: local_stream(),
        })
        .await
        .expect("session to start");
    assert_eq!(session.state(), NegotiationState::Established);
    orchestrator.factory().endpoint(Role::Initiator).fail_on("get_stats");

    let mut updates = session.take_stats_updates().expect("updates receiver");
    let first = tokio::time::timeout(Duration::from_secs(2), updates.recv())
        .await
        .expect("a periodic sample")
        .expect("sampler running");
    assert_eq!(first.role, Role::Responder);
    assert!(!first.last);
    assert_eq!(first.bitrate, None);
    assert_eq!(
        first.active_path.map(|path| path.to_string()).as_deref(),
        Some("10.0.0.5:5000")
    );

    session.teardown().await;
    let received = drain(updates).await;
    assert!(received.iter().all(|update| update.role == Role::Responder));
    assert!(received.last().map_or(false, |update| update.last));
}

#[tokio::test]
async fn candidates_emitted_during_teardown_never_reach_closed_endpoints() {
    let log = new_log();
    let factory = SpyFactory::with(log.clone(), |endpoint| {
        endpoint.delay_close(Duration::from_millis(30));
    });
    let orchestrator =
        SessionOrchestrator::new(factory, SpyRewriter::new(log.clone()), StatsConfig::default());
    let session = orchestrator
        .start(SessionRequest {
            bandwidth: BandwidthConfig::uncapped(),
            local_stream: local_stream(),
        })
        .await
        .expect("session to start");

    let early = EndpointEvent::IceCandidate(Some(candidate("early")));
    assert!(orchestrator.factory().emit(Role::Responder, early));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(log
        .lock()
        .contains(&Call::AddCandidate(Role::Initiator, Some("early".to_string()))));

    tokio::join!(session.teardown(), async {
        // 2つ目の close の途中
        tokio::time::sleep(Duration::from_millis(40)).await;
        let late = EndpointEvent::IceCandidate(Some(candidate("late")));
        orchestrator.factory().emit(Role::Responder, late);
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let calls = log.lock().clone();
    let first_close = calls
        .iter()
        .position(|call| matches!(call, Call::Close(_)))
        .unwrap();
    assert!(
        calls[first_close..]
            .iter()
            .all(|call| matches!(call, Call::Close(_))),
        "{calls:?}"
    );
    assert!(!calls.contains(&Call::AddCandidate(Role::Initiator, Some("late".to_string()))));
}
