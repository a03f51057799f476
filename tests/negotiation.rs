mod common;

use std::time::Duration;

use loopback_call::config::{BandwidthConfig, ConfigError, StatsConfig};
use loopback_call::endpoint::Role;
use loopback_call::media::MediaKind;
use loopback_call::negotiation::{NegotiationState, NegotiationStep};
use loopback_call::session::{SessionError, SessionOrchestrator, SessionRequest};

use common::{local_stream, new_log, Call, SpyFactory, SpyRewriter, REWRITE_MARKER};

fn request(bandwidth: BandwidthConfig) -> SessionRequest {
    SessionRequest {
        bandwidth,
        local_stream: local_stream(),
    }
}

fn position(calls: &[Call], wanted: impl Fn(&Call) -> bool) -> usize {
    calls
        .iter()
        .position(wanted)
        .unwrap_or_else(|| panic!("call not recorded: {calls:?}"))
}

#[tokio::test]
async fn each_descriptor_is_rewritten_once_before_delivery() {
    let log = new_log();
    let orchestrator = SessionOrchestrator::new(
        SpyFactory::new(log.clone()),
        SpyRewriter::new(log.clone()),
        StatsConfig::default(),
    );

    let session = orchestrator
        .start(request(BandwidthConfig::capped(1500, "")))
        .await
        .expect("session to start");
    assert_eq!(session.state(), NegotiationState::Established);

    let calls = log.lock().clone();
    let rewrites: Vec<_> = calls
        .iter()
        .filter(|call| matches!(call, Call::Rewrite(_)))
        .cloned()
        .collect();
    assert_eq!(
        rewrites,
        vec![Call::Rewrite(Some(MediaKind::Video)), Call::Rewrite(None)]
    );

    let offer_rewrite = position(&calls, |c| *c == Call::Rewrite(Some(MediaKind::Video)));
    let answer_rewrite = position(&calls, |c| *c == Call::Rewrite(None));
    let offer_delivered = position(&calls, |c| matches!(c, Call::SetRemote(Role::Responder, _)));
    let answer_delivered = position(&calls, |c| matches!(c, Call::SetRemote(Role::Initiator, _)));
    let answer_created = position(&calls, |c| *c == Call::CreateAnswer(Role::Responder));
    assert!(offer_rewrite < offer_delivered);
    assert!(offer_delivered < answer_created);
    assert!(answer_rewrite < answer_delivered);

    for call in &calls {
        if let Call::SetLocal(_, sdp) | Call::SetRemote(_, sdp) = call {
            assert_eq!(sdp.matches(REWRITE_MARKER).count(), 1, "{call:?}");
        }
    }

    session.teardown().await;
}

#[tokio::test]
async fn local_tracks_are_attached_to_initiator_only() {
    let log = new_log();
    let orchestrator = SessionOrchestrator::new(
        SpyFactory::new(log.clone()),
        SpyRewriter::new(log.clone()),
        StatsConfig::default(),
    );

    let session = orchestrator
        .start(request(BandwidthConfig::uncapped()))
        .await
        .expect("session to start");

    let calls = log.lock().clone();
    let attached: Vec<_> = calls
        .iter()
        .filter(|call| matches!(call, Call::AddTrack(_)))
        .collect();
    assert_eq!(attached, vec![&Call::AddTrack(Role::Initiator); 2]);
    assert!(
        position(&calls, |c| matches!(c, Call::AddTrack(_)))
            < position(&calls, |c| *c == Call::CreateOffer(Role::Initiator))
    );

    session.teardown().await;
}

#[tokio::test]
async fn invalid_bandwidth_creates_no_endpoints() {
    let log = new_log();
    let orchestrator = SessionOrchestrator::new(
        SpyFactory::new(log.clone()),
        SpyRewriter::new(log.clone()),
        StatsConfig::default(),
    );

    let error = orchestrator
        .start(request(BandwidthConfig::capped("", "")))
        .await
        .err()
        .expect("configuration should be rejected");
    match error {
        SessionError::Configuration(ConfigError::BandwidthRequired) => {}
        other => panic!("expected configuration error, got {other:?}"),
    }

    let error = orchestrator
        .start(request(BandwidthConfig::capped("fast", "")))
        .await
        .err()
        .expect("non-numeric bandwidth should be rejected");
    assert!(matches!(
        error,
        SessionError::Configuration(ConfigError::BandwidthNotNumeric {
            field: "average_kbps",
            ..
        })
    ));

    assert_eq!(orchestrator.factory().created(), 0);
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn failed_step_halts_without_rollback() {
    let log = new_log();
    let factory = SpyFactory::with(log.clone(), |endpoint| {
        endpoint.fail_on("set_remote_description");
    });
    let stats = StatsConfig {
        poll_interval_ms: 20,
        ..StatsConfig::default()
    };
    let orchestrator = SessionOrchestrator::new(factory, SpyRewriter::new(log.clone()), stats);

    let session = orchestrator
        .start(request(BandwidthConfig::uncapped()))
        .await
        .expect("session is returned even when negotiation fails");
    assert_eq!(
        session.state(),
        NegotiationState::Failed(NegotiationStep::DeliverOffer)
    );
    assert!(session.is_active());
    let mut updates = session.take_stats_updates().expect("updates receiver");

    // 数ティック分待っても、未接続の間は統計を取りに行かない
    tokio::time::sleep(Duration::from_millis(90)).await;
    {
        let calls = log.lock();
        assert!(!calls.contains(&Call::CreateAnswer(Role::Responder)));
        assert!(!calls.iter().any(|call| matches!(call, Call::Close(_))));
        assert!(!calls.iter().any(|call| matches!(call, Call::GetStats(_))));
    }

    session.teardown().await;
    {
        let calls = log.lock();
        assert!(calls.contains(&Call::Close(Role::Initiator)));
        assert!(calls.contains(&Call::Close(Role::Responder)));
    }

    let mut received = Vec::new();
    while let Some(update) = updates.recv().await {
        received.push(update);
    }
    assert_eq!(received.len(), 2);
    assert!(received.iter().all(|update| update.last));
}
