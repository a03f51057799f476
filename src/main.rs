use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use loopback_call::config::ConfigSet;
use loopback_call::endpoint::{LoopbackFactory, Role};
use loopback_call::media::{MediaSource, SyntheticMediaSource};
use loopback_call::sdp::BandwidthRewriter;
use loopback_call::session::{ControlState, SessionError, SessionOrchestrator, SessionRequest};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    match ConfigSet::load_from_env() {
        Ok(config) => {
            info!(root = ?config.root(), "configuration loaded");
            if let Err(err) = run(config).await {
                error!(error = %err, "call failed");
                std::process::exit(1);
            }
        }
        Err(err) => {
            error!(error = ?err, "failed to load configuration");
            std::process::exit(1);
        }
    }
}

async fn run(config: ConfigSet) -> Result<(), SessionError> {
    let media = SyntheticMediaSource::new();
    let local_stream = media.acquire(config.media).await?;
    info!(controls = ?ControlState::before_call(true), "local media ready");

    let orchestrator = SessionOrchestrator::new(
        LoopbackFactory::new(config.loopback.clone()),
        BandwidthRewriter,
        config.stats.clone(),
    );
    let session = orchestrator
        .start(SessionRequest {
            bandwidth: config.bandwidth.clone(),
            local_stream,
        })
        .await?;
    info!(session_id = %session.id(), state = ?session.state(), controls = ?session.controls(), "call started");

    let Some(mut updates) = session.take_stats_updates() else {
        return Ok(());
    };
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update.role {
                Role::Responder => {
                    let bitrate = update
                        .bitrate
                        .map_or_else(|| "-".to_string(), |bitrate| bitrate.to_string());
                    let peer = update
                        .active_path
                        .map_or_else(|| "-".to_string(), |path| path.to_string());
                    info!(bitrate = %bitrate, connected_to = %peer, reports = update.snapshot.len(), last = update.last, "receiver stats");
                }
                Role::Initiator => {
                    info!(reports = update.snapshot.len(), last = update.last, "sender stats");
                }
            }
            if update.last {
                info!("final stats:\n{}", update.snapshot.dump());
            }
        }
    });

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for ctrl-c");
    }
    session.teardown().await;
    info!(controls = ?session.controls(), "call ended");
    drop(session);
    if let Err(err) = printer.await {
        error!(error = %err, "stats printer ended abnormally");
    }
    Ok(())
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
    }
}
