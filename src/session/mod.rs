//! セッションの開始と切断
//!
//! `SessionOrchestrator` が設定検証→端点生成→候補リレー結線→記述交換→統計サンプリング開始を
//! 順に行い、結果を `Session` にまとめて返す。グローバルな端点ハンドルは持たず、
//! 後始末はすべて `Session::teardown` が担う。
mod error;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{BandwidthConfig, StatsConfig};
use crate::endpoint::{EndpointFactory, EndpointPair, Role};
use crate::media::{LocalStream, RemoteStream};
use crate::negotiation::{negotiate, NegotiationState, NegotiationTracker};
use crate::relay::CandidateRelay;
use crate::sdp::DescriptorRewriter;
use crate::stats::{BitrateDifferencer, SamplerHandle, StatsSampler, StatsUpdate};

pub use error::SessionError;

/// セッション開始要求
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub bandwidth: BandwidthConfig,
    pub local_stream: LocalStream,
}

/// 操作ボタンの有効/無効
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub acquire_media: bool,
    pub connect: bool,
    pub hang_up: bool,
}

impl ControlState {
    /// セッション開始前
    pub fn before_call(media_ready: bool) -> Self {
        Self {
            acquire_media: !media_ready,
            connect: media_ready,
            hang_up: false,
        }
    }
}

pub struct SessionOrchestrator<F, R>
where
    F: EndpointFactory,
    R: DescriptorRewriter,
{
    factory: F,
    rewriter: R,
    stats: StatsConfig,
}

impl<F, R> SessionOrchestrator<F, R>
where
    F: EndpointFactory,
    R: DescriptorRewriter,
{
    pub fn new(factory: F, rewriter: R, stats: StatsConfig) -> Self {
        Self {
            factory,
            rewriter,
            stats,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// 設定が不正な場合は端点を一切作らずに失敗する。
    /// 記述交換の失敗はログに残し、部分的に構築された `Session` をそのまま返す。
    pub async fn start(&self, request: SessionRequest) -> Result<Session, SessionError> {
        let policy = request.bandwidth.validate().map_err(|err| {
            warn!(error = %err, "bandwidth configuration rejected");
            err
        })?;

        let session_id = uuid::Uuid::new_v4().to_string();
        info!(session_id = %session_id, ?policy, "creating endpoints");

        let initiator = self.factory.create(Role::Initiator).await?;
        let responder = match self.factory.create(Role::Responder).await {
            Ok(responder) => responder,
            Err(err) => {
                if let Err(close_err) = initiator.endpoint.close().await {
                    warn!(session_id = %session_id, error = %close_err, "failed to close initiator");
                }
                return Err(err.into());
            }
        };

        let endpoints = EndpointPair {
            initiator: initiator.endpoint,
            responder: responder.endpoint,
        };

        let (remote_stream_tx, remote_stream) = watch::channel(None);
        let relays = vec![
            CandidateRelay::new(
                session_id.clone(),
                Role::Initiator,
                endpoints.get(Role::Initiator.peer()),
            )
            .spawn(initiator.events),
            CandidateRelay::new(
                session_id.clone(),
                Role::Responder,
                endpoints.get(Role::Responder.peer()),
            )
            .with_remote_stream(remote_stream_tx)
            .spawn(responder.events),
        ];

        for track in request.local_stream.tracks() {
            if let Err(err) = endpoints.initiator.add_track(track.clone()).await {
                warn!(session_id = %session_id, track_id = %track.id(), error = %err, "failed to attach local track");
            }
        }

        let tracker = NegotiationTracker::new();
        if let Err(err) = negotiate(&endpoints, &self.rewriter, &policy, &tracker).await {
            error!(session_id = %session_id, error = %err, step = ?err.step(), state = ?tracker.current(), "negotiation halted");
        }

        let endpoints = Arc::new(RwLock::new(Some(endpoints)));
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let sampler = StatsSampler::new(
            session_id.clone(),
            endpoints.clone(),
            tracker.subscribe(),
            BitrateDifferencer::new(self.stats.timestamp_unit),
            updates_tx,
        )
        .spawn(self.stats.poll_interval());

        Ok(Session {
            id: session_id,
            tracker,
            endpoints,
            local_stream: Mutex::new(Some(request.local_stream)),
            remote_stream,
            relays: Mutex::new(relays),
            sampler: Mutex::new(Some(sampler)),
            updates: Mutex::new(Some(updates_rx)),
        })
    }
}

/// 2つの端点とローカルストリームを束ねたセッション
pub struct Session {
    id: String,
    tracker: NegotiationTracker,
    endpoints: Arc<RwLock<Option<EndpointPair>>>,
    local_stream: Mutex<Option<LocalStream>>,
    remote_stream: watch::Receiver<Option<RemoteStream>>,
    relays: Mutex<Vec<JoinHandle<()>>>,
    sampler: Mutex<Option<SamplerHandle>>,
    updates: Mutex<Option<mpsc::UnboundedReceiver<StatsUpdate>>>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> NegotiationState {
        self.tracker.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<NegotiationState> {
        self.tracker.subscribe()
    }

    pub fn remote_stream(&self) -> Option<RemoteStream> {
        self.remote_stream.borrow().clone()
    }

    pub fn subscribe_remote_stream(&self) -> watch::Receiver<Option<RemoteStream>> {
        self.remote_stream.clone()
    }

    /// 統計更新の受信側（一度だけ取得可能）
    pub fn take_stats_updates(&self) -> Option<mpsc::UnboundedReceiver<StatsUpdate>> {
        self.updates.lock().take()
    }

    pub fn is_active(&self) -> bool {
        self.endpoints.read().is_some()
    }

    pub fn controls(&self) -> ControlState {
        if self.state().is_closed() {
            ControlState {
                acquire_media: true,
                connect: false,
                hang_up: false,
            }
        } else {
            ControlState {
                acquire_media: false,
                connect: false,
                hang_up: true,
            }
        }
    }

    /// 切断。2回目以降は何もしない
    ///
    /// 1. サンプラーを止め、最終の統計取得が終わるまで待つ（端点はまだ開いている）
    /// 2. 候補リレーを止め、終了を待つ
    /// 3. 両端点を閉じる
    /// 4. ローカルトラックを停止
    /// 5. 端点・ストリームへの参照を手放す
    pub async fn teardown(&self) {
        if !self.tracker.close() {
            debug!(session_id = %self.id, "session already torn down");
            return;
        }
        info!(session_id = %self.id, "ending call");

        let sampler = self.sampler.lock().take();
        if let Some(sampler) = sampler {
            sampler.shutdown().await;
        }

        // close 以降は候補を転送しない
        let relays: Vec<_> = self.relays.lock().drain(..).collect();
        for relay in relays {
            relay.abort();
            if let Err(err) = relay.await {
                if !err.is_cancelled() {
                    warn!(session_id = %self.id, error = %err, "candidate relay ended abnormally");
                }
            }
        }

        let endpoints = self.endpoints.read().clone();
        if let Some(endpoints) = endpoints {
            for role in [Role::Initiator, Role::Responder] {
                if let Err(err) = endpoints.get(role).close().await {
                    warn!(session_id = %self.id, role = %role, error = %err, "failed to close endpoint");
                }
            }
        }

        let local_stream = self.local_stream.lock().take();
        if let Some(stream) = local_stream {
            stream.stop();
        }

        self.endpoints.write().take();
        info!(session_id = %self.id, "session released");
    }
}
