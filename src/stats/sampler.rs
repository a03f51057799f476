use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::endpoint::{EndpointError, EndpointPair, Role};
use crate::negotiation::NegotiationState;

use super::differencer::{Bitrate, BitrateDifferencer};
use super::error::StatsFetchError;
use super::resolver::{resolve_active_path, ActivePath};
use super::snapshot::StatsSnapshot;

/// 表示側へ流す1回分の統計
#[derive(Debug, Clone)]
pub struct StatsUpdate {
    pub role: Role,
    pub snapshot: StatsSnapshot,
    /// 受信側のみ。初回サンプルでは `None`
    pub bitrate: Option<Bitrate>,
    /// 受信側のみ
    pub active_path: Option<ActivePath>,
    /// 切断時の最終取得
    pub last: bool,
}

/// 一定周期で両端点の統計を取得し、受信側をビットレート算出と経路判定へ回す
pub struct StatsSampler {
    session_id: String,
    endpoints: Arc<RwLock<Option<EndpointPair>>>,
    negotiation: watch::Receiver<NegotiationState>,
    differencer: BitrateDifferencer,
    updates: mpsc::UnboundedSender<StatsUpdate>,
}

/// 実行中のサンプラーを止めるためのハンドル
pub struct SamplerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// 以降のティックを止め、最終取得の完了まで待つ
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "stats sampler task ended abnormally");
        }
    }
}

impl StatsSampler {
    pub fn new(
        session_id: impl Into<String>,
        endpoints: Arc<RwLock<Option<EndpointPair>>>,
        negotiation: watch::Receiver<NegotiationState>,
        differencer: BitrateDifferencer,
        updates: mpsc::UnboundedSender<StatsUpdate>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            endpoints,
            negotiation,
            differencer,
            updates,
        }
    }

    pub fn spawn(mut self, period: Duration) -> SamplerHandle {
        let (stop, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 最初のティックは即時に完了するので読み捨てる
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let established = self.negotiation.borrow().is_established();
                        if established {
                            self.sample(false).await;
                        } else {
                            debug!(session_id = %self.session_id, "not connected yet");
                        }
                    }
                }
            }

            self.sample(true).await;
            debug!(session_id = %self.session_id, "stats sampler stopped");
        });
        SamplerHandle { stop, task }
    }

    /// 両端点から1回ずつ取得して結果を送る
    pub async fn sample(&mut self, last: bool) {
        let endpoints = self.endpoints.read().clone();
        let Some(endpoints) = endpoints else {
            debug!(session_id = %self.session_id, "not connected yet");
            return;
        };

        let (receiver, sender) = join(
            endpoints.responder.get_stats(None),
            endpoints.initiator.get_stats(None),
        )
        .await;
        drop(endpoints);

        if let Some(snapshot) = self.checked(Role::Responder, receiver) {
            let bitrate = self.differencer.sample(&snapshot);
            let active_path = resolve_active_path(&snapshot);
            self.publish(StatsUpdate {
                role: Role::Responder,
                snapshot,
                bitrate,
                active_path: Some(active_path),
                last,
            });
        }
        if let Some(snapshot) = self.checked(Role::Initiator, sender) {
            self.publish(StatsUpdate {
                role: Role::Initiator,
                snapshot,
                bitrate: None,
                active_path: None,
                last,
            });
        }
    }

    fn checked(
        &self,
        role: Role,
        result: Result<StatsSnapshot, EndpointError>,
    ) -> Option<StatsSnapshot> {
        match result {
            Ok(snapshot) => Some(snapshot),
            Err(source) => {
                let error = StatsFetchError { role, source };
                warn!(session_id = %self.session_id, error = %error, cause = %error.source, "skipping stats report");
                None
            }
        }
    }

    fn publish(&self, update: StatsUpdate) {
        if self.updates.send(update).is_err() {
            debug!(session_id = %self.session_id, "stats receiver dropped");
        }
    }
}
