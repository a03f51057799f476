//! メディアトランスポート端点の抽象
//!
//! 鍵交換・輻輳制御・メディア転送を行う実体は外部コラボレータであり、
//! セッションはここで定義した `Endpoint` 契約だけを通して操作する。
//! 候補やトラックの通知はコールバックではなくイベントチャネルで受け取る。
mod error;
mod loopback;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::media::{MediaTrack, RemoteStream};
use crate::stats::StatsSnapshot;

pub use error::EndpointError;
pub use loopback::{LoopbackEndpoint, LoopbackFactory};
pub use types::{CandidateAttributes, IceCandidate, Role, SdpType, SessionDescription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// `None` は候補収集の終了マーカー
    IceCandidate(Option<IceCandidate>),
    Track(RemoteStream),
}

#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), EndpointError>;

    async fn create_offer(&self) -> Result<SessionDescription, EndpointError>;

    async fn create_answer(&self) -> Result<SessionDescription, EndpointError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EndpointError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EndpointError>;

    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), EndpointError>;

    /// `selector` を指定した場合はそのIDのレポートだけを返す
    async fn get_stats(&self, selector: Option<&str>) -> Result<StatsSnapshot, EndpointError>;

    async fn close(&self) -> Result<(), EndpointError>;
}

/// 生成直後の端点と、その端点が発するイベントの受信側
pub struct EndpointHandle {
    pub endpoint: Arc<dyn Endpoint>,
    pub events: mpsc::UnboundedReceiver<EndpointEvent>,
}

impl EndpointHandle {
    pub fn new(endpoint: Arc<dyn Endpoint>, events: mpsc::UnboundedReceiver<EndpointEvent>) -> Self {
        Self { endpoint, events }
    }
}

/// セッションが保持する2つの端点
#[derive(Clone)]
pub struct EndpointPair {
    pub initiator: Arc<dyn Endpoint>,
    pub responder: Arc<dyn Endpoint>,
}

impl EndpointPair {
    pub fn get(&self, role: Role) -> &Arc<dyn Endpoint> {
        match role {
            Role::Initiator => &self.initiator,
            Role::Responder => &self.responder,
        }
    }
}

#[async_trait]
pub trait EndpointFactory: Send + Sync {
    async fn create(&self, role: Role) -> Result<EndpointHandle, EndpointError>;
}
