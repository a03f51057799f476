//! 端点間の候補リレー
//!
//! 一方の端点が発行した候補を、もう一方の `add_ice_candidate` へ順番どおりに渡す。
//! 1件の失敗は記録して捨て、後続の候補の処理は続ける。
use std::sync::{Arc, Weak};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::endpoint::{Endpoint, EndpointError, EndpointEvent, IceCandidate, Role};
use crate::media::RemoteStream;

#[derive(Debug, Error)]
#[error("{from} candidate rejected by peer: {candidate}")]
pub struct CandidateError {
    pub from: Role,
    pub candidate: String,
    #[source]
    pub source: EndpointError,
}

impl CandidateError {
    fn new(from: Role, candidate: &Option<IceCandidate>, source: EndpointError) -> Self {
        let candidate = candidate
            .as_ref()
            .map_or_else(|| "end-of-candidates".to_string(), |c| c.candidate.clone());
        Self {
            from,
            candidate,
            source,
        }
    }
}

pub struct CandidateRelay {
    session_id: String,
    from: Role,
    peer: Weak<dyn Endpoint>,
    remote_stream: Option<watch::Sender<Option<RemoteStream>>>,
}

impl CandidateRelay {
    /// `peer` への参照は弱参照で持ち、セッションが端点を手放したら転送をやめる
    pub fn new(session_id: impl Into<String>, from: Role, peer: &Arc<dyn Endpoint>) -> Self {
        Self {
            session_id: session_id.into(),
            from,
            peer: Arc::downgrade(peer),
            remote_stream: None,
        }
    }

    /// `from` 側が受信したリモートストリームの通知先
    pub fn with_remote_stream(mut self, remote_stream: watch::Sender<Option<RemoteStream>>) -> Self {
        self.remote_stream = Some(remote_stream);
        self
    }

    pub fn spawn(self, events: mpsc::UnboundedReceiver<EndpointEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    pub async fn run(self, mut events: mpsc::UnboundedReceiver<EndpointEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                EndpointEvent::IceCandidate(candidate) => {
                    if !self.forward(candidate).await {
                        break;
                    }
                }
                EndpointEvent::Track(stream) => self.publish_stream(stream),
            }
        }
        debug!(session_id = %self.session_id, from = %self.from, "candidate relay finished");
    }

    /// 転送先が既に無ければ `false`
    async fn forward(&self, candidate: Option<IceCandidate>) -> bool {
        let Some(peer) = self.peer.upgrade() else {
            debug!(session_id = %self.session_id, from = %self.from, "peer released, dropping candidate");
            return false;
        };
        debug!(session_id = %self.session_id, from = %self.from, end = candidate.is_none(), "relaying candidate");

        match peer.add_ice_candidate(candidate.clone()).await {
            Ok(()) => debug!(session_id = %self.session_id, from = %self.from, "candidate accepted"),
            Err(source) => {
                let error = CandidateError::new(self.from, &candidate, source);
                warn!(session_id = %self.session_id, error = %error, cause = %error.source, "failed to add candidate");
            }
        }
        true
    }

    fn publish_stream(&self, stream: RemoteStream) {
        let Some(remote_stream) = &self.remote_stream else {
            debug!(session_id = %self.session_id, from = %self.from, stream_id = %stream.id, "ignoring track event");
            return;
        };
        let replaced = remote_stream.send_if_modified(|current| {
            if current.as_ref().map(|s| &s.id) == Some(&stream.id) {
                return false;
            }
            *current = Some(stream.clone());
            true
        });
        if replaced {
            info!(session_id = %self.session_id, stream_id = %stream.id, "remote stream attached");
        }
    }
}
