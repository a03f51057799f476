use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::MediaConstraints;

use super::{LocalStream, MediaError, MediaKind, MediaSource, MediaTrack};

/// 実デバイスを持たない合成トラック
#[derive(Debug)]
pub struct SyntheticTrack {
    id: String,
    kind: MediaKind,
    stopped: AtomicBool,
}

impl SyntheticTrack {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            id: format!("{}-{}", kind, uuid::Uuid::new_v4()),
            kind,
            stopped: AtomicBool::new(false),
        }
    }
}

impl MediaTrack for SyntheticTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!(track_id = %self.id, kind = %self.kind, "track stopped");
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// 取得のたびに新しいストリームを返し、前回のストリームは停止する
#[derive(Debug, Default)]
pub struct SyntheticMediaSource {
    current: Mutex<Option<LocalStream>>,
}

impl SyntheticMediaSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError> {
        if !constraints.audio && !constraints.video {
            return Err(MediaError::NoTracksRequested);
        }

        if let Some(previous) = self.current.lock().take() {
            previous.stop();
        }

        let mut tracks: Vec<Arc<dyn MediaTrack>> = Vec::new();
        if constraints.audio {
            tracks.push(Arc::new(SyntheticTrack::new(MediaKind::Audio)));
        }
        if constraints.video {
            tracks.push(Arc::new(SyntheticTrack::new(MediaKind::Video)));
        }

        let stream = LocalStream::new(uuid::Uuid::new_v4().to_string(), tracks);
        info!(stream_id = %stream.id(), tracks = stream.tracks().len(), "local media acquired");
        *self.current.lock() = Some(stream.clone());
        Ok(stream)
    }
}
