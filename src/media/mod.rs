//! ローカルメディア（カメラ・マイク）の抽象
//!
//! 実デバイスの取得は外部コラボレータの責務。ここではセッションが消費する
//! インタフェースと、テスト・デモ用の合成ソースだけを提供する。
mod error;
mod synthetic;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MediaConstraints;

pub use error::MediaError;
pub use synthetic::{SyntheticMediaSource, SyntheticTrack};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;
    fn kind(&self) -> MediaKind;
    fn stop(&self);
    fn is_stopped(&self) -> bool;
}

/// 取得済みローカルストリーム
#[derive(Debug, Clone)]
pub struct LocalStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<dyn MediaTrack>> + '_ {
        self.tracks
            .iter()
            .filter(|track| track.kind() == MediaKind::Video)
    }

    /// すべてのトラックを停止
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// 相手側で受信したリモートストリーム（`onTrack` 相当）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub kinds: Vec<MediaKind>,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError>;
}
