//! 統計レポートの型付きモデル
//!
//! ブラウザ実装ごとに揺れるレポートスキーマを、種別ごとの固定構造体へ落とし込む。
//! 旧名フィールドへのフォールバックは各アクセサで明示的に行う。
use serde::{Deserialize, Serialize};

use crate::media::MediaKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub timestamp: f64,
    #[serde(flatten)]
    pub stats: ReportStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReportStats {
    InboundRtp(InboundRtpStats),
    OutboundRtp(OutboundRtpStats),
    Transport(TransportStats),
    CandidatePair(CandidatePairStats),
    /// 旧形式では `localcandidate`
    #[serde(alias = "localcandidate")]
    LocalCandidate(CandidateStats),
    #[serde(alias = "remotecandidate")]
    RemoteCandidate(CandidateStats),
    /// ローカル/リモートの区別が無い候補
    Candidate(CandidateStats),
    /// Chrome の旧 `getStats` が返していた候補ペア
    #[serde(rename = "googCandidatePair")]
    LegacyCandidatePair(LegacyCandidatePairStats),
    #[serde(other)]
    Other,
}

impl ReportStats {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InboundRtp(_) => "inbound-rtp",
            Self::OutboundRtp(_) => "outbound-rtp",
            Self::Transport(_) => "transport",
            Self::CandidatePair(_) => "candidate-pair",
            Self::LocalCandidate(_) => "local-candidate",
            Self::RemoteCandidate(_) => "remote-candidate",
            Self::Candidate(_) => "candidate",
            Self::LegacyCandidatePair(_) => "googCandidatePair",
            Self::Other => "other",
        }
    }
}

impl Report {
    pub fn new(id: impl Into<String>, timestamp: f64, stats: ReportStats) -> Self {
        Self {
            id: id.into(),
            timestamp,
            stats,
        }
    }

    pub fn as_candidate(&self) -> Option<&CandidateStats> {
        match &self.stats {
            ReportStats::LocalCandidate(candidate)
            | ReportStats::RemoteCandidate(candidate)
            | ReportStats::Candidate(candidate) => Some(candidate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundRtpStats {
    pub kind: Option<String>,
    /// 旧名（`kind` 以前）
    pub media_type: Option<String>,
    pub bytes_received: u64,
    pub packets_received: Option<u64>,
}

impl InboundRtpStats {
    pub fn media_kind(&self) -> Option<MediaKind> {
        media_kind(self.kind.as_deref(), self.media_type.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutboundRtpStats {
    pub kind: Option<String>,
    pub media_type: Option<String>,
    pub bytes_sent: u64,
    pub packets_sent: Option<u64>,
}

impl OutboundRtpStats {
    pub fn media_kind(&self) -> Option<MediaKind> {
        media_kind(self.kind.as_deref(), self.media_type.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportStats {
    pub selected_candidate_pair_id: Option<String>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidatePairStats {
    pub local_candidate_id: Option<String>,
    pub remote_candidate_id: Option<String>,
    /// Firefox 系の選択フラグ
    pub selected: Option<bool>,
    pub nominated: Option<bool>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyCandidatePairStats {
    pub local_candidate_id: Option<String>,
    pub remote_candidate_id: Option<String>,
    /// 文字列 `"true"` のときのみアクティブ
    pub goog_active_connection: Option<String>,
}

impl LegacyCandidatePairStats {
    pub fn is_active(&self) -> bool {
        self.goog_active_connection.as_deref() == Some("true")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateStats {
    pub address: Option<String>,
    /// `address` 以前の名前。両方載っていることもある
    pub ip: Option<String>,
    pub port: Option<u16>,
    /// 旧名
    pub ip_address: Option<String>,
    /// 旧名
    pub port_number: Option<u16>,
    pub protocol: Option<String>,
    pub candidate_type: Option<String>,
}

impl CandidateStats {
    /// `address` → `ip` → 旧名 `ipAddress`/`portNumber` の順に、揃っている組を使う
    pub fn endpoint(&self) -> Option<(&str, u16)> {
        complete(self.address.as_deref(), self.port)
            .or_else(|| complete(self.ip.as_deref(), self.port))
            .or_else(|| complete(self.ip_address.as_deref(), self.port_number))
    }
}

fn complete(address: Option<&str>, port: Option<u16>) -> Option<(&str, u16)> {
    match (address, port) {
        (Some(address), Some(port)) if !address.is_empty() && port != 0 => Some((address, port)),
        _ => None,
    }
}

fn media_kind(current: Option<&str>, legacy: Option<&str>) -> Option<MediaKind> {
    current
        .and_then(MediaKind::parse)
        .or_else(|| legacy.and_then(MediaKind::parse))
}
