use std::fmt;

use super::report::{Report, ReportStats};
use super::snapshot::StatsSnapshot;

/// 現在メディアが流れているリモート側の経路
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivePath {
    Resolved { address: String, port: u16 },
    /// まだ判定できない（エラーではない）
    Undetermined,
}

impl ActivePath {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

impl fmt::Display for ActivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved { address, port } => write!(f, "{address}:{port}"),
            Self::Undetermined => f.write_str("undetermined"),
        }
    }
}

/// スナップショットからアクティブな候補ペアを辿り、リモート候補のアドレスを得る
pub fn resolve_active_path(snapshot: &StatsSnapshot) -> ActivePath {
    let Some(pair) = selected_by_transport(snapshot).or_else(|| flagged_pair(snapshot)) else {
        return ActivePath::Undetermined;
    };

    remote_candidate_id(pair)
        .and_then(|id| snapshot.get(id))
        .and_then(Report::as_candidate)
        .and_then(|candidate| candidate.endpoint())
        .map_or(ActivePath::Undetermined, |(address, port)| {
            ActivePath::Resolved {
                address: address.to_string(),
                port,
            }
        })
}

/// `transport` レポートが指す選択済み候補ペア
fn selected_by_transport(snapshot: &StatsSnapshot) -> Option<&Report> {
    snapshot.iter().find_map(|report| match &report.stats {
        ReportStats::Transport(transport) => transport
            .selected_candidate_pair_id
            .as_deref()
            .and_then(|id| snapshot.get(id))
            .filter(|pair| matches!(pair.stats, ReportStats::CandidatePair(_))),
        _ => None,
    })
}

/// `selected` フラグ付き、または旧形式で `googActiveConnection == "true"` の候補ペア
fn flagged_pair(snapshot: &StatsSnapshot) -> Option<&Report> {
    snapshot.iter().find(|report| match &report.stats {
        ReportStats::CandidatePair(pair) => pair.selected == Some(true),
        ReportStats::LegacyCandidatePair(pair) => pair.is_active(),
        _ => false,
    })
}

fn remote_candidate_id(pair: &Report) -> Option<&str> {
    match &pair.stats {
        ReportStats::CandidatePair(pair) => pair.remote_candidate_id.as_deref(),
        ReportStats::LegacyCandidatePair(pair) => pair.remote_candidate_id.as_deref(),
        _ => None,
    }
}
