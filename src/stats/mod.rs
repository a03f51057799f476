//! 統計の取得・差分・経路判定
//!
//! - `StatsSnapshot` / `Report`: 種別ごとの固定構造体で表したレポート集合
//! - `BitrateDifferencer`: 連続する累積バイト数から kbit/s を算出
//! - `resolve_active_path`: transport → candidate-pair → candidate と辿って経路を特定
//! - `StatsSampler`: 一定周期で両端点から取得し、結果を表示側へ流す
mod differencer;
mod error;
mod report;
mod resolver;
mod sampler;
mod snapshot;

pub use differencer::{Bitrate, BitrateDifferencer};
pub use error::StatsFetchError;
pub use report::{
    CandidatePairStats, CandidateStats, InboundRtpStats, LegacyCandidatePairStats,
    OutboundRtpStats, Report, ReportStats, TransportStats,
};
pub use resolver::{resolve_active_path, ActivePath};
pub use sampler::{SamplerHandle, StatsSampler, StatsUpdate};
pub use snapshot::StatsSnapshot;
