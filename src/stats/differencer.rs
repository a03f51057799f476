use std::fmt;

use crate::config::TimestampUnit;
use crate::media::MediaKind;

use super::report::ReportStats;
use super::snapshot::StatsSnapshot;

/// 瞬間ビットレート (kbit/s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Bitrate {
    pub kbps: u64,
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kbits/sec", self.kbps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    bytes: u64,
    timestamp: f64,
}

/// 累積受信バイト数の差分から受信映像のビットレートを求める
///
/// 直前の値はサンプル毎に必ず更新する。初回は比較対象が無いので `None`。
#[derive(Debug, Clone)]
pub struct BitrateDifferencer {
    factor: f64,
    previous: Option<Sample>,
}

impl BitrateDifferencer {
    pub fn new(unit: TimestampUnit) -> Self {
        Self {
            factor: unit.kbps_factor(),
            previous: None,
        }
    }

    pub fn sample(&mut self, snapshot: &StatsSnapshot) -> Option<Bitrate> {
        let (bytes, timestamp) = snapshot.iter().find_map(|report| match &report.stats {
            ReportStats::InboundRtp(inbound) if inbound.media_kind() == Some(MediaKind::Video) => {
                Some((inbound.bytes_received, report.timestamp))
            }
            _ => None,
        })?;
        self.record(bytes, timestamp)
    }

    pub fn record(&mut self, bytes: u64, timestamp: f64) -> Option<Bitrate> {
        let previous = self.previous.replace(Sample { bytes, timestamp });
        let previous = previous.filter(|sample| sample.timestamp != 0.0)?;

        let elapsed = timestamp - previous.timestamp;
        if elapsed <= 0.0 || bytes < previous.bytes {
            return None;
        }
        let rate = self.factor * (bytes - previous.bytes) as f64 / elapsed;
        Some(Bitrate {
            kbps: rate.floor() as u64,
        })
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
