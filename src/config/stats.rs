//! 統計サンプリングに関する設定
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,
}

impl StatsConfig {
    /// ポーリング間隔（ミリ秒→Duration）
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timestamp_unit: TimestampUnit::default(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// レポートのタイムスタンプ単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    Seconds,
    #[default]
    Milliseconds,
    Microseconds,
}

impl TimestampUnit {
    /// `bytes / timestamp` を kbit/s に換算する係数
    ///
    /// ミリ秒の場合 `8 * bytes / ms` がそのまま kbit/s になる。
    pub fn kbps_factor(self) -> f64 {
        match self {
            Self::Seconds => 8.0 / 1000.0,
            Self::Milliseconds => 8.0,
            Self::Microseconds => 8.0 * 1000.0,
        }
    }
}
