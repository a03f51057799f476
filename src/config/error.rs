//! 設定読み込み・検証時のエラー定義
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration directory: {0:?}")]
    MissingRoot(PathBuf),
    #[error("failed to read configuration file: {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file: {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("bandwidth cap enabled but neither average nor transport-independent bandwidth is set")]
    BandwidthRequired,
    #[error("{field} must be a number, got {value:?}")]
    BandwidthNotNumeric { field: &'static str, value: String },
}

impl ConfigError {
    pub fn bandwidth_not_numeric(field: &'static str, value: impl Into<String>) -> Self {
        Self::BandwidthNotNumeric {
            field,
            value: value.into(),
        }
    }

    /// ユーザーへの入力促しが必要な検証エラーか
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BandwidthRequired | Self::BandwidthNotNumeric { .. }
        )
    }
}
