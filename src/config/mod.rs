//! 設定モジュール（YAML 読み込み）
//!
//! `ConfigSet` はルートディレクトリ配下の複数YAMLファイルを読み込み、
//! セッション開始前に必要な設定値を型安全に提供します。
mod bandwidth;
mod error;
mod loopback;
mod media;
mod stats;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

pub use bandwidth::*;
pub use error::ConfigError;
pub use loopback::*;
pub use media::*;
pub use stats::*;

/// 設定ディレクトリを指す環境変数名
pub const CONFIG_DIR_ENV: &str = "LOOPBACK_CALL_CONFIG_DIR";

/// すべての設定をひとまとめにした構造体
#[derive(Debug, Clone)]
pub struct ConfigSet {
    pub bandwidth: BandwidthConfig,
    pub stats: StatsConfig,
    pub media: MediaConstraints,
    pub loopback: LoopbackConfig,
    root: PathBuf,
}

impl ConfigSet {
    /// ルートディレクトリから各YAMLを読み込み
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ConfigError> {
        let root = dir.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ConfigError::MissingRoot(root));
        }

        let bandwidth = load_yaml(root.join("bandwidth.yaml"))?;
        let stats = load_yaml(root.join("stats.yaml"))?;
        let media = load_yaml(root.join("media.yaml"))?;
        let loopback = load_yaml(root.join("loopback.yaml"))?;

        Ok(Self {
            bandwidth,
            stats,
            media,
            loopback,
            root,
        })
    }

    /// 環境変数（未設定時は `config/`）から設定を読み込み
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| "config".to_string());
        Self::load_from_dir(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// YAMLファイルを読み込み、型 `T` へデシリアライズ
fn load_yaml<T>(path: PathBuf) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let data = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse { path, source })
}
