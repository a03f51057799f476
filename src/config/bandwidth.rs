//! 帯域制限（AS / TIAS）に関する設定と検証
use serde::Deserialize;

use super::ConfigError;

/// 数値・文字列どちらでも受け付ける帯域値（フォーム入力相当）
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BandwidthValue {
    Number(f64),
    Text(String),
}

impl BandwidthValue {
    fn is_blank(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(text) => text.trim().is_empty(),
        }
    }

    /// 空欄なら `Ok(None)`
    fn parse(&self, field: &'static str) -> Result<Option<u32>, ConfigError> {
        let not_numeric = || ConfigError::bandwidth_not_numeric(field, self.raw());
        let value = match self {
            Self::Number(value) => *value,
            Self::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                text.parse::<f64>().map_err(|_| not_numeric())?
            }
        };
        if !value.is_finite() || value < 0.0 {
            return Err(not_numeric());
        }
        Ok(Some(value as u32))
    }

    fn raw(&self) -> String {
        match self {
            Self::Number(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<u32> for BandwidthValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for BandwidthValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// セッション開始前に検証される帯域制限の入力
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BandwidthConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `b=AS` に使う平均帯域 (kbps)
    #[serde(default)]
    pub average_kbps: Option<BandwidthValue>,
    /// `b=TIAS` に使うトランスポート非依存帯域 (kbps)
    #[serde(default)]
    pub transport_independent_kbps: Option<BandwidthValue>,
}

/// 検証済みの帯域制限ポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandwidthPolicy {
    #[default]
    Uncapped,
    Capped {
        average_kbps: Option<u32>,
        transport_independent_kbps: Option<u32>,
    },
}

impl BandwidthConfig {
    pub fn uncapped() -> Self {
        Self::default()
    }

    pub fn capped(
        average_kbps: impl Into<BandwidthValue>,
        transport_independent_kbps: impl Into<BandwidthValue>,
    ) -> Self {
        Self {
            enabled: true,
            average_kbps: Some(average_kbps.into()),
            transport_independent_kbps: Some(transport_independent_kbps.into()),
        }
    }

    /// 有効時は少なくとも一方が数値で指定されていること
    pub fn validate(&self) -> Result<BandwidthPolicy, ConfigError> {
        if !self.enabled {
            return Ok(BandwidthPolicy::Uncapped);
        }

        let average_kbps = parse_field("average_kbps", self.average_kbps.as_ref())?;
        let transport_independent_kbps = parse_field(
            "transport_independent_kbps",
            self.transport_independent_kbps.as_ref(),
        )?;

        let all_blank = [&self.average_kbps, &self.transport_independent_kbps]
            .iter()
            .all(|value| value.as_ref().map_or(true, BandwidthValue::is_blank));
        if all_blank {
            return Err(ConfigError::BandwidthRequired);
        }

        Ok(BandwidthPolicy::Capped {
            average_kbps,
            transport_independent_kbps,
        })
    }
}

fn parse_field(
    field: &'static str,
    value: Option<&BandwidthValue>,
) -> Result<Option<u32>, ConfigError> {
    match value {
        None => Ok(None),
        Some(value) => value.parse(field),
    }
}
