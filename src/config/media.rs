use serde::Deserialize;

/// ローカルメディア取得時の制約（音声・映像）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MediaConstraints {
    #[serde(default = "enabled")]
    pub audio: bool,
    #[serde(default = "enabled")]
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

fn enabled() -> bool {
    true
}
