use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LoopbackConfig {
    /// ループバック候補として広告するアドレス（例: 127.0.0.1）
    pub host: String,
    /// 最初のエンドポイントに割り当てるポート。以降は +1 ずつ
    pub base_port: u16,
    /// SDPに `b=AS` が無い場合に擬似トラフィックで使う送信レート
    pub default_bitrate_kbps: u32,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 50000,
            default_bitrate_kbps: 2000,
        }
    }
}
