#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use loopback_call::config::BandwidthPolicy;
use loopback_call::endpoint::{
    Endpoint, EndpointError, EndpointEvent, EndpointFactory, EndpointHandle, IceCandidate, Role,
    SessionDescription,
};
use loopback_call::media::{LocalStream, MediaKind, MediaTrack, SyntheticTrack};
use loopback_call::sdp::DescriptorRewriter;
use loopback_call::stats::{Report, StatsSnapshot};

pub const REWRITE_MARKER: &str = "a=x-rewritten";

/// 端点・書き換え器への呼び出し記録
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Rewrite(Option<MediaKind>),
    AddTrack(Role),
    CreateOffer(Role),
    CreateAnswer(Role),
    SetLocal(Role, String),
    SetRemote(Role, String),
    AddCandidate(Role, Option<String>),
    GetStats(Role),
    Close(Role),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// 呼び出しを記録し、指定された操作だけ失敗させる端点
pub struct SpyEndpoint {
    role: Role,
    log: CallLog,
    fail_on: Mutex<Vec<&'static str>>,
    candidate_delays: Mutex<HashMap<String, Duration>>,
    rejected_candidates: Mutex<Vec<String>>,
    stats: Mutex<Option<StatsSnapshot>>,
    close_delay: Mutex<Option<Duration>>,
}

impl SpyEndpoint {
    pub fn new(role: Role, log: CallLog) -> Self {
        Self {
            role,
            log,
            fail_on: Mutex::new(Vec::new()),
            candidate_delays: Mutex::new(HashMap::new()),
            rejected_candidates: Mutex::new(Vec::new()),
            stats: Mutex::new(None),
            close_delay: Mutex::new(None),
        }
    }

    /// `operation` は `create_offer` などのメソッド名
    pub fn fail_on(&self, operation: &'static str) {
        self.fail_on.lock().push(operation);
    }

    pub fn delay_candidate(&self, candidate: &str, delay: Duration) {
        self.candidate_delays
            .lock()
            .insert(candidate.to_string(), delay);
    }

    pub fn reject_candidate(&self, candidate: &str) {
        self.rejected_candidates.lock().push(candidate.to_string());
    }

    /// `close` を記録した後、完了までの待ち時間
    pub fn delay_close(&self, delay: Duration) {
        *self.close_delay.lock() = Some(delay);
    }

    pub fn set_stats(&self, snapshot: StatsSnapshot) {
        *self.stats.lock() = Some(snapshot);
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<(), EndpointError> {
        self.log.lock().push(call);
        if self.fail_on.lock().contains(&operation) {
            return Err(EndpointError::rejected(format!("{operation} failed")));
        }
        Ok(())
    }

    fn description(&self, kind: &str) -> String {
        format!("v=0\r\ns={kind}-{}\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=mid:0\r\n", self.role)
    }
}

#[async_trait]
impl Endpoint for SpyEndpoint {
    async fn add_track(&self, _track: Arc<dyn MediaTrack>) -> Result<(), EndpointError> {
        self.record(Call::AddTrack(self.role), "add_track")
    }

    async fn create_offer(&self) -> Result<SessionDescription, EndpointError> {
        self.record(Call::CreateOffer(self.role), "create_offer")?;
        Ok(SessionDescription::offer(self.description("offer")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EndpointError> {
        self.record(Call::CreateAnswer(self.role), "create_answer")?;
        Ok(SessionDescription::answer(self.description("answer")))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EndpointError> {
        self.record(Call::SetLocal(self.role, desc.sdp), "set_local_description")
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EndpointError> {
        self.record(Call::SetRemote(self.role, desc.sdp), "set_remote_description")
    }

    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), EndpointError> {
        let text = candidate.as_ref().map(|c| c.candidate.clone());
        if let Some(text) = &text {
            let delay = self.candidate_delays.lock().get(text).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
        self.log.lock().push(Call::AddCandidate(self.role, text.clone()));
        match text {
            Some(text) if self.rejected_candidates.lock().contains(&text) => {
                Err(EndpointError::invalid_candidate(text))
            }
            _ => Ok(()),
        }
    }

    async fn get_stats(&self, _selector: Option<&str>) -> Result<StatsSnapshot, EndpointError> {
        self.record(Call::GetStats(self.role), "get_stats")?;
        Ok(self.stats.lock().clone().unwrap_or_default())
    }

    async fn close(&self) -> Result<(), EndpointError> {
        self.record(Call::Close(self.role), "close")?;
        let delay = *self.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// 生成回数を数え、生成した端点とイベント送信側を保持するファクトリ
pub struct SpyFactory {
    log: CallLog,
    created: AtomicUsize,
    endpoints: Mutex<HashMap<Role, Arc<SpyEndpoint>>>,
    events: Mutex<HashMap<Role, mpsc::UnboundedSender<EndpointEvent>>>,
    configure: Box<dyn Fn(&SpyEndpoint) + Send + Sync>,
}

impl SpyFactory {
    pub fn new(log: CallLog) -> Self {
        Self::with(log, |_| {})
    }

    /// 生成直後の端点に `configure` を適用する
    pub fn with(log: CallLog, configure: impl Fn(&SpyEndpoint) + Send + Sync + 'static) -> Self {
        Self {
            log,
            created: AtomicUsize::new(0),
            endpoints: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
            configure: Box::new(configure),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self, role: Role) -> Arc<SpyEndpoint> {
        self.endpoints.lock()[&role].clone()
    }

    /// リレーが既に止まっていれば `false`
    pub fn emit(&self, role: Role, event: EndpointEvent) -> bool {
        self.events.lock()[&role].send(event).is_ok()
    }
}

#[async_trait]
impl EndpointFactory for SpyFactory {
    async fn create(&self, role: Role) -> Result<EndpointHandle, EndpointError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let endpoint = Arc::new(SpyEndpoint::new(role, self.log.clone()));
        (self.configure)(&endpoint);
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.lock().insert(role, endpoint.clone());
        self.events.lock().insert(role, tx);
        Ok(EndpointHandle::new(endpoint, rx))
    }
}

/// 書き換えの回数と対象種別を記録し、目印の属性行を付ける
pub struct SpyRewriter {
    log: CallLog,
}

impl SpyRewriter {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl DescriptorRewriter for SpyRewriter {
    fn rewrite(&self, sdp: &str, media_kind: Option<MediaKind>, _policy: &BandwidthPolicy) -> String {
        self.log.lock().push(Call::Rewrite(media_kind));
        format!("{sdp}{REWRITE_MARKER}\r\n")
    }
}

pub fn local_stream() -> LocalStream {
    let tracks: Vec<Arc<dyn MediaTrack>> = vec![
        Arc::new(SyntheticTrack::new(MediaKind::Audio)),
        Arc::new(SyntheticTrack::new(MediaKind::Video)),
    ];
    LocalStream::new("local-stream", tracks)
}

pub fn candidate(text: &str) -> IceCandidate {
    IceCandidate::new(text, Some("0".to_string()), Some(0))
}

/// JSON 配列からスナップショットを作る
pub fn snapshot(reports: Value) -> StatsSnapshot {
    let reports: Vec<Report> = serde_json::from_value(reports).expect("valid stats fixture");
    StatsSnapshot::from(reports)
}
