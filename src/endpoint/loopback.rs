use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::LoopbackConfig;
use crate::media::{MediaKind, MediaTrack, RemoteStream};
use crate::sdp::media_bandwidth_kbps;
use crate::stats::{
    CandidatePairStats, CandidateStats, InboundRtpStats, OutboundRtpStats, Report, ReportStats,
    StatsSnapshot, TransportStats,
};

use super::{
    Endpoint, EndpointError, EndpointEvent, EndpointFactory, EndpointHandle, IceCandidate, Role,
    SdpType, SessionDescription,
};

const AUDIO_BITRATE_KBPS: u32 = 32;
const HOST_PRIORITY: u32 = 2_122_260_223;

/// 同一プロセス内で完結するエンドポイントを生成するファクトリ
#[derive(Debug)]
pub struct LoopbackFactory {
    config: LoopbackConfig,
    next_port: AtomicU16,
}

impl LoopbackFactory {
    pub fn new(config: LoopbackConfig) -> Self {
        let next_port = AtomicU16::new(config.base_port);
        Self { config, next_port }
    }
}

#[async_trait]
impl EndpointFactory for LoopbackFactory {
    async fn create(&self, role: Role) -> Result<EndpointHandle, EndpointError> {
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let endpoint = Arc::new(LoopbackEndpoint::new(
            role,
            self.config.host.clone(),
            port,
            self.config.default_bitrate_kbps,
            events_tx,
        ));
        info!(role = %role, port, "loopback endpoint created");
        Ok(EndpointHandle::new(endpoint, events_rx))
    }
}

/// 実ネットワークを使わず、記述・候補・統計を合成するエンドポイント
///
/// ローカル記述の設定で host 候補1件と終了マーカーを発行し、
/// 両方の記述とリモート候補が揃った時点から擬似的な受信バイト数を積み上げる。
pub struct LoopbackEndpoint {
    id: String,
    role: Role,
    host: String,
    port: u16,
    default_bitrate_kbps: u32,
    epoch_ms: f64,
    created: Instant,
    events: Mutex<Option<mpsc::UnboundedSender<EndpointEvent>>>,
    state: Mutex<LoopbackState>,
}

#[derive(Default)]
struct LoopbackState {
    tracks: Vec<Arc<dyn MediaTrack>>,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_candidates: Vec<IceCandidate>,
    end_of_candidates: bool,
    gathered: bool,
    connected_at: Option<Instant>,
    closed: bool,
}

impl LoopbackState {
    fn update_connectivity(&mut self, now: Instant) {
        if self.connected_at.is_none()
            && self.local.is_some()
            && self.remote.is_some()
            && !self.remote_candidates.is_empty()
        {
            self.connected_at = Some(now);
        }
    }
}

impl LoopbackEndpoint {
    pub fn new(
        role: Role,
        host: String,
        port: u16,
        default_bitrate_kbps: u32,
        events: mpsc::UnboundedSender<EndpointEvent>,
    ) -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as f64)
            .unwrap_or_default();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            role,
            host,
            port,
            default_bitrate_kbps,
            epoch_ms,
            created: Instant::now(),
            events: Mutex::new(Some(events)),
            state: Mutex::new(LoopbackState::default()),
        }
    }

    fn emit(&self, event: EndpointEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            // 受信側が既に破棄されていれば通知先が無いだけ
            let _ = events.send(event);
        }
    }

    fn timestamp(&self, now: Instant) -> f64 {
        self.epoch_ms + now.duration_since(self.created).as_micros() as f64 / 1000.0
    }

    fn build_description(&self, sdp_type: SdpType, state: &LoopbackState) -> String {
        let mut kinds: Vec<MediaKind> = Vec::new();
        match sdp_type {
            SdpType::Offer => {
                for track in &state.tracks {
                    if !kinds.contains(&track.kind()) {
                        kinds.push(track.kind());
                    }
                }
            }
            SdpType::Answer => {
                if let Some(remote) = &state.remote {
                    kinds = remote.media_kinds();
                }
            }
        }

        let mids: Vec<String> = (0..kinds.len()).map(|mid| mid.to_string()).collect();
        let mut sdp = format!(
            "v=0\r\no=- {} 2 IN IP4 {}\r\ns=-\r\nt=0 0\r\n",
            self.created.elapsed().as_nanos() % 1_000_000_007,
            self.host
        );
        if !mids.is_empty() {
            sdp.push_str(&format!("a=group:BUNDLE {}\r\n", mids.join(" ")));
        }
        for (mid, kind) in kinds.iter().enumerate() {
            let (payload, rtpmap) = match kind {
                MediaKind::Audio => (111, "opus/48000/2"),
                MediaKind::Video => (96, "VP8/90000"),
            };
            sdp.push_str(&format!(
                "m={kind} 9 UDP/TLS/RTP/SAVPF {payload}\r\nc=IN IP4 0.0.0.0\r\na=mid:{mid}\r\n"
            ));
            match state.tracks.iter().find(|track| track.kind() == *kind) {
                Some(track) => {
                    sdp.push_str(&format!("a=msid:{} {}\r\na=sendrecv\r\n", self.id, track.id()));
                }
                None => sdp.push_str("a=recvonly\r\n"),
            }
            sdp.push_str(&format!("a=rtpmap:{payload} {rtpmap}\r\n"));
        }
        sdp
    }

    fn bitrate_kbps(&self, state: &LoopbackState, kind: MediaKind) -> u32 {
        if kind == MediaKind::Audio {
            return AUDIO_BITRATE_KBPS;
        }
        [&state.local, &state.remote]
            .into_iter()
            .flatten()
            .filter_map(|desc| media_bandwidth_kbps(&desc.sdp, kind))
            .min()
            .unwrap_or(self.default_bitrate_kbps)
    }

    fn build_snapshot(&self, state: &LoopbackState) -> StatsSnapshot {
        let now = Instant::now();
        let timestamp = self.timestamp(now);
        let elapsed_us = state
            .connected_at
            .map_or(0, |since| now.duration_since(since).as_micros() as u64);
        // kbit/s * us / 8000 = bytes
        let bytes_for =
            |kind: MediaKind| u64::from(self.bitrate_kbps(state, kind)) * elapsed_us / 8000;

        let mut reports = Vec::new();
        let mut total_sent = 0;
        let mut total_received = 0;

        for kind in sending_kinds(state.local.as_ref()) {
            let bytes_sent = bytes_for(kind);
            total_sent += bytes_sent;
            reports.push(Report::new(
                format!("OT-{kind}"),
                timestamp,
                ReportStats::OutboundRtp(OutboundRtpStats {
                    kind: Some(kind.to_string()),
                    bytes_sent,
                    ..Default::default()
                }),
            ));
        }
        for kind in sending_kinds(state.remote.as_ref()) {
            let bytes_received = bytes_for(kind);
            total_received += bytes_received;
            reports.push(Report::new(
                format!("IT-{kind}"),
                timestamp,
                ReportStats::InboundRtp(InboundRtpStats {
                    kind: Some(kind.to_string()),
                    bytes_received,
                    ..Default::default()
                }),
            ));
        }

        let local_id = format!("L-{}", self.port);
        let selected_pair_id = state.connected_at.map(|_| "CP-0".to_string());
        reports.push(Report::new(
            "T01",
            timestamp,
            ReportStats::Transport(TransportStats {
                selected_candidate_pair_id: selected_pair_id,
                bytes_sent: total_sent,
                bytes_received: total_received,
            }),
        ));

        for index in 0..state.remote_candidates.len() {
            let active = index == 0 && state.connected_at.is_some();
            reports.push(Report::new(
                format!("CP-{index}"),
                timestamp,
                ReportStats::CandidatePair(CandidatePairStats {
                    local_candidate_id: Some(local_id.clone()),
                    remote_candidate_id: Some(format!("R-{index}")),
                    selected: None,
                    nominated: Some(active),
                    state: Some(if active { "succeeded" } else { "waiting" }.to_string()),
                }),
            ));
        }

        reports.push(Report::new(
            local_id,
            timestamp,
            ReportStats::LocalCandidate(CandidateStats {
                address: Some(self.host.clone()),
                port: Some(self.port),
                protocol: Some("udp".to_string()),
                candidate_type: Some("host".to_string()),
                ..Default::default()
            }),
        ));
        for (index, candidate) in state.remote_candidates.iter().enumerate() {
            if let Some(attrs) = candidate.parse() {
                reports.push(Report::new(
                    format!("R-{index}"),
                    timestamp,
                    ReportStats::RemoteCandidate(CandidateStats {
                        address: Some(attrs.address.to_string()),
                        port: Some(attrs.port),
                        protocol: Some(attrs.protocol.to_string()),
                        candidate_type: Some(attrs.candidate_type.to_string()),
                        ..Default::default()
                    }),
                ));
            }
        }

        StatsSnapshot::new(reports)
    }
}

#[async_trait]
impl Endpoint for LoopbackEndpoint {
    async fn add_track(&self, track: Arc<dyn MediaTrack>) -> Result<(), EndpointError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(EndpointError::Closed);
        }
        debug!(role = %self.role, track_id = %track.id(), "track added");
        state.tracks.push(track);
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, EndpointError> {
        let state = self.state.lock();
        if state.closed {
            return Err(EndpointError::Closed);
        }
        Ok(SessionDescription::offer(
            self.build_description(SdpType::Offer, &state),
        ))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EndpointError> {
        let state = self.state.lock();
        if state.closed {
            return Err(EndpointError::Closed);
        }
        match &state.remote {
            Some(remote) if remote.sdp_type == SdpType::Offer => Ok(SessionDescription::answer(
                self.build_description(SdpType::Answer, &state),
            )),
            _ => Err(EndpointError::invalid_state(
                "cannot create an answer without a remote offer",
            )),
        }
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EndpointError> {
        let gather = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(EndpointError::Closed);
            }
            if desc.sdp.trim().is_empty() {
                return Err(EndpointError::rejected("empty local description"));
            }
            state.local = Some(desc);
            state.update_connectivity(Instant::now());
            !std::mem::replace(&mut state.gathered, true)
        };

        if gather {
            let candidate = IceCandidate::new(
                format!(
                    "candidate:1 1 udp {HOST_PRIORITY} {} {} typ host",
                    self.host, self.port
                ),
                Some("0".to_string()),
                Some(0),
            );
            self.emit(EndpointEvent::IceCandidate(Some(candidate)));
            self.emit(EndpointEvent::IceCandidate(None));
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EndpointError> {
        let remote_stream = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(EndpointError::Closed);
            }
            if desc.sdp.trim().is_empty() {
                return Err(EndpointError::rejected("empty remote description"));
            }
            if desc.sdp_type == SdpType::Answer && state.local.is_none() {
                return Err(EndpointError::invalid_state(
                    "remote answer without a local offer",
                ));
            }
            let kinds = sending_kinds(Some(&desc));
            let stream_id = remote_stream_id(&desc);
            state.remote = Some(desc);
            state.update_connectivity(Instant::now());
            (!kinds.is_empty()).then(|| RemoteStream {
                id: stream_id,
                kinds,
            })
        };

        if let Some(stream) = remote_stream {
            self.emit(EndpointEvent::Track(stream));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), EndpointError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(EndpointError::Closed);
        }
        match candidate {
            None => state.end_of_candidates = true,
            Some(candidate) => {
                if candidate.parse().is_none() {
                    return Err(EndpointError::invalid_candidate(candidate.candidate));
                }
                state.remote_candidates.push(candidate);
                state.update_connectivity(Instant::now());
            }
        }
        Ok(())
    }

    async fn get_stats(&self, selector: Option<&str>) -> Result<StatsSnapshot, EndpointError> {
        let state = self.state.lock();
        if state.closed {
            return Err(EndpointError::Closed);
        }
        let snapshot = self.build_snapshot(&state);
        Ok(match selector {
            Some(id) => snapshot.select(id),
            None => snapshot,
        })
    }

    async fn close(&self) -> Result<(), EndpointError> {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            self.events.lock().take();
            info!(role = %self.role, "loopback endpoint closed");
        }
        Ok(())
    }
}

/// 記述の中で送信方向を持つメディア種別（recvonly / inactive を除く）
fn sending_kinds(desc: Option<&SessionDescription>) -> Vec<MediaKind> {
    let Some(desc) = desc else {
        return Vec::new();
    };
    let mut kinds = Vec::new();
    let mut current: Option<MediaKind> = None;
    let mut sending = true;
    for line in desc.sdp.lines() {
        if let Some(rest) = line.strip_prefix("m=") {
            if let (Some(kind), true) = (current, sending) {
                kinds.push(kind);
            }
            current = rest.split_whitespace().next().and_then(MediaKind::parse);
            sending = true;
        } else if line == "a=recvonly" || line == "a=inactive" {
            sending = false;
        }
    }
    if let (Some(kind), true) = (current, sending) {
        kinds.push(kind);
    }
    kinds
}

fn remote_stream_id(desc: &SessionDescription) -> String {
    desc.sdp
        .lines()
        .find_map(|line| line.strip_prefix("a=msid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("default")
        .to_string()
}
