use std::fmt;

use crate::media::MediaKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// オファーを作る側（送信側）
    Initiator,
    /// アンサーを返す側（受信側）
    Responder,
}

impl Role {
    pub fn peer(self) -> Self {
        match self {
            Self::Initiator => Self::Responder,
            Self::Responder => Self::Initiator,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initiator => f.write_str("initiator"),
            Self::Responder => f.write_str("responder"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offer => f.write_str("offer"),
            Self::Answer => f.write_str("answer"),
        }
    }
}

/// オファー/アンサーのセッション記述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// 本文だけを差し替えた記述を返す
    pub fn with_sdp(self, sdp: String) -> Self {
        Self {
            sdp_type: self.sdp_type,
            sdp,
        }
    }

    /// `m=` 行に現れるメディア種別（出現順）
    pub fn media_kinds(&self) -> Vec<MediaKind> {
        self.sdp
            .lines()
            .filter_map(|line| line.strip_prefix("m="))
            .filter_map(|rest| rest.split_whitespace().next())
            .filter_map(MediaKind::parse)
            .collect()
    }
}

/// 到達性候補（trickle ICE の1件）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>, sdp_mid: Option<String>, sdp_mline_index: Option<u16>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid,
            sdp_mline_index,
        }
    }

    /// `candidate:<foundation> <component> <protocol> <priority> <address> <port> typ <type>`
    pub fn parse(&self) -> Option<CandidateAttributes<'_>> {
        let line = self.candidate.trim();
        let line = line.strip_prefix("a=").unwrap_or(line);
        let mut fields = line.strip_prefix("candidate:")?.split_whitespace();
        let _foundation = fields.next()?;
        let _component = fields.next()?;
        let protocol = fields.next()?;
        let _priority = fields.next()?;
        let address = fields.next()?;
        let port = fields.next()?.parse().ok()?;
        let candidate_type = match (fields.next(), fields.next()) {
            (Some("typ"), Some(candidate_type)) => candidate_type,
            _ => return None,
        };
        Some(CandidateAttributes {
            protocol,
            address,
            port,
            candidate_type,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateAttributes<'a> {
    pub protocol: &'a str,
    pub address: &'a str,
    pub port: u16,
    pub candidate_type: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_candidate() {
        let candidate = IceCandidate::new(
            "candidate:1 1 udp 2122260223 192.168.1.20 54400 typ host generation 0",
            Some("0".into()),
            Some(0),
        );
        let attrs = candidate.parse().unwrap();
        assert_eq!(attrs.address, "192.168.1.20");
        assert_eq!(attrs.port, 54400);
        assert_eq!(attrs.protocol, "udp");
        assert_eq!(attrs.candidate_type, "host");
    }

    #[test]
    fn rejects_truncated_candidate() {
        let candidate = IceCandidate::new("candidate:1 1 udp 2122260223 10.0.0.1", None, None);
        assert!(candidate.parse().is_none());
    }

    #[test]
    fn lists_media_kinds_in_order() {
        let desc = SessionDescription::offer(
            "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n",
        );
        assert_eq!(desc.media_kinds(), vec![MediaKind::Audio, MediaKind::Video]);
    }
}
