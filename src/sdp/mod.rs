//! セッション記述の書き換え（帯域制限の付与）
//!
//! 記述は送出前に一度だけ `DescriptorRewriter` を通る。既定実装の
//! `BandwidthRewriter` は対象メディアセクションへ `b=AS` / `b=TIAS` を挿入する。
use crate::config::BandwidthPolicy;
use crate::media::MediaKind;

pub trait DescriptorRewriter: Send + Sync {
    /// `media_kind` が `None` の場合はすべてのメディアセクションが対象
    fn rewrite(&self, sdp: &str, media_kind: Option<MediaKind>, policy: &BandwidthPolicy) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BandwidthRewriter;

impl DescriptorRewriter for BandwidthRewriter {
    fn rewrite(&self, sdp: &str, media_kind: Option<MediaKind>, policy: &BandwidthPolicy) -> String {
        let (average_kbps, transport_independent_kbps) = match *policy {
            BandwidthPolicy::Uncapped => return sdp.to_string(),
            BandwidthPolicy::Capped {
                average_kbps,
                transport_independent_kbps,
            } => (average_kbps, transport_independent_kbps),
        };

        let mut bandwidth_lines = Vec::new();
        if let Some(kbps) = average_kbps {
            bandwidth_lines.push(format!("b=AS:{kbps}"));
        }
        if let Some(kbps) = transport_independent_kbps {
            bandwidth_lines.push(format!("b=TIAS:{}", u64::from(kbps) * 1000));
        }

        let eol = line_ending(sdp);
        let mut out: Vec<String> = Vec::new();
        for section in sections(sdp) {
            let targeted = section_kind(&section).map_or(false, |kind| {
                media_kind.map_or(true, |wanted| wanted == kind)
            });
            if !targeted {
                out.extend(section.iter().map(|line| line.to_string()));
                continue;
            }

            let kept: Vec<&str> = section
                .iter()
                .copied()
                .filter(|line| !line.starts_with("b="))
                .collect();
            // m= の直後に続く i= / c= の後ろが b= の位置
            let insert_at = 1 + kept[1..]
                .iter()
                .take_while(|line| line.starts_with("i=") || line.starts_with("c="))
                .count();
            out.extend(kept[..insert_at].iter().map(|line| line.to_string()));
            out.extend(bandwidth_lines.iter().cloned());
            out.extend(kept[insert_at..].iter().map(|line| line.to_string()));
        }

        let mut rewritten = out.join(eol);
        if sdp.ends_with(eol) {
            rewritten.push_str(eol);
        }
        rewritten
    }
}

/// 指定メディアセクションの帯域上限 (kbps)。`b=AS` を優先し、無ければ `b=TIAS`
pub fn media_bandwidth_kbps(sdp: &str, media_kind: MediaKind) -> Option<u32> {
    let section = sections(sdp)
        .into_iter()
        .find(|section| section_kind(section) == Some(media_kind))?;

    let value = |prefix: &str| {
        section
            .iter()
            .find_map(|line| line.strip_prefix(prefix))
            .and_then(|value| value.trim().parse::<u64>().ok())
    };
    value("b=AS:")
        .or_else(|| value("b=TIAS:").map(|bps| bps / 1000))
        .map(|kbps| u32::try_from(kbps).unwrap_or(u32::MAX))
}

fn line_ending(sdp: &str) -> &'static str {
    if sdp.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// セッション部と各メディアセクションに分割（先頭要素がセッション部）
fn sections(sdp: &str) -> Vec<Vec<&str>> {
    let eol = line_ending(sdp);
    let body = sdp.strip_suffix(eol).unwrap_or(sdp);
    let mut sections = vec![Vec::new()];
    for line in body.split(eol) {
        if line.starts_with("m=") {
            sections.push(Vec::new());
        }
        if let Some(current) = sections.last_mut() {
            current.push(line);
        }
    }
    sections
}

fn section_kind(section: &[&str]) -> Option<MediaKind> {
    section
        .first()?
        .strip_prefix("m=")?
        .split_whitespace()
        .next()
        .and_then(MediaKind::parse)
}
