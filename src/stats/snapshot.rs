use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::report::Report;

/// 1回の `getStats` で得られるレポート集合（挿入順を保持）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Report>", into = "Vec<Report>")]
pub struct StatsSnapshot {
    reports: Vec<Report>,
    index: HashMap<String, usize>,
}

impl StatsSnapshot {
    pub fn new(reports: Vec<Report>) -> Self {
        let mut index = HashMap::with_capacity(reports.len());
        for (position, report) in reports.iter().enumerate() {
            index.entry(report.id.clone()).or_insert(position);
        }
        Self { reports, index }
    }

    pub fn get(&self, id: &str) -> Option<&Report> {
        self.index.get(id).map(|&position| &self.reports[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Report> + '_ {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// 指定IDのレポートだけを残したスナップショット
    pub fn select(&self, id: &str) -> Self {
        Self::new(self.get(id).cloned().into_iter().collect())
    }

    /// 表示用のテキストダンプ（type / id / time の後に残りのフィールド）
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for report in &self.reports {
            let _ = writeln!(out, "Report type={}", report.stats.type_name());
            let _ = writeln!(out, "id {}", report.id);
            let _ = writeln!(out, "time {}", report.timestamp);
            if let Ok(serde_json::Value::Object(fields)) = serde_json::to_value(&report.stats) {
                for (key, value) in fields {
                    if key == "type" || value.is_null() {
                        continue;
                    }
                    match value {
                        serde_json::Value::String(text) => {
                            let _ = writeln!(out, "{key}: {text}");
                        }
                        other => {
                            let _ = writeln!(out, "{key}: {other}");
                        }
                    }
                }
            }
        }
        out
    }
}

impl From<Vec<Report>> for StatsSnapshot {
    fn from(reports: Vec<Report>) -> Self {
        Self::new(reports)
    }
}

impl From<StatsSnapshot> for Vec<Report> {
    fn from(snapshot: StatsSnapshot) -> Self {
        snapshot.reports
    }
}

impl FromIterator<Report> for StatsSnapshot {
    fn from_iter<I: IntoIterator<Item = Report>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StatsSnapshot {
    type Item = &'a Report;
    type IntoIter = std::slice::Iter<'a, Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.reports.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::stats::ReportStats;

    fn fixture() -> StatsSnapshot {
        serde_json::from_value(json!([
            {"id": "T01", "type": "transport", "timestamp": 1000.0, "selectedCandidatePairId": "CP1"},
            {"id": "CP1", "type": "candidate-pair", "timestamp": 1000.0, "remoteCandidateId": "RC1"},
            {"id": "RC1", "type": "remote-candidate", "timestamp": 1000.0, "ip": "10.0.0.5", "port": 5000},
            {"id": "X1", "type": "certificate", "timestamp": 1000.0, "fingerprint": "AB:CD"}
        ]))
        .unwrap()
    }

    #[test]
    fn keeps_insertion_order_and_index() {
        let snapshot = fixture();
        let ids: Vec<_> = snapshot.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["T01", "CP1", "RC1", "X1"]);
        assert!(matches!(
            snapshot.get("RC1").map(|r| &r.stats),
            Some(ReportStats::RemoteCandidate(_))
        ));
        assert!(snapshot.get("missing").is_none());
    }

    #[test]
    fn unknown_kinds_deserialize_as_other() {
        let snapshot = fixture();
        assert_eq!(snapshot.get("X1").unwrap().stats, ReportStats::Other);
    }

    #[test]
    fn dump_lists_header_then_fields() {
        let dump = fixture().select("RC1").dump();
        assert!(dump.starts_with("Report type=remote-candidate\nid RC1\ntime 1000\n"));
        assert!(dump.contains("ip: 10.0.0.5\n"));
        assert!(dump.contains("port: 5000\n"));
        assert!(!dump.contains("ipAddress"));
    }
}
