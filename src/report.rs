//! Run results and their line-oriented rendering.

use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::config::{OutputFormat, Party};
use crate::hash::{to_hex, Digest};
use crate::instrumented::ChannelTranscript;

/// Shortest elapsed time used when computing a rate, so a phase that the
/// clock could not resolve still reports a finite throughput.
const MIN_ELAPSED_SECS: f64 = 1e-9;

/// OTs per second for `count` OTs produced in `elapsed`.
pub fn throughput(count: u64, elapsed: Duration) -> f64 {
    count as f64 / elapsed.as_secs_f64().max(MIN_ELAPSED_SECS)
}

fn hex_digest<S: Serializer>(digest: &Digest, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_hex(digest))
}

#[derive(Clone, Debug, Serialize)]
pub struct PhaseTiming {
    pub phase: &'static str,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otps: Option<f64>,
}

impl PhaseTiming {
    pub fn elapsed_only(phase: &'static str, elapsed: Duration) -> Self {
        Self {
            phase,
            elapsed_ms: elapsed.as_secs_f64() * 1e3,
            count: None,
            otps: None,
        }
    }

    pub fn with_count(phase: &'static str, elapsed: Duration, count: u64) -> Self {
        Self {
            phase,
            elapsed_ms: elapsed.as_secs_f64() * 1e3,
            count: Some(count),
            otps: Some(throughput(count, elapsed)),
        }
    }
}

/// Everything one party learned from one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub party: Party,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    #[serde(serialize_with = "hex_digest")]
    pub send_digest: Digest,
    #[serde(serialize_with = "hex_digest")]
    pub recv_digest: Digest,
    pub phases: Vec<PhaseTiming>,
    /// Per-channel transcripts, in channel order.
    #[serde(skip)]
    pub channels: Vec<ChannelTranscript>,
}

impl RunReport {
    pub fn phase(&self, name: &str) -> Option<&PhaseTiming> {
        self.phases.iter().find(|p| p.phase == name)
    }

    /// One `key=value` line per phase, then the totals line.
    pub fn text_lines(&self) -> Vec<String> {
        let party = self.party.id();
        let mut lines: Vec<String> = self
            .phases
            .iter()
            .map(|p| {
                let mut line = format!("party={}\tphase={}\telapsed_ms={:.2}", party, p.phase, p.elapsed_ms);
                if let Some(otps) = p.otps {
                    line.push_str(&format!("\totps={:.1}", otps));
                }
                line
            })
            .collect();
        lines.push(format!(
            "party={}\tbytes_sent={}\tbytes_recv={}\tsend_digest={}\trecv_digest={}",
            party,
            self.bytes_sent,
            self.bytes_received,
            to_hex(&self.send_digest),
            to_hex(&self.recv_digest),
        ));
        lines
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, serde_json::Error> {
        match format {
            OutputFormat::Text => Ok(self.text_lines().join("\n")),
            OutputFormat::Json => serde_json::to_string(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        RunReport {
            party: Party::Initiator,
            bytes_sent: 10,
            bytes_received: 20,
            send_digest: [0xab; 32],
            recv_digest: [0x01; 32],
            phases: vec![
                PhaseTiming::elapsed_only("setup", Duration::from_millis(5)),
                PhaseTiming::with_count("rcot", Duration::from_secs(2), 1000),
            ],
            channels: Vec::new(),
        }
    }

    #[test]
    fn throughput_is_count_over_seconds() {
        assert_eq!(throughput(1000, Duration::from_secs(2)), 500.0);
        let fast = throughput(1 << 20, Duration::ZERO);
        assert!(fast.is_finite() && fast > 0.0);
    }

    #[test]
    fn text_lines_are_tab_separated_key_values() {
        let lines = sample().text_lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "party=1\tphase=setup\telapsed_ms=5.00");
        assert_eq!(lines[1], "party=1\tphase=rcot\telapsed_ms=2000.00\totps=500.0");
        assert_eq!(
            lines[2],
            format!(
                "party=1\tbytes_sent=10\tbytes_recv=20\tsend_digest={}\trecv_digest={}",
                "ab".repeat(32),
                "01".repeat(32)
            )
        );
    }

    #[test]
    fn json_uses_hex_digests() {
        let json = sample().render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["party"], "initiator");
        assert_eq!(value["send_digest"], "ab".repeat(32));
        assert_eq!(value["phases"][1]["otps"], 500.0);
        assert!(value["phases"][0].get("otps").is_none());
    }
}
