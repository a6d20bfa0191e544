//! Run configuration.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::engine::Variant;
use crate::error::{BenchError, Result};

/// Largest accepted log2 batch size.
pub const MAX_LOG2: u32 = 30;

pub const DEFAULT_LOG2: u32 = 24;
pub const DEFAULT_CHANNELS: usize = 2;
pub const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    /// Listens for connections, starts the barrier and holds the COT delta.
    Initiator,
    Responder,
}

impl Party {
    /// Numeric id used on the command line and in report lines.
    pub fn id(self) -> u8 {
        match self {
            Party::Initiator => 1,
            Party::Responder => 2,
        }
    }

    pub fn peer(self) -> Party {
        match self {
            Party::Initiator => Party::Responder,
            Party::Responder => Party::Initiator,
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Initiator => f.write_str("initiator"),
            Party::Responder => f.write_str("responder"),
        }
    }
}

impl FromStr for Party {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "initiator" | "alice" => Ok(Party::Initiator),
            "2" | "responder" | "bob" => Ok(Party::Responder),
            other => Err(BenchError::Configuration(format!(
                "unknown party {other:?}, expected 1|initiator|alice or 2|responder|bob"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Everything one party needs to run the benchmark.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub party: Party,
    /// Address the responder dials. The initiator listens on all interfaces.
    pub host: String,
    /// Channel `i` uses port `port + i`.
    pub port: u16,
    pub channels: usize,
    /// The buffered phase generates `2^log2` COTs.
    pub log2: u32,
    pub malicious: bool,
    pub variant: Variant,
    pub nodelay: bool,
    /// Cross-check generated COTs with the peer after each phase.
    pub verify: bool,
    pub format: OutputFormat,
}

impl RunConfig {
    pub fn new(party: Party, port: u16) -> Self {
        Self {
            party,
            host: DEFAULT_HOST.to_string(),
            port,
            channels: DEFAULT_CHANNELS,
            log2: DEFAULT_LOG2,
            malicious: true,
            variant: Variant::default(),
            nodelay: true,
            verify: false,
            format: OutputFormat::default(),
        }
    }

    /// Number of COTs requested by the buffered phase.
    pub fn num_ots(&self) -> usize {
        1usize << self.log2
    }

    /// Rejects configurations that must not reach the network.
    pub fn validate(&self) -> Result<()> {
        if self.log2 > MAX_LOG2 {
            return Err(BenchError::Configuration(format!(
                "Large test size! (guard): log2 batch size {} exceeds {}",
                self.log2, MAX_LOG2
            )));
        }
        if self.channels == 0 {
            return Err(BenchError::Configuration(
                "at least one channel is required".to_string(),
            ));
        }
        if usize::from(self.port)
            .checked_add(self.channels - 1)
            .map_or(true, |last| last > usize::from(u16::MAX))
        {
            return Err(BenchError::Configuration(format!(
                "ports {}..{} do not fit in the port range",
                self.port,
                usize::from(self.port) + self.channels
            )));
        }
        Ok(())
    }
}
