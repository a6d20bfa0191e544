//! Benchmark harness for random correlated OT (COT) extension.
//!
//! Two parties connect over one or more channels, generate COTs in bulk and
//! report per-phase throughput together with a digest of everything each
//! party sent and received.

pub mod aggregate;
pub mod barrier;
pub mod comm_channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod hash;
pub mod iknp;
pub mod instrumented;
pub mod memory_channel;
pub mod orchestrator;
pub mod ot;
pub mod prg;
pub mod report;
pub mod socket_channel;

pub use config::{OutputFormat, Party, RunConfig};
pub use engine::{CotEngine, EngineError, EngineParams, RandomCot, Variant};
pub use error::{BenchError, Result};
pub use instrumented::{ChannelTranscript, InstrumentedChannel};
pub use orchestrator::{run_party, BenchmarkOrchestrator, Phase};
pub use report::RunReport;
