//! Phase-by-phase driver for one party's benchmark run.
//!
//! ```text
//! Setup -> BulkGenerate -> BulkGenerateInPlace -> Flush -> Finalize -> Report
//! ```
//!
//! Phases run strictly in that order. Calling one out of order fails with
//! [`BenchError::InvalidState`]; any other failure aborts the run and no
//! report is produced.

use std::fmt;
use std::time::Instant;

use crate::aggregate::aggregate;
use crate::barrier::sync_barrier;
use crate::comm_channel::ByteChannel;
use crate::config::{Party, RunConfig};
use crate::engine::{check_cots, CotEngine, EngineParams, RandomCot};
use crate::error::{BenchError, Result};
use crate::hash::{Block, Digest};
use crate::instrumented::{ChannelTranscript, InstrumentedChannel};
use crate::report::{PhaseTiming, RunReport};
use crate::socket_channel::{open_channels, TcpChannel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Setup,
    BulkGenerate,
    BulkGenerateInPlace,
    Flush,
    Finalize,
    Report,
    Done,
}

impl Phase {
    /// Name used in report lines.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::BulkGenerate => "rcot",
            Phase::BulkGenerateInPlace => "rcot_inplace",
            Phase::Flush => "flush",
            Phase::Finalize => "finalize",
            Phase::Report => "report",
            Phase::Done => "done",
        }
    }

    fn next(self) -> Phase {
        match self {
            Phase::Setup => Phase::BulkGenerate,
            Phase::BulkGenerate => Phase::BulkGenerateInPlace,
            Phase::BulkGenerateInPlace => Phase::Flush,
            Phase::Flush => Phase::Finalize,
            Phase::Finalize => Phase::Report,
            Phase::Report | Phase::Done => Phase::Done,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Transcripts {
    send_digest: Digest,
    recv_digest: Digest,
    bytes_sent: u64,
    bytes_received: u64,
    channels: Vec<ChannelTranscript>,
}

pub struct BenchmarkOrchestrator<C, E> {
    party: Party,
    params: EngineParams,
    num_ots: usize,
    verify: bool,
    phase: Phase,
    pending: Vec<InstrumentedChannel<C>>,
    engine: Option<E>,
    timings: Vec<PhaseTiming>,
    transcripts: Option<Transcripts>,
}

impl<C, E> BenchmarkOrchestrator<C, E>
where
    C: ByteChannel,
    E: RandomCot<InstrumentedChannel<C>>,
{
    /// Wraps every raw channel for transcript capture. `num_ots` is the size
    /// of the buffered phase.
    pub fn new(party: Party, channels: Vec<C>, params: EngineParams, num_ots: usize) -> Self {
        Self {
            party,
            params,
            num_ots,
            verify: false,
            phase: Phase::Setup,
            pending: channels.into_iter().map(InstrumentedChannel::new).collect(),
            engine: None,
            timings: Vec::new(),
            transcripts: None,
        }
    }

    /// Cross-check outputs with the peer after each generation phase. The
    /// check runs untimed, over the raw first channel.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            return Err(BenchError::InvalidState(format!(
                "cannot run phase {} while at phase {}",
                expected, self.phase
            )));
        }
        Ok(())
    }

    fn engine_mut(&mut self) -> Result<&mut E> {
        self.engine
            .as_mut()
            .ok_or_else(|| BenchError::InvalidState("engine is not set up".to_string()))
    }

    fn advance(&mut self) {
        self.phase = self.phase.next();
    }

    /// Barrier on the raw first channel, then builds the engine over the
    /// instrumented channels. Only engine construction is timed.
    pub fn setup(&mut self) -> Result<()> {
        self.enter(Phase::Setup)?;
        let first = self
            .pending
            .first_mut()
            .ok_or_else(|| BenchError::Configuration("no channels to run on".to_string()))?;
        sync_barrier(self.party, first.raw_mut())?;

        let start = Instant::now();
        let channels = std::mem::take(&mut self.pending);
        let engine = E::setup(self.party, channels, &self.params)?;
        let elapsed = start.elapsed();

        tracing::info!(party = %self.party, elapsed_ms = elapsed.as_secs_f64() * 1e3, "setup done");
        self.timings.push(PhaseTiming::elapsed_only(Phase::Setup.name(), elapsed));
        self.engine = Some(engine);
        self.advance();
        Ok(())
    }

    /// `num_ots` COTs through the engine's internally buffered path.
    pub fn bulk_generate(&mut self) -> Result<()> {
        self.enter(Phase::BulkGenerate)?;
        let mut out = vec![[0u8; 16]; self.num_ots];

        let start = Instant::now();
        self.engine_mut()?.rcot(&mut out)?;
        let elapsed = start.elapsed();

        self.record(Phase::BulkGenerate, elapsed, out.len());
        self.check(&out)?;
        self.advance();
        Ok(())
    }

    /// Exactly `ot_limit` COTs written straight into a caller buffer.
    pub fn bulk_generate_inplace(&mut self) -> Result<()> {
        self.enter(Phase::BulkGenerateInPlace)?;
        let engine = self.engine_mut()?;
        let mut buf = vec![[0u8; 16]; engine.ot_limit()];

        let start = Instant::now();
        engine.rcot_inplace(&mut buf)?;
        let elapsed = start.elapsed();

        self.record(Phase::BulkGenerateInPlace, elapsed, buf.len());
        self.check(&buf)?;
        self.advance();
        Ok(())
    }

    /// Pushes every channel's pending writes so the transcripts are complete.
    pub fn flush(&mut self) -> Result<()> {
        self.enter(Phase::Flush)?;
        for channel in self.engine_mut()?.channels_mut() {
            channel.flush()?;
        }
        self.advance();
        Ok(())
    }

    /// Finalizes each channel once and folds the per-channel digests.
    pub fn finalize(&mut self) -> Result<()> {
        self.enter(Phase::Finalize)?;
        let engine = self
            .engine
            .take()
            .ok_or_else(|| BenchError::InvalidState("engine is not set up".to_string()))?;

        let channels: Vec<ChannelTranscript> = engine
            .into_channels()
            .into_iter()
            .map(|channel| channel.finalize().0)
            .collect();

        let sends: Vec<Digest> = channels.iter().map(|t| t.send_digest).collect();
        let recvs: Vec<Digest> = channels.iter().map(|t| t.recv_digest).collect();
        let transcripts = Transcripts {
            send_digest: aggregate(&sends),
            recv_digest: aggregate(&recvs),
            bytes_sent: channels.iter().map(|t| t.bytes_sent).sum(),
            bytes_received: channels.iter().map(|t| t.bytes_received).sum(),
            channels,
        };
        tracing::debug!(
            party = %self.party,
            bytes_sent = transcripts.bytes_sent,
            bytes_received = transcripts.bytes_received,
            "transcripts finalized"
        );

        self.transcripts = Some(transcripts);
        self.advance();
        Ok(())
    }

    pub fn report(&mut self) -> Result<RunReport> {
        self.enter(Phase::Report)?;
        let t = self
            .transcripts
            .take()
            .ok_or_else(|| BenchError::InvalidState("transcripts are not finalized".to_string()))?;
        self.advance();
        Ok(RunReport {
            party: self.party,
            bytes_sent: t.bytes_sent,
            bytes_received: t.bytes_received,
            send_digest: t.send_digest,
            recv_digest: t.recv_digest,
            phases: std::mem::take(&mut self.timings),
            channels: t.channels,
        })
    }

    /// Runs every phase in order.
    pub fn run(mut self) -> Result<RunReport> {
        self.setup()?;
        self.bulk_generate()?;
        self.bulk_generate_inplace()?;
        self.flush()?;
        self.finalize()?;
        self.report()
    }

    fn record(&mut self, phase: Phase, elapsed: std::time::Duration, count: usize) {
        let timing = PhaseTiming::with_count(phase.name(), elapsed, count as u64);
        tracing::info!(
            party = %self.party,
            phase = phase.name(),
            elapsed_ms = timing.elapsed_ms,
            otps = timing.otps,
            "generation done"
        );
        self.timings.push(timing);
    }

    fn check(&mut self, data: &[Block]) -> Result<()> {
        if !self.verify {
            return Ok(());
        }
        let party = self.party;
        let engine = self.engine_mut()?;
        let delta = engine.delta();
        let raw = engine
            .channels_mut()
            .first_mut()
            .ok_or_else(|| BenchError::InvalidState("engine has no channels".to_string()))?
            .raw_mut();
        check_cots(party, raw, data, delta)?;
        tracing::info!(%party, cots = data.len(), "outputs verified");
        Ok(())
    }
}

/// Opens the TCP channels described by `config` and runs one full benchmark.
///
/// The configuration is validated before any socket is touched.
pub fn run_party(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;

    let channels = open_channels(
        config.party,
        &config.host,
        config.port,
        config.channels,
        config.nodelay,
    )?;
    tracing::info!(party = %config.party, channels = channels.len(), "channels open");

    let params = EngineParams::new(config.channels, config.malicious, config.variant);
    BenchmarkOrchestrator::<TcpChannel, CotEngine<InstrumentedChannel<TcpChannel>>>::new(
        config.party,
        channels,
        params,
        config.num_ots(),
    )
    .with_verification(config.verify)
    .run()
}
