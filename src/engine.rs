//! The random-COT engine the benchmark drives.
//!
//! The orchestrator only sees [`RandomCot`]: build over a set of channels,
//! report the natural batch size, and fill buffers with random correlated
//! OTs either through an internal staging buffer or in place.

use std::thread;

use thiserror::Error;

use crate::comm_channel::ByteChannel;
use crate::config::Party;
use crate::hash::Block;
use crate::iknp::{IknpExtender, NUM_BITS};
use crate::ot::OTCO;
use crate::prg::PRG;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("peer sent an invalid curve point")]
    InvalidPoint,

    #[error("OT extension consistency check failed on channel {channel}")]
    ConsistencyCheck { channel: usize },

    #[error("in-place batch of {len} COTs is not a non-zero multiple of ot_limit ({ot_limit})")]
    BatchSize { len: usize, ot_limit: usize },

    #[error("COT verification failed at index {index}")]
    Verification { index: usize },

    #[error("initiator has no delta to reveal")]
    MissingDelta,

    #[error("the engine needs at least one channel")]
    NoChannels,

    #[error("an extension worker thread panicked")]
    WorkerPanic,
}

/// Batch-size profile of the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    #[default]
    Regular,
    Large,
}

impl Variant {
    pub fn ot_limit(self) -> usize {
        match self {
            Variant::Regular => 1 << 20,
            Variant::Large => 1 << 22,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EngineParams {
    /// Upper bound on the number of channels worked in parallel.
    pub threads: usize,
    pub malicious: bool,
    pub ot_limit: usize,
}

impl EngineParams {
    pub fn new(threads: usize, malicious: bool, variant: Variant) -> Self {
        Self {
            threads,
            malicious,
            ot_limit: variant.ot_limit(),
        }
    }

    /// Overrides the batch size picked by the variant.
    pub fn with_ot_limit(mut self, ot_limit: usize) -> Self {
        self.ot_limit = ot_limit.max(1);
        self
    }
}

pub trait RandomCot<C>: Sized {
    /// Runs the base OTs and builds the engine. Blocks on peer traffic.
    fn setup(party: Party, channels: Vec<C>, params: &EngineParams) -> Result<Self, EngineError>;

    /// Natural batch size; the only granularity `rcot_inplace` accepts.
    fn ot_limit(&self) -> usize;

    /// Fills `out` through the internal staging buffer.
    fn rcot(&mut self, out: &mut [Block]) -> Result<(), EngineError>;

    /// Fills `buf` directly. `buf.len()` must be a non-zero multiple of
    /// [`RandomCot::ot_limit`].
    fn rcot_inplace(&mut self, buf: &mut [Block]) -> Result<(), EngineError>;

    /// The global correlation, known to the initiator only.
    fn delta(&self) -> Option<Block>;

    fn channels_mut(&mut self) -> &mut [C];

    fn into_channels(self) -> Vec<C>;
}

pub struct CotEngine<C> {
    channels: Vec<C>,
    extenders: Vec<IknpExtender>,
    delta: Option<u128>,
    malicious: bool,
    ot_limit: usize,
    staging: Vec<Block>,
}

impl<C: ByteChannel + Send> CotEngine<C> {
    /// Splits `out` into one 128-aligned chunk per active channel and
    /// extends all chunks concurrently, one scoped thread per channel.
    fn fan_out(&mut self, out: &mut [Block]) -> Result<(), EngineError> {
        if out.is_empty() {
            return Ok(());
        }
        let active = self.extenders.len();
        let per = ((out.len() + active - 1) / active + NUM_BITS - 1) / NUM_BITS * NUM_BITS;
        let malicious = self.malicious;

        thread::scope(|s| {
            let workers: Vec<_> = self
                .channels
                .iter_mut()
                .zip(self.extenders.iter_mut())
                .zip(out.chunks_mut(per))
                .enumerate()
                .map(|(c, ((io, ext), chunk))| {
                    s.spawn(move || {
                        tracing::trace!(channel = c, cots = chunk.len(), "extending");
                        ext.extend(io, chunk, malicious, c)
                    })
                })
                .collect();
            workers
                .into_iter()
                .try_for_each(|w| w.join().map_err(|_| EngineError::WorkerPanic)?)
        })
    }
}

impl<C: ByteChannel + Send> RandomCot<C> for CotEngine<C> {
    fn setup(party: Party, mut channels: Vec<C>, params: &EngineParams) -> Result<Self, EngineError> {
        if channels.is_empty() {
            return Err(EngineError::NoChannels);
        }
        let active = params.threads.clamp(1, channels.len());
        let first = &mut channels[0];

        let (delta, extenders) = match party {
            Party::Initiator => {
                let mut words = [0u128];
                PRG::new(None, 0).random_words(&mut words);
                let delta = words[0] | 1;
                let choices: Vec<bool> = (0..NUM_BITS).map(|i| (delta >> i) & 1 == 1).collect();
                let keys = OTCO::recv(first, &choices)?;
                let extenders = (0..active)
                    .map(|c| IknpExtender::sender(delta, &keys, c))
                    .collect();
                (Some(delta), extenders)
            }
            Party::Responder => {
                let pairs = OTCO::send(first, NUM_BITS)?;
                let extenders = (0..active).map(|c| IknpExtender::receiver(&pairs, c)).collect();
                (None, extenders)
            }
        };
        tracing::debug!(?party, active, ot_limit = params.ot_limit, "base OTs done");

        Ok(Self {
            channels,
            extenders,
            delta,
            malicious: params.malicious,
            ot_limit: params.ot_limit,
            staging: vec![[0u8; 16]; params.ot_limit],
        })
    }

    fn ot_limit(&self) -> usize {
        self.ot_limit
    }

    fn rcot(&mut self, out: &mut [Block]) -> Result<(), EngineError> {
        let limit = self.ot_limit;
        let mut staging = std::mem::take(&mut self.staging);
        let result = out.chunks_mut(limit).try_for_each(|batch| {
            let staged = &mut staging[..batch.len()];
            self.fan_out(staged)?;
            batch.copy_from_slice(staged);
            Ok(())
        });
        self.staging = staging;
        result
    }

    fn rcot_inplace(&mut self, buf: &mut [Block]) -> Result<(), EngineError> {
        let limit = self.ot_limit;
        if buf.is_empty() || buf.len() % limit != 0 {
            return Err(EngineError::BatchSize {
                len: buf.len(),
                ot_limit: limit,
            });
        }
        buf.chunks_mut(limit).try_for_each(|batch| self.fan_out(batch))
    }

    fn delta(&self) -> Option<Block> {
        self.delta.map(u128::to_le_bytes)
    }

    fn channels_mut(&mut self) -> &mut [C] {
        &mut self.channels
    }

    fn into_channels(self) -> Vec<C> {
        self.channels
    }
}

/// Cross-checks generated COTs over `io`.
///
/// The initiator reveals `delta` and its blocks; the responder checks
/// `M_j == K_j ^ lsb(M_j) * delta` for every `j`. Meant for a channel whose
/// traffic is not part of the transcript.
pub fn check_cots<IO: ByteChannel + ?Sized>(
    party: Party,
    io: &mut IO,
    data: &[Block],
    delta: Option<Block>,
) -> Result<(), EngineError> {
    const CHUNK: usize = 1 << 16;
    match party {
        Party::Initiator => {
            let delta = delta.ok_or(EngineError::MissingDelta)?;
            io.send(&delta)?;
            for chunk in data.chunks(CHUNK) {
                io.send_blocks(chunk)?;
            }
            io.flush()?;
        }
        Party::Responder => {
            let delta = u128::from_le_bytes(io.recv_blocks(1)?[0]);
            for (c, chunk) in data.chunks(CHUNK).enumerate() {
                let theirs = io.recv_blocks(chunk.len())?;
                for (i, (k, m)) in theirs.iter().zip(chunk).enumerate() {
                    let k = u128::from_le_bytes(*k);
                    let m = u128::from_le_bytes(*m);
                    let expected = if m & 1 == 1 { k ^ delta } else { k };
                    if m != expected {
                        return Err(EngineError::Verification {
                            index: c * CHUNK + i,
                        });
                    }
                }
            }
        }
    }
    Ok(())
}
