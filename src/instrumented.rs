//! Transcript-digesting channel wrapper.
//!
//! [`InstrumentedChannel`] sits between the OT engine and a raw transport.
//! Every byte passing through it in either direction is forwarded unchanged,
//! absorbed into a per-direction SHA-256 accumulator and counted. The engine
//! never learns that hashing happens.

use std::io;

use crate::comm_channel::ByteChannel;
use crate::hash::{Digest, DigestAccumulator};

/// The two per-direction digests of one channel, plus its final counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelTranscript {
    pub send_digest: Digest,
    pub recv_digest: Digest,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

pub struct InstrumentedChannel<C> {
    inner: C,
    send_hash: DigestAccumulator,
    recv_hash: DigestAccumulator,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<C: ByteChannel> InstrumentedChannel<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            send_hash: DigestAccumulator::new(),
            recv_hash: DigestAccumulator::new(),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Direct access to the wrapped transport.
    ///
    /// Traffic sent through this handle bypasses the transcript: it is
    /// neither hashed nor counted.
    pub fn raw_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Closes the accumulation phase and returns both digests.
    ///
    /// Consumes the channel, so the accumulators cannot be finalized twice
    /// or fed after finalization. The wrapped transport is handed back.
    pub fn finalize(self) -> (ChannelTranscript, C) {
        let transcript = ChannelTranscript {
            send_digest: self.send_hash.finalize(),
            recv_digest: self.recv_hash.finalize(),
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
        };
        (transcript, self.inner)
    }
}

impl<C: ByteChannel> ByteChannel for InstrumentedChannel<C> {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.send(data)?;
        self.send_hash.absorb(data);
        self.bytes_sent += data.len() as u64;
        Ok(())
    }

    fn recv(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let data = self.inner.recv(len)?;
        self.recv_hash.absorb(&data);
        self.bytes_received += len as u64;
        Ok(data)
    }

    fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner.recv_into(buf)?;
        self.recv_hash.absorb(buf);
        self.bytes_received += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
