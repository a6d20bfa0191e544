use crate::comm_channel::ByteChannel;

use std::io;
use std::sync::mpsc::{channel, Receiver, Sender};

const AUTO_FLUSH: usize = 1 << 16;

/// One end of an in-process duplex byte pipe.
///
/// Behaves like a buffered socket: writes are held until `flush` (or until
/// the pending buffer grows past a threshold), and `recv` blocks until enough
/// bytes have arrived. Dropping one end flushes it and makes further reads on
/// the other end fail with `UnexpectedEof` once the data runs out.
pub struct MemoryChannel {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    inbox: Vec<u8>,
    cursor: usize,
}

impl MemoryChannel {
    /// Creates a connected pair of channels.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = channel();
        let (tx_b, rx_a) = channel();
        (Self::new(tx_a, rx_a), Self::new(tx_b, rx_b))
    }

    /// Creates `count` independent connected pairs, split by side.
    pub fn pairs(count: usize) -> (Vec<Self>, Vec<Self>) {
        (0..count).map(|_| Self::pair()).unzip()
    }

    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx,
            pending: Vec::new(),
            inbox: Vec::new(),
            cursor: 0,
        }
    }

    fn push_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.pending);
        self.tx
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
    }
}

impl ByteChannel for MemoryChannel {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.pending.extend_from_slice(data);
        if self.pending.len() >= AUTO_FLUSH {
            self.push_pending()?;
        }
        Ok(())
    }

    fn recv(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.recv_into(&mut data)?;
        Ok(data)
    }

    fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.cursor == self.inbox.len() {
                self.inbox = self.rx.recv().map_err(|_| {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the channel")
                })?;
                self.cursor = 0;
            }
            let take = (buf.len() - filled).min(self.inbox.len() - self.cursor);
            buf[filled..filled + take]
                .copy_from_slice(&self.inbox[self.cursor..self.cursor + take]);
            self.cursor += take;
            filled += take;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.push_pending()
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        let _ = self.push_pending();
    }
}
