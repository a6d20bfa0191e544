use crate::comm_channel::ByteChannel;
use crate::config::Party;

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

const BUFFER_SIZE: usize = 1 << 16;
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// A buffered TCP transport.
///
/// Writes are coalesced in a user-space buffer and only hit the socket on
/// `flush` (or when the buffer fills), so callers must flush before blocking
/// on a read the peer can only answer after seeing their data.
pub struct TcpChannel {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl TcpChannel {
    /// Creates a new TcpChannel
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let read_half = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, read_half),
            writer: BufWriter::with_capacity(BUFFER_SIZE, stream),
        })
    }

    /// Accepts exactly one connection on `0.0.0.0:port`.
    pub fn listen(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        tracing::debug!(port, "waiting for peer");
        let (stream, peer) = listener.accept()?;
        tracing::debug!(port, %peer, "peer connected");
        Self::new(stream)
    }

    /// Dials `host:port`, retrying until the listener is up.
    ///
    /// Only `ConnectionRefused` is retried; any other failure is returned.
    pub fn connect(host: &str, port: u16) -> io::Result<Self> {
        let mut attempts = 0u64;
        loop {
            match TcpStream::connect((host, port)) {
                Ok(stream) => {
                    tracing::debug!(host, port, attempts, "connected");
                    return Self::new(stream);
                }
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    attempts += 1;
                    if attempts % 100 == 0 {
                        tracing::warn!(host, port, attempts, "peer not listening yet");
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Toggles Nagle's algorithm on the underlying socket.
    pub fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        self.writer.get_ref().set_nodelay(nodelay)
    }
}

/// Opens `count` channels on ports `port..port + count`, in order.
///
/// The initiator listens and the responder dials, as in a NetIO setup.
pub fn open_channels(
    party: Party,
    host: &str,
    port: u16,
    count: usize,
    nodelay: bool,
) -> io::Result<Vec<TcpChannel>> {
    (0..count)
        .map(|i| {
            let port = u16::try_from(usize::from(port) + i)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "port out of range"))?;
            let channel = match party {
                Party::Initiator => TcpChannel::listen(port)?,
                Party::Responder => TcpChannel::connect(host, port)?,
            };
            channel.set_nodelay(nodelay)?;
            Ok(channel)
        })
        .collect()
}

impl ByteChannel for TcpChannel {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    fn recv(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.recv_into(&mut data)?;
        Ok(data)
    }

    fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.read_exact(buf)
    }

    /// Flushes the TCP stream.
    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut channel = TcpChannel::new(stream).unwrap();
            let got = channel.recv(5).unwrap();
            channel.send(&got).unwrap();
            channel.flush().unwrap();
        });

        let mut client = TcpChannel::connect("127.0.0.1", port).unwrap();
        client.set_nodelay(true).unwrap();
        client.send(b"he").unwrap();
        client.send(b"llo").unwrap();
        client.flush().unwrap();
        assert_eq!(client.recv(5).unwrap(), b"hello");

        server.join().unwrap();
    }

    #[test]
    fn short_read_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut channel = TcpChannel::new(stream).unwrap();
            channel.send(b"x").unwrap();
            channel.flush().unwrap();
        });

        let mut client = TcpChannel::connect("127.0.0.1", port).unwrap();
        server.join().unwrap();
        let err = client.recv(2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
