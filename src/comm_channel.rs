use std::io;

/// An ordered, reliable, bidirectional byte stream between the two parties.
///
/// This is the only capability the instrumentation layer and the OT engine
/// need from a transport.
pub trait ByteChannel {
    /// Writes all of `data`. May buffer until `flush`.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Reads exactly `len` bytes, blocking until they arrive.
    fn recv(&mut self, len: usize) -> io::Result<Vec<u8>>;

    /// Pushes buffered outbound bytes to the peer.
    fn flush(&mut self) -> io::Result<()>;

    /// Reads exactly `buf.len()` bytes into `buf`.
    fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let data = self.recv(buf.len())?;
        buf.copy_from_slice(&data);
        Ok(())
    }

    /// Sends a slice of 128-bit blocks back to back, with no length prefix.
    fn send_blocks(&mut self, blocks: &[[u8; 16]]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(blocks.len() * 16);
        for block in blocks {
            bytes.extend_from_slice(block);
        }
        self.send(&bytes)
    }

    /// Receives `count` 128-bit blocks.
    fn recv_blocks(&mut self, count: usize) -> io::Result<Vec<[u8; 16]>> {
        let bytes = self.recv(count * 16)?;
        Ok(bytes
            .chunks_exact(16)
            .map(|chunk| {
                let mut block = [0u8; 16];
                block.copy_from_slice(chunk);
                block
            })
            .collect())
    }
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).send(data)
    }

    fn recv(&mut self, len: usize) -> io::Result<Vec<u8>> {
        (**self).recv(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn recv_into(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).recv_into(buf)
    }
}
