use std::io;

use crate::comm_channel::ByteChannel;
use crate::config::Party;

/// Marker the initiating party writes to release the peer.
pub const BARRIER_MARKER: &[u8; 2] = b"OK";

/// One-shot rendezvous over `channel`.
///
/// The initiator writes [`BARRIER_MARKER`] and flushes; the responder blocks
/// until it has read exactly that many bytes. A closed channel or a short
/// read surfaces as the transport's error, a wrong marker as `InvalidData`.
pub fn sync_barrier<C: ByteChannel + ?Sized>(party: Party, channel: &mut C) -> io::Result<()> {
    match party {
        Party::Initiator => {
            channel.send(BARRIER_MARKER)?;
            channel.flush()?;
        }
        Party::Responder => {
            let marker = channel.recv(BARRIER_MARKER.len())?;
            if marker != BARRIER_MARKER {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected barrier marker {:?}", marker),
                ));
            }
        }
    }
    tracing::debug!(?party, "passed sync barrier");
    Ok(())
}
