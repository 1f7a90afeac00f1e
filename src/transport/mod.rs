//! Transport session contract
//!
//! The device never frames packets itself. It hands whole payloads to a
//! [`Transport`] tagged with a [`PayloadType`] and receives
//! [`ReceivedPacket`]s through a [`PacketSink`]:
//!
//! ```text
//!   tick ──send(payload, pt)──► Transport ──► peer
//!   tick ◄──try_recv── PacketSink ◄── transport receive context
//! ```
//!
//! The transport assigns a sequence number to every packet it sends. The
//! receive side uses those numbers only to report loss.

pub mod memory;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::PayloadType;

pub use memory::{MemoryTransport, SentPacket};

/// Packet-oriented, unreliable transport
pub trait Transport: Send + Sync {
    /// Send one payload, returning the sequence number it was assigned
    fn send(&self, payload: &[u8], payload_type: PayloadType) -> Result<u32>;

    /// Push out anything buffered
    fn flush(&self) -> Result<()>;

    /// Largest payload accepted by a single [`send`](Transport::send)
    fn max_payload_size(&self) -> usize;

    /// Send `data` split into chunks of at most `max_payload_size` bytes,
    /// returning the number of packets sent
    fn send_chunked(&self, data: &[u8], payload_type: PayloadType) -> Result<usize> {
        let chunk_size = self.max_payload_size().max(1);
        let mut packets = 0;
        for chunk in data.chunks(chunk_size) {
            self.send(chunk, payload_type)?;
            packets += 1;
        }
        Ok(packets)
    }
}

/// A packet delivered by the transport receive path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub payload_type: PayloadType,
    pub payload: Bytes,
    pub seq: u32,
}

impl ReceivedPacket {
    pub fn new(payload_type: PayloadType, payload: impl Into<Bytes>, seq: u32) -> Self {
        Self {
            payload_type,
            payload: payload.into(),
            seq,
        }
    }
}

/// Handle used by the transport receive context to hand packets to the device
///
/// Backed by a bounded channel; a full channel drops the packet, which the
/// receiver then observes as sequence loss.
#[derive(Debug, Clone)]
pub struct PacketSink {
    tx: mpsc::Sender<ReceivedPacket>,
}

impl PacketSink {
    /// Create a sink and the receiver drained by the device tick
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReceivedPacket>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Deliver a packet without blocking
    ///
    /// Returns `false` when the packet was dropped.
    pub fn deliver(&self, packet: ReceivedPacket) -> bool {
        match self.tx.try_send(packet) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(packet)) => {
                tracing::warn!(
                    payload_type = %packet.payload_type,
                    seq = packet.seq,
                    "Receive queue full, packet dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
