//! In-memory transport
//!
//! Records every sent packet instead of putting it on a wire. Used for
//! loopback setups, the demo and tests.

use std::sync::Mutex;

use bytes::Bytes;

use super::{PacketSink, ReceivedPacket, Transport};
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::PayloadType;

/// A packet captured by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub payload_type: PayloadType,
    pub payload: Bytes,
    pub seq: u32,
}

#[derive(Debug, Default)]
struct Inner {
    sent: Vec<SentPacket>,
    next_seq: u32,
    flushes: usize,
}

/// Transport that keeps sent packets in memory
#[derive(Debug)]
pub struct MemoryTransport {
    max_payload_size: usize,
    inner: Mutex<Inner>,
    peer: Option<PacketSink>,
}

impl MemoryTransport {
    pub fn new(max_payload_size: usize) -> Self {
        Self {
            max_payload_size,
            inner: Mutex::new(Inner::default()),
            peer: None,
        }
    }

    /// Also deliver every sent packet to `peer`
    pub fn with_peer(mut self, peer: PacketSink) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Snapshot of everything sent so far
    pub fn sent(&self) -> Vec<SentPacket> {
        self.lock().sent.clone()
    }

    /// Remove and return everything sent so far
    pub fn take_sent(&self) -> Vec<SentPacket> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Sent packets of one payload type
    pub fn sent_of(&self, payload_type: PayloadType) -> Vec<SentPacket> {
        self.lock()
            .sent
            .iter()
            .filter(|p| p.payload_type == payload_type)
            .cloned()
            .collect()
    }

    /// Number of `flush` calls
    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoning leaves the packet list intact
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn send(&self, payload: &[u8], payload_type: PayloadType) -> Result<u32> {
        if payload.len() > self.max_payload_size {
            return Err(Error::Protocol(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload_size,
            }));
        }

        let packet = {
            let mut inner = self.lock();
            let seq = inner.next_seq;
            inner.next_seq = inner.next_seq.wrapping_add(1);
            let packet = SentPacket {
                payload_type,
                payload: Bytes::copy_from_slice(payload),
                seq,
            };
            inner.sent.push(packet.clone());
            packet
        };

        tracing::debug!(
            payload_type = %payload_type,
            seq = packet.seq,
            size = payload.len(),
            "Packet sent"
        );

        if let Some(ref peer) = self.peer {
            peer.deliver(ReceivedPacket::new(
                packet.payload_type,
                packet.payload,
                packet.seq,
            ));
        }

        Ok(packet.seq)
    }

    fn flush(&self) -> Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }

    fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}
