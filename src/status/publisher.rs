//! Periodic status publishing
//!
//! Records are packed back to back into packets no larger than the
//! transport payload limit. A record is never split across packets.

use std::time::{Duration, Instant};

use super::StatusRegistry;
use crate::error::Result;
use crate::protocol::{PayloadType, StatusRecord};
use crate::transport::Transport;

/// Pack serialized records into packets of at most `max_payload_size` bytes
///
/// A record that would overflow the current packet flushes it first. A
/// record larger than the limit on its own is dropped.
pub fn pack_records(records: &[String], max_payload_size: usize) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    let mut current: Vec<u8> = Vec::with_capacity(max_payload_size);

    for record in records {
        let bytes = record.as_bytes();
        if bytes.len() > max_payload_size {
            tracing::warn!(
                size = bytes.len(),
                limit = max_payload_size,
                "Status record too large, dropped"
            );
            continue;
        }
        if current.len() + bytes.len() > max_payload_size {
            packets.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(bytes);
    }

    if !current.is_empty() {
        packets.push(current);
    }
    packets
}

/// Rate-limited publisher of a [`StatusRegistry`]
#[derive(Debug)]
pub struct StatusPublisher {
    interval: Duration,
    last_published: Option<Instant>,
}

impl StatusPublisher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_published: None,
        }
    }

    /// Publish all statuses if the interval has elapsed
    ///
    /// Returns the number of packets sent.
    pub fn publish(
        &mut self,
        now: Instant,
        registry: &StatusRegistry,
        transport: &dyn Transport,
    ) -> Result<usize> {
        if let Some(last) = self.last_published {
            if now.saturating_duration_since(last) < self.interval {
                return Ok(0);
            }
        }
        self.last_published = Some(now);

        let records: Vec<String> = registry
            .statuses()
            .iter()
            .map(|entry| StatusRecord::new(entry.name.as_str(), entry.value()).encode())
            .collect();

        let packets = pack_records(&records, transport.max_payload_size());
        for packet in &packets {
            transport.send(packet, PayloadType::STATUS)?;
        }
        if !packets.is_empty() {
            transport.flush()?;
        }
        Ok(packets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn test_pack_three_large_records() {
        let records: Vec<String> = (0..3).map(|_| "r".repeat(500)).collect();
        let packets = pack_records(&records, 1400);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].len(), 1000);
        assert_eq!(packets[1].len(), 500);
    }

    #[test]
    fn test_pack_drops_oversized_record() {
        let records = vec!["a".repeat(10), "b".repeat(30), "c".repeat(10)];
        let packets = pack_records(&records, 25);
        assert_eq!(packets, vec![b"aaaaaaaaaacccccccccc".to_vec()]);
    }

    #[test]
    fn test_pack_empty() {
        assert!(pack_records(&[], 1400).is_empty());
    }

    #[test]
    fn test_publish_respects_interval() {
        let mut registry = StatusRegistry::new();
        registry
            .register_status("next_frame_id", || "3".to_string())
            .unwrap();
        registry
            .register_status("north", || "0.000000".to_string())
            .unwrap();
        let transport = MemoryTransport::new(1400);
        let mut publisher = StatusPublisher::new(Duration::from_millis(100));

        let start = Instant::now();
        assert_eq!(publisher.publish(start, &registry, &transport).unwrap(), 1);
        assert_eq!(
            publisher
                .publish(start + Duration::from_millis(50), &registry, &transport)
                .unwrap(),
            0
        );
        assert_eq!(
            publisher
                .publish(start + Duration::from_millis(100), &registry, &transport)
                .unwrap(),
            1
        );

        let sent = transport.sent_of(PayloadType::STATUS);
        let records = StatusRecord::parse_all(&sent[0].payload);
        assert_eq!(records[0], StatusRecord::new("next_frame_id", "3"));
        assert_eq!(records[1].name, "north");
    }
}
