//! Sequence-loss detection
//!
//! The transport numbers every packet. Loss is detected when a received
//! number is not the successor of the previous one. Nothing is requested
//! again; the gap is only reported.

/// Non-contiguous sequence numbers observed on receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    /// Last sequence number seen before the gap
    pub last: u32,
    /// Sequence number that arrived instead of `last + 1`
    pub received: u32,
}

impl SequenceGap {
    /// Number of packets missing between `last` and `received`
    ///
    /// Reordered or duplicated packets report zero.
    pub fn missing(&self) -> u32 {
        let distance = self.received.wrapping_sub(self.last);
        if distance == 0 || distance > u32::MAX / 2 {
            0
        } else {
            distance - 1
        }
    }
}

/// Tracks the last received sequence number of one transport session
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last: Option<u32>,
    gaps: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a received sequence number
    pub fn observe(&mut self, seq: u32) -> Option<SequenceGap> {
        let gap = match self.last {
            Some(last) if seq != last.wrapping_add(1) => Some(SequenceGap {
                last,
                received: seq,
            }),
            _ => None,
        };
        self.last = Some(seq);
        if gap.is_some() {
            self.gaps += 1;
        }
        gap
    }

    /// Number of gaps seen so far
    pub fn gap_count(&self) -> u64 {
        self.gaps
    }
}
