//! Statistics for frames and the transport link

use std::time::Duration;

/// Per-frame recording statistics
///
/// Reset when a frame starts recording; summarized when it stops.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    /// Frames handed to the encoder
    pub frames: u64,
    /// Accumulated render + encode-submit time
    pub elapsed: Duration,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one processed frame
    pub fn record(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.elapsed += elapsed;
    }

    /// Average processing time per frame
    pub fn average(&self) -> Duration {
        if self.frames > 0 {
            self.elapsed / self.frames as u32
        } else {
            Duration::ZERO
        }
    }

    /// Frames per second sustained over `wall`
    pub fn fps(&self, wall: Duration) -> f64 {
        let secs = wall.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Stream-level multiplexer statistics
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// NAL units (or MJPEG buffers) dispatched
    pub units: u64,
    /// Transport packets sent
    pub packets_sent: u64,
    /// Bytes handed to the transport
    pub bytes_sent: u64,
    /// Bytes appended to the recording file
    pub bytes_recorded: u64,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `packets` transport packets carrying `bytes` bytes
    pub fn record_sent(&mut self, packets: usize, bytes: usize) {
        self.packets_sent += packets as u64;
        self.bytes_sent += bytes as u64;
    }
}

/// Device-wide link statistics
#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    /// Packets received from the transport
    pub packets_received: u64,
    /// Packets missing according to sequence numbers
    pub packets_lost: u64,
    /// Command retransmissions
    pub retransmissions: u64,
    /// Encoded units dropped because the completion queue was full
    pub dropped_units: u64,
    /// Status packets published
    pub status_packets: u64,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of packets lost, 0 when nothing was expected
    pub fn loss_ratio(&self) -> f64 {
        let expected = self.packets_received + self.packets_lost;
        if expected > 0 {
            self.packets_lost as f64 / expected as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_stats_new() {
        let stats = FrameStats::new();
        assert_eq!(stats.frames, 0);
        assert_eq!(stats.average(), Duration::ZERO);
        assert_eq!(stats.fps(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_frame_stats_average_and_fps() {
        let mut stats = FrameStats::new();
        stats.record(Duration::from_millis(10));
        stats.record(Duration::from_millis(30));

        assert_eq!(stats.average(), Duration::from_millis(20));
        assert_eq!(stats.fps(Duration::from_secs(2)), 1.0);
    }

    #[test]
    fn test_link_stats_loss_ratio() {
        let mut stats = LinkStats::new();
        assert_eq!(stats.loss_ratio(), 0.0);

        stats.packets_received = 90;
        stats.packets_lost = 10;
        assert!((stats.loss_ratio() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stream_stats_new() {
        let stats = StreamStats::new();
        assert_eq!(stats.units, 0);
        assert_eq!(stats.packets_sent, 0);
        assert_eq!(stats.bytes_recorded, 0);
    }
}
