//! Device configuration

use std::time::Duration;

use crate::frame::BitrateLadder;
use crate::protocol::constants::DEFAULT_MAX_PAYLOAD_SIZE;

/// Shortest frame-sync wait
const MIN_FRAME_SYNC_TIMEOUT: Duration = Duration::from_millis(1);

/// Longest frame-sync wait
const MAX_FRAME_SYNC_TIMEOUT: Duration = Duration::from_secs(1);

/// Device configuration options
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Largest payload handed to the transport in one packet
    pub max_payload_size: usize,

    /// Main loop period
    pub tick_interval: Duration,

    /// Minimum time between status publications
    pub status_interval: Duration,

    /// Minimum time between retransmissions of an unacknowledged command
    pub command_retry_interval: Duration,

    /// Largest NAL unit accepted from an encoder
    pub max_nal_size: usize,

    /// Bitrate for file recordings without an explicit rate
    pub video_kbps: u32,

    /// Render widths above this are drawn in two half-width passes
    pub double_size_threshold: u32,

    /// Capacity of the encoder completion queue
    pub encoded_queue_capacity: usize,

    /// Capacity of the transport receive queue
    pub receive_queue_capacity: usize,

    /// Local commands executed per tick
    pub local_commands_per_tick: usize,

    /// Forward `endpoint.` commands upstream instead of executing them
    pub relay: bool,

    /// Wait for a capture arrival before each tick
    pub frame_sync: bool,

    /// Longest wait for a capture arrival
    pub frame_sync_timeout: Duration,

    /// View source used by frames that do not name one
    pub default_view_source: Option<String>,

    /// Stream bitrates by output size
    pub bitrate_ladder: BitrateLadder,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            tick_interval: Duration::from_millis(10),
            status_interval: Duration::from_millis(100),
            command_retry_interval: Duration::from_millis(50),
            max_nal_size: 1024 * 1024, // 1MB
            video_kbps: 4000,
            double_size_threshold: 2048,
            encoded_queue_capacity: 64,
            receive_queue_capacity: 256,
            local_commands_per_tick: 10,
            relay: false,
            frame_sync: false,
            frame_sync_timeout: MIN_FRAME_SYNC_TIMEOUT,
            default_view_source: None,
            bitrate_ladder: BitrateLadder::default(),
        }
    }
}

impl DeviceConfig {
    /// Set the transport payload limit
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size.max(1);
        self
    }

    /// Set the main loop period
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the status publication interval
    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Set the command retransmission interval
    pub fn command_retry_interval(mut self, interval: Duration) -> Self {
        self.command_retry_interval = interval;
        self
    }

    /// Set the NAL unit size limit
    pub fn max_nal_size(mut self, size: usize) -> Self {
        self.max_nal_size = size;
        self
    }

    /// Set the default recording bitrate
    pub fn video_kbps(mut self, kbps: u32) -> Self {
        self.video_kbps = kbps;
        self
    }

    /// Enable relay mode
    pub fn relay(mut self, relay: bool) -> Self {
        self.relay = relay;
        self
    }

    /// Enable frame sync with the given wait bound
    pub fn frame_sync(mut self, timeout: Duration) -> Self {
        self.frame_sync = true;
        self.frame_sync_timeout = timeout.clamp(MIN_FRAME_SYNC_TIMEOUT, MAX_FRAME_SYNC_TIMEOUT);
        self
    }

    /// Set the default view source
    pub fn default_view_source(mut self, name: impl Into<String>) -> Self {
        self.default_view_source = Some(name.into());
        self
    }

    /// Replace the stream bitrate ladder
    pub fn bitrate_ladder(mut self, ladder: BitrateLadder) -> Self {
        self.bitrate_ladder = ladder;
        self
    }
}
