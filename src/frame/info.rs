//! Per-rendered-frame metadata

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time of the last view update, as a monotonic instant plus the
/// wall-clock milliseconds echoed back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerKey {
    pub at: Instant,
    pub epoch_ms: i64,
}

impl ServerKey {
    pub fn now() -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self {
            at: Instant::now(),
            epoch_ms,
        }
    }
}

/// Snapshot taken when a frame is rendered in streaming mode
///
/// Moves with the encoder input and is consumed by the multiplexer when the
/// matching picture unit comes out.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    /// View orientation quaternion (x, y, z, w)
    pub view_quat: [f32; 4],
    /// Field of view in degrees
    pub fov: f32,
    /// Opaque key supplied by the client with the last view update
    pub client_key: String,
    pub server_key: Option<ServerKey>,
    pub before_render: Instant,
    pub after_render: Instant,
}

/// Latency breakdown reported in the frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Latencies {
    /// View update until render start
    pub idle: Duration,
    /// Render start until readback done
    pub processed: Duration,
    /// Readback done until the encoded unit is multiplexed
    pub encoded: Duration,
}

impl FrameInfo {
    /// Latencies up to `encoded_at`; all zero unless a client key is set
    pub fn latencies(&self, encoded_at: Instant) -> Latencies {
        if self.client_key.is_empty() {
            return Latencies::default();
        }
        let idle = self
            .server_key
            .map(|key| self.before_render.saturating_duration_since(key.at))
            .unwrap_or_default();
        Latencies {
            idle,
            processed: self.after_render.saturating_duration_since(self.before_render),
            encoded: encoded_at.saturating_duration_since(self.after_render),
        }
    }

    /// Wall-clock milliseconds of the server key, 0 when unset
    pub fn server_key_ms(&self) -> i64 {
        self.server_key.map(|key| key.epoch_ms).unwrap_or(0)
    }
}
