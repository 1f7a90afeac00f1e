//! Protocol constants

/// XML-ish namespace used by every record on the wire
pub const NAMESPACE: &str = "picam360";

/// Command prefix addressing the local endpoint
pub const ENDPOINT_DOMAIN: &str = "endpoint.";

/// Command prefix addressing the upstream peer
pub const UPSTREAM_DOMAIN: &str = "upstream.";

/// Default largest payload the transport carries in one packet
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1400;

/// Longest command text kept when enqueueing (longer input is truncated)
pub const MAX_COMMAND_LEN: usize = 256;

/// Longest status/watch name
pub const MAX_STATUS_NAME_LEN: usize = 63;

/// Longest value accepted when parsing a received record
pub const MAX_RECORD_VALUE_LEN: usize = 255;

/// Transport payload type
///
/// The transport multiplexes independent streams by payload type and calls
/// back per type on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadType(pub u8);

impl PayloadType {
    /// Status records
    pub const STATUS: PayloadType = PayloadType(100);
    /// Command records
    pub const COMMAND: PayloadType = PayloadType(101);
    /// First camera/video payload type
    pub const CAMERA_BASE: PayloadType = PayloadType(110);

    /// Payload type of the n-th video output
    pub fn camera(index: u8) -> Self {
        PayloadType(Self::CAMERA_BASE.0.saturating_add(index))
    }

    /// Whether this payload type carries video
    pub fn is_camera(&self) -> bool {
        self.0 >= Self::CAMERA_BASE.0
    }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            PayloadType::STATUS => write!(f, "status"),
            PayloadType::COMMAND => write!(f, "command"),
            pt if pt.is_camera() => write!(f, "camera{}", pt.0 - Self::CAMERA_BASE.0),
            pt => write!(f, "pt{}", pt.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_type_values() {
        assert_eq!(PayloadType::STATUS.0, 100);
        assert_eq!(PayloadType::COMMAND.0, 101);
        assert_eq!(PayloadType::camera(0), PayloadType::CAMERA_BASE);
        assert_eq!(PayloadType::camera(2).0, 112);
        assert!(PayloadType::camera(1).is_camera());
        assert!(!PayloadType::COMMAND.is_camera());
    }

    #[test]
    fn test_payload_type_display() {
        assert_eq!(PayloadType::STATUS.to_string(), "status");
        assert_eq!(PayloadType::camera(1).to_string(), "camera1");
        assert_eq!(PayloadType(7).to_string(), "pt7");
    }
}
