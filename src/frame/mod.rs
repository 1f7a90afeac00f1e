//! Frame outputs
//!
//! A frame is one rendered output of the device: a still capture, a file
//! recording or a live stream. Frames are created and steered by local
//! commands and advanced once per tick by the [`FramePipeline`].
//!
//! ```text
//!                 set Video / Stream
//!   None ────────────────────────────► Recording (encoder allocated)
//!    ▲                                     │
//!    └──────── mode set back to None ──────┘ (encoder released once)
//!
//!   Still: rendered once, handed to the still writer, then deleted
//! ```

pub mod bitrate;
pub mod command;
pub mod compose;
pub mod info;
pub mod options;
pub mod pipeline;
pub mod state;

pub use bitrate::BitrateLadder;
pub use command::{FrameCommand, FrameSelector};
pub use compose::compose_split;
pub use info::{FrameInfo, Latencies, ServerKey};
pub use options::FrameOptions;
pub use pipeline::FramePipeline;
pub use state::Frame;

use std::fmt;

/// Frame identifier, allocated monotonically and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a frame does with its rendered pictures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Rendered but not delivered
    #[default]
    None,
    /// One still image, then the frame is deleted
    Still,
    /// Encoded into a recording file
    Video,
    /// Encoded and sent over the transport
    Stream,
}

impl OutputMode {
    /// Whether this mode keeps an encoder allocated
    pub fn is_recording(&self) -> bool {
        matches!(self, OutputMode::Video | OutputMode::Stream)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputMode::None => "none",
            OutputMode::Still => "still",
            OutputMode::Video => "video",
            OutputMode::Stream => "stream",
        };
        f.write_str(name)
    }
}
