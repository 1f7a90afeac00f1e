//! Statistics

pub mod metrics;

pub use metrics::{FrameStats, LinkStats, StreamStats};
