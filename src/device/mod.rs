//! Device runtime
//!
//! Wires the frame pipeline, command channel and status pub/sub to a
//! transport and to the application's collaborators:
//!
//! ```text
//!               +--------------- Device ----------------+
//!  transport ──►│ PacketSink ─► status watches          │
//!               │            ─► CommandChannel ─► FramePipeline ─► Renderer
//!               │                                        │  ▲
//!               │                     EncodedSink ◄── Encoder
//!               │                          │             │
//!  transport ◄──│ StatusPublisher   StreamMuxer ◄────────┘
//!               +---------------------------------------+
//! ```

pub mod config;
pub mod context;
pub mod runtime;
pub mod telemetry;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use config::DeviceConfig;
pub use context::DeviceContext;
pub use runtime::Device;
pub use telemetry::{TelemetryHandle, UpstreamTelemetry};
pub use traits::{
    Decoder, DecoderFactory, DecoderParams, EncodedSink, EncodedUnit, Encoder, EncoderFactory,
    EncoderParams, RenderPass, Renderer, StillWriter, TextureSize, TextureSizeHandle, ViewSource,
};
