//! panostream: device-side delivery layer for panoramic cameras
//!
//! A device renders views of a live panorama ("frames"), encodes them and
//! delivers them either over a packet transport or into recording files.
//! A small control plane runs over the same transport: reliable commands in
//! both directions and periodically published status values.
//!
//! ```text
//!   peer ──commands──►  CommandChannel ──► FramePipeline ──► Encoder
//!   peer ◄─statuses──   StatusPublisher        │                │
//!   peer ◄──video────   StreamMuxer ◄──────────┴──── encoded ───┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use panostream::{Device, DeviceConfig, DeviceContext, MemoryTransport};
//!
//! # async fn run(context: DeviceContext) -> panostream::Result<()> {
//! let transport = Arc::new(MemoryTransport::new(1400));
//! let mut device = Device::new(DeviceConfig::default(), context, transport)?;
//! device.send_command("create_frame -w 1024 -h 512 -s h264");
//! device.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod device;
pub mod error;
pub mod frame;
pub mod media;
pub mod protocol;
pub mod stats;
pub mod status;
pub mod transport;

pub use command::{CommandChannel, CommandSender, Domain};
pub use device::{
    Decoder, Device, DeviceConfig, DeviceContext, Encoder, Renderer, StillWriter, ViewSource,
};
pub use error::{Error, Result};
pub use frame::{FrameCommand, FrameId, FrameInfo, FrameOptions, FramePipeline, OutputMode};
pub use media::{Codec, StreamMuxer};
pub use protocol::{CommandRecord, PayloadType, StatusRecord};
pub use status::{StatusPublisher, StatusRegistry};
pub use transport::{MemoryTransport, PacketSink, ReceivedPacket, Transport};
