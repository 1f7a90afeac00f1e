//! External collaborators
//!
//! Rendering, encoding, decoding, orientation sensing and still-image
//! writing are provided by the embedding application. The device only talks
//! to them through these traits.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::frame::{FrameId, FrameInfo};
use crate::media::Codec;

/// Camera texture dimensions negotiated with the capture side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

/// Shared handle to the negotiated texture size
pub type TextureSizeHandle = Arc<RwLock<TextureSize>>;

/// Parameters of one render pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub frame_id: FrameId,
    /// Width of this pass in pixels
    pub width: u32,
    pub height: u32,
    /// 0 for a single pass, 1 and 2 for the halves of a double-size frame
    pub split: u8,
    pub view_quat: [f32; 4],
    pub fov: f32,
    /// Camera texture size at render time
    pub texture: TextureSize,
}

/// Draws the panorama for a view and reads it back as packed RGB
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    /// Fill `out` (`width * height * 3` bytes) for `pass`
    fn render(&self, pass: &RenderPass, out: &mut [u8]) -> Result<()>;
}

/// Encoder configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderParams {
    pub frame_id: FrameId,
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
    pub kbps: u32,
    pub fps: f32,
}

/// Output of an encoder for one frame
#[derive(Debug, Clone)]
pub struct EncodedUnit {
    pub frame_id: FrameId,
    pub data: Bytes,
    pub info: Option<FrameInfo>,
}

/// Where an encoder delivers its output
///
/// Backed by a bounded channel drained on every tick. Delivery never
/// blocks; a full channel drops the unit and counts it.
#[derive(Debug, Clone)]
pub struct EncodedSink {
    frame_id: FrameId,
    tx: mpsc::Sender<EncodedUnit>,
    dropped: Arc<AtomicU64>,
}

impl EncodedSink {
    pub fn new(frame_id: FrameId, tx: mpsc::Sender<EncodedUnit>, dropped: Arc<AtomicU64>) -> Self {
        Self {
            frame_id,
            tx,
            dropped,
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Hand an encoded buffer to the multiplexer
    ///
    /// Returns `false` when the unit was dropped.
    pub fn submit(&self, data: impl Into<Bytes>, info: Option<FrameInfo>) -> bool {
        let unit = EncodedUnit {
            frame_id: self.frame_id,
            data: data.into(),
            info,
        };
        match self.tx.try_send(unit) {
            Ok(()) => true,
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(frame_id = %self.frame_id, error = %e, "Encoded unit dropped");
                false
            }
        }
    }
}

/// Video encoder
pub trait Encoder: Send {
    fn init(&mut self, params: EncoderParams, sink: EncodedSink) -> Result<()>;

    /// Queue one RGB frame; `info` travels with it to the multiplexer
    fn add_frame(&mut self, pixels: &[u8], info: Option<FrameInfo>) -> Result<()>;

    fn release(&mut self);
}

/// Creates encoders of one kind
pub type EncoderFactory = Box<dyn Fn() -> Box<dyn Encoder> + Send + Sync>;

/// Decoder configuration
#[derive(Debug, Clone)]
pub struct DecoderParams {
    /// Camera slot the decoded pictures feed
    pub camera: u8,
    pub codec: Codec,
    /// Handle to report the decoded texture size
    pub texture_size: TextureSizeHandle,
}

/// Decoder of an incoming camera stream
pub trait Decoder: Send {
    fn init(&mut self, params: DecoderParams) -> Result<()>;

    fn decode(&mut self, data: &[u8]) -> Result<()>;

    fn release(&mut self);
}

/// Creates decoders of one kind
pub type DecoderFactory = Box<dyn Fn() -> Box<dyn Decoder> + Send + Sync>;

/// Orientation sensor (or a virtual one driven by commands)
pub trait ViewSource: Send + Sync {
    fn name(&self) -> &str;

    /// Orientation as (x, y, z, w)
    fn quaternion(&self) -> [f32; 4];

    fn compass(&self) -> [f32; 4] {
        [0.0; 4]
    }

    fn temperature(&self) -> f32 {
        0.0
    }

    fn north(&self) -> f32 {
        0.0
    }

    /// Override the orientation; sensors that cannot be overridden ignore it
    fn set_quaternion(&self, _quat: [f32; 4]) {}
}

/// Writes a still image of a rendered buffer
pub trait StillWriter: Send + Sync {
    fn write_still(&self, pixels: &[u8], width: u32, height: u32, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_sink_counts_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        let dropped = Arc::new(AtomicU64::new(0));
        let sink = EncodedSink::new(FrameId(2), tx, Arc::clone(&dropped));

        assert!(sink.submit(vec![1u8, 2, 3], None));
        assert!(!sink.submit(vec![4u8], None));
        assert_eq!(dropped.load(Ordering::Relaxed), 1);

        let unit = rx.try_recv().unwrap();
        assert_eq!(unit.frame_id, FrameId(2));
        assert_eq!(unit.data, Bytes::from_static(&[1, 2, 3]));
    }

    struct Fixed;

    impl ViewSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn quaternion(&self) -> [f32; 4] {
            [0.0, 0.0, 0.0, 1.0]
        }
    }

    #[test]
    fn test_view_source_defaults() {
        let source = Fixed;
        source.set_quaternion([1.0, 0.0, 0.0, 0.0]);
        assert_eq!(source.quaternion(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(source.north(), 0.0);
        assert_eq!(source.compass(), [0.0; 4]);
    }
}
