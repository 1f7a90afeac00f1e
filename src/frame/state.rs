//! Per-frame state

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::compose::BYTES_PER_PIXEL;
use super::info::ServerKey;
use super::options::DEFAULT_FOV;
use super::{FrameId, OutputMode};
use crate::device::{Encoder, ViewSource};
use crate::media::{Codec, OutputFile, StreamMuxer};
use crate::stats::FrameStats;

/// Callback run just before a frame is torn down
pub type PreDeleteHook = Box<dyn FnOnce(&Frame) + Send>;

/// One rendered output
pub struct Frame {
    pub id: FrameId,
    /// Name of the renderer drawing this frame
    pub renderer: String,
    pub mode: OutputMode,
    pub codec: Codec,
    /// Encoder kind used when streaming
    pub encoder_kind: Option<String>,
    pub fps: f32,
    /// 0 derives the rate from the bitrate ladder
    pub kbps: u32,
    /// Width of one render pass
    pub width: u32,
    pub height: u32,
    /// Rendered as two half-width passes
    pub double_size: bool,
    pub fov: f32,
    pub client_key: String,
    pub server_key: Option<ServerKey>,
    /// Recording file for video mode
    pub output_path: Option<PathBuf>,
    /// Pending record or snapshot request while streaming
    pub record_path: Option<PathBuf>,
    pub last_updated: Option<Instant>,
    pub delete_after_processed: bool,
    /// Delete once recording stops
    pub(crate) one_shot: bool,
    pub(crate) recording: bool,
    pub(crate) view_source: Option<Arc<dyn ViewSource>>,
    pub(crate) encoder: Option<Box<dyn Encoder>>,
    pub(crate) output: Option<OutputFile>,
    pub(crate) muxer: Option<StreamMuxer>,
    pub(crate) stats: FrameStats,
    pub(crate) recording_since: Option<Instant>,
    pub(crate) pixels: Vec<u8>,
    pub(crate) scratch: Vec<u8>,
    pre_delete: Option<PreDeleteHook>,
}

impl Frame {
    pub(crate) fn new(id: FrameId, renderer: String, width: u32, height: u32, double_size: bool) -> Self {
        let pass = width as usize * height as usize * BYTES_PER_PIXEL;
        let (pixels, scratch) = if double_size {
            (vec![0u8; pass * 2], vec![0u8; pass])
        } else {
            (vec![0u8; pass], Vec::new())
        };

        Self {
            id,
            renderer,
            mode: OutputMode::None,
            codec: Codec::None,
            encoder_kind: None,
            fps: 0.0,
            kbps: 0,
            width,
            height,
            double_size,
            fov: DEFAULT_FOV,
            client_key: String::new(),
            server_key: None,
            output_path: None,
            record_path: None,
            last_updated: None,
            delete_after_processed: false,
            one_shot: false,
            recording: false,
            view_source: None,
            encoder: None,
            output: None,
            muxer: None,
            stats: FrameStats::new(),
            recording_since: None,
            pixels,
            scratch,
            pre_delete: None,
        }
    }

    /// Whether an encoder is allocated
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Whether a recording file is open
    pub fn has_output_file(&self) -> bool {
        self.output.is_some()
    }

    /// Width of the composed output
    pub fn output_width(&self) -> u32 {
        if self.double_size {
            self.width * 2
        } else {
            self.width
        }
    }

    /// Last rendered picture, packed RGB
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn view_source_name(&self) -> Option<&str> {
        self.view_source.as_ref().map(|v| v.name())
    }

    /// Register a hook run before the frame is deleted
    pub fn on_delete<F>(&mut self, hook: F)
    where
        F: FnOnce(&Frame) + Send + 'static,
    {
        self.pre_delete = Some(Box::new(hook));
    }

    /// Current view orientation
    pub(crate) fn view_quat(&self) -> [f32; 4] {
        self.view_source
            .as_ref()
            .map(|v| v.quaternion())
            .unwrap_or([0.0, 0.0, 0.0, 1.0])
    }

    /// Stop encoding: release the encoder and close the file
    pub(crate) fn stop_recording(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            encoder.release();
        }
        self.close_output();
        if let Some(ref mut muxer) = self.muxer {
            muxer.reset();
        }
        self.recording = false;
    }

    pub(crate) fn close_output(&mut self) {
        if let Some(mut file) = self.output.take() {
            if let Err(e) = file.flush() {
                tracing::warn!(frame_id = %self.id, error = %e, "Failed to flush recording file");
            }
            tracing::info!(frame_id = %self.id, path = %file.path().display(), "Recording file closed");
        }
    }

    /// Run the pre-delete hook and release everything the frame owns
    pub(crate) fn teardown(mut self) {
        if let Some(hook) = self.pre_delete.take() {
            hook(&self);
        }
        self.stop_recording();
        self.muxer = None;
        self.pixels = Vec::new();
        self.scratch = Vec::new();
        tracing::info!(frame_id = %self.id, "Frame deleted");
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("renderer", &self.renderer)
            .field("mode", &self.mode)
            .field("codec", &self.codec)
            .field("fps", &self.fps)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("double_size", &self.double_size)
            .field("recording", &self.recording)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_new_frame_buffers() {
        let frame = Frame::new(FrameId(0), "W".into(), 4, 2, false);
        assert_eq!(frame.pixels().len(), 4 * 2 * 3);
        assert_eq!(frame.output_width(), 4);

        let frame = Frame::new(FrameId(1), "W".into(), 4, 2, true);
        assert_eq!(frame.pixels().len(), 4 * 2 * 3 * 2);
        assert_eq!(frame.output_width(), 8);
        assert_eq!(frame.fov, DEFAULT_FOV);
        assert_eq!(frame.view_quat(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_teardown_runs_hook_first() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let mut frame = Frame::new(FrameId(3), "W".into(), 2, 2, false);
        frame.on_delete(move |f| {
            assert_eq!(f.id, FrameId(3));
            assert_eq!(f.pixels().len(), 12);
            flag.store(true, Ordering::SeqCst);
        });
        frame.teardown();
        assert!(called.load(Ordering::SeqCst));
    }
}
