//! Frame output state machine
//!
//! The pipeline owns every frame and advances them once per tick:
//!
//! ```text
//!  for each frame (id order)
//!    fps gate ──► start/stop transition ──► render ──► dispatch
//!                                                        │
//!        Still: still writer   Video/Stream: encoder ◄───┘
//!
//!  then sweep frames marked for deletion
//! ```
//!
//! Encoders deliver their output asynchronously through an [`EncodedSink`];
//! the device drains those units and hands them back through
//! [`FramePipeline::mux_encoded`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::compose::compose_split;
use super::info::{FrameInfo, ServerKey};
use super::{Frame, FrameCommand, FrameId, FrameOptions, FrameSelector, OutputMode};
use crate::device::{
    DeviceConfig, DeviceContext, EncodedSink, EncodedUnit, EncoderParams, RenderPass,
};
use crate::error::{Error, FrameError, Result};
use crate::media::{Codec, OutputFile, StreamMuxer};
use crate::stats::FrameStats;
use crate::transport::Transport;

/// All frames of a device
pub struct FramePipeline {
    config: DeviceConfig,
    frames: BTreeMap<FrameId, Frame>,
    next_id: Arc<AtomicU32>,
    encoded_tx: mpsc::Sender<EncodedUnit>,
    dropped: Arc<AtomicU64>,
}

impl FramePipeline {
    /// Create a pipeline whose encoders deliver into `encoded_tx`
    pub fn new(config: DeviceConfig, encoded_tx: mpsc::Sender<EncodedUnit>) -> Self {
        Self {
            config,
            frames: BTreeMap::new(),
            next_id: Arc::new(AtomicU32::new(0)),
            encoded_tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Id the next created frame will get, shared with the status registry
    pub fn next_id_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.next_id)
    }

    /// Encoded units dropped because the completion queue was full
    pub fn dropped_units(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn ids(&self) -> Vec<FrameId> {
        self.frames.keys().copied().collect()
    }

    /// Create a frame
    ///
    /// `-o` alone records to a file and deletes the frame when the recording
    /// stops. `-s` streams; combined with `-o` the path becomes a pending
    /// record request on the stream.
    pub fn create_frame(&mut self, options: FrameOptions, ctx: &DeviceContext) -> Result<FrameId> {
        let renderer = match options.renderer {
            Some(ref name) => ctx
                .renderer(name)
                .ok_or_else(|| FrameError::RendererUnavailable(name.clone()))?,
            None => ctx
                .default_renderer()
                .ok_or_else(|| FrameError::RendererUnavailable("default".into()))?,
        };
        if options.width == 0 || options.height == 0 {
            return Err(FrameError::InvalidOption(format!(
                "size {}x{}",
                options.width, options.height
            ))
            .into());
        }

        let double_size = options.width > self.config.double_size_threshold;
        let width = if double_size {
            options.width / 2
        } else {
            options.width
        };

        let id = FrameId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut frame = Frame::new(id, renderer.name().to_string(), width, options.height, double_size);
        frame.fps = options.fps.max(0.0);
        frame.kbps = options.kbps;

        match (options.stream, options.output) {
            (Some(kind), output) => {
                frame.mode = OutputMode::Stream;
                frame.codec = Codec::from_name(&kind)
                    .filter(|c| *c != Codec::None)
                    .unwrap_or(Codec::Mjpeg);
                frame.encoder_kind = Some(kind);
                frame.record_path = output;
            }
            (None, Some(path)) => {
                frame.mode = OutputMode::Video;
                frame.one_shot = true;
                frame.codec = Codec::from_path(&path).unwrap_or(Codec::H264);
                frame.encoder_kind = Some(frame.codec.name().to_string());
                frame.output_path = Some(path);
            }
            (None, None) => {}
        }

        let view_source = options
            .view_source
            .or_else(|| self.config.default_view_source.clone());
        if let Some(name) = view_source {
            match ctx.view_source(&name) {
                Some(source) => frame.view_source = Some(source),
                None => tracing::warn!(frame_id = %id, view_source = %name, "Unknown view source"),
            }
        }

        tracing::info!(
            frame_id = %id,
            renderer = %frame.renderer,
            mode = %frame.mode,
            codec = %frame.codec,
            width = frame.output_width(),
            height = frame.height,
            "Frame created"
        );
        self.frames.insert(id, frame);
        Ok(id)
    }

    /// Mark one or all frames for deletion at the end of the next tick
    pub fn delete_frame(&mut self, selector: FrameSelector) -> Result<()> {
        match selector {
            FrameSelector::All => {
                for frame in self.frames.values_mut() {
                    frame.delete_after_processed = true;
                }
            }
            FrameSelector::One(id) => self.frame_mut(id)?.delete_after_processed = true,
        }
        Ok(())
    }

    /// Stop recording and delete the frame once the encoder is released
    pub fn stop_output(&mut self, id: FrameId) -> Result<()> {
        let frame = self.frame_mut(id)?;
        frame.mode = OutputMode::None;
        frame.one_shot = true;
        Ok(())
    }

    /// Apply a parsed local command
    pub fn execute(&mut self, command: FrameCommand, ctx: &DeviceContext) -> Result<()> {
        match command {
            FrameCommand::Create(options) => {
                self.create_frame(options, ctx)?;
            }
            FrameCommand::Delete(selector) => self.delete_frame(selector)?,
            FrameCommand::SetFps { id, fps } => self.frame_mut(id)?.fps = fps,
            FrameCommand::SetMode { id, renderer } => {
                if ctx.renderer(&renderer).is_none() {
                    return Err(FrameError::RendererUnavailable(renderer).into());
                }
                let frame = self.frame_mut(id)?;
                if let Some(ref mut muxer) = frame.muxer {
                    muxer.set_renderer(renderer.as_str());
                }
                frame.renderer = renderer;
            }
            FrameCommand::StartRecord { id, path } => {
                let frame = self.frame_mut(id)?;
                let mode = frame.mode;
                match mode {
                    OutputMode::Stream => frame.record_path = Some(path),
                    OutputMode::None => {
                        frame.mode = OutputMode::Video;
                        frame.codec = Codec::from_path(&path).unwrap_or(Codec::H264);
                        frame.encoder_kind = Some(frame.codec.name().to_string());
                        frame.output_path = Some(path);
                    }
                    mode => {
                        tracing::warn!(frame_id = %id, mode = %mode, "Frame already has an output")
                    }
                }
            }
            FrameCommand::StopRecord { id } => {
                let frame = self.frame_mut(id)?;
                let mode = frame.mode;
                match mode {
                    OutputMode::Stream if frame.has_output_file() => frame.close_output(),
                    OutputMode::Video => frame.mode = OutputMode::None,
                    _ => return Err(FrameError::NotRecording(id).into()),
                }
            }
            FrameCommand::Snap { id, path } => {
                let frame = self.frame_mut(id)?;
                if frame.mode.is_recording() {
                    frame.record_path = Some(path);
                } else {
                    frame.mode = OutputMode::Still;
                    frame.output_path = Some(path);
                }
            }
            FrameCommand::SetViewQuaternion {
                id,
                quat,
                fov,
                client_key,
            } => {
                let quat = quat.ok_or_else(|| FrameError::InvalidOption("quat".into()))?;
                let frame = self.frame_mut(id)?;
                match frame.view_source {
                    Some(ref source) => {
                        let _guard = ctx.lock_render();
                        source.set_quaternion(quat);
                    }
                    None => tracing::debug!(frame_id = %id, "Frame has no view source"),
                }
                if let Some(fov) = fov {
                    frame.fov = fov;
                }
                if let Some(key) = client_key {
                    frame.client_key = key;
                    frame.server_key = Some(ServerKey::now());
                }
            }
            FrameCommand::SetFov { id, fov } => self.frame_mut(id)?.fov = fov,
        }
        Ok(())
    }

    /// Advance every frame once
    pub fn tick(&mut self, now: Instant, ctx: &DeviceContext) {
        let Self {
            config,
            frames,
            encoded_tx,
            dropped,
            ..
        } = self;
        let step = FrameStep {
            config,
            ctx,
            encoded_tx,
            dropped,
            now,
        };

        for frame in frames.values_mut() {
            if frame.delete_after_processed {
                continue;
            }
            if let Err(e) = step.run(frame) {
                tracing::error!(frame_id = %frame.id, error = %e, "Frame failed, deleting");
                frame.delete_after_processed = true;
            }
        }

        self.sweep();
    }

    /// Multiplex one encoder output into the transport and/or recording file
    ///
    /// Units for frames that are gone or no longer recording are dropped.
    pub fn mux_encoded(&mut self, unit: EncodedUnit, transport: &dyn Transport) -> Result<()> {
        let Some(frame) = self.frames.get_mut(&unit.frame_id) else {
            tracing::debug!(frame_id = %unit.frame_id, "Encoded unit for deleted frame");
            return Ok(());
        };
        if !frame.recording {
            return Ok(());
        }

        let id = frame.id;
        let transport = (frame.mode == OutputMode::Stream).then_some(transport);
        let Some(ref mut muxer) = frame.muxer else {
            return Err(FrameError::MissingEncoder(id).into());
        };

        match muxer.process(&unit.data, unit.info, transport, frame.output.as_mut()) {
            Err(Error::Io(e)) => {
                tracing::warn!(frame_id = %id, error = %e, "Recording write failed, closing file");
                frame.close_output();
                Ok(())
            }
            other => other,
        }
    }

    /// Delete every frame now
    pub fn clear(&mut self) {
        for (_, frame) in std::mem::take(&mut self.frames) {
            frame.teardown();
        }
    }

    fn frame_mut(&mut self, id: FrameId) -> Result<&mut Frame> {
        self.frames
            .get_mut(&id)
            .ok_or_else(|| FrameError::NotFound(id).into())
    }

    fn sweep(&mut self) {
        let doomed: Vec<FrameId> = self
            .frames
            .iter()
            .filter(|(_, f)| f.delete_after_processed)
            .map(|(id, _)| *id)
            .collect();
        for id in doomed {
            if let Some(frame) = self.frames.remove(&id) {
                frame.teardown();
            }
        }
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("frames", &self.frames)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

/// Everything one frame needs from the pipeline during a tick
struct FrameStep<'a> {
    config: &'a DeviceConfig,
    ctx: &'a DeviceContext,
    encoded_tx: &'a mpsc::Sender<EncodedUnit>,
    dropped: &'a Arc<AtomicU64>,
    now: Instant,
}

impl FrameStep<'_> {
    fn run(&self, frame: &mut Frame) -> Result<()> {
        if frame.fps > 0.0 {
            if let Some(last) = frame.last_updated {
                let elapsed = self.now.saturating_duration_since(last).as_secs_f64();
                if elapsed * f64::from(frame.fps) < 1.0 {
                    return Ok(());
                }
            }
        }
        frame.last_updated = Some(self.now);

        if frame.recording && frame.mode == OutputMode::None {
            self.stop(frame);
            if frame.delete_after_processed {
                return Ok(());
            }
        } else if !frame.recording && frame.mode.is_recording() {
            self.start(frame)?;
        }

        let view_quat = frame.view_quat();
        let before_render = Instant::now();
        self.render(frame, view_quat)?;
        let after_render = Instant::now();

        match frame.mode {
            OutputMode::None => {}
            OutputMode::Still => {
                if let Some(path) = frame.output_path.clone() {
                    write_still(self.ctx, frame, &path)?;
                } else {
                    tracing::warn!(frame_id = %frame.id, "Still requested without a path");
                }
                frame.mode = OutputMode::None;
                frame.delete_after_processed = true;
            }
            OutputMode::Video => {
                if frame.output.is_none() {
                    tracing::warn!(frame_id = %frame.id, "No recording file, stopping");
                    frame.mode = OutputMode::None;
                    return Ok(());
                }
                self.encode(frame, None, before_render)?;
                self.honour_record_path(frame);
            }
            OutputMode::Stream => {
                let info = FrameInfo {
                    view_quat,
                    fov: frame.fov,
                    client_key: frame.client_key.clone(),
                    server_key: frame.server_key,
                    before_render,
                    after_render,
                };
                self.encode(frame, Some(info), before_render)?;
                self.honour_record_path(frame);
            }
        }
        Ok(())
    }

    fn start(&self, frame: &mut Frame) -> Result<()> {
        let ratio = if frame.double_size { 2 } else { 1 };
        let (kind, kbps) = if frame.mode == OutputMode::Stream {
            let kind = frame
                .encoder_kind
                .clone()
                .ok_or(FrameError::MissingEncoder(frame.id))?;
            let kbps = if frame.kbps > 0 {
                frame.kbps
            } else {
                self.config
                    .bitrate_ladder
                    .kbps(frame.codec, frame.width, frame.height)
            };
            (kind, kbps)
        } else {
            let kbps = if frame.kbps > 0 {
                frame.kbps
            } else {
                self.config.video_kbps
            };
            (frame.codec.name().to_string(), kbps)
        };

        let mut encoder = self
            .ctx
            .create_encoder(&kind)
            .ok_or(FrameError::EncoderUnavailable(kind))?;
        let params = EncoderParams {
            frame_id: frame.id,
            codec: frame.codec,
            width: frame.width * ratio,
            height: frame.height,
            kbps: kbps * ratio,
            fps: frame.fps.max(1.0),
        };
        let sink = EncodedSink::new(frame.id, self.encoded_tx.clone(), Arc::clone(self.dropped));
        if let Err(e) = encoder.init(params.clone(), sink) {
            encoder.release();
            return Err(e);
        }

        if frame.mode == OutputMode::Video {
            if let Some(ref path) = frame.output_path {
                match OutputFile::create(path) {
                    Ok(file) => frame.output = Some(file),
                    Err(e) => {
                        tracing::warn!(frame_id = %frame.id, path = %path.display(), error = %e, "Failed to open recording file")
                    }
                }
            }
        }

        frame.encoder = Some(encoder);
        frame.muxer = Some(StreamMuxer::new(
            frame.id,
            frame.codec,
            frame.renderer.as_str(),
            self.config.max_nal_size,
        ));
        frame.stats = FrameStats::new();
        frame.recording_since = Some(self.now);
        frame.recording = true;

        tracing::info!(
            frame_id = %frame.id,
            mode = %frame.mode,
            codec = %params.codec,
            width = params.width,
            height = params.height,
            kbps = params.kbps,
            fps = params.fps,
            "Recording started"
        );
        Ok(())
    }

    fn stop(&self, frame: &mut Frame) {
        let wall = frame
            .recording_since
            .map(|since| self.now.saturating_duration_since(since))
            .unwrap_or_default();
        tracing::info!(
            frame_id = %frame.id,
            frames = frame.stats.frames,
            avg_ms = frame.stats.average().as_secs_f64() * 1000.0,
            fps = frame.stats.fps(wall),
            "Recording stopped"
        );

        frame.stop_recording();
        frame.recording_since = None;
        if frame.one_shot {
            frame.delete_after_processed = true;
        }
    }

    fn render(&self, frame: &mut Frame, view_quat: [f32; 4]) -> Result<()> {
        let renderer = self
            .ctx
            .renderer(&frame.renderer)
            .ok_or_else(|| FrameError::RendererUnavailable(frame.renderer.clone()))?;

        let _guard = self.ctx.lock_render();
        let mut pass = RenderPass {
            frame_id: frame.id,
            width: frame.width,
            height: frame.height,
            split: 0,
            view_quat,
            fov: frame.fov,
            texture: self.ctx.texture_size(),
        };

        if frame.double_size {
            let (width, height) = (frame.width as usize, frame.height as usize);
            for split in 1..=2u8 {
                pass.split = split;
                renderer.render(&pass, &mut frame.scratch)?;
                compose_split(
                    &mut frame.pixels,
                    &frame.scratch,
                    width,
                    height,
                    usize::from(split - 1),
                );
            }
        } else {
            renderer.render(&pass, &mut frame.pixels)?;
        }
        Ok(())
    }

    fn encode(&self, frame: &mut Frame, info: Option<FrameInfo>, started: Instant) -> Result<()> {
        let Some(ref mut encoder) = frame.encoder else {
            return Err(FrameError::MissingEncoder(frame.id).into());
        };
        encoder.add_frame(&frame.pixels, info)?;
        frame.stats.record(started.elapsed());
        Ok(())
    }

    /// Act on a record or snapshot request made while recording
    fn honour_record_path(&self, frame: &mut Frame) {
        let Some(path) = frame.record_path.take() else {
            return;
        };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if matches!(ext.as_deref(), Some("jpeg") | Some("jpg")) {
            if let Err(e) = write_still(self.ctx, frame, &path) {
                tracing::warn!(frame_id = %frame.id, path = %path.display(), error = %e, "Snapshot failed");
            }
            return;
        }

        match Codec::from_path(&path) {
            Some(codec) if codec == frame.codec => {
                frame.close_output();
                match OutputFile::create(&path) {
                    Ok(file) => {
                        frame.output = Some(file);
                        if let Some(ref mut muxer) = frame.muxer {
                            muxer.restart_recording();
                        }
                        tracing::info!(frame_id = %frame.id, path = %path.display(), "Recording file opened");
                    }
                    Err(e) => {
                        tracing::warn!(frame_id = %frame.id, path = %path.display(), error = %e, "Failed to open recording file")
                    }
                }
            }
            _ => tracing::error!(
                frame_id = %frame.id,
                path = %path.display(),
                codec = %frame.codec,
                "Recording path does not match the frame codec"
            ),
        }
    }
}

fn write_still(ctx: &DeviceContext, frame: &Frame, path: &Path) -> Result<()> {
    let writer = ctx
        .still_writer()
        .ok_or_else(|| Error::collaborator("still writer", "none registered"))?;
    writer.write_still(&frame.pixels, frame.output_width(), frame.height, path)?;
    tracing::info!(frame_id = %frame.id, path = %path.display(), "Still written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{EncoderLog, FakeEncoder, FakeRenderer, FakeStillWriter, ManualView};
    use crate::device::{Encoder, ViewSource};
    use crate::media::nal::START_CODE;
    use crate::protocol::PayloadType;
    use crate::transport::MemoryTransport;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Harness {
        pipeline: FramePipeline,
        ctx: DeviceContext,
        rx: mpsc::Receiver<EncodedUnit>,
        passes: Arc<Mutex<Vec<RenderPass>>>,
        encoders: Arc<Mutex<EncoderLog>>,
        stills: Arc<Mutex<Vec<(u32, u32, std::path::PathBuf)>>>,
        start: Instant,
    }

    impl Harness {
        fn new(config: DeviceConfig) -> Self {
            let mut ctx = DeviceContext::new();
            let renderer = FakeRenderer::new("EQUIRECTANGULAR");
            let passes = renderer.passes();
            ctx.register_renderer(renderer);
            ctx.register_renderer(FakeRenderer::new("WINDOW"));

            let (h264, encoders) = FakeEncoder::factory();
            ctx.register_encoder("h264", h264);
            let (mjpeg, _) = FakeEncoder::factory();
            ctx.register_encoder("mjpeg", mjpeg);

            let still = FakeStillWriter::new();
            let stills = still.writes();
            ctx.set_still_writer(still);
            ctx.register_view_source(ManualView::new("manual"));

            let (tx, rx) = mpsc::channel(64);
            Self {
                pipeline: FramePipeline::new(config, tx),
                ctx,
                rx,
                passes,
                encoders,
                stills,
                start: Instant::now(),
            }
        }

        fn tick_at(&mut self, ms: u64) {
            self.pipeline
                .tick(self.start + Duration::from_millis(ms), &self.ctx);
        }

        fn create(&mut self, options: FrameOptions) -> FrameId {
            self.pipeline.create_frame(options, &self.ctx).unwrap()
        }

        fn drain(&mut self) -> Vec<EncodedUnit> {
            let mut units = Vec::new();
            while let Ok(unit) = self.rx.try_recv() {
                units.push(unit);
            }
            units
        }
    }

    fn small() -> FrameOptions {
        FrameOptions::new().size(8, 4)
    }

    #[test]
    fn test_fps_gate() {
        let mut h = Harness::new(DeviceConfig::default());
        h.create(small().fps(10.0));

        for ms in [0, 50, 100, 150] {
            h.tick_at(ms);
        }
        assert_eq!(h.passes.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_stream_starts_once_and_stops_once() {
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small().stream("h264"));

        for ms in [0, 10, 20] {
            h.tick_at(ms);
        }
        {
            let log = h.encoders.lock().unwrap();
            assert_eq!(log.inits.len(), 1);
            assert_eq!(log.frames, 3);
            assert_eq!(log.inits[0].codec, Codec::H264);
            assert_eq!(log.inits[0].fps, 1.0);
        }
        let units = h.drain();
        assert_eq!(units.len(), 3);
        assert!(units.iter().all(|u| u.frame_id == id && u.info.is_some()));

        h.pipeline.stop_output(id).unwrap();
        h.tick_at(30);
        h.tick_at(40);
        assert_eq!(h.encoders.lock().unwrap().releases, 1);
        assert!(h.pipeline.get(id).is_none());
    }

    #[test]
    fn test_stream_bitrate_from_ladder() {
        let mut h = Harness::new(DeviceConfig::default());
        h.create(FrameOptions::new().stream("h264"));
        h.tick_at(0);
        assert_eq!(h.encoders.lock().unwrap().inits[0].kbps, 800);
    }

    #[test]
    fn test_double_size_composes_halves() {
        let mut config = DeviceConfig::default();
        config.double_size_threshold = 4;
        let mut h = Harness::new(config);
        let id = h.create(small());

        let frame = h.pipeline.get(id).unwrap();
        assert!(frame.double_size);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.output_width(), 8);

        h.tick_at(0);
        let splits: Vec<u8> = h.passes.lock().unwrap().iter().map(|p| p.split).collect();
        assert_eq!(splits, vec![1, 2]);

        let row = 4 * 3;
        let pixels = h.pipeline.get(id).unwrap().pixels();
        for y in 0..4 {
            let start = y * row * 2;
            assert!(pixels[start..start + row].iter().all(|b| *b == 0x11));
            assert!(pixels[start + row..start + 2 * row].iter().all(|b| *b == 0x12));
        }
    }

    #[test]
    fn test_snap_writes_still_and_deletes() {
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small());
        h.pipeline
            .execute(
                FrameCommand::Snap {
                    id,
                    path: "shot.jpeg".into(),
                },
                &h.ctx,
            )
            .unwrap();
        h.tick_at(0);

        let stills = h.stills.lock().unwrap();
        assert_eq!(stills.len(), 1);
        assert_eq!(stills[0], (8, 4, std::path::PathBuf::from("shot.jpeg")));
        assert!(h.pipeline.is_empty());
    }

    #[test]
    fn test_snap_while_streaming_keeps_frame() {
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small().stream("h264"));
        h.tick_at(0);
        h.pipeline
            .execute(
                FrameCommand::Snap {
                    id,
                    path: "live.jpg".into(),
                },
                &h.ctx,
            )
            .unwrap();
        h.tick_at(10);

        assert_eq!(h.stills.lock().unwrap().len(), 1);
        assert!(h.pipeline.get(id).unwrap().is_recording());
        assert!(h.pipeline.get(id).unwrap().record_path.is_none());
    }

    #[test]
    fn test_unknown_encoder_deletes_frame() {
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small().stream("vp8"));
        assert_eq!(h.pipeline.get(id).unwrap().codec, Codec::Mjpeg);
        h.tick_at(0);
        assert!(h.pipeline.is_empty());
    }

    #[test]
    fn test_create_errors() {
        let mut h = Harness::new(DeviceConfig::default());
        let err = h
            .pipeline
            .create_frame(small().renderer("FISHEYE"), &h.ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Frame(FrameError::RendererUnavailable(ref name)) if name == "FISHEYE"
        ));
        assert!(h
            .pipeline
            .create_frame(FrameOptions::new().size(0, 4), &h.ctx)
            .is_err());
    }

    #[test]
    fn test_ids_never_reused() {
        let mut h = Harness::new(DeviceConfig::default());
        let a = h.create(small());
        let b = h.create(small());
        h.pipeline.delete_frame(FrameSelector::One(a)).unwrap();
        h.tick_at(0);
        let c = h.create(small());

        assert_eq!((a, b, c), (FrameId(0), FrameId(1), FrameId(2)));
        assert_eq!(h.pipeline.ids(), vec![b, c]);
        assert_eq!(h.pipeline.next_id_handle().load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_delete_runs_hook() {
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small());
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        h.pipeline
            .get_mut(id)
            .unwrap()
            .on_delete(move |_| flag.store(true, Ordering::SeqCst));

        assert!(matches!(
            h.pipeline.delete_frame(FrameSelector::One(FrameId(9))),
            Err(Error::Frame(FrameError::NotFound(FrameId(9))))
        ));
        h.pipeline.delete_frame(FrameSelector::All).unwrap();
        assert!(!called.load(Ordering::SeqCst));
        h.tick_at(0);
        assert!(called.load(Ordering::SeqCst));
        assert!(h.pipeline.is_empty());
    }

    #[test]
    fn test_stream_is_multiplexed() {
        let mut h = Harness::new(DeviceConfig::default());
        h.create(small().stream("h264"));
        h.tick_at(0);

        let transport = MemoryTransport::new(1400);
        for unit in h.drain() {
            h.pipeline.mux_encoded(unit, &transport).unwrap();
        }
        let sent = transport.sent_of(PayloadType::camera(0));
        assert!(!sent.is_empty());
        assert_eq!(&sent[0].payload[..2], b"NA");
    }

    #[test]
    fn test_video_recording_to_file() {
        let path = std::env::temp_dir().join(format!("panostream-{}-rec.h264", std::process::id()));
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small().output(&path));
        assert_eq!(h.pipeline.get(id).unwrap().mode, OutputMode::Video);

        h.tick_at(0);
        assert!(h.pipeline.get(id).unwrap().has_output_file());
        assert_eq!(h.encoders.lock().unwrap().inits[0].kbps, 4000);

        let transport = MemoryTransport::new(1400);
        for unit in h.drain() {
            h.pipeline.mux_encoded(unit, &transport).unwrap();
        }
        assert!(transport.sent().is_empty());

        h.pipeline
            .execute(FrameCommand::StopRecord { id }, &h.ctx)
            .unwrap();
        h.tick_at(10);
        assert!(h.pipeline.is_empty());

        let written = std::fs::read(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(&written[..4], &START_CODE);
        assert_eq!(written[4], 0x67);
    }

    #[test]
    fn test_file_open_failure_reverts_to_none() {
        let path = std::env::temp_dir()
            .join(format!("panostream-{}-missing", std::process::id()))
            .join("x.h264");
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small().output(&path));

        h.tick_at(0);
        {
            let frame = h.pipeline.get(id).unwrap();
            assert_eq!(frame.mode, OutputMode::None);
            assert!(!frame.has_output_file());
        }
        assert_eq!(h.encoders.lock().unwrap().inits.len(), 1);

        h.tick_at(10);
        assert!(h.pipeline.get(id).is_none());
        assert_eq!(h.encoders.lock().unwrap().releases, 1);
    }

    struct RejectingEncoder {
        releases: Arc<AtomicU64>,
    }

    impl Encoder for RejectingEncoder {
        fn init(&mut self, _params: EncoderParams, _sink: EncodedSink) -> Result<()> {
            Err(Error::collaborator("encoder", "no hardware"))
        }

        fn add_frame(&mut self, _pixels: &[u8], _info: Option<FrameInfo>) -> Result<()> {
            Ok(())
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_encoder_init_failure_releases_encoder() {
        let mut h = Harness::new(DeviceConfig::default());
        let releases = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&releases);
        h.ctx.register_encoder("broken", move || -> Box<dyn Encoder> {
            Box::new(RejectingEncoder {
                releases: Arc::clone(&counter),
            })
        });
        let id = h.create(small().stream("broken"));

        h.tick_at(0);
        assert!(h.pipeline.get(id).is_none());
        assert_eq!(releases.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_view_quaternion_command() {
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small().view_source("manual").stream("h264"));
        h.pipeline
            .execute(
                FrameCommand::parse("set_view_quaternion id=0 quat=0,0.5,0,1 fov=90 client_key=k1")
                    .unwrap(),
                &h.ctx,
            )
            .unwrap();

        let frame = h.pipeline.get(id).unwrap();
        assert_eq!(frame.fov, 90.0);
        assert_eq!(frame.client_key, "k1");
        assert!(frame.server_key.is_some());

        h.tick_at(0);
        assert_eq!(h.passes.lock().unwrap()[0].view_quat, [0.0, 0.5, 0.0, 1.0]);
        let info = h.drain().remove(0).info.unwrap();
        assert_eq!(info.client_key, "k1");
        assert_eq!(info.view_quat, [0.0, 0.5, 0.0, 1.0]);
    }

    /// Turns a little further every time it is sampled
    struct SpinningView {
        samples: AtomicU32,
    }

    impl ViewSource for SpinningView {
        fn name(&self) -> &str {
            "spinning"
        }

        fn quaternion(&self) -> [f32; 4] {
            let n = self.samples.fetch_add(1, Ordering::Relaxed);
            [0.0, 0.1 * n as f32, 0.0, 1.0]
        }
    }

    #[test]
    fn test_frame_info_matches_rendered_view() {
        let mut h = Harness::new(DeviceConfig::default());
        h.ctx.register_view_source(SpinningView {
            samples: AtomicU32::new(0),
        });
        h.create(small().view_source("spinning").stream("h264"));

        h.tick_at(0);
        let rendered = h.passes.lock().unwrap()[0].view_quat;
        let info = h.drain().remove(0).info.unwrap();
        assert_eq!(info.view_quat, rendered);
    }

    #[test]
    fn test_commands_on_frames() {
        let mut h = Harness::new(DeviceConfig::default());
        let id = h.create(small());

        h.pipeline
            .execute(FrameCommand::parse("set_fps -i 0 -f 15").unwrap(), &h.ctx)
            .unwrap();
        h.pipeline
            .execute(FrameCommand::parse("set_mode -i 0 -m WINDOW").unwrap(), &h.ctx)
            .unwrap();
        h.pipeline
            .execute(FrameCommand::parse("set_fov 0=60").unwrap(), &h.ctx)
            .unwrap();
        let frame = h.pipeline.get(id).unwrap();
        assert_eq!(frame.fps, 15.0);
        assert_eq!(frame.renderer, "WINDOW");
        assert_eq!(frame.fov, 60.0);

        assert!(h
            .pipeline
            .execute(FrameCommand::parse("set_mode -i 0 -m FISHEYE").unwrap(), &h.ctx)
            .is_err());
        assert!(matches!(
            h.pipeline
                .execute(FrameCommand::StopRecord { id }, &h.ctx),
            Err(Error::Frame(FrameError::NotRecording(_)))
        ));
        assert!(h
            .pipeline
            .execute(FrameCommand::SetFps { id: FrameId(7), fps: 1.0 }, &h.ctx)
            .is_err());
    }

    #[test]
    fn test_clear_tears_down_recording_frames() {
        let mut h = Harness::new(DeviceConfig::default());
        h.create(small().stream("h264"));
        h.tick_at(0);
        h.pipeline.clear();
        assert!(h.pipeline.is_empty());
        assert_eq!(h.encoders.lock().unwrap().releases, 1);
    }
}
