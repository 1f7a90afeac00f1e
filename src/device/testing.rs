//! In-process collaborators for tests

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::traits::{
    EncodedSink, Encoder, EncoderParams, RenderPass, Renderer, StillWriter, ViewSource,
};
use crate::error::{Error, Result};
use crate::frame::FrameInfo;
use crate::media::Codec;

/// Fills every pass with `0x10 + split` and remembers it
pub struct FakeRenderer {
    name: String,
    passes: Arc<Mutex<Vec<RenderPass>>>,
}

impl FakeRenderer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passes: Arc::default(),
        }
    }

    pub fn passes(&self) -> Arc<Mutex<Vec<RenderPass>>> {
        Arc::clone(&self.passes)
    }
}

impl Renderer for FakeRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, pass: &RenderPass, out: &mut [u8]) -> Result<()> {
        out.fill(0x10 + pass.split);
        self.passes.lock().unwrap().push(pass.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EncoderLog {
    pub inits: Vec<EncoderParams>,
    pub frames: usize,
    pub releases: usize,
}

fn length_prefixed(body: &[u8]) -> Vec<u8> {
    let mut unit = (body.len() as u32).to_be_bytes().to_vec();
    unit.extend_from_slice(body);
    unit
}

/// Emits a tiny access unit per frame through its sink
pub struct FakeEncoder {
    log: Arc<Mutex<EncoderLog>>,
    codec: Codec,
    sink: Option<EncodedSink>,
}

impl FakeEncoder {
    pub fn factory() -> (
        impl Fn() -> Box<dyn Encoder> + Send + Sync + 'static,
        Arc<Mutex<EncoderLog>>,
    ) {
        let log = Arc::new(Mutex::new(EncoderLog::default()));
        let shared = Arc::clone(&log);
        let factory = move || -> Box<dyn Encoder> {
            Box::new(FakeEncoder {
                log: Arc::clone(&shared),
                codec: Codec::None,
                sink: None,
            })
        };
        (factory, log)
    }

    fn access_unit(&self) -> Vec<u8> {
        match self.codec {
            Codec::H264 => {
                let mut au = length_prefixed(&[0x67, 0x42, 0x00, 0x1F]);
                au.extend(length_prefixed(&[0x68, 0xCE, 0x3C]));
                au.extend(length_prefixed(&[0x65, 0x88, 0x84]));
                au
            }
            Codec::H265 => {
                let mut au = length_prefixed(&[0x40, 0x01, 0x0C]);
                au.extend(length_prefixed(&[0x26, 0x01, 0xAF]));
                au
            }
            Codec::Mjpeg | Codec::None => vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9],
        }
    }
}

impl Encoder for FakeEncoder {
    fn init(&mut self, params: EncoderParams, sink: EncodedSink) -> Result<()> {
        self.codec = params.codec;
        self.log.lock().unwrap().inits.push(params);
        self.sink = Some(sink);
        Ok(())
    }

    fn add_frame(&mut self, _pixels: &[u8], info: Option<FrameInfo>) -> Result<()> {
        let Some(ref sink) = self.sink else {
            return Err(Error::collaborator("encoder", "not initialised"));
        };
        sink.submit(self.access_unit(), info);
        self.log.lock().unwrap().frames += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.sink = None;
        self.log.lock().unwrap().releases += 1;
    }
}

/// Records every still request instead of writing images
#[derive(Default)]
pub struct FakeStillWriter {
    writes: Arc<Mutex<Vec<(u32, u32, PathBuf)>>>,
}

impl FakeStillWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Arc<Mutex<Vec<(u32, u32, PathBuf)>>> {
        Arc::clone(&self.writes)
    }
}

impl StillWriter for FakeStillWriter {
    fn write_still(&self, pixels: &[u8], width: u32, height: u32, path: &Path) -> Result<()> {
        assert_eq!(pixels.len(), (width * height * 3) as usize);
        self.writes
            .lock()
            .unwrap()
            .push((width, height, path.to_path_buf()));
        Ok(())
    }
}

/// View source steered only by `set_quaternion`
pub struct ManualView {
    name: String,
    quat: Mutex<[f32; 4]>,
}

impl ManualView {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            quat: Mutex::new([0.0, 0.0, 0.0, 1.0]),
        }
    }
}

impl ViewSource for ManualView {
    fn name(&self) -> &str {
        &self.name
    }

    fn quaternion(&self) -> [f32; 4] {
        *self.quat.lock().unwrap()
    }

    fn north(&self) -> f32 {
        90.0
    }

    fn set_quaternion(&self, quat: [f32; 4]) {
        *self.quat.lock().unwrap() = quat;
    }
}
