//! Stream multiplexer
//!
//! Turns encoder output into transport packets and recording-file appends.
//! For NAL codecs each unit goes out framed as:
//!
//! ```text
//! +-----+-----------------+------------------+-----+
//! | SOI | SEI (len+hdr+tag) | unit (len+data) | EOI |  flush
//! +-----+-----------------+------------------+-----+
//!   2         chunked             chunked        2
//! ```
//!
//! Recording files are written in Annex B form, starting at the first
//! parameter set so that the file is decodable from its first byte. MJPEG
//! buffers are sent and recorded as-is.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::nal::{split_parameter_sets, NalAssembler, NalUnit, LENGTH_PREFIX_SIZE, START_CODE};
use super::sei::{frame_tag, markers, sei_unit};
use super::Codec;
use crate::error::Result;
use crate::frame::{FrameId, FrameInfo};
use crate::protocol::PayloadType;
use crate::stats::StreamStats;
use crate::transport::Transport;

/// Pending metadata kept for picture units not yet seen
const MAX_PENDING_INFO: usize = 16;

/// A recording file opened with truncation
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OutputFile {
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Per-frame multiplexer state
#[derive(Debug)]
pub struct StreamMuxer {
    frame_id: FrameId,
    codec: Codec,
    renderer: String,
    payload_type: PayloadType,
    assembler: NalAssembler,
    pending_info: VecDeque<FrameInfo>,
    recording_started: bool,
    stats: StreamStats,
}

impl StreamMuxer {
    pub fn new(frame_id: FrameId, codec: Codec, renderer: impl Into<String>, max_nal_size: usize) -> Self {
        Self {
            frame_id,
            codec,
            renderer: renderer.into(),
            payload_type: PayloadType::camera(0),
            assembler: NalAssembler::new(max_nal_size),
            pending_info: VecDeque::new(),
            recording_started: false,
            stats: StreamStats::new(),
        }
    }

    /// Send on a different video payload type
    pub fn with_payload_type(mut self, payload_type: PayloadType) -> Self {
        self.payload_type = payload_type;
        self
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn set_renderer(&mut self, renderer: impl Into<String>) {
        self.renderer = renderer.into();
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Whether file writes have passed the first parameter set
    pub fn recording_started(&self) -> bool {
        self.recording_started
    }

    /// Forget stream position after a new recording file was opened
    pub fn restart_recording(&mut self) {
        self.recording_started = false;
    }

    /// Drop carried-over partial data and pending metadata
    pub fn reset(&mut self) {
        self.assembler.reset();
        self.pending_info.clear();
        self.recording_started = false;
    }

    /// Multiplex one encoder output buffer
    ///
    /// `transport` is set in streaming mode; `file` whenever a recording
    /// file is open.
    pub fn process(
        &mut self,
        data: &[u8],
        info: Option<FrameInfo>,
        transport: Option<&dyn Transport>,
        file: Option<&mut OutputFile>,
    ) -> Result<()> {
        if let Some(info) = info {
            if self.pending_info.len() >= MAX_PENDING_INFO {
                self.pending_info.pop_front();
                tracing::debug!(frame_id = %self.frame_id, "Stale frame metadata dropped");
            }
            self.pending_info.push_back(info);
        }

        match self.codec {
            Codec::Mjpeg => self.process_mjpeg(data, transport, file),
            Codec::H264 | Codec::H265 => {
                let Self {
                    frame_id,
                    codec,
                    renderer,
                    payload_type,
                    assembler,
                    pending_info,
                    recording_started,
                    stats,
                } = self;
                let mut writer = UnitWriter {
                    frame_id: *frame_id,
                    codec: *codec,
                    renderer: renderer.as_str(),
                    payload_type: *payload_type,
                    pending_info,
                    recording_started,
                    stats,
                    transport,
                    file,
                };
                assembler.feed(data, |unit| writer.dispatch(unit))
            }
            Codec::None => Ok(()),
        }
    }

    fn process_mjpeg(
        &mut self,
        data: &[u8],
        transport: Option<&dyn Transport>,
        file: Option<&mut OutputFile>,
    ) -> Result<()> {
        self.pending_info.clear();
        self.stats.units += 1;
        if let Some(transport) = transport {
            let packets = transport.send_chunked(data, self.payload_type)?;
            self.stats.record_sent(packets, data.len());
            transport.flush()?;
        }
        if let Some(file) = file {
            file.write_all(data)?;
            self.stats.bytes_recorded += data.len() as u64;
        }
        Ok(())
    }
}

/// Borrowed view of the muxer used while the assembler dispatches units
struct UnitWriter<'a> {
    frame_id: FrameId,
    codec: Codec,
    renderer: &'a str,
    payload_type: PayloadType,
    pending_info: &'a mut VecDeque<FrameInfo>,
    recording_started: &'a mut bool,
    stats: &'a mut StreamStats,
    transport: Option<&'a dyn Transport>,
    file: Option<&'a mut OutputFile>,
}

impl UnitWriter<'_> {
    fn dispatch(&mut self, unit: NalUnit<'_>) -> Result<()> {
        let Some(header) = unit.header() else {
            tracing::debug!(frame_id = %self.frame_id, "Empty NAL unit skipped");
            return Ok(());
        };

        if self.codec.unit_kind(header).splittable {
            for piece in split_parameter_sets(unit.as_bytes()) {
                self.emit(NalUnit::new(&piece))?;
            }
            Ok(())
        } else {
            self.emit(unit)
        }
    }

    fn emit(&mut self, unit: NalUnit<'_>) -> Result<()> {
        let Some(header) = unit.header() else {
            return Ok(());
        };
        let kind = self.codec.unit_kind(header);
        self.stats.units += 1;

        if let Some(file) = self.file.as_deref_mut() {
            if !*self.recording_started && kind.recording_start {
                tracing::info!(
                    frame_id = %self.frame_id,
                    path = %file.path().display(),
                    "Recording started at parameter set"
                );
                *self.recording_started = true;
            }
            if *self.recording_started {
                file.write_all(&START_CODE)?;
                file.write_all(unit.payload())?;
                self.stats.bytes_recorded += (START_CODE.len() + unit.payload().len()) as u64;
            }
        }

        if let Some(transport) = self.transport {
            let info = if kind.picture {
                self.pending_info.pop_front()
            } else {
                None
            };
            let tag = frame_tag(self.frame_id, self.renderer, info.as_ref(), Instant::now());
            let (start, end) = markers(self.codec);

            let mut head = Vec::with_capacity(start.len() + LENGTH_PREFIX_SIZE + 1 + tag.len());
            head.extend_from_slice(&start);
            head.extend_from_slice(&sei_unit(self.codec, &tag));

            for part in [&head[..], unit.as_bytes(), &end[..]] {
                let packets = transport.send_chunked(part, self.payload_type)?;
                self.stats.record_sent(packets, part.len());
            }
            transport.flush()?;
        }
        Ok(())
    }
}
