//! Elementary stream handling
//!
//! This module provides:
//! - H.264/H.265 NAL unit typing
//! - Reassembly of length-prefixed NAL units across encoder buffers
//! - The per-frame metadata (SEI) unit
//! - The stream multiplexer that packetizes and records encoder output

pub mod h264;
pub mod h265;
pub mod mux;
pub mod nal;
pub mod sei;

pub use h264::NaluType;
pub use h265::HevcNaluType;
pub use mux::{OutputFile, StreamMuxer};
pub use nal::{split_parameter_sets, NalAssembler, NalUnit};

use std::path::Path;

/// Output codec of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    #[default]
    None,
    Mjpeg,
    H264,
    H265,
}

/// How the multiplexer treats one NAL unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitKind {
    /// Coded picture slice; consumes pending frame metadata
    pub picture: bool,
    /// Combined parameter set that may embed further start-coded units
    pub splittable: bool,
    /// First unit written to a recording file
    pub recording_start: bool,
}

impl Codec {
    /// Parse a codec name as used in commands (`h264`, `H265`, `mjpeg`...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "h264" => Some(Codec::H264),
            "h265" => Some(Codec::H265),
            "mjpeg" => Some(Codec::Mjpeg),
            "none" | "" => Some(Codec::None),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Mjpeg => "mjpeg",
            Codec::H264 => "h264",
            Codec::H265 => "h265",
        }
    }

    /// Codec implied by a recording file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "h264" => Some(Codec::H264),
            "h265" => Some(Codec::H265),
            "mjpeg" => Some(Codec::Mjpeg),
            _ => None,
        }
    }

    /// Whether output is a stream of length-prefixed NAL units
    pub fn is_nal(&self) -> bool {
        matches!(self, Codec::H264 | Codec::H265)
    }

    /// Classify a unit by its first header byte
    pub fn unit_kind(&self, header: u8) -> UnitKind {
        match self {
            Codec::H264 => match NaluType::from_byte(header) {
                Some(t) => UnitKind {
                    picture: t.is_picture(),
                    splittable: t == NaluType::Sps,
                    recording_start: t == NaluType::Sps,
                },
                None => UnitKind::default(),
            },
            Codec::H265 => {
                let t = HevcNaluType::from_byte(header);
                UnitKind {
                    picture: t.is_picture(),
                    splittable: matches!(t, HevcNaluType::Vps | HevcNaluType::Sps),
                    recording_start: t == HevcNaluType::Vps,
                }
            }
            Codec::None | Codec::Mjpeg => UnitKind::default(),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
