//! H.264/AVC NAL unit typing
//!
//! The encoder emits length-prefixed NAL units (4-byte big-endian length
//! followed by the unit). The first byte after the prefix is the NAL header:
//!
//! ```text
//! +---+-----+----------+
//! | F | NRI | nal_type |
//! | 1 |  2  |    5     |
//! +---+-----+----------+
//! ```

/// NAL unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    /// Non-IDR slice
    Slice = 1,
    /// Slice data partition A
    SlicePartA = 2,
    /// Slice data partition B
    SlicePartB = 3,
    /// Slice data partition C
    SlicePartC = 4,
    /// IDR slice (keyframe)
    Idr = 5,
    /// Supplemental enhancement information
    Sei = 6,
    /// Sequence parameter set
    Sps = 7,
    /// Picture parameter set
    Pps = 8,
    /// Access unit delimiter
    Aud = 9,
    /// End of sequence
    EndSeq = 10,
    /// End of stream
    EndStream = 11,
    /// Filler data
    Filler = 12,
}

impl NaluType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & 0x1F {
            1 => Some(NaluType::Slice),
            2 => Some(NaluType::SlicePartA),
            3 => Some(NaluType::SlicePartB),
            4 => Some(NaluType::SlicePartC),
            5 => Some(NaluType::Idr),
            6 => Some(NaluType::Sei),
            7 => Some(NaluType::Sps),
            8 => Some(NaluType::Pps),
            9 => Some(NaluType::Aud),
            10 => Some(NaluType::EndSeq),
            11 => Some(NaluType::EndStream),
            12 => Some(NaluType::Filler),
            _ => None,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, NaluType::Idr)
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(self, NaluType::Sps | NaluType::Pps)
    }

    /// Coded picture slice that carries per-frame metadata
    pub fn is_picture(&self) -> bool {
        matches!(self, NaluType::Slice | NaluType::Idr)
    }
}

/// NAL header byte of an SEI unit
pub const SEI_HEADER: u8 = NaluType::Sei as u8;

/// Stream-start delimiter (`"NA"`)
pub const START_MARKER: [u8; 2] = *b"NA";

/// Stream-end delimiter (`"LU"`)
pub const END_MARKER: [u8; 2] = *b"LU";
