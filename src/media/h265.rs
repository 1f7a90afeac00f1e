//! H.265/HEVC NAL unit typing
//!
//! HEVC uses a two-byte NAL header; the type is six bits after the
//! forbidden bit:
//!
//! ```text
//! +---+----------+--------------+-----------+
//! | F | nal_type | nuh_layer_id | temporal  |
//! | 1 |    6     |      6       |     3     |
//! +---+----------+--------------+-----------+
//! ```

/// HEVC NAL unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HevcNaluType {
    /// Video coding layer unit (types 0..=31)
    Vcl(u8),
    /// Video parameter set
    Vps,
    /// Sequence parameter set
    Sps,
    /// Picture parameter set
    Pps,
    /// Access unit delimiter
    Aud,
    /// End of sequence
    EndSeq,
    /// End of bitstream
    EndStream,
    /// Filler data
    Filler,
    /// Prefix SEI
    PrefixSei,
    /// Suffix SEI
    SuffixSei,
    /// Reserved or unspecified
    Other(u8),
}

impl HevcNaluType {
    /// Type from the first header byte
    pub fn from_byte(b: u8) -> Self {
        match (b & 0x7E) >> 1 {
            t @ 0..=31 => HevcNaluType::Vcl(t),
            32 => HevcNaluType::Vps,
            33 => HevcNaluType::Sps,
            34 => HevcNaluType::Pps,
            35 => HevcNaluType::Aud,
            36 => HevcNaluType::EndSeq,
            37 => HevcNaluType::EndStream,
            38 => HevcNaluType::Filler,
            39 => HevcNaluType::PrefixSei,
            40 => HevcNaluType::SuffixSei,
            t => HevcNaluType::Other(t),
        }
    }

    pub fn is_picture(&self) -> bool {
        matches!(self, HevcNaluType::Vcl(_))
    }

    pub fn is_parameter_set(&self) -> bool {
        matches!(
            self,
            HevcNaluType::Vps | HevcNaluType::Sps | HevcNaluType::Pps
        )
    }
}

/// NAL header byte of an SEI unit
pub const SEI_HEADER: u8 = 40 << 1;

/// Stream-start delimiter (`"HE"`)
pub const START_MARKER: [u8; 2] = *b"HE";

/// Stream-end delimiter (`"VC"`)
pub const END_MARKER: [u8; 2] = *b"VC";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hevc_nalu_type() {
        assert_eq!(HevcNaluType::from_byte(0x40), HevcNaluType::Vps);
        assert_eq!(HevcNaluType::from_byte(0x42), HevcNaluType::Sps);
        assert_eq!(HevcNaluType::from_byte(0x44), HevcNaluType::Pps);
        assert_eq!(HevcNaluType::from_byte(0x26), HevcNaluType::Vcl(19));
        assert_eq!(HevcNaluType::from_byte(0x02), HevcNaluType::Vcl(1));
        assert_eq!(HevcNaluType::from_byte(SEI_HEADER), HevcNaluType::SuffixSei);
        assert_eq!(HevcNaluType::from_byte(0x7E), HevcNaluType::Other(63));
    }

    #[test]
    fn test_hevc_classes() {
        assert!(HevcNaluType::Vcl(19).is_picture());
        assert!(!HevcNaluType::Vps.is_picture());
        assert!(HevcNaluType::Vps.is_parameter_set());
        assert!(!HevcNaluType::PrefixSei.is_parameter_set());
    }
}
