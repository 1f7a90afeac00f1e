//! Length-prefixed NAL unit reassembly
//!
//! Encoder output buffers do not respect unit boundaries. A unit (or even
//! its 4-byte length prefix) may start in one buffer and end in a later one:
//!
//! ```text
//!  buffer 1                buffer 2
//! +------+-------+------+ +-------+------+--------+
//! | len  | unit  | len  | | ...   | len  | unit   |
//! |  A   |  A    |  B   | | B     |  C   |  C     |
//! +------+-------+------+ +-------+------+--------+
//!                 \____ carried over ___/
//! ```
//!
//! The assembler keeps the partial unit between calls and dispatches each
//! unit once complete, prefix included.

use crate::error::{MediaError, Result};

/// Size of the big-endian length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Annex B start code
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// A complete unit including its length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a>(&'a [u8]);

impl<'a> NalUnit<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        NalUnit(bytes)
    }

    /// Prefix and unit
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Unit without the length prefix
    pub fn payload(&self) -> &'a [u8] {
        self.0.get(LENGTH_PREFIX_SIZE..).unwrap_or(&[])
    }

    /// First header byte, if the unit is not empty
    pub fn header(&self) -> Option<u8> {
        self.payload().first().copied()
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    /// Length prefix split across buffers
    Prefix { bytes: [u8; LENGTH_PREFIX_SIZE], filled: usize },
    /// Unit body split across buffers; `buf` holds the prefix too
    Body { buf: Vec<u8>, total: usize },
}

/// Reassembles length-prefixed units across buffers
#[derive(Debug)]
pub struct NalAssembler {
    max_unit_size: usize,
    state: State,
}

impl NalAssembler {
    pub fn new(max_unit_size: usize) -> Self {
        Self {
            max_unit_size,
            state: State::Idle,
        }
    }

    /// Whether a partial unit is carried over
    pub fn has_partial(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    /// Drop any carried-over partial unit
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Feed one encoder buffer, dispatching every unit it completes in order
    ///
    /// A declared length above the limit aborts the call and drops all
    /// partial state.
    pub fn feed<F>(&mut self, mut data: &[u8], mut on_unit: F) -> Result<()>
    where
        F: FnMut(NalUnit<'_>) -> Result<()>,
    {
        while !data.is_empty() {
            match std::mem::take(&mut self.state) {
                State::Idle => {
                    if data.len() < LENGTH_PREFIX_SIZE {
                        let mut bytes = [0u8; LENGTH_PREFIX_SIZE];
                        bytes[..data.len()].copy_from_slice(data);
                        self.state = State::Prefix {
                            bytes,
                            filled: data.len(),
                        };
                        return Ok(());
                    }

                    let total = self.unit_size(&data[..LENGTH_PREFIX_SIZE])?;
                    if data.len() >= total {
                        on_unit(NalUnit(&data[..total]))?;
                        data = &data[total..];
                    } else {
                        let mut buf = Vec::with_capacity(total);
                        buf.extend_from_slice(data);
                        self.state = State::Body { buf, total };
                        return Ok(());
                    }
                }
                State::Prefix { mut bytes, filled } => {
                    let take = (LENGTH_PREFIX_SIZE - filled).min(data.len());
                    bytes[filled..filled + take].copy_from_slice(&data[..take]);
                    data = &data[take..];

                    let filled = filled + take;
                    if filled < LENGTH_PREFIX_SIZE {
                        self.state = State::Prefix { bytes, filled };
                        return Ok(());
                    }

                    let total = self.unit_size(&bytes)?;
                    let mut buf = Vec::with_capacity(total);
                    buf.extend_from_slice(&bytes);
                    if buf.len() == total {
                        on_unit(NalUnit(&buf))?;
                    } else {
                        self.state = State::Body { buf, total };
                    }
                }
                State::Body { mut buf, total } => {
                    let take = (total - buf.len()).min(data.len());
                    buf.extend_from_slice(&data[..take]);
                    data = &data[take..];

                    if buf.len() == total {
                        on_unit(NalUnit(&buf))?;
                    } else {
                        self.state = State::Body { buf, total };
                    }
                }
            }
        }
        Ok(())
    }

    fn unit_size(&mut self, prefix: &[u8]) -> Result<usize> {
        let declared = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if declared > self.max_unit_size {
            self.reset();
            return Err(MediaError::OversizedUnit {
                declared,
                limit: self.max_unit_size,
            }
            .into());
        }
        Ok(declared + LENGTH_PREFIX_SIZE)
    }
}

/// Split a combined parameter-set unit at every embedded start code
///
/// Each piece is returned as its own length-prefixed unit. A unit without
/// embedded start codes is returned unchanged.
pub fn split_parameter_sets(unit: &[u8]) -> Vec<Vec<u8>> {
    let mut cuts = Vec::new();
    let mut i = LENGTH_PREFIX_SIZE;
    while i + START_CODE.len() <= unit.len() {
        if unit[i..i + START_CODE.len()] == START_CODE {
            cuts.push(i);
            i += START_CODE.len();
        } else {
            i += 1;
        }
    }

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for end in cuts.into_iter().chain(std::iter::once(unit.len())) {
        let body = unit.get(start + LENGTH_PREFIX_SIZE..end).unwrap_or(&[]);
        let mut piece = Vec::with_capacity(LENGTH_PREFIX_SIZE + body.len());
        piece.extend_from_slice(&(body.len() as u32).to_be_bytes());
        piece.extend_from_slice(body);
        pieces.push(piece);
        start = end;
    }
    pieces
}
