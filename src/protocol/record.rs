//! Status and command records
//!
//! Encoding is plain formatting. Decoding is deliberately lenient: a status
//! packet is scanned for every `<` and each position that starts a well
//! formed record yields one entry; anything else is skipped so that peers
//! running a newer record set do not break older ones.

use std::fmt;

use crate::error::ProtocolError;

use super::constants::{MAX_RECORD_VALUE_LEN, MAX_STATUS_NAME_LEN, NAMESPACE};

/// One named status value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub name: String,
    pub value: String,
}

impl StatusRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Serialized record bytes
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Extract every status record embedded in a packet, in order
    pub fn parse_all(payload: &[u8]) -> Vec<StatusRecord> {
        let mut records = Vec::new();
        for (start, _) in payload.iter().enumerate().filter(|(_, b)| **b == b'<') {
            let mut scanner = Scanner::new(&payload[start..]);
            if let Some(record) = Self::scan(&mut scanner) {
                records.push(record);
            }
        }
        records
    }

    fn scan(scanner: &mut Scanner<'_>) -> Option<StatusRecord> {
        scanner.literal(b"<")?;
        scanner.literal(NAMESPACE.as_bytes())?;
        scanner.literal(b":status name=\"")?;
        let name = scanner.quoted(MAX_STATUS_NAME_LEN)?;
        scanner.literal(b" value=\"")?;
        let value = scanner.quoted_prefix(MAX_RECORD_VALUE_LEN)?;
        Some(StatusRecord { name, value })
    }
}

impl fmt::Display for StatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}:status name=\"{}\" value=\"{}\" />",
            NAMESPACE, self.name, self.value
        )
    }
}

/// One command with its delivery id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub id: u32,
    pub value: String,
}

impl CommandRecord {
    pub fn new(id: u32, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    /// Serialized record bytes
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse the command record at the start of a packet
    pub fn parse(payload: &[u8]) -> Result<CommandRecord, ProtocolError> {
        let mut scanner = Scanner::new(payload);
        let malformed = || {
            ProtocolError::MalformedRecord(String::from_utf8_lossy(payload).into_owned())
        };

        scanner.literal(b"<").ok_or_else(malformed)?;
        scanner
            .literal(NAMESPACE.as_bytes())
            .ok_or_else(malformed)?;
        scanner
            .literal(b":command id=\"")
            .ok_or_else(malformed)?;
        let id = scanner.number().ok_or_else(malformed)?;
        scanner.literal(b"\" value=\"").ok_or_else(malformed)?;
        let value = scanner
            .quoted_prefix(MAX_RECORD_VALUE_LEN)
            .ok_or_else(malformed)?;

        Ok(CommandRecord { id, value })
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}:command id=\"{}\" value=\"{}\" />",
            NAMESPACE, self.id, self.value
        )
    }
}

/// Byte cursor for the fixed record grammar
struct Scanner<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Scanner<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    fn literal(&mut self, expected: &[u8]) -> Option<()> {
        if self.rest().starts_with(expected) {
            self.offset += expected.len();
            Some(())
        } else {
            None
        }
    }

    /// Text up to the next `"`, consuming the quote
    fn quoted(&mut self, max_len: usize) -> Option<String> {
        let rest = self.rest();
        let end = rest.iter().position(|b| *b == b'"')?;
        if end > max_len {
            return None;
        }
        let text = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.offset += end + 1;
        Some(text)
    }

    /// Like [`quoted`](Self::quoted), but keeps only the first `max_len`
    /// bytes of a longer text instead of failing
    fn quoted_prefix(&mut self, max_len: usize) -> Option<String> {
        let rest = self.rest();
        let end = rest.iter().position(|b| *b == b'"')?;
        let mut keep = end.min(max_len);
        if let Ok(text) = std::str::from_utf8(&rest[..end]) {
            while !text.is_char_boundary(keep) {
                keep -= 1;
            }
        }
        let text = String::from_utf8_lossy(&rest[..keep]).into_owned();
        self.offset += end + 1;
        Some(text)
    }

    fn number(&mut self) -> Option<u32> {
        let rest = self.rest();
        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let text = std::str::from_utf8(&rest[..digits]).ok()?;
        let value = text.parse().ok()?;
        self.offset += digits;
        Some(value)
    }
}
