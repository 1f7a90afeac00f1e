//! Frame creation options
//!
//! Parsed from the argument string of `create_frame`:
//!
//! ```text
//! create_frame [-w W] [-h H] [-m RENDERER] [-o PATH] [-s CODEC]
//!              [-f FPS] [-k KBPS] [-v VIEW_SOURCE]
//! ```
//!
//! `-o` records to a file; `-s` streams with the named encoder.

use std::path::PathBuf;

use crate::error::FrameError;

/// Default render width and height
pub const DEFAULT_RENDER_SIZE: u32 = 512;

/// Default field of view in degrees
pub const DEFAULT_FOV: f32 = 120.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FrameOptions {
    pub width: u32,
    pub height: u32,
    /// Renderer name; the first registered renderer when unset
    pub renderer: Option<String>,
    /// Recording file path
    pub output: Option<PathBuf>,
    /// Encoder kind to stream with
    pub stream: Option<String>,
    /// View source name; the configured default when unset
    pub view_source: Option<String>,
    /// 0 renders on every tick
    pub fps: f32,
    /// 0 derives the rate from the bitrate ladder
    pub kbps: u32,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_RENDER_SIZE,
            height: DEFAULT_RENDER_SIZE,
            renderer: None,
            output: None,
            stream: None,
            view_source: None,
            fps: 0.0,
            kbps: 0,
        }
    }
}

impl FrameOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `create_frame` arguments
    pub fn parse(args: &str) -> Result<Self, FrameError> {
        let mut options = Self::default();
        for (flag, value) in parse_flags(args, "whmosfkv")? {
            match flag {
                'w' => options.width = parse_value(flag, &value)?,
                'h' => options.height = parse_value(flag, &value)?,
                'm' => options.renderer = Some(value),
                'o' => options.output = Some(PathBuf::from(value)),
                's' => options.stream = Some(value),
                'f' => options.fps = parse_value(flag, &value)?,
                'k' => options.kbps = parse_value(flag, &value)?,
                'v' => options.view_source = Some(value),
                _ => {}
            }
        }
        Ok(options)
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn renderer(mut self, name: impl Into<String>) -> Self {
        self.renderer = Some(name.into());
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn stream(mut self, encoder: impl Into<String>) -> Self {
        self.stream = Some(encoder.into());
        self
    }

    pub fn fps(mut self, fps: f32) -> Self {
        self.fps = fps;
        self
    }

    pub fn kbps(mut self, kbps: u32) -> Self {
        self.kbps = kbps;
        self
    }

    pub fn view_source(mut self, name: impl Into<String>) -> Self {
        self.view_source = Some(name.into());
        self
    }
}

/// Split `-x VALUE` / `-xVALUE` flags
///
/// Every flag listed in `valued` takes a value. Other flags and bare words
/// are skipped.
pub(crate) fn parse_flags(args: &str, valued: &str) -> Result<Vec<(char, String)>, FrameError> {
    let mut flags = Vec::new();
    let mut tokens = args.split_whitespace();
    while let Some(token) = tokens.next() {
        let Some(rest) = token.strip_prefix('-') else {
            continue;
        };
        let mut chars = rest.chars();
        let Some(flag) = chars.next() else {
            continue;
        };
        if !valued.contains(flag) {
            continue;
        }
        let inline = chars.as_str();
        let value = if inline.is_empty() {
            tokens
                .next()
                .ok_or_else(|| FrameError::InvalidOption(format!("-{} needs a value", flag)))?
        } else {
            inline
        };
        flags.push((flag, value.to_string()));
    }
    Ok(flags)
}

pub(crate) fn parse_value<T: std::str::FromStr>(flag: char, value: &str) -> Result<T, FrameError> {
    value
        .parse()
        .map_err(|_| FrameError::InvalidOption(format!("-{} {}", flag, value)))
}
