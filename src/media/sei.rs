//! Per-frame metadata unit
//!
//! Every dispatched unit in streaming mode is preceded by an SEI unit
//! carrying an ASCII tag. Picture units that consume a pending
//! [`FrameInfo`] get the full tag:
//!
//! ```text
//! <picam360:frame frame_id="ID" mode="RENDERER" view_quat="x,y,z,w"
//!   fov="F" client_key="K" server_key="MS" idle_time="S"
//!   frame_processed="S" encoded="S" />
//! ```
//!
//! All other units get `<picam360:frame frame_id="ID" />`. The SEI unit is
//! length-prefixed like any other unit; the length covers the one-byte
//! header and the tag.

use std::time::Instant;

use super::{h264, h265, Codec};
use crate::frame::{FrameId, FrameInfo};
use crate::protocol::constants::NAMESPACE;

/// Build the metadata tag for one unit
pub fn frame_tag(
    frame_id: FrameId,
    renderer: &str,
    info: Option<&FrameInfo>,
    encoded_at: Instant,
) -> String {
    match info {
        Some(info) => {
            let latencies = info.latencies(encoded_at);
            let [x, y, z, w] = info.view_quat;
            format!(
                "<{ns}:frame frame_id=\"{id}\" mode=\"{mode}\" view_quat=\"{x:.3},{y:.3},{z:.3},{w:.3}\" fov=\"{fov:.3}\" client_key=\"{key}\" server_key=\"{server_key}\" idle_time=\"{idle:.3}\" frame_processed=\"{processed:.3}\" encoded=\"{encoded:.3}\" />",
                ns = NAMESPACE,
                id = frame_id,
                mode = renderer,
                fov = info.fov,
                key = info.client_key,
                server_key = info.server_key_ms(),
                idle = latencies.idle.as_secs_f32(),
                processed = latencies.processed.as_secs_f32(),
                encoded = latencies.encoded.as_secs_f32(),
            )
        }
        None => format!("<{}:frame frame_id=\"{}\" />", NAMESPACE, frame_id),
    }
}

/// Length-prefixed SEI unit wrapping `tag`
pub fn sei_unit(codec: Codec, tag: &str) -> Vec<u8> {
    let header = match codec {
        Codec::H265 => h265::SEI_HEADER,
        _ => h264::SEI_HEADER,
    };
    let len = (tag.len() + 1) as u32;
    let mut unit = Vec::with_capacity(4 + len as usize);
    unit.extend_from_slice(&len.to_be_bytes());
    unit.push(header);
    unit.extend_from_slice(tag.as_bytes());
    unit
}

/// Stream delimiters `(start, end)` for a codec
pub fn markers(codec: Codec) -> ([u8; 2], [u8; 2]) {
    match codec {
        Codec::H265 => (h265::START_MARKER, h265::END_MARKER),
        _ => (h264::START_MARKER, h264::END_MARKER),
    }
}
