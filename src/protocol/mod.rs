//! Control-plane wire protocol
//!
//! Commands and status telemetry travel as single-line ASCII records over the
//! same lossy transport that carries video:
//!
//! ```text
//! <picam360:status name="NAME" value="VALUE" />
//! <picam360:command id="N" value="TEXT" />
//! ```
//!
//! Values are not escaped and must not contain `"`. Several status records
//! may be packed back to back into one packet; a command packet carries
//! exactly one record.

pub mod constants;
pub mod record;
pub mod sequence;

pub use constants::PayloadType;
pub use record::{CommandRecord, StatusRecord};
pub use sequence::{SequenceGap, SequenceTracker};
