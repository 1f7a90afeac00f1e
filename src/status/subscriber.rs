//! Received status dispatch

use super::StatusRegistry;
use crate::protocol::constants::UPSTREAM_DOMAIN;
use crate::protocol::StatusRecord;

/// Apply every status record in `payload` to the matching watch
///
/// Returns the number of records that matched a watch.
pub fn dispatch(registry: &StatusRegistry, payload: &[u8]) -> usize {
    let mut matched = 0;
    for record in StatusRecord::parse_all(payload) {
        let name = format!("{}{}", UPSTREAM_DOMAIN, record.name);
        match registry.watch(&name) {
            Some(watch) => {
                watch.set(&record.value);
                matched += 1;
            }
            None => tracing::trace!(name = %name, "Unwatched status ignored"),
        }
    }
    matched
}
