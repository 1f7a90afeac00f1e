//! Status publish/subscribe
//!
//! Telemetry is exchanged as named text values. A device registers
//! *statuses* (getters it publishes periodically) and *watches* (setters
//! invoked when the peer publishes a matching name). Received names are
//! qualified with the upstream marker before matching, so a peer's
//! `quaternion` lands on the local watch `upstream.quaternion`.
//!
//! Registrations live for the whole process; there is no removal.

pub mod publisher;
pub mod subscriber;

use crate::error::StatusError;
use crate::protocol::constants::MAX_STATUS_NAME_LEN;

pub use publisher::{pack_records, StatusPublisher};
pub use subscriber::dispatch;

type Getter = Box<dyn Fn() -> String + Send + Sync>;
type Setter = Box<dyn Fn(&str) + Send + Sync>;

/// A published value
pub struct StatusEntry {
    pub name: String,
    getter: Getter,
}

impl StatusEntry {
    pub fn value(&self) -> String {
        (self.getter)()
    }
}

impl std::fmt::Debug for StatusEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusEntry").field("name", &self.name).finish()
    }
}

/// A subscription to a peer value
pub struct WatchEntry {
    pub name: String,
    setter: Setter,
}

impl WatchEntry {
    pub fn set(&self, value: &str) {
        (self.setter)(value)
    }
}

impl std::fmt::Debug for WatchEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchEntry").field("name", &self.name).finish()
    }
}

/// Registered statuses and watches, in registration order
#[derive(Debug, Default)]
pub struct StatusRegistry {
    statuses: Vec<StatusEntry>,
    watches: Vec<WatchEntry>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a status published under `name`
    pub fn register_status<F>(&mut self, name: &str, getter: F) -> Result<(), StatusError>
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        check_name(name)?;
        if self.statuses.iter().any(|e| e.name == name) {
            return Err(StatusError::Duplicate(name.to_string()));
        }
        self.statuses.push(StatusEntry {
            name: name.to_string(),
            getter: Box::new(getter),
        });
        tracing::debug!(name = name, "Status registered");
        Ok(())
    }

    /// Register a watch invoked for received values named `name`
    pub fn register_watch<F>(&mut self, name: &str, setter: F) -> Result<(), StatusError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        check_name(name)?;
        if self.watches.iter().any(|e| e.name == name) {
            return Err(StatusError::Duplicate(name.to_string()));
        }
        self.watches.push(WatchEntry {
            name: name.to_string(),
            setter: Box::new(setter),
        });
        tracing::debug!(name = name, "Watch registered");
        Ok(())
    }

    pub fn statuses(&self) -> &[StatusEntry] {
        &self.statuses
    }

    pub fn watches(&self) -> &[WatchEntry] {
        &self.watches
    }

    pub fn watch(&self, name: &str) -> Option<&WatchEntry> {
        self.watches.iter().find(|e| e.name == name)
    }

    pub fn status(&self, name: &str) -> Option<&StatusEntry> {
        self.statuses.iter().find(|e| e.name == name)
    }
}

fn check_name(name: &str) -> Result<(), StatusError> {
    if name.len() > MAX_STATUS_NAME_LEN {
        return Err(StatusError::NameTooLong {
            name: name.to_string(),
            limit: MAX_STATUS_NAME_LEN,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_register_and_read_status() {
        let mut registry = StatusRegistry::new();
        registry
            .register_status("north", || "12.000000".to_string())
            .unwrap();
        assert_eq!(registry.status("north").unwrap().value(), "12.000000");
        assert!(registry.status("south").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = StatusRegistry::new();
        registry.register_status("a", String::new).unwrap();
        assert_eq!(
            registry.register_status("a", String::new),
            Err(StatusError::Duplicate("a".into()))
        );
        registry.register_watch("a", |_| {}).unwrap();
        assert!(registry.register_watch("a", |_| {}).is_err());
    }

    #[test]
    fn test_long_name_rejected() {
        let mut registry = StatusRegistry::new();
        let name = "x".repeat(MAX_STATUS_NAME_LEN + 1);
        assert!(matches!(
            registry.register_watch(&name, |_| {}),
            Err(StatusError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_watch_setter_invoked() {
        let mut registry = StatusRegistry::new();
        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        registry
            .register_watch("upstream.compass", move |v| {
                *sink.lock().unwrap() = v.to_string();
            })
            .unwrap();

        registry.watch("upstream.compass").unwrap().set("1,2,3");
        assert_eq!(*seen.lock().unwrap(), "1,2,3");
    }
}
