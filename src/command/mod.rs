//! Command routing and the reliable command channel
//!
//! Every command is a line of text. A domain prefix decides where it goes:
//!
//! ```text
//! "endpoint.<cmd>"  -> local queue, prefix stripped
//!                      (relay mode: upstream queue, unchanged)
//! "upstream.<cmd>"  -> upstream queue, prefix stripped
//! "<cmd>"           -> local queue
//! ```
//!
//! The local queue is drained by the device tick and executed in place. The
//! upstream queue feeds the [`CommandChannel`], which keeps at most one
//! command in flight until the peer acknowledges it.

pub mod channel;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::constants::{ENDPOINT_DOMAIN, MAX_COMMAND_LEN, UPSTREAM_DOMAIN};

pub use channel::{CommandChannel, PendingCommand};

/// Target of a queued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Executed by this device
    Endpoint,
    /// Delivered to the upstream peer
    Upstream,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Endpoint => "endpoint",
            Domain::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide the queue and final text for a command
pub fn route(text: &str, relay: bool) -> (Domain, &str) {
    let text = truncate(text, MAX_COMMAND_LEN);
    if let Some(rest) = text.strip_prefix(ENDPOINT_DOMAIN) {
        if relay {
            (Domain::Upstream, text)
        } else {
            (Domain::Endpoint, rest)
        }
    } else if let Some(rest) = text.strip_prefix(UPSTREAM_DOMAIN) {
        (Domain::Upstream, rest)
    } else {
        (Domain::Endpoint, text)
    }
}

/// Cut `text` to at most `max` bytes on a character boundary
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[derive(Debug, Default)]
struct Queues {
    endpoint: VecDeque<String>,
    upstream: VecDeque<String>,
}

impl Queues {
    fn get_mut(&mut self, domain: Domain) -> &mut VecDeque<String> {
        match domain {
            Domain::Endpoint => &mut self.endpoint,
            Domain::Upstream => &mut self.upstream,
        }
    }
}

/// FIFO command queues, one per domain
///
/// The lock is held only for a single push or pop.
#[derive(Debug, Default)]
pub struct CommandQueue {
    queues: Mutex<Queues>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, domain: Domain, text: impl Into<String>) {
        self.lock().get_mut(domain).push_back(text.into());
    }

    pub fn pop(&self, domain: Domain) -> Option<String> {
        self.lock().get_mut(domain).pop_front()
    }

    pub fn len(&self, domain: Domain) -> usize {
        self.lock().get_mut(domain).len()
    }

    pub fn is_empty(&self, domain: Domain) -> bool {
        self.len(domain) == 0
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Cloneable handle for submitting commands from any context
#[derive(Debug, Clone)]
pub struct CommandSender {
    queue: Arc<CommandQueue>,
    relay: bool,
}

impl CommandSender {
    pub fn new(queue: Arc<CommandQueue>, relay: bool) -> Self {
        Self { queue, relay }
    }

    /// Route and enqueue a command, returning the queue it landed in
    pub fn send_command(&self, text: &str) -> Domain {
        let (domain, text) = route(text, self.relay);
        tracing::debug!(domain = %domain, command = text, "Command queued");
        self.queue.push(domain, text);
        domain
    }
}
