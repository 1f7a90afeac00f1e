//! Reliable single-flight command channel
//!
//! ```text
//!            dequeue (new id)                ack == id
//!   Idle ───────────────────────► InFlight ───────────► Idle
//!                                  │    ▲
//!                                  └────┘ resend every retry interval
//! ```
//!
//! Only one upstream command is outstanding at a time, so commands are
//! delivered in order. There is no retry limit. The peer acknowledges by
//! publishing the id of the last command it processed as a status value; the
//! receiving side rejects a command whose id equals the one it processed
//! last.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{route, CommandQueue, CommandSender, Domain};
use crate::error::Result;
use crate::protocol::{CommandRecord, PayloadType};
use crate::transport::Transport;

/// The command currently awaiting acknowledgement
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub id: u32,
    pub text: String,
    wire: String,
    pub last_sent: Instant,
}

/// Sender side and receive-side dedupe of the command protocol
#[derive(Debug)]
pub struct CommandChannel {
    queue: Arc<CommandQueue>,
    relay: bool,
    retry_interval: Duration,
    next_id: u32,
    pending: Option<PendingCommand>,
    /// Last id acknowledged by the upstream peer
    upstream_ack: Arc<AtomicI64>,
    /// Last id received and processed from the peer
    last_received: Arc<AtomicI64>,
    retransmissions: u64,
}

impl CommandChannel {
    pub fn new(queue: Arc<CommandQueue>, retry_interval: Duration, relay: bool) -> Self {
        Self {
            queue,
            relay,
            retry_interval,
            next_id: 1,
            pending: None,
            upstream_ack: Arc::new(AtomicI64::new(-1)),
            last_received: Arc::new(AtomicI64::new(-1)),
            retransmissions: 0,
        }
    }

    /// Handle that enqueues into this channel's queues
    pub fn sender(&self) -> CommandSender {
        CommandSender::new(Arc::clone(&self.queue), self.relay)
    }

    /// Route and enqueue a command
    pub fn send_command(&self, text: &str) -> Domain {
        let (domain, text) = route(text, self.relay);
        self.queue.push(domain, text);
        domain
    }

    /// Record an acknowledgement from the peer
    pub fn acknowledge(&self, id: u32) {
        self.upstream_ack.store(i64::from(id), Ordering::Release);
    }

    /// Shared acknowledgement cell, written by the `upstream.ack_command_id` watch
    pub fn ack_handle(&self) -> Arc<AtomicI64> {
        Arc::clone(&self.upstream_ack)
    }

    /// Shared cell holding the last processed received id
    pub fn received_handle(&self) -> Arc<AtomicI64> {
        Arc::clone(&self.last_received)
    }

    /// Id of the last received command, or -1 before any
    pub fn last_received_id(&self) -> i64 {
        self.last_received.load(Ordering::Acquire)
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// One step of the sender state machine
    pub fn tick(&mut self, now: Instant, transport: &dyn Transport) -> Result<()> {
        let acked = self.upstream_ack.load(Ordering::Acquire);
        if let Some(ref pending) = self.pending {
            if i64::from(pending.id) == acked {
                tracing::debug!(id = pending.id, command = %pending.text, "Command acknowledged");
                self.pending = None;
            }
        }

        if let Some(ref mut pending) = self.pending {
            if now.saturating_duration_since(pending.last_sent) < self.retry_interval {
                return Ok(());
            }
            pending.last_sent = now;
            self.retransmissions += 1;
            tracing::debug!(id = pending.id, "Command retransmitted");
            transport.send(pending.wire.as_bytes(), PayloadType::COMMAND)?;
            transport.flush()?;
            return Ok(());
        }

        let Some(text) = self.queue.pop(Domain::Upstream) else {
            return Ok(());
        };

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        let wire = CommandRecord::new(id, text.as_str()).encode();

        tracing::debug!(id = id, command = %text, "Command sent");
        self.pending = Some(PendingCommand {
            id,
            text,
            wire,
            last_sent: now,
        });

        // Stays pending on failure and goes out again after the retry interval
        if let Some(ref pending) = self.pending {
            transport.send(pending.wire.as_bytes(), PayloadType::COMMAND)?;
            transport.flush()?;
        }
        Ok(())
    }

    /// Handle a received command packet
    ///
    /// Returns the id when the command was accepted, `None` for a repeat.
    pub fn on_command_packet(&self, payload: &[u8]) -> Result<Option<u32>> {
        let record = CommandRecord::parse(payload)?;
        if i64::from(record.id) == self.last_received.load(Ordering::Acquire) {
            tracing::debug!(id = record.id, "Duplicate command ignored");
            return Ok(None);
        }
        self.last_received
            .store(i64::from(record.id), Ordering::Release);

        let domain = self.send_command(&record.value);
        tracing::debug!(id = record.id, domain = %domain, command = %record.value, "Command received");
        Ok(Some(record.id))
    }

    /// Take up to `max` local commands for execution
    pub fn drain_local(&self, max: usize) -> Vec<String> {
        let mut commands = Vec::new();
        while commands.len() < max {
            match self.queue.pop(Domain::Endpoint) {
                Some(command) => commands.push(command),
                None => break,
            }
        }
        commands
    }
}
