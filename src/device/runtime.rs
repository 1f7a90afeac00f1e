//! Device main loop
//!
//! One tick does, in order:
//!
//! ```text
//!  1. drain received packets    status → watches, command → channel,
//!                               camera → decoder
//!  2. execute local commands    (bounded per tick)
//!  3. advance frames            render, encode
//!  4. multiplex encoder output  transport and/or recording files
//!  5. command channel step      send / retransmit / acknowledge
//!  6. publish statuses          (rate limited)
//! ```
//!
//! A failure in one step is logged and the tick carries on.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Notify};
use tokio::time::MissedTickBehavior;

use super::telemetry::{self, TelemetryHandle};
use super::traits::{Decoder, DecoderParams, EncodedUnit};
use super::{DeviceConfig, DeviceContext};
use crate::command::{CommandChannel, CommandQueue, CommandSender};
use crate::error::{Error, FrameError, Result};
use crate::frame::{FrameCommand, FramePipeline};
use crate::media::Codec;
use crate::protocol::{PayloadType, SequenceTracker};
use crate::stats::LinkStats;
use crate::status::{self, StatusPublisher, StatusRegistry};
use crate::transport::{PacketSink, ReceivedPacket, Transport};

/// A panoramic camera device endpoint
pub struct Device {
    config: DeviceConfig,
    context: DeviceContext,
    transport: Arc<dyn Transport>,
    pipeline: FramePipeline,
    channel: CommandChannel,
    registry: StatusRegistry,
    publisher: StatusPublisher,
    encoded_rx: mpsc::Receiver<EncodedUnit>,
    packet_rx: mpsc::Receiver<ReceivedPacket>,
    packet_sink: PacketSink,
    sequence: SequenceTracker,
    decoders: BTreeMap<u8, Box<dyn Decoder>>,
    telemetry: TelemetryHandle,
    stats: LinkStats,
    frame_arrival: Arc<Notify>,
}

impl Device {
    /// Create a device sending through `transport`
    ///
    /// Registers the built-in statuses and `upstream.*` watches.
    pub fn new(
        config: DeviceConfig,
        context: DeviceContext,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let (encoded_tx, encoded_rx) = mpsc::channel(config.encoded_queue_capacity.max(1));
        let (packet_sink, packet_rx) = PacketSink::channel(config.receive_queue_capacity);

        let channel = CommandChannel::new(
            Arc::new(CommandQueue::new()),
            config.command_retry_interval,
            config.relay,
        );

        let mut device = Self {
            pipeline: FramePipeline::new(config.clone(), encoded_tx),
            publisher: StatusPublisher::new(config.status_interval),
            config,
            context,
            transport,
            channel,
            registry: StatusRegistry::new(),
            encoded_rx,
            packet_rx,
            packet_sink,
            sequence: SequenceTracker::new(),
            decoders: BTreeMap::new(),
            telemetry: TelemetryHandle::default(),
            stats: LinkStats::new(),
            frame_arrival: Arc::new(Notify::new()),
        };
        device.register_default_statuses()?;

        tracing::info!(
            max_payload_size = device.transport.max_payload_size(),
            relay = device.config.relay,
            frame_sync = device.config.frame_sync,
            "Device created"
        );
        Ok(device)
    }

    fn register_default_statuses(&mut self) -> Result<()> {
        let received = self.channel.received_handle();
        self.registry.register_status("ack_command_id", move || {
            received.load(Ordering::Acquire).to_string()
        })?;

        let next_id = self.pipeline.next_id_handle();
        self.registry.register_status("next_frame_id", move || {
            next_id.load(Ordering::Relaxed).to_string()
        })?;

        let view = self
            .config
            .default_view_source
            .as_deref()
            .and_then(|name| self.context.view_source(name));
        let quat_view = view.clone();
        self.registry.register_status("quaternion", move || {
            let [x, y, z, w] = quat_view
                .as_ref()
                .map(|v| v.quaternion())
                .unwrap_or([0.0, 0.0, 0.0, 1.0]);
            format!("{:.6},{:.6},{:.6},{:.6}", x, y, z, w)
        })?;
        self.registry.register_status("north", move || {
            let north = view.as_ref().map(|v| v.north()).unwrap_or(0.0);
            format!("{:.6}", north)
        })?;

        telemetry::register_watches(&mut self.registry, &self.telemetry, self.channel.ack_handle())?;
        Ok(())
    }

    /// Handle the transport receive context delivers packets into
    pub fn packet_sink(&self) -> PacketSink {
        self.packet_sink.clone()
    }

    /// Handle for enqueueing commands from other tasks
    pub fn command_sender(&self) -> CommandSender {
        self.channel.sender()
    }

    /// Route and enqueue a command
    pub fn send_command(&self, text: &str) {
        self.channel.send_command(text);
    }

    /// Notified by the capture side whenever a camera picture arrives
    pub fn frame_arrival(&self) -> Arc<Notify> {
        Arc::clone(&self.frame_arrival)
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    /// Registry for application statuses and watches
    pub fn registry_mut(&mut self) -> &mut StatusRegistry {
        &mut self.registry
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut FramePipeline {
        &mut self.pipeline
    }

    pub fn telemetry(&self) -> TelemetryHandle {
        Arc::clone(&self.telemetry)
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Attach a decoder of `kind` to camera slot `camera`
    pub fn attach_decoder(&mut self, camera: u8, kind: &str) -> Result<()> {
        let mut decoder = self
            .context
            .create_decoder(kind)
            .ok_or_else(|| Error::collaborator("decoder", format!("no decoder registered for {}", kind)))?;
        decoder.init(DecoderParams {
            camera,
            codec: Codec::from_name(kind).unwrap_or_default(),
            texture_size: self.context.texture_size_handle(),
        })?;
        if let Some(mut old) = self.decoders.insert(camera, decoder) {
            old.release();
        }
        tracing::info!(camera = camera, kind = kind, "Decoder attached");
        Ok(())
    }

    /// Run one iteration of the main loop
    pub fn tick(&mut self, now: Instant) {
        self.step(now, true);
    }

    /// One iteration; `frames == false` leaves frame processing out and
    /// keeps the control plane running
    fn step(&mut self, now: Instant, frames: bool) {
        self.drain_packets();
        self.run_local_commands();

        if frames {
            self.pipeline.tick(now, &self.context);
            self.drain_encoded();
        }

        if let Err(e) = self.channel.tick(now, self.transport.as_ref()) {
            tracing::warn!(error = %e, "Command channel step failed");
        }

        match self
            .publisher
            .publish(now, &self.registry, self.transport.as_ref())
        {
            Ok(packets) => self.stats.status_packets += packets as u64,
            Err(e) => tracing::warn!(error = %e, "Status publication failed"),
        }

        self.stats.retransmissions = self.channel.retransmissions();
        self.stats.dropped_units = self.pipeline.dropped_units();
    }

    fn drain_packets(&mut self) {
        while let Ok(packet) = self.packet_rx.try_recv() {
            self.stats.packets_received += 1;
            if let Some(gap) = self.sequence.observe(packet.seq) {
                self.stats.packets_lost += u64::from(gap.missing());
                tracing::warn!(
                    last = gap.last,
                    received = gap.received,
                    missing = gap.missing(),
                    "Packet loss detected"
                );
            }

            match packet.payload_type {
                PayloadType::STATUS => {
                    status::dispatch(&self.registry, &packet.payload);
                }
                PayloadType::COMMAND => {
                    if let Err(e) = self.channel.on_command_packet(&packet.payload) {
                        tracing::warn!(error = %e, "Rejected command packet");
                    }
                }
                pt if pt.is_camera() => {
                    let camera = pt.0 - PayloadType::CAMERA_BASE.0;
                    match self.decoders.get_mut(&camera) {
                        Some(decoder) => {
                            if let Err(e) = decoder.decode(&packet.payload) {
                                tracing::warn!(camera = camera, error = %e, "Decode failed");
                            }
                        }
                        None => tracing::trace!(camera = camera, "No decoder for camera"),
                    }
                }
                pt => tracing::debug!(payload_type = %pt, "Unhandled payload type"),
            }
        }
    }

    fn run_local_commands(&mut self) {
        for line in self.channel.drain_local(self.config.local_commands_per_tick) {
            let result = FrameCommand::parse(&line)
                .map_err(Error::from)
                .and_then(|command| self.pipeline.execute(command, &self.context));
            match result {
                Ok(()) => tracing::debug!(command = %line, "Command executed"),
                Err(Error::Frame(FrameError::UnknownCommand(name))) => {
                    tracing::warn!(command = %name, "Unknown command")
                }
                Err(e) => tracing::warn!(command = %line, error = %e, "Command failed"),
            }
        }
    }

    fn drain_encoded(&mut self) {
        while let Ok(unit) = self.encoded_rx.try_recv() {
            let frame_id = unit.frame_id;
            if let Err(e) = self.pipeline.mux_encoded(unit, self.transport.as_ref()) {
                tracing::warn!(frame_id = %frame_id, error = %e, "Multiplexing failed");
            }
        }
    }

    /// Run the main loop until `shutdown` resolves
    ///
    /// With frame sync enabled each tick waits for a capture arrival, up to
    /// the configured timeout. A tick whose wait times out skips frame
    /// processing but still serves commands and statuses.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(tick_ms = self.config.tick_interval.as_millis() as u64, "Device running");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                _ = interval.tick() => {
                    let mut frames = true;
                    if self.config.frame_sync {
                        let arrival = Arc::clone(&self.frame_arrival);
                        frames = tokio::time::timeout(
                            self.config.frame_sync_timeout,
                            arrival.notified(),
                        )
                        .await
                        .is_ok();
                        if !frames {
                            tracing::trace!("No capture arrival, frames skipped");
                        }
                    }
                    self.step(Instant::now(), frames);
                }
            }
        }

        self.shutdown();
    }

    /// Delete every frame and release the decoders
    pub fn shutdown(&mut self) {
        self.pipeline.clear();
        for (_, mut decoder) in std::mem::take(&mut self.decoders) {
            decoder.release();
        }
        tracing::info!(
            packets_received = self.stats.packets_received,
            packets_lost = self.stats.packets_lost,
            loss_ratio = self.stats.loss_ratio(),
            "Device stopped"
        );
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .field("stats", &self.stats)
            .finish()
    }
}
