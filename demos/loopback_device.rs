//! Loopback device example
//!
//! Run with: cargo run --example loopback_device [SECONDS]
//!
//! Creates a device on an in-memory transport, streams one MJPEG frame and
//! drives it through the same command records a remote viewer would send.
//! At the end the packets the device produced are summarized by payload type.
//!
//! Set `RUST_LOG=panostream=debug` for per-command logging.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use panostream::device::{EncodedSink, EncoderParams, RenderPass};
use panostream::frame::FrameInfo;
use panostream::{
    CommandRecord, Device, DeviceConfig, DeviceContext, Encoder, MemoryTransport, PayloadType,
    ReceivedPacket, Renderer, ViewSource,
};

/// Horizontal gradient shifted by the view yaw
struct GradientRenderer;

impl Renderer for GradientRenderer {
    fn name(&self) -> &str {
        "EQUIRECTANGULAR"
    }

    fn render(&self, pass: &RenderPass, out: &mut [u8]) -> panostream::Result<()> {
        let shift = (pass.view_quat[1] * 255.0) as u8;
        for (i, px) in out.chunks_mut(3).enumerate() {
            let x = (i % pass.width as usize) as u8;
            px.copy_from_slice(&[x.wrapping_add(shift), 0x80, 0xFF - x]);
        }
        Ok(())
    }
}

/// Wraps the first bytes of every picture in JPEG markers
#[derive(Default)]
struct StubJpegEncoder {
    sink: Option<EncodedSink>,
}

impl Encoder for StubJpegEncoder {
    fn init(&mut self, params: EncoderParams, sink: EncodedSink) -> panostream::Result<()> {
        println!(
            "Encoder for frame {}: {}x{} {} kbps",
            params.frame_id, params.width, params.height, params.kbps
        );
        self.sink = Some(sink);
        Ok(())
    }

    fn add_frame(&mut self, pixels: &[u8], info: Option<FrameInfo>) -> panostream::Result<()> {
        if let Some(ref sink) = self.sink {
            let mut jpeg = vec![0xFF, 0xD8];
            jpeg.extend_from_slice(&pixels[..pixels.len().min(4000)]);
            jpeg.extend_from_slice(&[0xFF, 0xD9]);
            sink.submit(jpeg, info);
        }
        Ok(())
    }

    fn release(&mut self) {
        self.sink = None;
    }
}

/// Orientation set only by `set_view_quaternion`
struct ManualView(Mutex<[f32; 4]>);

impl ViewSource for ManualView {
    fn name(&self) -> &str {
        "manual"
    }

    fn quaternion(&self) -> [f32; 4] {
        *self.0.lock().unwrap()
    }

    fn set_quaternion(&self, quat: [f32; 4]) {
        *self.0.lock().unwrap() = quat;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("panostream=info".parse()?),
        )
        .init();

    let seconds: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);

    let mut context = DeviceContext::new();
    context.register_renderer(GradientRenderer);
    context.register_encoder("mjpeg", || -> Box<dyn Encoder> { Box::<StubJpegEncoder>::default() });
    context.register_view_source(ManualView(Mutex::new([0.0, 0.0, 0.0, 1.0])));

    let config = DeviceConfig::default().default_view_source("manual");
    let transport = Arc::new(MemoryTransport::new(config.max_payload_size));
    let mut device = Device::new(config, context, transport.clone())?;

    // Commands arrive as records on the command payload type, like a viewer sends them
    let sink = device.packet_sink();
    let commands = [
        "create_frame -w 320 -h 240 -s mjpeg -f 15",
        "set_view_quaternion id=0 quat=0,0.3,0,0.95 client_key=demo",
    ];
    for (seq, text) in commands.iter().enumerate() {
        let record = CommandRecord::new(seq as u32 + 1, *text).encode();
        sink.deliver(ReceivedPacket::new(
            PayloadType::COMMAND,
            record.into_bytes(),
            seq as u32 + 1,
        ));
    }

    device
        .run_until(tokio::time::sleep(Duration::from_secs(seconds)))
        .await;

    let mut summary: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for packet in transport.sent() {
        let entry = summary.entry(packet.payload_type.to_string()).or_default();
        entry.0 += 1;
        entry.1 += packet.payload.len();
    }
    for (payload_type, (packets, bytes)) in summary {
        println!("{:>8}: {} packets, {} bytes", payload_type, packets, bytes);
    }
    println!("Link: {:?}", device.stats());

    Ok(())
}
