//! Telemetry published by the upstream peer

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::StatusError;
use crate::status::StatusRegistry;

/// Last values received from upstream
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamTelemetry {
    /// Camera orientation (x, y, z, w)
    pub camera_quaternion: [f32; 4],
    pub compass: [f32; 4],
    pub temperature: f32,
    /// Link bandwidth reported by the camera side
    pub bandwidth: f32,
    pub cam_fps: [f32; 2],
    pub cam_frameskip: [f32; 2],
}

impl Default for UpstreamTelemetry {
    fn default() -> Self {
        Self {
            camera_quaternion: [0.0, 0.0, 0.0, 1.0],
            compass: [0.0; 4],
            temperature: 0.0,
            bandwidth: 0.0,
            cam_fps: [0.0; 2],
            cam_frameskip: [0.0; 2],
        }
    }
}

/// Shared handle updated by the upstream watches
pub type TelemetryHandle = Arc<RwLock<UpstreamTelemetry>>;

/// Parse exactly `N` comma-separated floats
fn parse_floats<const N: usize>(value: &str) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    let mut parts = value.split(',');
    for slot in out.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts.next().is_none().then_some(out)
}

fn update<F>(telemetry: &TelemetryHandle, name: &str, value: &str, apply: F)
where
    F: FnOnce(&mut UpstreamTelemetry, &str) -> Option<()>,
{
    let mut guard = telemetry.write().unwrap_or_else(|e| e.into_inner());
    if apply(&mut guard, value).is_none() {
        tracing::debug!(name = name, value = value, "Unparseable telemetry value");
    }
}

/// Register the `upstream.*` watches
///
/// `ack` receives the id the peer reports as its last processed command.
pub fn register_watches(
    registry: &mut StatusRegistry,
    telemetry: &TelemetryHandle,
    ack: Arc<AtomicI64>,
) -> Result<(), StatusError> {
    registry.register_watch("upstream.ack_command_id", move |value| {
        match value.trim().parse::<i64>() {
            Ok(id) => ack.store(id, Ordering::Release),
            Err(_) => tracing::debug!(value = value, "Invalid ack id"),
        }
    })?;

    let t = Arc::clone(telemetry);
    registry.register_watch("upstream.quaternion", move |value| {
        update(&t, "quaternion", value, |tm, v| {
            tm.camera_quaternion = parse_floats(v)?;
            Some(())
        })
    })?;

    let t = Arc::clone(telemetry);
    registry.register_watch("upstream.compass", move |value| {
        update(&t, "compass", value, |tm, v| {
            tm.compass = parse_floats(v)?;
            Some(())
        })
    })?;

    let t = Arc::clone(telemetry);
    registry.register_watch("upstream.temperature", move |value| {
        update(&t, "temperature", value, |tm, v| {
            tm.temperature = v.trim().parse().ok()?;
            Some(())
        })
    })?;

    let t = Arc::clone(telemetry);
    registry.register_watch("upstream.bandwidth", move |value| {
        update(&t, "bandwidth", value, |tm, v| {
            tm.bandwidth = v.trim().parse().ok()?;
            Some(())
        })
    })?;

    let t = Arc::clone(telemetry);
    registry.register_watch("upstream.cam_fps", move |value| {
        update(&t, "cam_fps", value, |tm, v| {
            tm.cam_fps = parse_floats(v)?;
            Some(())
        })
    })?;

    let t = Arc::clone(telemetry);
    registry.register_watch("upstream.cam_frameskip", move |value| {
        update(&t, "cam_frameskip", value, |tm, v| {
            tm.cam_frameskip = parse_floats(v)?;
            Some(())
        })
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::dispatch;

    #[test]
    fn test_parse_floats() {
        assert_eq!(parse_floats::<2>("1.5, 2"), Some([1.5, 2.0]));
        assert_eq!(parse_floats::<2>("1.5"), None);
        assert_eq!(parse_floats::<2>("1,2,3"), None);
        assert_eq!(parse_floats::<4>("a,b,c,d"), None);
    }

    #[test]
    fn test_watches_update_telemetry() {
        let mut registry = StatusRegistry::new();
        let telemetry = TelemetryHandle::default();
        let ack = Arc::new(AtomicI64::new(-1));
        register_watches(&mut registry, &telemetry, Arc::clone(&ack)).unwrap();

        let payload = concat!(
            r#"<picam360:status name="quaternion" value="0.1,0.2,0.3,0.9" />"#,
            r#"<picam360:status name="cam_fps" value="30,29.5" />"#,
            r#"<picam360:status name="temperature" value="41.5" />"#,
            r#"<picam360:status name="ack_command_id" value="12" />"#,
            r#"<picam360:status name="bandwidth" value="garbage" />"#,
        );
        assert_eq!(dispatch(&registry, payload.as_bytes()), 5);

        let t = telemetry.read().unwrap();
        assert_eq!(t.camera_quaternion, [0.1, 0.2, 0.3, 0.9]);
        assert_eq!(t.cam_fps, [30.0, 29.5]);
        assert_eq!(t.temperature, 41.5);
        assert_eq!(t.bandwidth, 0.0);
        assert_eq!(ack.load(Ordering::Acquire), 12);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = StatusRegistry::new();
        let telemetry = TelemetryHandle::default();
        let ack = Arc::new(AtomicI64::new(-1));
        register_watches(&mut registry, &telemetry, Arc::clone(&ack)).unwrap();
        assert!(register_watches(&mut registry, &telemetry, ack).is_err());
    }
}
