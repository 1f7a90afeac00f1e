//! Local frame commands

use std::path::PathBuf;

use super::options::{parse_flags, parse_value, FrameOptions};
use super::FrameId;
use crate::error::FrameError;

/// Frame targeted by `delete_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSelector {
    One(FrameId),
    All,
}

/// A parsed local command
#[derive(Debug, Clone, PartialEq)]
pub enum FrameCommand {
    Create(FrameOptions),
    Delete(FrameSelector),
    SetFps {
        id: FrameId,
        fps: f32,
    },
    SetMode {
        id: FrameId,
        renderer: String,
    },
    StartRecord {
        id: FrameId,
        path: PathBuf,
    },
    StopRecord {
        id: FrameId,
    },
    Snap {
        id: FrameId,
        path: PathBuf,
    },
    SetViewQuaternion {
        id: FrameId,
        quat: Option<[f32; 4]>,
        fov: Option<f32>,
        client_key: Option<String>,
    },
    SetFov {
        id: FrameId,
        fov: f32,
    },
}

impl FrameCommand {
    /// Parse one command line
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        let line = line.trim();
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (line, ""),
        };

        match name {
            "create_frame" => Ok(FrameCommand::Create(FrameOptions::parse(args)?)),
            "delete_frame" => {
                let flags = parse_flags(args, "i")?;
                match flags.iter().find(|(f, _)| *f == 'i') {
                    Some((_, value)) if value.starts_with('*') => {
                        Ok(FrameCommand::Delete(FrameSelector::All))
                    }
                    Some((_, value)) => Ok(FrameCommand::Delete(FrameSelector::One(FrameId(
                        parse_value('i', value)?,
                    )))),
                    None => Err(missing('i')),
                }
            }
            "set_fps" => {
                let flags = parse_flags(args, "if")?;
                let id = frame_id(&flags)?;
                let fps = match value_of(&flags, 'f') {
                    Some(v) => parse_value::<f32>('f', v)?,
                    None => 5.0,
                };
                Ok(FrameCommand::SetFps {
                    id,
                    fps: fps.max(1.0),
                })
            }
            "set_mode" => {
                let flags = parse_flags(args, "im")?;
                Ok(FrameCommand::SetMode {
                    id: frame_id(&flags)?,
                    renderer: value_of(&flags, 'm').ok_or_else(|| missing('m'))?.to_string(),
                })
            }
            "start_record" | "snap" => {
                let flags = parse_flags(args, "io")?;
                let id = frame_id(&flags)?;
                let path = PathBuf::from(value_of(&flags, 'o').ok_or_else(|| missing('o'))?);
                if name == "snap" {
                    Ok(FrameCommand::Snap { id, path })
                } else {
                    Ok(FrameCommand::StartRecord { id, path })
                }
            }
            "stop_record" => {
                let flags = parse_flags(args, "i")?;
                Ok(FrameCommand::StopRecord {
                    id: frame_id(&flags)?,
                })
            }
            "set_view_quaternion" => parse_view_quaternion(args),
            "set_fov" => {
                let (id, fov) = args
                    .split_whitespace()
                    .next()
                    .and_then(|p| p.split_once('='))
                    .ok_or_else(|| FrameError::InvalidOption(args.to_string()))?;
                Ok(FrameCommand::SetFov {
                    id: FrameId(parse_value('i', id)?),
                    fov: parse_value('f', fov)?,
                })
            }
            _ => Err(FrameError::UnknownCommand(name.to_string())),
        }
    }
}

fn parse_view_quaternion(args: &str) -> Result<FrameCommand, FrameError> {
    let mut id = None;
    let mut quat = None;
    let mut fov = None;
    let mut client_key = None;

    for param in args.split_whitespace() {
        if let Some(v) = param.strip_prefix("quat=") {
            let parts: Vec<f32> = v.split(',').filter_map(|p| p.parse().ok()).collect();
            if let [x, y, z, w] = parts[..] {
                quat = Some([x, y, z, w]);
            }
        } else if let Some(v) = param.strip_prefix("fov=") {
            fov = v.parse().ok();
        } else if let Some(v) = param.strip_prefix("client_key=") {
            client_key = Some(v.to_string());
        } else if let Some(v) = param.strip_prefix("id=") {
            id = v.parse().ok().map(FrameId);
        }
    }

    Ok(FrameCommand::SetViewQuaternion {
        id: id.ok_or_else(|| missing('i'))?,
        quat,
        fov,
        client_key,
    })
}

fn value_of(flags: &[(char, String)], flag: char) -> Option<&str> {
    flags
        .iter()
        .rev()
        .find(|(f, _)| *f == flag)
        .map(|(_, v)| v.as_str())
}

fn frame_id(flags: &[(char, String)]) -> Result<FrameId, FrameError> {
    let value = value_of(flags, 'i').ok_or_else(|| missing('i'))?;
    Ok(FrameId(parse_value('i', value)?))
}

fn missing(flag: char) -> FrameError {
    FrameError::InvalidOption(format!("missing -{}", flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let cmd = FrameCommand::parse("create_frame -w 256 -s mjpeg").unwrap();
        match cmd {
            FrameCommand::Create(options) => {
                assert_eq!(options.width, 256);
                assert_eq!(options.stream.as_deref(), Some("mjpeg"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_delete() {
        assert_eq!(
            FrameCommand::parse("delete_frame -i 3").unwrap(),
            FrameCommand::Delete(FrameSelector::One(FrameId(3)))
        );
        assert_eq!(
            FrameCommand::parse("delete_frame -i *").unwrap(),
            FrameCommand::Delete(FrameSelector::All)
        );
        assert!(FrameCommand::parse("delete_frame").is_err());
    }

    #[test]
    fn test_parse_set_fps_clamps() {
        assert_eq!(
            FrameCommand::parse("set_fps -i 1 -f 0.2").unwrap(),
            FrameCommand::SetFps {
                id: FrameId(1),
                fps: 1.0
            }
        );
        assert_eq!(
            FrameCommand::parse("set_fps -i 1").unwrap(),
            FrameCommand::SetFps {
                id: FrameId(1),
                fps: 5.0
            }
        );
    }

    #[test]
    fn test_parse_record_and_snap() {
        assert_eq!(
            FrameCommand::parse("start_record -i 0 -o /tmp/a.h264").unwrap(),
            FrameCommand::StartRecord {
                id: FrameId(0),
                path: PathBuf::from("/tmp/a.h264")
            }
        );
        assert_eq!(
            FrameCommand::parse("snap -i 2 -o x.jpeg").unwrap(),
            FrameCommand::Snap {
                id: FrameId(2),
                path: PathBuf::from("x.jpeg")
            }
        );
        assert_eq!(
            FrameCommand::parse("stop_record -i 4").unwrap(),
            FrameCommand::StopRecord { id: FrameId(4) }
        );
    }

    #[test]
    fn test_parse_view_quaternion() {
        let cmd =
            FrameCommand::parse("set_view_quaternion id=1 quat=0,0.5,0,1 fov=90 client_key=k1")
                .unwrap();
        assert_eq!(
            cmd,
            FrameCommand::SetViewQuaternion {
                id: FrameId(1),
                quat: Some([0.0, 0.5, 0.0, 1.0]),
                fov: Some(90.0),
                client_key: Some("k1".into()),
            }
        );

        let cmd = FrameCommand::parse("set_view_quaternion id=1 quat=0,0").unwrap();
        assert!(matches!(cmd, FrameCommand::SetViewQuaternion { quat: None, .. }));
    }

    #[test]
    fn test_parse_set_fov_and_mode() {
        assert_eq!(
            FrameCommand::parse("set_fov 2=75.5").unwrap(),
            FrameCommand::SetFov {
                id: FrameId(2),
                fov: 75.5
            }
        );
        assert_eq!(
            FrameCommand::parse("set_mode -i 0 -m WINDOW").unwrap(),
            FrameCommand::SetMode {
                id: FrameId(0),
                renderer: "WINDOW".into()
            }
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            FrameCommand::parse("reboot now"),
            Err(FrameError::UnknownCommand("reboot".into()))
        );
    }
}
