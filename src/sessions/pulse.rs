//! PulseAudio session directory
//!
//! Drives `pactl`: sessions come from `pactl list sink-inputs`, keyed by the
//! `application.process.binary` property. The sink-input carrying
//! `media.role = "event"` is the system-sounds session. Master volume goes
//! through `@DEFAULT_SINK@`.

use super::{
    LiveSession, ProcessId, SessionDirectory, SessionError, SessionSnapshot, VolumeControl,
    VolumeSetError,
};
use std::collections::HashMap;
use std::process::Command;
use std::sync::Arc;

const SYSTEM_MEDIA_ROLE: &str = "event";

/// One `Sink Input #N` block from `pactl list sink-inputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SinkInput {
    index: u32,
    properties: HashMap<String, String>,
}

impl SinkInput {
    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Process identity: executable name, falling back to the application
    /// name for streams that do not report a binary.
    fn process_name(&self) -> Option<&str> {
        self.property("application.process.binary")
            .or_else(|| self.property("application.name"))
    }

    fn is_system(&self) -> bool {
        self.property("media.role") == Some(SYSTEM_MEDIA_ROLE)
    }
}

/// Parse `pactl list sink-inputs` output into blocks.
fn parse_sink_inputs(output: &str) -> Vec<SinkInput> {
    let mut inputs = Vec::new();
    let mut current: Option<SinkInput> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("Sink Input #") {
            if let Some(done) = current.take() {
                inputs.push(done);
            }
            if let Ok(index) = rest.trim().parse::<u32>() {
                current = Some(SinkInput {
                    index,
                    properties: HashMap::new(),
                });
            }
            continue;
        }

        let Some(input) = current.as_mut() else {
            continue;
        };
        // Property lines look like:  application.process.binary = "firefox"
        let trimmed = line.trim();
        if let Some((key, value)) = trimmed.split_once(" = ") {
            let value = value.trim().trim_matches('"');
            input
                .properties
                .insert(key.trim().to_string(), value.to_string());
        }
    }

    if let Some(done) = current.take() {
        inputs.push(done);
    }
    inputs
}

fn run_pactl(args: &[&str]) -> Result<String, SessionError> {
    let output = Command::new("pactl")
        .args(args)
        .output()
        .map_err(|e| SessionError::Backend(format!("failed to run pactl: {e}")))?;
    if !output.status.success() {
        return Err(SessionError::Backend(format!(
            "pactl {} exited with {}",
            args.join(" "),
            output.status
        )));
    }
    String::from_utf8(output.stdout)
        .map_err(|e| SessionError::Backend(format!("pactl output was not UTF-8: {e}")))
}

fn percent(level: f32) -> String {
    format!("{}%", (level.clamp(0.0, 1.0) * 100.0).round() as u32)
}

/// Volume handle for one sink-input.
struct SinkInputHandle {
    index: u32,
    label: String,
}

impl VolumeControl for SinkInputHandle {
    fn set_volume(&self, level: f32) -> Result<(), VolumeSetError> {
        // A failed set means the stream is gone; the next refresh drops it.
        let status = Command::new("pactl")
            .args([
                "set-sink-input-volume",
                &self.index.to_string(),
                &percent(level),
            ])
            .status();
        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(VolumeSetError {
                target: self.label.clone(),
            }),
        }
    }
}

/// Volume handle for the default sink.
struct DefaultSinkHandle;

impl VolumeControl for DefaultSinkHandle {
    fn set_volume(&self, level: f32) -> Result<(), VolumeSetError> {
        let status = Command::new("pactl")
            .args(["set-sink-volume", "@DEFAULT_SINK@", &percent(level)])
            .status();
        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(VolumeSetError {
                target: "master".to_string(),
            }),
        }
    }
}

/// Session directory backed by a running PulseAudio (or PipeWire) server.
pub struct PulseDirectory;

impl PulseDirectory {
    pub fn new() -> Self {
        Self
    }

    /// True when `pactl` is reachable.
    pub fn detect() -> bool {
        Command::new("pactl")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn sessions_from(inputs: &[SinkInput]) -> (Vec<LiveSession>, Option<LiveSession>) {
        let mut sessions = Vec::new();
        let mut system = None;

        for input in inputs {
            let Some(name) = input.process_name() else {
                continue;
            };
            let id = ProcessId::new(name);
            let session = LiveSession::new(
                id.clone(),
                Arc::new(SinkInputHandle {
                    index: input.index,
                    label: id.as_str().to_string(),
                }),
            );
            if input.is_system() && system.is_none() {
                system = Some(session.clone());
            }
            sessions.push(session);
        }

        (sessions, system)
    }
}

impl Default for PulseDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionDirectory for PulseDirectory {
    fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let output = run_pactl(&["list", "sink-inputs"])?;
        let inputs = parse_sink_inputs(&output);
        let (sessions, system) = Self::sessions_from(&inputs);
        let system = system.ok_or(SessionError::SystemSessionMissing)?;

        Ok(SessionSnapshot::new(
            Arc::new(DefaultSinkHandle),
            system,
            sessions,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Sink Input #61
	Driver: protocol-native.c
	Owner Module: 12
	Client: 147
	Sink: 1
	Volume: front-left: 42598 /  65% / -11.23 dB
	Properties:
		media.name = "Playback"
		application.name = "Firefox"
		application.process.id = "4242"
		application.process.binary = "firefox"

Sink Input #64
	Driver: protocol-native.c
	Sink: 1
	Properties:
		media.name = "bell-window-system"
		media.role = "event"
		application.name = "Plugin"
		application.process.binary = "gnome-shell"

Sink Input #70
	Driver: protocol-native.c
	Sink: 1
	Properties:
		application.name = "Spotify"
		application.process.binary = "spotify"
"#;

    #[test]
    fn test_parse_sink_inputs() {
        let inputs = parse_sink_inputs(SAMPLE);
        assert_eq!(inputs.len(), 3);

        assert_eq!(inputs[0].index, 61);
        assert_eq!(inputs[0].process_name(), Some("firefox"));
        assert!(!inputs[0].is_system());

        assert_eq!(inputs[1].index, 64);
        assert!(inputs[1].is_system());

        assert_eq!(inputs[2].index, 70);
        assert_eq!(inputs[2].process_name(), Some("spotify"));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_sink_inputs("").is_empty());
    }

    #[test]
    fn test_application_name_fallback() {
        let text = "Sink Input #5\n\tProperties:\n\t\tapplication.name = \"Player\"\n";
        let inputs = parse_sink_inputs(text);
        assert_eq!(inputs[0].process_name(), Some("Player"));
    }

    #[test]
    fn test_sessions_from_picks_system_stream() {
        let inputs = parse_sink_inputs(SAMPLE);
        let (sessions, system) = PulseDirectory::sessions_from(&inputs);

        assert_eq!(sessions.len(), 3);
        let system = system.expect("event stream present");
        assert_eq!(system.id, ProcessId::new("gnome-shell"));
    }

    #[test]
    fn test_no_event_stream_means_no_system() {
        let text = "Sink Input #5\n\tProperties:\n\t\tapplication.process.binary = \"mpv\"\n";
        let inputs = parse_sink_inputs(text);
        let (_, system) = PulseDirectory::sessions_from(&inputs);
        assert!(system.is_none());
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(percent(0.0), "0%");
        assert_eq!(percent(0.5), "50%");
        assert_eq!(percent(1.0), "100%");
        assert_eq!(percent(1.5), "100%");
    }
}
