//! Mapping file schema and parser
//!
//! The mapping file is line oriented: `#` starts a comment, blank lines are
//! skipped, and every other line is `key: value`. A numeric key declares a
//! slider target, anything else is a scalar setting.

use crate::sessions::ProcessId;
use std::collections::HashMap;
use thiserror::Error;

const DEFAULT_BAUD_RATE: u32 = 9600;

/// Errors produced while parsing a mapping file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read mapping file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected 'key: value', got '{text}'")]
    Malformed { line: usize, text: String },

    #[error("line {line}: slider {index} has no target")]
    EmptyTarget { line: usize, index: usize },

    #[error("line {line}: duplicate setting '{key}'")]
    DuplicateKey { line: usize, key: String },

    #[error("missing required setting '{0}'")]
    MissingSetting(&'static str),

    #[error("invalid value '{value}' for setting '{key}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("no target declared for slider {0}")]
    MissingSlider(usize),
}

/// What a slider is declared to control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// The master output volume.
    Master,
    /// The system-sounds channel.
    System,
    /// Every live session not claimed by another declaration.
    Unmapped,
    /// A single application by executable name.
    Process(ProcessId),
    /// A fixed list of applications, controlled together.
    Group(Vec<ProcessId>),
}

impl TargetSpec {
    /// Parse a target expression: `master`, `system`, `unmapped`, a bare
    /// process name, or a comma-separated group.
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if text.contains(',') {
            let members: Vec<ProcessId> = text
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(ProcessId::new)
                .collect();
            if members.is_empty() {
                return None;
            }
            return Some(TargetSpec::Group(members));
        }

        Some(match text.to_lowercase().as_str() {
            "master" => TargetSpec::Master,
            "system" => TargetSpec::System,
            "unmapped" => TargetSpec::Unmapped,
            _ => TargetSpec::Process(ProcessId::new(text)),
        })
    }
}

impl std::fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSpec::Master => f.write_str("master"),
            TargetSpec::System => f.write_str("system"),
            TargetSpec::Unmapped => f.write_str("unmapped"),
            TargetSpec::Process(id) => write!(f, "{id}"),
            TargetSpec::Group(ids) => {
                let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

/// One slider declaration from the mapping file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliderDeclaration {
    /// Physical slider index, starting at 0.
    pub index: usize,
    /// What the slider controls.
    pub target: TargetSpec,
}

/// Scalar settings from the mapping file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Number of physical sliders on the device.
    pub slider_count: usize,
    /// Flip the slider direction: top is low volume.
    pub inverted: bool,
    /// Include the system-sounds session in `unmapped` when it is not
    /// claimed elsewhere.
    pub system_in_unmapped: bool,
    /// USB product name used to locate the serial port.
    pub device_name: Option<String>,
    /// Fallback serial port when the device name cannot be found.
    pub port: Option<String>,
    /// Serial baud rate, matching the firmware.
    pub baud_rate: u32,
}

/// A parsed mapping file: settings plus one declaration per slider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub settings: Settings,
    /// Ordered by ascending index, covering every index in
    /// `[0, settings.slider_count)`.
    pub declarations: Vec<SliderDeclaration>,
}

impl Config {
    /// Parse the mapping file text.
    ///
    /// Settings keys are matched exactly (case-insensitively) against an
    /// explicit map; duplicate settings are rejected. An index declared twice
    /// keeps its last declaration. Declarations at or above the slider count
    /// are ignored.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut settings: HashMap<String, String> = HashMap::new();
        let mut targets: HashMap<usize, TargetSpec> = HashMap::new();

        for (line_no, raw) in text.lines().enumerate() {
            let line_no = line_no + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                return Err(ConfigError::Malformed {
                    line: line_no,
                    text: line.to_string(),
                });
            };
            let key = key.trim();
            let value = value.trim();

            if let Ok(index) = key.parse::<usize>() {
                let target = TargetSpec::parse(value)
                    .ok_or(ConfigError::EmptyTarget { line: line_no, index })?;
                // Last declaration for an index wins.
                targets.insert(index, target);
            } else {
                let key = key.to_lowercase();
                if settings.contains_key(&key) {
                    return Err(ConfigError::DuplicateKey { line: line_no, key });
                }
                settings.insert(key, value.to_string());
            }
        }

        let settings = Settings::from_map(&settings)?;

        let mut declarations = Vec::with_capacity(settings.slider_count);
        for index in 0..settings.slider_count {
            let target = targets
                .get(&index)
                .cloned()
                .ok_or(ConfigError::MissingSlider(index))?;
            declarations.push(SliderDeclaration { index, target });
        }

        Ok(Config {
            settings,
            declarations,
        })
    }
}

impl Settings {
    fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let slider_count = match map.get("sliders") {
            None => return Err(ConfigError::MissingSetting("sliders")),
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                Ok(_) => {
                    return Err(ConfigError::InvalidValue {
                        key: "sliders",
                        value: value.clone(),
                        reason: "must be at least 1",
                    })
                }
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        key: "sliders",
                        value: value.clone(),
                        reason: "not a number",
                    })
                }
            },
        };

        let baud_rate = match map.get("baudrate") {
            None => DEFAULT_BAUD_RATE,
            Some(value) => value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: "baudrate",
                value: value.clone(),
                reason: "not a number",
            })?,
        };

        let inverted = parse_bool(map, "inverted")?.unwrap_or(false);
        let system_in_unmapped = parse_bool(map, "system in unmapped")?.unwrap_or(true);

        Ok(Settings {
            slider_count,
            inverted,
            system_in_unmapped,
            device_name: map.get("device name").cloned().filter(|s| !s.is_empty()),
            port: map.get("port").cloned().filter(|s| !s.is_empty()),
            baud_rate,
        })
    }
}

fn parse_bool(
    map: &HashMap<String, String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => match value.to_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key,
                value: value.clone(),
                reason: "expected 'true' or 'false'",
            }),
        },
    }
}
