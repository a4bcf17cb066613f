//! gcfocus runtime configuration handling
//!
//! Values come from an optional TOML/YAML file, then `GCFOCUS_*` environment
//! variables, then command line flags. [`GcfocusConfig::resolve`] checks that
//! everything required is present and produces the [`Settings`] the daemon runs on.

use crate::error::{Error, Result};
use crate::focus::FocusFormula;
use crate::log_reader::DEFAULT_LINE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure persisted to disk or environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GcfocusConfig {
    /// Camera selection
    pub camera: CameraOptions,
    /// Serial log input
    pub source: SourceOptions,
    /// Calibration constants of the focus formula
    pub calibration: CalibrationOptions,
    /// Logging configuration
    pub logging: LoggingOptions,
}

impl GcfocusConfig {
    /// Load configuration from an explicit path or fall back to discovered defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            Self::from_file(path)?
        } else if let Some(path) = Self::discover_file()? {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Attempt to locate a configuration file in common locations.
    fn discover_file() -> Result<Option<PathBuf>> {
        let cwd =
            env::current_dir().map_err(|e| Error::Config(format!("Failed to read cwd: {e}")))?;
        for candidate in ["gcfocus.toml", "gcfocus.yaml", "gcfocus.yml"] {
            let path = cwd.join(candidate);
            if path.exists() {
                return Ok(Some(path));
            }
        }

        if let Some(xdg_config) = env::var_os("XDG_CONFIG_HOME") {
            let base = PathBuf::from(xdg_config).join("gcfocus");
            for candidate in ["config.toml", "config.yaml"] {
                let path = base.join(candidate);
                if path.exists() {
                    return Ok(Some(path));
                }
            }
        }

        Ok(None)
    }

    /// Read configuration from a concrete file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;

        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "toml" => toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse TOML {}: {e}", path.display()))
            }),
            "yaml" | "yml" => serde_yaml::from_str(&contents).map_err(|e| {
                Error::Config(format!("Failed to parse YAML {}: {e}", path.display()))
            }),
            other => Err(Error::Config(format!(
                "Unsupported config format '{other}', expected toml/yaml"
            ))),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(device) = env::var_os("GCFOCUS_DEVICE") {
            self.camera.device = Some(PathBuf::from(device));
        }
        self.source.apply_env_overrides();
        self.calibration.apply_env_overrides();
        self.logging.apply_env_overrides();
    }

    /// Validate required values and produce the daemon settings
    pub fn resolve(&self) -> Result<Settings> {
        let (Some(a), Some(b), Some(c)) =
            (self.calibration.a, self.calibration.b, self.calibration.c)
        else {
            return Err(Error::MissingOption("All calibration constants"));
        };
        for (name, value) in [("a", a), ("b", b), ("c", c)] {
            if !value.is_finite() {
                return Err(Error::Config(format!(
                    "Calibration constant {name} must be a finite number, got {value}"
                )));
            }
        }

        let device = self
            .camera
            .device
            .clone()
            .ok_or(Error::MissingOption("Camera device path"))?;
        let log = self
            .source
            .log
            .clone()
            .ok_or(Error::MissingOption("OctoPrint log file location"))?;

        if self.source.line_capacity < 2 {
            return Err(Error::Config(format!(
                "line_capacity must be at least 2, got {}",
                self.source.line_capacity
            )));
        }

        Ok(Settings {
            device,
            log,
            truncate: self.source.truncate,
            truncate_threshold: self.source.truncate_threshold,
            reopen_on_rotation: self.source.reopen_on_rotation,
            rotation_grace: Duration::from_millis(self.source.rotation_grace_ms),
            line_capacity: self.source.line_capacity,
            formula: FocusFormula::new(a, b, c),
        })
    }
}

/// Validated configuration the daemon runs on
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// V4L2 device node
    pub device: PathBuf,
    /// OctoPrint serial log
    pub log: PathBuf,
    /// Periodically truncate the serial log
    pub truncate: bool,
    /// Bytes consumed before the serial log is truncated
    pub truncate_threshold: u64,
    /// Reopen the serial log after rotation instead of exiting
    pub reopen_on_rotation: bool,
    /// Delay before reopening a rotated log
    pub rotation_grace: Duration,
    /// Longest accepted log line plus one
    pub line_capacity: usize,
    /// Position to focus conversion
    pub formula: FocusFormula,
}

/// Camera selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    /// Device path to a V4L2 compliant camera (e.g. `/dev/video0`)
    pub device: Option<PathBuf>,
}

/// Serial log input options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// OctoPrint serial log file to follow
    pub log: Option<PathBuf>,
    /// Truncate the log periodically to save space
    pub truncate: bool,
    /// Bytes consumed between truncations
    pub truncate_threshold: u64,
    /// Reopen the log when it is rotated or deleted
    pub reopen_on_rotation: bool,
    /// Milliseconds to wait for the replacement file after rotation
    pub rotation_grace_ms: u64,
    /// Line buffer capacity in bytes
    pub line_capacity: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            log: None,
            truncate: false,
            truncate_threshold: 1024 * 1024,
            reopen_on_rotation: true,
            rotation_grace_ms: 3000,
            line_capacity: DEFAULT_LINE_CAPACITY,
        }
    }
}

impl SourceOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(log) = env::var_os("GCFOCUS_SERIAL_LOG") {
            self.log = Some(PathBuf::from(log));
        }
        if let Some(truncate) = env::var("GCFOCUS_TRUNCATE").ok().as_deref().and_then(parse_flag) {
            self.truncate = truncate;
        }
        if let Ok(threshold) = env::var("GCFOCUS_TRUNCATE_THRESHOLD") {
            if let Ok(parsed) = threshold.parse::<u64>() {
                self.truncate_threshold = parsed;
            }
        }
        if let Some(reopen) = env::var("GCFOCUS_REOPEN").ok().as_deref().and_then(parse_flag) {
            self.reopen_on_rotation = reopen;
        }
        if let Ok(grace) = env::var("GCFOCUS_ROTATION_GRACE_MS") {
            if let Ok(parsed) = grace.parse::<u64>() {
                self.rotation_grace_ms = parsed;
            }
        }
    }
}

/// Calibration constants, see calibration.md for how to find them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Constant a
    pub a: Option<f64>,
    /// Constant b
    pub b: Option<f64>,
    /// Constant c
    pub c: Option<f64>,
}

impl CalibrationOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        for (var, slot) in [
            ("GCFOCUS_CAL_A", &mut self.a),
            ("GCFOCUS_CAL_B", &mut self.b),
            ("GCFOCUS_CAL_C", &mut self.c),
        ] {
            if let Ok(value) = env::var(var) {
                if let Ok(parsed) = value.trim().parse::<f64>() {
                    *slot = Some(parsed);
                }
            }
        }
    }
}

/// Structured logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Default log level (overridable via `GCFOCUS_LOG_LEVEL`)
    pub level: String,
    /// Optional log file path for teeing structured logs
    pub file: Option<PathBuf>,
    /// Force ANSI colors in console logging
    pub color: bool,
    /// Optional log rotation strategy applied to `file`
    pub rotation: Option<LogRotation>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            color: true,
            rotation: None,
        }
    }
}

impl LoggingOptions {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("GCFOCUS_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(file) = env::var("GCFOCUS_LOG_FILE") {
            self.file = Some(PathBuf::from(file));
        }
        if let Some(color) = env::var("GCFOCUS_LOG_COLOR").ok().as_deref().and_then(parse_flag) {
            self.color = color;
        }
        if let Ok(rotation) = env::var("GCFOCUS_LOG_ROTATION") {
            if let Some(parsed) = LogRotation::parse(&rotation) {
                self.rotation = Some(parsed);
            }
        }
    }
}

/// Supported log rotation policies for file sinks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate log files once per hour
    Hourly,
    /// Rotate log files once per day
    Daily,
}

impl LogRotation {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            _ => None,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn complete() -> GcfocusConfig {
        let mut config = GcfocusConfig::default();
        config.camera.device = Some(PathBuf::from("/dev/video0"));
        config.source.log = Some(PathBuf::from("/var/log/octoprint/serial.log"));
        config.calibration = CalibrationOptions {
            a: Some(10.0),
            b: Some(2.0),
            c: Some(0.0),
        };
        config
    }

    #[test]
    fn test_resolve_complete() {
        let settings = complete().resolve().unwrap();
        assert_eq!(settings.device, PathBuf::from("/dev/video0"));
        assert_eq!(settings.formula, FocusFormula::new(10.0, 2.0, 0.0));
        assert_eq!(settings.rotation_grace, Duration::from_secs(3));
        assert_eq!(settings.line_capacity, 256);
        assert!(settings.reopen_on_rotation);
        assert!(!settings.truncate);
    }

    #[test]
    fn test_resolve_missing_values() {
        let mut config = complete();
        config.calibration.b = None;
        assert!(matches!(
            config.resolve(),
            Err(Error::MissingOption("All calibration constants"))
        ));

        let mut config = complete();
        config.camera.device = None;
        assert!(matches!(
            config.resolve(),
            Err(Error::MissingOption("Camera device path"))
        ));

        let mut config = complete();
        config.source.log = None;
        assert!(matches!(config.resolve(), Err(Error::MissingOption(_))));
    }

    #[test]
    fn test_resolve_rejects_bad_values() {
        let mut config = complete();
        config.calibration.a = Some(f64::NAN);
        assert!(matches!(config.resolve(), Err(Error::Config(_))));

        let mut config = complete();
        config.source.line_capacity = 1;
        assert!(matches!(config.resolve(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[camera]
device = "/dev/video2"

[source]
log = "/tmp/serial.log"
truncate = true
rotation_grace_ms = 500

[calibration]
a = 3500.0
b = -12.5
c = 40.0

[logging]
level = "debug"
rotation = "daily"
"#
        )
        .unwrap();

        let config = GcfocusConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.rotation, Some(LogRotation::Daily));
        let settings = config.resolve().unwrap();
        assert_eq!(settings.device, PathBuf::from("/dev/video2"));
        assert!(settings.truncate);
        assert_eq!(settings.truncate_threshold, 1024 * 1024);
        assert_eq!(settings.rotation_grace, Duration::from_millis(500));
        assert_eq!(settings.formula, FocusFormula::new(3500.0, -12.5, 40.0));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "camera:\n  device: /dev/video1\ncalibration:\n  a: 1.0\n  b: 2.0\n  c: 3.0\n"
        )
        .unwrap();

        let config = GcfocusConfig::from_file(file.path()).unwrap();
        assert_eq!(config.camera.device, Some(PathBuf::from("/dev/video1")));
        assert_eq!(config.calibration.c, Some(3.0));
        assert!(config.source.log.is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(matches!(
            GcfocusConfig::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
