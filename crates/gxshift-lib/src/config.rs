//! Application configuration — TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fixup::{FixupTable, ReportLayout};

/// Header comment prepended to saved config files.
const CONFIG_HEADER: &str =
    "# gxshift configuration — changes made outside gxshift may be overwritten.\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// How the factory descriptor is fixed: "native" keeps the device's own
    /// report layout, "buttons16" substitutes a button-only descriptor.
    #[serde(default)]
    pub report_layout: ReportLayout,

    /// Preferred device serial number. Empty = auto-select first device.
    #[serde(default)]
    pub device_serial: String,

    /// Command to run after the mode changes (`GXSHIFT_MODE` = `H` or `S`).
    /// Empty = disabled.
    #[serde(default)]
    pub on_mode_command: String,

    /// Command to run after a calibration flag changes (`GXSHIFT_AXIS` =
    /// `h` or `seq`, `GXSHIFT_ARMED` = `0` or `1`). Empty = disabled.
    #[serde(default)]
    pub on_calibration_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            report_layout: ReportLayout::default(),
            device_serial: String::new(),
            on_mode_command: String::new(),
            on_calibration_command: String::new(),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `device_serial` contains characters a USB serial string never has.
    InvalidSerial(String),
    /// A hook command spans several lines (`field` names the key).
    MultilineCommand { field: &'static str },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidSerial(s) => write!(f, "Invalid device serial: {s:?}"),
            ValidationError::MultilineCommand { field } => {
                write!(f, "Invalid {field}: command must be a single line")
            }
        }
    }
}

impl Config {
    /// Keys accepted by [`Config::set_value`].
    pub const KEYS: [&'static str; 4] = [
        "report_layout",
        "device_serial",
        "on_mode_command",
        "on_calibration_command",
    ];

    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gxshift"))
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Save config to an arbitrary path atomically (write to temp file, then rename).
    ///
    /// A header comment is prepended to warn that manual edits may be overwritten.
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let serialized = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        let contents = format!("{CONFIG_HEADER}{serialized}");
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, &contents)?;
        match std::fs::rename(&tmp, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // Rename can fail across filesystems; fall back to direct write + cleanup
                let result = std::fs::write(path, &contents);
                let _ = std::fs::remove_file(&tmp);
                result
            }
        }
    }

    /// Save config to the default platform path.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// The fixup table for the configured report layout.
    pub fn fixup_table(&self) -> FixupTable {
        FixupTable::for_layout(self.report_layout)
    }

    /// Validate the entire config, collecting all errors.
    /// Set one setting by key, as typed on the command line.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key.trim() {
            "report_layout" => self.report_layout = value.parse()?,
            "device_serial" => self.device_serial = value.trim().to_string(),
            "on_mode_command" => self.on_mode_command = value.trim().to_string(),
            "on_calibration_command" => self.on_calibration_command = value.trim().to_string(),
            other => {
                return Err(format!(
                    "unknown config key \"{other}\" (expected one of: {})",
                    Self::KEYS.join(", ")
                ));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let serial = self.device_serial.trim();
        if !serial
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            errors.push(ValidationError::InvalidSerial(serial.to_string()));
        }

        for (field, command) in [
            ("on_mode_command", &self.on_mode_command),
            ("on_calibration_command", &self.on_calibration_command),
        ] {
            if command.trim().contains('\n') {
                errors.push(ValidationError::MultilineCommand { field });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
