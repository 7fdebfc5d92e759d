//! CLI subcommands — device listing, descriptor fixup, control shell.

mod config_cmd;
mod descriptor;
mod devices;
mod fixup_cmd;
mod shell;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use gxshift_lib::config::Config;
pub(super) use gxshift_lib::device::{
    self, DeviceInfo, DiscoveredDevice, FileDevice, ShifterDevice,
};
pub(super) use gxshift_lib::error::Result;
pub(super) use gxshift_lib::fixup::{FixupOutcome, FixupTable, ReportLayout};
pub(super) use gxshift_lib::rdesc::{self, AnnotatedItem, DescriptorSummary};

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// Space-separated uppercase hex, 16 bytes per line, each line prefixed
/// with its offset.
pub(super) fn hex_lines(data: &[u8]) -> Vec<String> {
    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
            format!("{:04X}: {}", i * 16, bytes.join(" "))
        })
        .collect()
}

pub(super) fn hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let s = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{s}");
    Ok(())
}

/// Load the config from `custom_path` or the default location, logging
/// parse warnings.
pub(super) fn load_config(custom_path: Option<&Path>) -> Config {
    let (config, warnings) = match custom_path {
        Some(p) => Config::load_from(p),
        None => Config::load_with_warnings(),
    };
    for w in &warnings {
        log::warn!("{w}");
    }
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::warn!("{e}");
        }
    }
    config
}

/// Open a descriptor file, or the configured shifter when no file is given.
pub(super) fn open_shifter(
    file: Option<&Path>,
    config: &Config,
) -> Result<Box<dyn ShifterDevice>> {
    match file {
        Some(path) => {
            if !path.is_file() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{}: no such file", path.display()),
                )
                .into());
            }
            Ok(Box::new(FileDevice::from_path(path)?))
        }
        None => Ok(Box::new(device::open_device_by_serial(
            &config.device_serial,
        )?)),
    }
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredDevice>,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
}

#[derive(Serialize)]
pub(super) struct DescriptorOutput {
    pub device: DeviceInfo,
    pub layout: ReportLayout,
    pub outcome: String,
    pub applied: bool,
    pub raw_size: usize,
    pub size: usize,
    pub descriptor: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub summary: Option<DescriptorSummary>,
    pub parse_error: Option<String>,
    pub items: Vec<AnnotatedItem>,
}

#[derive(Serialize)]
pub(super) struct FixupOutput {
    pub input: String,
    pub output: Option<String>,
    pub layout: ReportLayout,
    pub outcome: String,
    pub applied: bool,
    pub size_before: usize,
    pub size_after: usize,
    pub descriptor: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List connected GX100 shifters
    Devices,

    /// Read the report descriptor and show it after fixup
    Descriptor {
        /// Read the descriptor from a file instead of the device
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
        /// Show the descriptor as read, without fixup
        #[arg(long)]
        raw: bool,
    },

    /// Run the fixup engine over a binary descriptor file
    Fixup {
        /// Binary report descriptor
        input: PathBuf,
        /// Write the fixed descriptor here instead of printing it
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Override the configured report layout
        #[arg(long)]
        layout: Option<ReportLayout>,
    },

    /// Attach a session and read endpoint commands from stdin
    Shell {
        /// Back the session with a descriptor file instead of the device
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },

    /// Show current configuration and file paths
    Config {
        /// Update a setting and save the config file (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, json: bool, config_path: Option<&Path>) -> Result<()> {
    match cmd {
        Command::Devices => devices::cmd_devices(json),
        Command::Descriptor { file, raw } => {
            let config = load_config(config_path);
            descriptor::cmd_descriptor(file.as_deref(), raw, json, &config)
        }
        Command::Fixup {
            input,
            output,
            layout,
        } => {
            let config = load_config(config_path);
            let layout = layout.unwrap_or(config.report_layout);
            fixup_cmd::cmd_fixup(&input, output.as_deref(), layout, json)
        }
        Command::Shell { file } => {
            if json {
                warn_json_unsupported("shell");
            }
            let config = load_config(config_path);
            shell::cmd_shell(file.as_deref(), &config)
        }
        Command::Config { set } => config_cmd::cmd_config(json, config_path, &set),
    }
}



#[cfg(test)]
mod json_output_tests {
    use super::*;

    #[test]
    fn devices_output_with_devices() {
        let output = DevicesOutput {
            count: 2,
            devices: vec![
                DiscoveredDevice {
                    path: "usb:001/002 [04b0:5750]".into(),
                    product: Some("GX100".into()),
                    serial: Some("SERIAL1".into()),
                },
                DiscoveredDevice {
                    path: "usb:001/003 [04b0:5750]".into(),
                    product: None,
                    serial: None,
                },
            ],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["count"], 2);
        let devices = parsed["devices"].as_array().unwrap();
        assert_eq!(devices[0]["serial"], "SERIAL1");
        assert!(devices[1]["serial"].is_null());
    }

    #[test]
    fn config_output_complete() {
        let output = ConfigOutput {
            config_file: Some("/home/user/.config/gxshift/config.toml".into()),
            config_file_exists: true,
            settings: Config::default(),
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert!(parsed["config_file"].is_string());
        assert_eq!(parsed["settings"]["report_layout"], "native");
        assert_eq!(parsed["settings"]["device_serial"], "");
    }

    #[test]
    fn fixup_output_fields() {
        let output = FixupOutput {
            input: "in.bin".into(),
            output: None,
            layout: ReportLayout::Buttons16,
            outcome: "replaced".into(),
            applied: true,
            size_before: 50,
            size_after: 27,
            descriptor: String::new(),
            bytes: vec![],
        };
        let parsed = serde_json::to_value(&output).unwrap();
        assert_eq!(parsed["layout"], "buttons16");
        assert!(parsed["output"].is_null());
        assert_eq!(parsed["size_after"], 27);
    }
}
