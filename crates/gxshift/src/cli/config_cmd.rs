//! `config` subcommand — show current configuration and file paths, and
//! update settings with `--set KEY=VALUE`.

use std::path::Path;

use gxshift_lib::GxshiftError;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width, print_json};

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>, set: &[String]) -> Result<()> {
    if !set.is_empty() {
        update_config(custom_path, set)?;
        if !json {
            println!("Configuration saved.");
            println!();
        }
    }

    let config = super::load_config(custom_path);
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());

    if json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
        });
    }

    let w = kv_width(
        &["Config file:"],
        &[
            "report_layout:",
            "device_serial:",
            "on_mode_command:",
            "on_calibration_command:",
        ],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    let or_label = |value: &str, empty: &'static str| {
        if value.trim().is_empty() {
            empty.to_string()
        } else {
            value.to_string()
        }
    };

    println!("Settings:");
    kv_indent("report_layout:", config.report_layout, w);
    kv_indent(
        "device_serial:",
        or_label(&config.device_serial, "(first device)"),
        w,
    );
    kv_indent(
        "on_mode_command:",
        or_label(&config.on_mode_command, "(disabled)"),
        w,
    );
    kv_indent(
        "on_calibration_command:",
        or_label(&config.on_calibration_command, "(disabled)"),
        w,
    );

    if let Err(errors) = config.validate() {
        println!();
        println!("Problems:");
        for e in errors {
            println!("  {e}");
        }
    }
    Ok(())
}

/// Apply `KEY=VALUE` assignments and save. Nothing is written unless every
/// assignment applies and the result validates.
fn update_config(custom_path: Option<&Path>, assignments: &[String]) -> Result<()> {
    let (mut config, warnings) = match custom_path {
        Some(p) => Config::load_from(p),
        None => Config::load_with_warnings(),
    };
    if let Some(w) = warnings.first() {
        return Err(GxshiftError::Config(format!(
            "refusing to overwrite unreadable config: {w}"
        )));
    }

    for assignment in assignments {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            GxshiftError::Config(format!("expected KEY=VALUE, got \"{assignment}\""))
        })?;
        config.set_value(key, value).map_err(GxshiftError::Config)?;
    }

    if let Err(errors) = config.validate() {
        let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(GxshiftError::Config(msgs.join("; ")));
    }

    match custom_path {
        Some(p) => config.save_to(p)?,
        None => config.save()?,
    }
    log::info!("saved {} setting(s)", assignments.len());
    Ok(())
}
