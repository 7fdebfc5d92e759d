//! `devices` subcommand — list connected GX100 shifters.

use super::{DevicesOutput, DiscoveredDevice, Result, device, print_json};

pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let devices = device::enumerate_devices();

    if json {
        return print_json(&DevicesOutput {
            count: devices.len(),
            devices,
        });
    }

    for line in device_lines(&devices) {
        println!("{line}");
    }
    Ok(())
}

fn device_lines(devices: &[DiscoveredDevice]) -> Vec<String> {
    if devices.is_empty() {
        return vec!["No GX100 shifters found.".to_string()];
    }

    let mut lines = vec![
        format!(
            "Found {} GX100 shifter{}:",
            devices.len(),
            if devices.len() == 1 { "" } else { "s" }
        ),
        String::new(),
    ];
    for (i, dev) in devices.iter().enumerate() {
        lines.push(format!("  [{}] {}", i + 1, dev.path));
        if let Some(ref product) = dev.product {
            lines.push(format!("      Product: {product}"));
        }
        if let Some(ref serial) = dev.serial {
            lines.push(format!("      Serial: {serial}"));
        }
    }
    lines
}
