//! `descriptor` subcommand — read the report descriptor and show it after fixup.

use std::path::Path;

use super::{
    Config, DescriptorOutput, FixupTable, ReportLayout, Result, ShifterDevice, hex_lines,
    hex_string, kv, kv_width, open_shifter, print_json, rdesc,
};

pub(super) fn cmd_descriptor(
    file: Option<&Path>,
    raw: bool,
    json: bool,
    config: &Config,
) -> Result<()> {
    let device = open_shifter(file, config)?;
    let report = build_report(device.as_ref(), config.report_layout, raw)?;
    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn build_report(
    device: &dyn ShifterDevice,
    layout: ReportLayout,
    raw: bool,
) -> Result<DescriptorOutput> {
    let original = device.report_descriptor()?;
    let mut buf = original.clone();

    let (outcome, applied, shown) = if raw {
        ("not applied (--raw)".to_string(), false, original.clone())
    } else {
        let (outcome, fixed) = FixupTable::for_layout(layout).apply(&mut buf);
        (outcome.to_string(), outcome.is_applied(), fixed.to_vec())
    };

    let (summary, parse_error) = match rdesc::parse(&shown) {
        Ok(s) => (Some(s), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(DescriptorOutput {
        device: device.info().clone(),
        layout,
        outcome,
        applied,
        raw_size: original.len(),
        size: shown.len(),
        descriptor: hex_string(&shown),
        summary,
        parse_error,
        items: rdesc::annotate(&shown),
        bytes: shown,
    })
}

fn print_report(r: &DescriptorOutput) {
    let w = kv_width(
        &["Device:", "Layout:", "Fixup:", "Size:", "Top level:", "Reports:"],
        &[],
    );
    kv("Device:", format_args!("{} ({})", r.device.product, r.device.path), w);
    kv("Layout:", r.layout, w);
    kv("Fixup:", &r.outcome, w);
    if r.size == r.raw_size {
        kv("Size:", format_args!("{} bytes", r.size), w);
    } else {
        kv("Size:", format_args!("{} -> {} bytes", r.raw_size, r.size), w);
    }

    match (&r.summary, &r.parse_error) {
        (Some(summary), _) => {
            let top: Vec<String> = summary
                .top_level
                .iter()
                .map(|t| format!("{} ({})", t.usage_name(), t.kind))
                .collect();
            kv("Top level:", top.join(", "), w);
            for (id, bits) in &summary.reports {
                kv(
                    "Reports:",
                    format_args!(
                        "id {id}: {} bytes in, {} bytes out",
                        bits.input_bytes(),
                        bits.output_bytes()
                    ),
                    w,
                );
            }
        }
        (None, Some(e)) => kv("Top level:", format_args!("(malformed: {e})"), w),
        (None, None) => {}
    }
    println!();

    for line in hex_lines(&r.bytes) {
        println!("  {line}");
    }
    println!();

    for item in &r.items {
        let hex = hex_string(&item.bytes);
        println!(
            "  {:04X}  {hex:<15} {:indent$}{}",
            item.offset,
            "",
            item.label,
            indent = item.depth * 2
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gxshift_lib::mock::MockDevice;
    use gxshift_lib::protocol::{GX100_BUTTONS16_RDESC, GX100_FACTORY_RDESC};

    #[test]
    fn factory_descriptor_is_fixed() {
        let dev = MockDevice::factory();
        let r = build_report(&dev, ReportLayout::Native, false).unwrap();
        assert!(r.applied);
        assert_eq!(r.size, 50);
        assert!(r.outcome.starts_with("patched"));
        assert!(r.summary.as_ref().unwrap().is_joystick());
        assert!(r.descriptor.starts_with("05 01 09 04 a1 01"));
    }

    #[test]
    fn raw_flag_skips_fixup() {
        let dev = MockDevice::factory();
        let r = build_report(&dev, ReportLayout::Native, true).unwrap();
        assert!(!r.applied);
        assert_eq!(r.descriptor, hex_string(&GX100_FACTORY_RDESC));
        assert!(!r.summary.unwrap().is_joystick());
    }

    #[test]
    fn unmatched_descriptor_is_not_applied() {
        let other = vec![0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0xC0];
        let dev = MockDevice::with_descriptor(other.clone());
        let r = build_report(&dev, ReportLayout::Native, false).unwrap();
        assert!(!r.applied);
        assert!(r.outcome.starts_with("unchanged"));
        assert_eq!(r.bytes, other);
    }

    #[test]
    fn buttons16_changes_size() {
        let dev = MockDevice::factory();
        let r = build_report(&dev, ReportLayout::Buttons16, false).unwrap();
        assert_eq!(r.raw_size, 50);
        assert_eq!(r.size, GX100_BUTTONS16_RDESC.len());
        assert_eq!(r.items.first().unwrap().label, "Usage Page (Generic Desktop)");
    }

    #[test]
    fn malformed_descriptor_is_reported_not_fatal() {
        let dev = MockDevice::with_descriptor(vec![0xA1, 0x01]);
        let r = build_report(&dev, ReportLayout::Native, false).unwrap();
        assert!(r.summary.is_none());
        assert!(r.parse_error.is_some());
        print_report(&r);
    }

    #[test]
    fn read_failure_propagates() {
        let dev = MockDevice::factory();
        dev.fail_read.set(true);
        assert!(build_report(&dev, ReportLayout::Native, false).is_err());
    }
}
