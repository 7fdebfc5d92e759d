//! `fixup` subcommand — run the fixup engine over a descriptor file.

use std::path::Path;

use super::{
    FixupOutcome, FixupOutput, FixupTable, ReportLayout, Result, hex_lines, hex_string, kv,
    kv_width, print_json,
};

pub(super) fn cmd_fixup(
    input: &Path,
    output: Option<&Path>,
    layout: ReportLayout,
    json: bool,
) -> Result<()> {
    let report = fixup_file(input, output, layout)?;
    if json {
        return print_json(&report);
    }

    let w = kv_width(&["Input:", "Layout:", "Result:", "Size:", "Written:"], &[]);
    kv("Input:", &report.input, w);
    kv("Layout:", report.layout, w);
    kv("Result:", &report.outcome, w);
    kv(
        "Size:",
        format_args!("{} -> {} bytes", report.size_before, report.size_after),
        w,
    );
    match &report.output {
        Some(path) => kv("Written:", path, w),
        None => {
            println!();
            for line in hex_lines(&report.bytes) {
                println!("  {line}");
            }
        }
    }
    Ok(())
}

/// Fix `input` and, when `output` is given, write the result there.
fn fixup_file(input: &Path, output: Option<&Path>, layout: ReportLayout) -> Result<FixupOutput> {
    let mut buf = std::fs::read(input)?;
    let size_before = buf.len();
    let (outcome, fixed) = FixupTable::for_layout(layout).apply(&mut buf);
    let fixed = fixed.to_vec();

    if let Some(path) = output {
        std::fs::write(path, &fixed)?;
        log::info!("wrote {} bytes to {}", fixed.len(), path.display());
    }
    if let FixupOutcome::Passthrough(reason) = &outcome {
        log::info!("{}: descriptor left unchanged: {reason}", input.display());
    }

    Ok(FixupOutput {
        input: input.display().to_string(),
        output: output.map(|p| p.display().to_string()),
        layout,
        applied: outcome.is_applied(),
        outcome: outcome.to_string(),
        size_before,
        size_after: fixed.len(),
        descriptor: hex_string(&fixed),
        bytes: fixed,
    })
}
