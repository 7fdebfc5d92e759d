//! Report descriptor fixup — recognise the factory descriptor and correct it.
//!
//! A [`FixupTable`] is an ordered list of [`FixupRule`]s. Each rule pairs a
//! [`Signature`] (expected length plus sentinel bytes) with a
//! [`PatchStrategy`]. The first rule whose signature matches is applied;
//! anything else passes through untouched.
//!
//! Fixup is total: an unknown descriptor, an out-of-range patch, or a patch
//! that would leave the descriptor malformed all return the input unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::*;
use crate::rdesc;

/// Bytes that identify one known-bad descriptor shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Exact descriptor length.
    pub size: usize,
    /// `(offset, expected value)` pairs.
    pub bytes: &'static [(usize, u8)],
}

impl Signature {
    /// Compare a descriptor against this signature.
    ///
    /// Offsets are looked up with bounds checks, so a short descriptor
    /// reports a mismatch rather than reading past its end.
    pub fn check(&self, rdesc: &[u8]) -> Result<(), SkipReason> {
        if rdesc.len() != self.size {
            return Err(SkipReason::Length {
                expected: self.size,
                actual: rdesc.len(),
            });
        }
        for &(offset, expected) in self.bytes {
            let actual = rdesc.get(offset).copied();
            if actual != Some(expected) {
                return Err(SkipReason::Byte {
                    offset,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// How a matched descriptor is corrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchStrategy {
    /// Overwrite individual bytes in place; the report layout is kept.
    Patch(&'static [(usize, u8)]),
    /// Substitute a complete static descriptor.
    Replace(&'static [u8]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupRule {
    pub name: &'static str,
    pub signature: Signature,
    pub strategy: PatchStrategy,
}

/// Which physical report layout the attached firmware sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLayout {
    /// Keep the device's own layout (16 buttons, 14 data bytes, 64-byte output);
    /// only the top-level usage and collection type are corrected.
    #[default]
    Native,
    /// Firmware that sends 16 buttons and 14 bytes of padding.
    Buttons16,
}

impl ReportLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportLayout::Native => "native",
            ReportLayout::Buttons16 => "buttons16",
        }
    }
}

impl fmt::Display for ReportLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(ReportLayout::Native),
            "buttons16" => Ok(ReportLayout::Buttons16),
            other => Err(format!(
                "unknown report layout \"{other}\" (expected native or buttons16)"
            )),
        }
    }
}

/// Sentinels of the factory descriptor: `Usage (Game Pad)`, `Collection (Logical)`.
const GX100_SIGNATURE: Signature = Signature {
    size: GX100_RDESC_SIZE,
    bytes: &[
        (OFF_TOP_USAGE - 1, ITEM_USAGE),
        (OFF_TOP_USAGE, USAGE_GAMEPAD),
        (OFF_TOP_COLLECTION - 1, ITEM_COLLECTION),
        (OFF_TOP_COLLECTION, COLLECTION_LOGICAL),
    ],
};

/// Rules for firmware that keeps the factory report layout.
pub const NATIVE_RULES: &[FixupRule] = &[FixupRule {
    name: "gx100 gamepad -> joystick",
    signature: GX100_SIGNATURE,
    strategy: PatchStrategy::Patch(&[
        (OFF_TOP_USAGE, USAGE_JOYSTICK),
        (OFF_TOP_COLLECTION, COLLECTION_APPLICATION),
    ]),
}];

/// Rules for firmware that sends a button-only report.
pub const BUTTONS16_RULES: &[FixupRule] = &[FixupRule {
    name: "gx100 gamepad -> 16-button joystick",
    signature: GX100_SIGNATURE,
    strategy: PatchStrategy::Replace(GX100_BUTTONS16_RDESC),
}];

/// Why a descriptor was passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The table holds no rules.
    NoRules,
    Length {
        expected: usize,
        actual: usize,
    },
    Byte {
        offset: usize,
        expected: u8,
        /// `None` when the offset lies past the end of the descriptor.
        actual: Option<u8>,
    },
    /// A patch offset lies outside the descriptor.
    PatchOutOfRange { offset: usize },
    /// Applying the patch would produce a malformed descriptor.
    Malformed(rdesc::RdescError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoRules => write!(f, "no fixup rules configured"),
            SkipReason::Length { expected, actual } => {
                write!(f, "size is {actual}, expected {expected}")
            }
            SkipReason::Byte {
                offset,
                expected,
                actual: Some(actual),
            } => write!(
                f,
                "byte {offset} is {actual:02x}, expected {expected:02x}"
            ),
            SkipReason::Byte {
                offset, expected, ..
            } => write!(f, "byte {offset} missing, expected {expected:02x}"),
            SkipReason::PatchOutOfRange { offset } => {
                write!(f, "patch offset {offset} is out of range")
            }
            SkipReason::Malformed(e) => write!(f, "patched descriptor is malformed: {e}"),
        }
    }
}

/// Result of running a descriptor through a [`FixupTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixupOutcome {
    /// Bytes overwritten in place by the named rule.
    Patched { rule: &'static str },
    /// Descriptor replaced by the named rule's static descriptor.
    Replaced { rule: &'static str },
    /// Descriptor returned unchanged.
    Passthrough(SkipReason),
}

impl FixupOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, FixupOutcome::Passthrough(_))
    }
}

impl fmt::Display for FixupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixupOutcome::Patched { rule } => write!(f, "patched ({rule})"),
            FixupOutcome::Replaced { rule } => write!(f, "replaced ({rule})"),
            FixupOutcome::Passthrough(reason) => write!(f, "unchanged ({reason})"),
        }
    }
}

/// Ordered list of fixup rules, first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupTable {
    rules: Vec<FixupRule>,
}

impl Default for FixupTable {
    fn default() -> Self {
        Self::for_layout(ReportLayout::default())
    }
}

impl FixupTable {
    pub fn new(rules: Vec<FixupRule>) -> Self {
        FixupTable { rules }
    }

    /// The GX100 table for the given report layout.
    pub fn for_layout(layout: ReportLayout) -> Self {
        let rules = match layout {
            ReportLayout::Native => NATIVE_RULES,
            ReportLayout::Buttons16 => BUTTONS16_RULES,
        };
        Self::new(rules.to_vec())
    }

    pub fn rules(&self) -> &[FixupRule] {
        &self.rules
    }

    /// Fix a descriptor, returning the bytes the host should parse.
    pub fn fixup<'a>(&self, rdesc: &'a mut [u8]) -> &'a [u8] {
        self.apply(rdesc).1
    }

    /// Fix a descriptor, also reporting what was done.
    ///
    /// The returned slice is either `rdesc` itself (patched or untouched) or a
    /// `'static` replacement.
    pub fn apply<'a>(&self, rdesc: &'a mut [u8]) -> (FixupOutcome, &'a [u8]) {
        let mut first_skip = None;

        for rule in &self.rules {
            if let Err(reason) = rule.signature.check(rdesc) {
                first_skip.get_or_insert(reason);
                continue;
            }
            match rule.strategy {
                PatchStrategy::Patch(patches) => match patch_in_place(rdesc, patches) {
                    Ok(()) => {
                        log::info!("fixing up report descriptor: {}", rule.name);
                        return (FixupOutcome::Patched { rule: rule.name }, rdesc);
                    }
                    Err(reason) => {
                        log::warn!("fixup rule \"{}\" skipped: {reason}", rule.name);
                        first_skip.get_or_insert(reason);
                    }
                },
                PatchStrategy::Replace(replacement) => {
                    log::info!(
                        "replacing report descriptor ({} -> {} bytes): {}",
                        rdesc.len(),
                        replacement.len(),
                        rule.name
                    );
                    return (FixupOutcome::Replaced { rule: rule.name }, replacement);
                }
            }
        }

        log::info!(
            "descriptor size is {}, bytes 3-6 are {}, skipping fixup",
            rdesc.len(),
            hex_window(rdesc, 3..7)
        );
        let reason = first_skip.unwrap_or(SkipReason::NoRules);
        (FixupOutcome::Passthrough(reason), rdesc)
    }
}

/// Fix a descriptor with the default table.
pub fn fixup(rdesc: &mut [u8]) -> &[u8] {
    FixupTable::default().fixup(rdesc)
}

/// Apply all patches or none. The result must still parse.
fn patch_in_place(rdesc: &mut [u8], patches: &[(usize, u8)]) -> Result<(), SkipReason> {
    if let Some(&(offset, _)) = patches.iter().find(|(off, _)| *off >= rdesc.len()) {
        return Err(SkipReason::PatchOutOfRange { offset });
    }
    let saved: Vec<(usize, u8)> = patches.iter().map(|&(off, _)| (off, rdesc[off])).collect();
    for &(offset, value) in patches {
        rdesc[offset] = value;
    }
    if let Err(e) = rdesc::parse(rdesc) {
        for (offset, value) in saved {
            rdesc[offset] = value;
        }
        return Err(SkipReason::Malformed(e));
    }
    Ok(())
}

/// Render the bytes in `range` as hex, `--` for positions past the end.
fn hex_window(rdesc: &[u8], range: std::ops::Range<usize>) -> String {
    range
        .map(|i| match rdesc.get(i) {
            Some(b) => format!("{b:02x}"),
            None => "--".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
