//! HID report descriptor items — tokenizer, structural checks, annotation.
//!
//! Items are decoded per HID 1.11 §6.2.2. [`parse`] walks the item stream the
//! way a host parser does (global state with push/pop, collection nesting)
//! and rejects anything a host parser would choke on, so a fixed descriptor
//! can be checked before it is handed over.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// ── Error type ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdescError {
    /// Descriptor has no items at all.
    Empty,
    /// An item header announces more data than the buffer holds.
    Truncated { offset: usize },
    /// `End Collection` without a matching `Collection`.
    UnbalancedEndCollection { offset: usize },
    /// Descriptor ended with collections still open.
    UnclosedCollection { depth: usize },
    /// `Pop` without a matching `Push`.
    PopWithoutPush { offset: usize },
    /// Main item emitted outside any collection.
    ItemOutsideCollection { offset: usize },
}

impl fmt::Display for RdescError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdescError::Empty => write!(f, "empty report descriptor"),
            RdescError::Truncated { offset } => {
                write!(f, "item at offset {offset} runs past end of descriptor")
            }
            RdescError::UnbalancedEndCollection { offset } => {
                write!(f, "End Collection at offset {offset} has no open collection")
            }
            RdescError::UnclosedCollection { depth } => {
                write!(f, "descriptor ends with {depth} unclosed collection(s)")
            }
            RdescError::PopWithoutPush { offset } => {
                write!(f, "Pop at offset {offset} without matching Push")
            }
            RdescError::ItemOutsideCollection { offset } => {
                write!(f, "main item at offset {offset} is outside any collection")
            }
        }
    }
}

impl std::error::Error for RdescError {}

// ── Items ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Main,
    Global,
    Local,
    Reserved,
}

/// One tokenized descriptor item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<'a> {
    /// Byte offset of the item prefix.
    pub offset: usize,
    pub item_type: ItemType,
    pub tag: u8,
    pub data: &'a [u8],
    /// Whether this was encoded as a long item.
    pub long: bool,
}

impl Item<'_> {
    /// Data as an unsigned little-endian value.
    pub fn value(&self) -> u32 {
        self.data
            .iter()
            .take(4)
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
    }

    /// Data as a sign-extended little-endian value.
    pub fn signed_value(&self) -> i32 {
        let v = self.value();
        match self.data.len() {
            1 => v as u8 as i8 as i32,
            2 => v as u16 as i16 as i32,
            _ => v as i32,
        }
    }

    /// Total encoded length of the item, prefix included.
    pub fn encoded_len(&self) -> usize {
        if self.long {
            3 + self.data.len()
        } else {
            1 + self.data.len()
        }
    }
}

/// Iterator over the items of a descriptor.
///
/// Yields `Err(Truncated)` once and then stops if an item runs past the end.
pub struct ItemIter<'a> {
    rdesc: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> ItemIter<'a> {
    pub fn new(rdesc: &'a [u8]) -> Self {
        ItemIter {
            rdesc,
            pos: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = Result<Item<'a>, RdescError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let offset = self.pos;
        let prefix = *self.rdesc.get(offset)?;

        let truncated = |iter: &mut Self| -> Option<Result<Item<'a>, RdescError>> {
            iter.done = true;
            Some(Err(RdescError::Truncated { offset }))
        };

        // Long item: 0xFE, bDataSize, bLongItemTag, data...
        if prefix == 0xFE {
            let (Some(&size), Some(&tag)) =
                (self.rdesc.get(offset + 1), self.rdesc.get(offset + 2))
            else {
                return truncated(self);
            };
            let start = offset + 3;
            let Some(data) = self.rdesc.get(start..start + size as usize) else {
                return truncated(self);
            };
            self.pos = start + size as usize;
            return Some(Ok(Item {
                offset,
                item_type: ItemType::Reserved,
                tag,
                data,
                long: true,
            }));
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let item_type = match (prefix >> 2) & 0x03 {
            0 => ItemType::Main,
            1 => ItemType::Global,
            2 => ItemType::Local,
            _ => ItemType::Reserved,
        };
        let start = offset + 1;
        let Some(data) = self.rdesc.get(start..start + size) else {
            return truncated(self);
        };
        self.pos = start + size;
        Some(Ok(Item {
            offset,
            item_type,
            tag: prefix >> 4,
            data,
            long: false,
        }))
    }
}

// ── Tags ──

const MAIN_INPUT: u8 = 0x8;
const MAIN_OUTPUT: u8 = 0x9;
const MAIN_COLLECTION: u8 = 0xA;
const MAIN_FEATURE: u8 = 0xB;
const MAIN_END_COLLECTION: u8 = 0xC;

const GLOBAL_USAGE_PAGE: u8 = 0x0;
const GLOBAL_LOGICAL_MIN: u8 = 0x1;
const GLOBAL_LOGICAL_MAX: u8 = 0x2;
const GLOBAL_PHYSICAL_MIN: u8 = 0x3;
const GLOBAL_PHYSICAL_MAX: u8 = 0x4;
const GLOBAL_UNIT_EXPONENT: u8 = 0x5;
const GLOBAL_UNIT: u8 = 0x6;
const GLOBAL_REPORT_SIZE: u8 = 0x7;
const GLOBAL_REPORT_ID: u8 = 0x8;
const GLOBAL_REPORT_COUNT: u8 = 0x9;
const GLOBAL_PUSH: u8 = 0xA;
const GLOBAL_POP: u8 = 0xB;

const LOCAL_USAGE: u8 = 0x0;
const LOCAL_USAGE_MIN: u8 = 0x1;
const LOCAL_USAGE_MAX: u8 = 0x2;

// ── Collections ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CollectionKind {
    Physical,
    Application,
    Logical,
    Report,
    NamedArray,
    UsageSwitch,
    UsageModifier,
    Other(u8),
}

impl From<u8> for CollectionKind {
    fn from(v: u8) -> Self {
        match v {
            0x00 => CollectionKind::Physical,
            0x01 => CollectionKind::Application,
            0x02 => CollectionKind::Logical,
            0x03 => CollectionKind::Report,
            0x04 => CollectionKind::NamedArray,
            0x05 => CollectionKind::UsageSwitch,
            0x06 => CollectionKind::UsageModifier,
            other => CollectionKind::Other(other),
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Physical => write!(f, "Physical"),
            CollectionKind::Application => write!(f, "Application"),
            CollectionKind::Logical => write!(f, "Logical"),
            CollectionKind::Report => write!(f, "Report"),
            CollectionKind::NamedArray => write!(f, "Named Array"),
            CollectionKind::UsageSwitch => write!(f, "Usage Switch"),
            CollectionKind::UsageModifier => write!(f, "Usage Modifier"),
            CollectionKind::Other(v) => write!(f, "0x{v:02X}"),
        }
    }
}

// ── Summary ──

/// A top-level collection and the usage that names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopLevel {
    pub usage_page: u16,
    pub usage: u16,
    pub kind: CollectionKind,
}

impl TopLevel {
    /// Human label for the top-level usage, e.g. `"Joystick"`.
    pub fn usage_name(&self) -> String {
        usage_name(self.usage_page, self.usage)
    }
}

/// Field bit totals for one report ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportBits {
    pub input: u32,
    pub output: u32,
    pub feature: u32,
}

impl ReportBits {
    pub fn input_bytes(&self) -> usize {
        self.input.div_ceil(8) as usize
    }

    pub fn output_bytes(&self) -> usize {
        self.output.div_ceil(8) as usize
    }
}

/// What a host parser would build from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorSummary {
    pub top_level: Vec<TopLevel>,
    /// Bit totals keyed by report ID (0 = no report ID).
    pub reports: BTreeMap<u8, ReportBits>,
    pub item_count: usize,
}

impl DescriptorSummary {
    /// Whether any top-level collection is a Generic Desktop Joystick application.
    pub fn is_joystick(&self) -> bool {
        self.top_level.iter().any(|t| {
            t.usage_page == u16::from(crate::protocol::USAGE_PAGE_GENERIC_DESKTOP)
                && t.usage == u16::from(crate::protocol::USAGE_JOYSTICK)
                && t.kind == CollectionKind::Application
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    usage_page: u32,
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

/// Walk a descriptor and check it is well formed.
pub fn parse(rdesc: &[u8]) -> Result<DescriptorSummary, RdescError> {
    let mut globals = Globals::default();
    let mut stack: Vec<Globals> = Vec::new();
    let mut collections: Vec<CollectionKind> = Vec::new();
    let mut last_usage: Option<u32> = None;
    let mut top_level = Vec::new();
    let mut reports: BTreeMap<u8, ReportBits> = BTreeMap::new();
    let mut item_count = 0;

    for item in ItemIter::new(rdesc) {
        let item = item?;
        item_count += 1;
        match item.item_type {
            ItemType::Main => {
                match item.tag {
                    MAIN_COLLECTION => {
                        let kind = CollectionKind::from(item.value() as u8);
                        if collections.is_empty() {
                            let usage = last_usage.unwrap_or(0);
                            let (page, id) = split_usage(usage, globals.usage_page);
                            top_level.push(TopLevel {
                                usage_page: page,
                                usage: id,
                                kind,
                            });
                        }
                        collections.push(kind);
                    }
                    MAIN_END_COLLECTION => {
                        if collections.pop().is_none() {
                            return Err(RdescError::UnbalancedEndCollection {
                                offset: item.offset,
                            });
                        }
                    }
                    MAIN_INPUT | MAIN_OUTPUT | MAIN_FEATURE => {
                        if collections.is_empty() {
                            return Err(RdescError::ItemOutsideCollection {
                                offset: item.offset,
                            });
                        }
                        let bits = globals.report_size.saturating_mul(globals.report_count);
                        let entry = reports.entry(globals.report_id).or_default();
                        let slot = match item.tag {
                            MAIN_INPUT => &mut entry.input,
                            MAIN_OUTPUT => &mut entry.output,
                            _ => &mut entry.feature,
                        };
                        *slot = slot.saturating_add(bits);
                    }
                    _ => {}
                }
                // Local items only live until the next main item.
                last_usage = None;
            }
            ItemType::Global => match item.tag {
                GLOBAL_USAGE_PAGE => globals.usage_page = item.value(),
                GLOBAL_REPORT_SIZE => globals.report_size = item.value(),
                GLOBAL_REPORT_COUNT => globals.report_count = item.value(),
                GLOBAL_REPORT_ID => globals.report_id = item.value() as u8,
                GLOBAL_PUSH => stack.push(globals),
                GLOBAL_POP => {
                    globals = stack.pop().ok_or(RdescError::PopWithoutPush {
                        offset: item.offset,
                    })?;
                }
                _ => {}
            },
            ItemType::Local => {
                if item.tag == LOCAL_USAGE && last_usage.is_none() {
                    last_usage = Some(item.value());
                }
            }
            ItemType::Reserved => {}
        }
    }

    if item_count == 0 {
        return Err(RdescError::Empty);
    }
    if !collections.is_empty() {
        return Err(RdescError::UnclosedCollection {
            depth: collections.len(),
        });
    }

    Ok(DescriptorSummary {
        top_level,
        reports,
        item_count,
    })
}

/// Split a usage into (page, id). 4-byte usages carry their own page.
fn split_usage(usage: u32, usage_page: u32) -> (u16, u16) {
    if usage > 0xFFFF {
        ((usage >> 16) as u16, usage as u16)
    } else {
        (usage_page as u16, usage as u16)
    }
}

// ── Annotation ──

/// One item with a human-readable label, for dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedItem {
    pub offset: usize,
    pub bytes: Vec<u8>,
    pub depth: usize,
    pub label: String,
}

/// Label every item of a descriptor. Stops at the first truncated item.
pub fn annotate(rdesc: &[u8]) -> Vec<AnnotatedItem> {
    let mut out = Vec::new();
    let mut usage_page = 0u32;
    let mut depth = 0usize;

    for item in ItemIter::new(rdesc).map_while(Result::ok) {
        let mut item_depth = depth;
        let label = match (item.item_type, item.tag) {
            (ItemType::Main, MAIN_INPUT) => format!("Input ({})", main_flags(item.value())),
            (ItemType::Main, MAIN_OUTPUT) => format!("Output ({})", main_flags(item.value())),
            (ItemType::Main, MAIN_FEATURE) => format!("Feature ({})", main_flags(item.value())),
            (ItemType::Main, MAIN_COLLECTION) => {
                depth += 1;
                format!("Collection ({})", CollectionKind::from(item.value() as u8))
            }
            (ItemType::Main, MAIN_END_COLLECTION) => {
                depth = depth.saturating_sub(1);
                item_depth = depth;
                "End Collection".to_string()
            }
            (ItemType::Global, GLOBAL_USAGE_PAGE) => {
                usage_page = item.value();
                format!("Usage Page ({})", usage_page_name(usage_page as u16))
            }
            (ItemType::Global, GLOBAL_LOGICAL_MIN) => {
                format!("Logical Minimum ({})", item.signed_value())
            }
            (ItemType::Global, GLOBAL_LOGICAL_MAX) => {
                format!("Logical Maximum ({})", item.signed_value())
            }
            (ItemType::Global, GLOBAL_PHYSICAL_MIN) => {
                format!("Physical Minimum ({})", item.signed_value())
            }
            (ItemType::Global, GLOBAL_PHYSICAL_MAX) => {
                format!("Physical Maximum ({})", item.signed_value())
            }
            (ItemType::Global, GLOBAL_UNIT_EXPONENT) => {
                format!("Unit Exponent ({})", item.signed_value())
            }
            (ItemType::Global, GLOBAL_UNIT) => format!("Unit (0x{:X})", item.value()),
            (ItemType::Global, GLOBAL_REPORT_SIZE) => format!("Report Size ({})", item.value()),
            (ItemType::Global, GLOBAL_REPORT_ID) => format!("Report ID ({})", item.value()),
            (ItemType::Global, GLOBAL_REPORT_COUNT) => format!("Report Count ({})", item.value()),
            (ItemType::Global, GLOBAL_PUSH) => "Push".to_string(),
            (ItemType::Global, GLOBAL_POP) => "Pop".to_string(),
            (ItemType::Local, LOCAL_USAGE) => {
                format!("Usage ({})", usage_name(usage_page as u16, item.value() as u16))
            }
            (ItemType::Local, LOCAL_USAGE_MIN) => format!("Usage Minimum ({})", item.value()),
            (ItemType::Local, LOCAL_USAGE_MAX) => format!("Usage Maximum ({})", item.value()),
            (_, tag) if item.long => format!("Long Item (tag 0x{tag:02X})"),
            (kind, tag) => format!("{kind:?} item (tag 0x{tag:X})"),
        };
        let end = item.offset + item.encoded_len();
        out.push(AnnotatedItem {
            offset: item.offset,
            bytes: rdesc[item.offset..end].to_vec(),
            depth: item_depth,
            label,
        });
    }
    out
}

fn main_flags(v: u32) -> String {
    let pick = |bit: u32, set: &'static str, clear: &'static str| {
        if v & bit != 0 { set } else { clear }
    };
    format!(
        "{},{},{}",
        pick(0x01, "Cnst", "Data"),
        pick(0x02, "Var", "Arr"),
        pick(0x04, "Rel", "Abs")
    )
}

fn usage_page_name(page: u16) -> String {
    match page {
        0x00 => "Undefined".into(),
        0x01 => "Generic Desktop".into(),
        0x02 => "Simulation Controls".into(),
        0x07 => "Keyboard".into(),
        0x08 => "LEDs".into(),
        0x09 => "Button".into(),
        0x0C => "Consumer".into(),
        p if p >= 0xFF00 => format!("Vendor 0x{p:04X}"),
        p => format!("0x{p:02X}"),
    }
}

/// Name a usage within its page, falling back to hex.
pub fn usage_name(page: u16, usage: u16) -> String {
    match (page, usage) {
        (0x01, 0x01) => "Pointer".into(),
        (0x01, 0x02) => "Mouse".into(),
        (0x01, 0x04) => "Joystick".into(),
        (0x01, 0x05) => "Game Pad".into(),
        (0x01, 0x06) => "Keyboard".into(),
        (0x01, 0x30) => "X".into(),
        (0x01, 0x31) => "Y".into(),
        (0x09, n) => format!("Button {n}"),
        (_, n) => format!("0x{n:02X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GX100_BUTTONS16_RDESC, GX100_FACTORY_RDESC};

    #[test]
    fn tokenizes_factory_descriptor() {
        let items: Vec<_> = ItemIter::new(&GX100_FACTORY_RDESC).collect::<Result<_, _>>().unwrap();
        assert_eq!(items.len(), 25);
        assert_eq!(items[1].item_type, ItemType::Local);
        assert_eq!(items[1].value(), 0x05);
        let total: usize = items.iter().map(|i| i.encoded_len()).sum();
        assert_eq!(total, GX100_FACTORY_RDESC.len());
    }

    #[test]
    fn factory_is_gamepad_logical() {
        let summary = parse(&GX100_FACTORY_RDESC).unwrap();
        assert_eq!(
            summary.top_level,
            vec![TopLevel {
                usage_page: 0x01,
                usage: 0x05,
                kind: CollectionKind::Logical,
            }]
        );
        assert!(!summary.is_joystick());
        let bits = &summary.reports[&0];
        assert_eq!(bits.input_bytes(), 16);
        assert_eq!(bits.output_bytes(), 64);
    }

    #[test]
    fn buttons16_is_joystick_with_16_byte_input() {
        let summary = parse(GX100_BUTTONS16_RDESC).unwrap();
        assert!(summary.is_joystick());
        assert_eq!(summary.reports[&0].input, 16 + 14 * 8);
        assert_eq!(summary.reports[&0].output, 0);
    }

    #[test]
    fn truncated_item_is_rejected() {
        // Logical Maximum (2-byte) with only one data byte
        let rdesc = [0x05, 0x01, 0x09, 0x04, 0xA1, 0x01, 0x26, 0xFF];
        assert_eq!(parse(&rdesc), Err(RdescError::Truncated { offset: 6 }));
    }

    #[test]
    fn unbalanced_end_collection_is_rejected() {
        let rdesc = [0x05, 0x01, 0xC0];
        assert_eq!(
            parse(&rdesc),
            Err(RdescError::UnbalancedEndCollection { offset: 2 })
        );
    }

    #[test]
    fn unclosed_collection_is_rejected() {
        let rdesc = [0x05, 0x01, 0x09, 0x04, 0xA1, 0x01, 0xA1, 0x00, 0xC0];
        assert_eq!(
            parse(&rdesc),
            Err(RdescError::UnclosedCollection { depth: 1 })
        );
    }

    #[test]
    fn pop_without_push_is_rejected() {
        let rdesc = [0xB4];
        assert_eq!(parse(&rdesc), Err(RdescError::PopWithoutPush { offset: 0 }));
    }

    #[test]
    fn input_outside_collection_is_rejected() {
        let rdesc = [0x75, 0x08, 0x95, 0x01, 0x81, 0x02];
        assert_eq!(
            parse(&rdesc),
            Err(RdescError::ItemOutsideCollection { offset: 4 })
        );
    }

    #[test]
    fn empty_descriptor_is_rejected() {
        assert_eq!(parse(&[]), Err(RdescError::Empty));
    }

    #[test]
    fn push_pop_restores_report_size() {
        let rdesc = [
            0x05, 0x01, 0x09, 0x04, 0xA1, 0x01, // Joystick application
            0x75, 0x08, 0x95, 0x01, // size 8, count 1
            0xA4, // Push
            0x75, 0x10, // size 16
            0x81, 0x02, // 16 bits
            0xB4, // Pop
            0x81, 0x02, // 8 bits
            0xC0,
        ];
        let summary = parse(&rdesc).unwrap();
        assert_eq!(summary.reports[&0].input, 24);
    }

    #[test]
    fn report_ids_are_tracked_separately() {
        let rdesc = [
            0x05, 0x01, 0x09, 0x04, 0xA1, 0x01, 0x85, 0x01, 0x75, 0x08, 0x95, 0x02, 0x81, 0x02,
            0x85, 0x02, 0x95, 0x04, 0x81, 0x02, 0xC0,
        ];
        let summary = parse(&rdesc).unwrap();
        assert_eq!(summary.reports[&1].input_bytes(), 2);
        assert_eq!(summary.reports[&2].input_bytes(), 4);
    }

    #[test]
    fn long_item_is_skipped() {
        let rdesc = [0xFE, 0x02, 0x10, 0xAA, 0xBB, 0x05, 0x01, 0x09, 0x04, 0xA1, 0x01, 0xC0];
        let summary = parse(&rdesc).unwrap();
        assert!(summary.is_joystick());
        let items: Vec<_> = ItemIter::new(&rdesc).collect::<Result<_, _>>().unwrap();
        assert!(items[0].long);
        assert_eq!(items[0].data, &[0xAA, 0xBB]);
    }

    #[test]
    fn truncated_long_item_is_rejected() {
        assert_eq!(parse(&[0xFE, 0x05]), Err(RdescError::Truncated { offset: 0 }));
    }

    #[test]
    fn signed_values_sign_extend() {
        let items: Vec<_> = ItemIter::new(&[0x25, 0xFF, 0x26, 0xFF, 0x00])
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(items[0].signed_value(), -1);
        assert_eq!(items[1].signed_value(), 255);
    }

    #[test]
    fn annotate_labels_factory_header() {
        let items = annotate(&GX100_FACTORY_RDESC);
        assert_eq!(items[0].label, "Usage Page (Generic Desktop)");
        assert_eq!(items[1].label, "Usage (Game Pad)");
        assert_eq!(items[2].label, "Collection (Logical)");
        assert_eq!(items[3].depth, 1);
        assert_eq!(items[3].label, "Usage Page (Button)");
        let last = items.last().unwrap();
        assert_eq!(last.label, "End Collection");
        assert_eq!(last.depth, 0);
    }

    #[test]
    fn annotate_input_flags() {
        let items = annotate(GX100_BUTTONS16_RDESC);
        let inputs: Vec<_> = items
            .iter()
            .filter(|i| i.label.starts_with("Input"))
            .map(|i| i.label.as_str())
            .collect();
        assert_eq!(inputs, ["Input (Data,Var,Abs)", "Input (Cnst,Arr,Abs)"]);
    }

    #[test]
    fn annotate_stops_at_truncation() {
        let items = annotate(&[0x05, 0x01, 0x26, 0xFF]);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            RdescError::UnclosedCollection { depth: 2 }.to_string(),
            "descriptor ends with 2 unclosed collection(s)"
        );
    }
}
