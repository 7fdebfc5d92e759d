//! Protocol constants for the GX100 shifter.
//!
//! HID item prefixes and usage values follow the HID 1.11 specification and
//! the HID Usage Tables. The device identifiers and the factory descriptor
//! layout come from captures of the stock firmware.
//!
//! ## Factory descriptor (50 bytes)
//!
//! ```text
//! 05 01        Usage Page (Generic Desktop)
//! 09 05        Usage (Game Pad)              <- offset 3 patched to 0x04
//! A1 02        Collection (Logical)          <- offset 5 patched to 0x01
//! 05 09          Usage Page (Button)
//! 19 01          Usage Minimum (1)
//! 29 10          Usage Maximum (16)
//! 15 00          Logical Minimum (0)
//! 25 01          Logical Maximum (1)
//! 95 10          Report Count (16)
//! 75 01          Report Size (1)
//! 81 02          Input (Data,Var,Abs)
//! 05 00          Usage Page (Undefined)
//! 09 01          Usage (1)
//! 15 00          Logical Minimum (0)
//! 25 FF          Logical Maximum (-1)
//! 95 0E          Report Count (14)
//! 75 08          Report Size (8)
//! 81 02          Input (Data,Var,Abs)
//! 09 20          Usage (0x20)
//! 15 00          Logical Minimum (0)
//! 26 FF 00       Logical Maximum (255)
//! 95 40          Report Count (64)
//! 75 08          Report Size (8)
//! 91 02          Output (Data,Var,Abs)
//! C0           End Collection
//! ```

// ── USB identifiers ──

/// Vendor ID reported by the GX100.
pub const GX_VID: u16 = 0x04b0;

/// Product ID reported by the GX100 shifter.
pub const GX100_PID: u16 = 0x5750;

/// USB interface class for HID.
pub const USB_CLASS_HID: u8 = 0x03;

// ── USB control transfer parameters ──

/// Standard `GET_DESCRIPTOR` request.
pub const USB_REQ_GET_DESCRIPTOR: u8 = 0x06;

/// HID class descriptor type for the report descriptor.
pub const HID_DT_REPORT: u8 = 0x22;

/// Timeout per USB control transfer in milliseconds.
pub const USB_TIMEOUT_MS: u64 = 1000;

/// Largest report descriptor we ask the device for.
pub const HID_MAX_DESCRIPTOR_SIZE: usize = 4096;

// ── HID short-item prefixes (tag | type | size) ──

pub const ITEM_USAGE_PAGE: u8 = 0x05;
pub const ITEM_USAGE: u8 = 0x09;
pub const ITEM_COLLECTION: u8 = 0xA1;
pub const ITEM_END_COLLECTION: u8 = 0xC0;

// ── Usage values ──

/// Generic Desktop usage page.
pub const USAGE_PAGE_GENERIC_DESKTOP: u8 = 0x01;

/// Button usage page.
pub const USAGE_PAGE_BUTTON: u8 = 0x09;

/// Generic Desktop: Joystick.
pub const USAGE_JOYSTICK: u8 = 0x04;

/// Generic Desktop: Game Pad.
pub const USAGE_GAMEPAD: u8 = 0x05;

// ── Collection types ──

pub const COLLECTION_APPLICATION: u8 = 0x01;
pub const COLLECTION_LOGICAL: u8 = 0x02;

// ── Factory descriptor signature ──

/// Length of the descriptor shipped by the stock firmware.
pub const GX100_RDESC_SIZE: usize = 50;

/// Descriptor shipped by the stock firmware, as laid out above.
pub const GX100_FACTORY_RDESC: [u8; GX100_RDESC_SIZE] = [
    0x05, 0x01, 0x09, 0x05, 0xA1, 0x02, 0x05, 0x09, 0x19, 0x01, 0x29, 0x10, 0x15, 0x00,
    0x25, 0x01, 0x95, 0x10, 0x75, 0x01, 0x81, 0x02, 0x05, 0x00, 0x09, 0x01, 0x15, 0x00,
    0x25, 0xFF, 0x95, 0x0E, 0x75, 0x08, 0x81, 0x02, 0x09, 0x20, 0x15, 0x00, 0x26, 0xFF,
    0x00, 0x95, 0x40, 0x75, 0x08, 0x91, 0x02, 0xC0,
];

/// Offset of the top-level Usage data byte.
pub const OFF_TOP_USAGE: usize = 3;

/// Offset of the top-level Collection data byte.
pub const OFF_TOP_COLLECTION: usize = 5;

/// Bytes of a button-only input report: 16 one-bit buttons plus padding.
pub const GX100_INPUT_REPORT_SIZE: usize = 16;

/// Hand-authored descriptor for firmware that reports buttons only.
///
/// 16 one-bit buttons packed into the first two bytes of each input report,
/// followed by 14 constant bytes the host ignores.
pub const GX100_BUTTONS16_RDESC: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x04, // Usage (Joystick)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x10, //   Usage Maximum (16)
    0x25, 0x01, //   Logical Maximum (1)
    0x95, 0x10, //   Report Count (16)
    0x75, 0x01, //   Report Size (1)
    0x81, 0x02, //   Input (Data,Var,Abs)
    0x95, 0x0E, //   Report Count (14)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Cnst,Arr,Abs)
    0xC0, // End Collection
];

/// Size of [`GX100_BUTTONS16_RDESC`].
pub const GX100_BUTTONS16_RDESC_SIZE: usize = 27;
