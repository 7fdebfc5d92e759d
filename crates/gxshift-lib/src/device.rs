//! Device access — trait + Linux USB backend + file backend.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::protocol::*;
use crate::rdesc::RdescError;

// ── Error type ──

/// Device access errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* names the step (e.g. `"USB open"`, `"GET_DESCRIPTOR"`) and
/// *details* describes what went wrong.
#[derive(Debug)]
pub enum DeviceError {
    NotFound,
    OpenFailed(String),
    ReadFailed(String),
    /// The (fixed-up) report descriptor failed to parse.
    ParseFailed(RdescError),
    /// The host refused to register a control endpoint.
    EndpointFailed(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound => write!(f, "GX100 shifter not found"),
            DeviceError::OpenFailed(e) => write!(f, "Failed to open device: {e}"),
            DeviceError::ReadFailed(e) => write!(f, "Failed to read report descriptor: {e}"),
            DeviceError::ParseFailed(e) => write!(f, "Report descriptor parse failed: {e}"),
            DeviceError::EndpointFailed(e) => write!(f, "Failed to create endpoint: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::ParseFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RdescError> for DeviceError {
    fn from(e: RdescError) -> Self {
        DeviceError::ParseFailed(e)
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Device info ──

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Bus location (`usb:BBB/DDD`) or file path for offline devices.
    pub path: String,
    pub product: String,
    pub serial: Option<String>,
    /// HID interface number the report descriptor belongs to.
    pub interface: u8,
}

// ── Trait ──

pub trait ShifterDevice {
    fn open() -> Result<Self>
    where
        Self: Sized;
    fn info(&self) -> &DeviceInfo;
    /// Read the raw (unfixed) HID report descriptor.
    fn report_descriptor(&self) -> Result<Vec<u8>>;
}

impl<D: ShifterDevice + ?Sized> ShifterDevice for Box<D> {
    fn open() -> Result<Self> {
        Err(DeviceError::OpenFailed(
            "boxed device: open the concrete backend instead".into(),
        ))
    }
    fn info(&self) -> &DeviceInfo {
        (**self).info()
    }
    fn report_descriptor(&self) -> Result<Vec<u8>> {
        (**self).report_descriptor()
    }
}

// ── Linux implementation ──

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::time::Duration;

    use nusb::transfer::Control;
    use nusb::transfer::ControlType;
    use nusb::transfer::Recipient;

    pub struct LinuxDevice {
        device: nusb::Device,
        info: DeviceInfo,
    }

    pub(super) fn is_shifter(dev: &nusb::DeviceInfo) -> bool {
        dev.vendor_id() == GX_VID && dev.product_id() == GX100_PID
    }

    pub(super) fn bus_path(dev: &nusb::DeviceInfo) -> String {
        format!("usb:{:03}/{:03}", dev.bus_number(), dev.device_address())
    }

    fn hid_interface(dev: &nusb::DeviceInfo) -> Option<u8> {
        dev.interfaces()
            .find(|iface| iface.class() == USB_CLASS_HID)
            .map(|iface| iface.interface_number())
    }

    impl LinuxDevice {
        /// Open the first shifter whose serial matches, or the first shifter
        /// when `serial` is `None`.
        pub fn open_matching(serial: Option<&str>) -> Result<Self> {
            let device_info = nusb::list_devices()
                .map_err(|e| DeviceError::OpenFailed(format!("USB enumeration: {e}")))?
                .filter(is_shifter)
                .find(|dev| match serial {
                    None => true,
                    Some(want) => dev
                        .serial_number()
                        .is_some_and(|s| s.eq_ignore_ascii_case(want)),
                })
                .ok_or(DeviceError::NotFound)?;

            let interface = hid_interface(&device_info)
                .ok_or_else(|| DeviceError::OpenFailed("no HID interface".into()))?;

            // The HID driver keeps its claim on the interface; a standard
            // GET_DESCRIPTOR on the default pipe needs no claim.
            let device = device_info
                .open()
                .map_err(|e| DeviceError::OpenFailed(format!("USB open: {e}")))?;

            Ok(LinuxDevice {
                device,
                info: DeviceInfo {
                    path: bus_path(&device_info),
                    product: device_info.product_string().unwrap_or("GX100").to_string(),
                    serial: device_info.serial_number().map(|s| s.to_string()),
                    interface,
                },
            })
        }
    }

    impl ShifterDevice for LinuxDevice {
        fn open() -> Result<Self> {
            Self::open_matching(None)
        }

        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn report_descriptor(&self) -> Result<Vec<u8>> {
            let control = Control {
                control_type: ControlType::Standard,
                recipient: Recipient::Interface,
                request: USB_REQ_GET_DESCRIPTOR,
                value: u16::from(HID_DT_REPORT) << 8,
                index: u16::from(self.info.interface),
            };
            let mut buf = vec![0u8; HID_MAX_DESCRIPTOR_SIZE];
            let n = self
                .device
                .control_in_blocking(control, &mut buf, Duration::from_millis(USB_TIMEOUT_MS))
                .map_err(|e| DeviceError::ReadFailed(format!("GET_DESCRIPTOR: {e}")))?;
            buf.truncate(n);
            log::debug!("read {n}-byte report descriptor from {}", self.info.path);
            Ok(buf)
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::LinuxDevice;

// ── Stub device for unsupported platforms ──

/// Placeholder device that always returns `NotFound`.
/// Enables compilation and `cargo test` on unsupported hosts.
#[cfg(not(target_os = "linux"))]
pub struct StubDevice {
    info: DeviceInfo,
}

#[cfg(not(target_os = "linux"))]
impl StubDevice {
    pub fn open_matching(_serial: Option<&str>) -> Result<Self> {
        Err(DeviceError::NotFound)
    }
}

#[cfg(not(target_os = "linux"))]
impl ShifterDevice for StubDevice {
    fn open() -> Result<Self> {
        Err(DeviceError::NotFound)
    }
    fn info(&self) -> &DeviceInfo {
        &self.info
    }
    fn report_descriptor(&self) -> Result<Vec<u8>> {
        Err(DeviceError::NotFound)
    }
}

// ── File-backed device ──

/// Serves a report descriptor captured to disk (e.g. from
/// `/sys/class/hidraw/*/device/report_descriptor`).
#[derive(Debug)]
pub struct FileDevice {
    file: PathBuf,
    info: DeviceInfo,
}

impl FileDevice {
    /// Fails with `NotFound` if `path` does not exist.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = path.as_ref().to_path_buf();
        if !file.is_file() {
            return Err(DeviceError::NotFound);
        }
        let info = DeviceInfo {
            path: file.display().to_string(),
            product: "GX100 (file)".into(),
            serial: None,
            interface: 0,
        };
        Ok(FileDevice { file, info })
    }
}

impl ShifterDevice for FileDevice {
    /// A file device has no default location; use [`FileDevice::from_path`].
    fn open() -> Result<Self> {
        Err(DeviceError::OpenFailed(
            "file device: no path given".into(),
        ))
    }

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn report_descriptor(&self) -> Result<Vec<u8>> {
        let data = std::fs::read(&self.file)
            .map_err(|e| DeviceError::ReadFailed(format!("{}: {e}", self.file.display())))?;
        if data.len() > HID_MAX_DESCRIPTOR_SIZE {
            return Err(DeviceError::ReadFailed(format!(
                "{}: {} bytes exceeds the {HID_MAX_DESCRIPTOR_SIZE}-byte descriptor limit",
                self.file.display(),
                data.len()
            )));
        }
        Ok(data)
    }
}

// ── Device enumeration ──

/// A connected shifter (not yet opened).
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    /// Bus location, e.g. `usb:001/004 [04b0:5750]`.
    pub path: String,
    pub product: Option<String>,
    pub serial: Option<String>,
}

/// Enumerate all connected GX100 shifters.
///
/// On unsupported platforms, always returns an empty list.
pub fn enumerate_devices() -> Vec<DiscoveredDevice> {
    #[cfg(target_os = "linux")]
    {
        enumerate_devices_linux()
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "linux")]
fn enumerate_devices_linux() -> Vec<DiscoveredDevice> {
    let Ok(devices) = nusb::list_devices() else {
        return Vec::new();
    };

    devices
        .filter(linux_impl::is_shifter)
        .map(|dev| DiscoveredDevice {
            path: format!(
                "{} [{:04x}:{:04x}]",
                linux_impl::bus_path(&dev),
                dev.vendor_id(),
                dev.product_id()
            ),
            product: dev.product_string().map(|s| s.to_string()),
            serial: dev.serial_number().map(|s| s.to_string()),
        })
        .collect()
}

/// Concrete device type for the current platform.
#[cfg(target_os = "linux")]
pub type PlatformDevice = LinuxDevice;
#[cfg(not(target_os = "linux"))]
pub type PlatformDevice = StubDevice;

/// Open the first connected shifter.
pub fn open_device() -> Result<PlatformDevice> {
    PlatformDevice::open()
}

/// Open the shifter with the given serial number.
///
/// If `serial` is empty, delegates to [`open_device`] (auto-select). When no
/// device matches, the error lists the serials that are present.
pub fn open_device_by_serial(serial: &str) -> Result<PlatformDevice> {
    let serial = serial.trim();
    if serial.is_empty() {
        return open_device();
    }
    match PlatformDevice::open_matching(Some(serial)) {
        Err(DeviceError::NotFound) => {
            let devices = enumerate_devices();
            if devices.is_empty() {
                return Err(DeviceError::NotFound);
            }
            Err(DeviceError::OpenFailed(format!(
                "no device with serial '{serial}' found (available: {})",
                available_serials(&devices)
            )))
        }
        other => other,
    }
}

fn available_serials(devices: &[DiscoveredDevice]) -> String {
    devices
        .iter()
        .map(|d| d.serial.as_deref().unwrap_or("(no serial)"))
        .collect::<Vec<_>>()
        .join(", ")
}
