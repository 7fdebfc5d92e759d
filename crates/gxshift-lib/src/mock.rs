//! In-memory doubles for unit and integration tests.
//!
//! Always compiled (zero runtime cost), hidden from public docs.

use std::cell::{Cell, RefCell};
use std::sync::{Arc, Mutex};

use crate::control::{CalibrationAxis, ControlSurface, DeviceMode, DeviceNotifier};
use crate::device::{DeviceError, DeviceInfo, Result, ShifterDevice};
use crate::endpoint::Endpoint;
use crate::protocol::GX100_FACTORY_RDESC;
use crate::session::EndpointHost;

// ── Device ──

/// Device serving a fixed report descriptor.
pub struct MockDevice {
    info: DeviceInfo,
    /// Bytes returned by `report_descriptor`.
    pub descriptor: RefCell<Vec<u8>>,
    /// If true, `report_descriptor` returns `ReadFailed`.
    pub fail_read: Cell<bool>,
    /// Number of `report_descriptor` calls.
    pub reads: Cell<usize>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::factory()
    }
}

impl MockDevice {
    /// A shifter with the stock firmware descriptor.
    pub fn factory() -> Self {
        Self::with_descriptor(GX100_FACTORY_RDESC.to_vec())
    }

    pub fn with_descriptor(descriptor: Vec<u8>) -> Self {
        MockDevice {
            info: DeviceInfo {
                path: "mock://gx100".into(),
                product: "GX100 (mock)".into(),
                serial: Some("MOCK123".into()),
                interface: 0,
            },
            descriptor: RefCell::new(descriptor),
            fail_read: Cell::new(false),
            reads: Cell::new(0),
        }
    }
}

impl ShifterDevice for MockDevice {
    fn open() -> Result<Self> {
        Ok(Self::factory())
    }

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn report_descriptor(&self) -> Result<Vec<u8>> {
        self.reads.set(self.reads.get() + 1);
        if self.fail_read.get() {
            return Err(DeviceError::ReadFailed(
                "mock: read failure injected".into(),
            ));
        }
        Ok(self.descriptor.borrow().clone())
    }
}

// ── Notifier ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Mode(DeviceMode),
    Calibration(CalibrationAxis, bool),
}

/// Notifier that records every call, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Drain the recorded notifications.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn push(&self, n: Notification) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(n);
    }
}

impl DeviceNotifier for RecordingNotifier {
    fn mode_changed(&self, mode: DeviceMode) {
        self.push(Notification::Mode(mode));
    }

    fn calibration_changed(&self, axis: CalibrationAxis, armed: bool) {
        self.push(Notification::Calibration(axis, armed));
    }
}

// ── Endpoint host ──

/// Host that records endpoint registration, with optional failure injection.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub created: Vec<Endpoint>,
    pub removed: Vec<Endpoint>,
    /// `create` for this endpoint returns `EndpointFailed`.
    pub fail_on: Option<Endpoint>,
    /// Surface handed to the last `create`.
    pub surface: Option<Arc<ControlSurface>>,
}

impl RecordingHost {
    pub fn failing_on(endpoint: Endpoint) -> Self {
        RecordingHost {
            fail_on: Some(endpoint),
            ..Default::default()
        }
    }
}

impl EndpointHost for RecordingHost {
    fn create(&mut self, endpoint: Endpoint, surface: &Arc<ControlSurface>) -> Result<()> {
        if self.fail_on == Some(endpoint) {
            return Err(DeviceError::EndpointFailed(format!(
                "mock: {endpoint} creation failure injected"
            )));
        }
        self.created.push(endpoint);
        self.surface = Some(Arc::clone(surface));
        Ok(())
    }

    fn remove(&mut self, endpoint: Endpoint) {
        self.removed.push(endpoint);
    }
}
