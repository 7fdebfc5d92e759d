//! Device session — attach/detach lifecycle binding a device to a fresh
//! control surface.
//!
//! Attach runs the fixup table once over the raw descriptor, checks that the
//! result parses, then registers the control endpoints with an
//! [`EndpointHost`]. A failed endpoint registration rolls back the ones
//! already created.

use std::sync::Arc;

use crate::control::{ControlError, ControlSurface, DeviceNotifier};
use crate::device::{DeviceError, DeviceInfo, Result, ShifterDevice};
use crate::endpoint::Endpoint;
use crate::fixup::{FixupOutcome, FixupTable};
use crate::rdesc::{self, DescriptorSummary};

/// Platform side that publishes endpoints (attribute files, a REPL, ...).
pub trait EndpointHost {
    fn create(&mut self, endpoint: Endpoint, surface: &Arc<ControlSurface>) -> Result<()>;
    fn remove(&mut self, endpoint: Endpoint);
}

/// Host that publishes nothing; endpoints are reached through
/// [`DeviceSession::show`] and [`DeviceSession::store`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl EndpointHost for NullHost {
    fn create(&mut self, _endpoint: Endpoint, _surface: &Arc<ControlSurface>) -> Result<()> {
        Ok(())
    }
    fn remove(&mut self, _endpoint: Endpoint) {}
}

/// One attached shifter.
#[derive(Debug)]
pub struct DeviceSession {
    info: DeviceInfo,
    raw: Vec<u8>,
    descriptor: Vec<u8>,
    outcome: FixupOutcome,
    summary: DescriptorSummary,
    surface: Arc<ControlSurface>,
}

impl DeviceSession {
    pub fn attach<D, H>(
        device: &D,
        table: &FixupTable,
        notifier: Arc<dyn DeviceNotifier>,
        host: &mut H,
    ) -> Result<Self>
    where
        D: ShifterDevice + ?Sized,
        H: EndpointHost + ?Sized,
    {
        let raw = device.report_descriptor()?;

        let mut buf = raw.clone();
        let (outcome, fixed) = table.apply(&mut buf);
        let descriptor = fixed.to_vec();

        let summary = rdesc::parse(&descriptor).map_err(DeviceError::ParseFailed)?;
        let surface = Arc::new(ControlSurface::new(notifier));

        let mut created = Vec::with_capacity(Endpoint::ALL.len());
        for endpoint in Endpoint::ALL {
            if let Err(e) = host.create(endpoint, &surface) {
                log::warn!("failed to create {endpoint} endpoint: {e}");
                for done in created.into_iter().rev() {
                    host.remove(done);
                }
                return Err(e);
            }
            created.push(endpoint);
        }

        log::info!(
            "attached {} ({}), descriptor {outcome}",
            device.info().product,
            device.info().path
        );

        Ok(DeviceSession {
            info: device.info().clone(),
            raw,
            descriptor,
            outcome,
            summary,
            surface,
        })
    }

    /// Remove the endpoints and drop the session state.
    pub fn detach<H: EndpointHost + ?Sized>(self, host: &mut H) {
        for endpoint in Endpoint::ALL.into_iter().rev() {
            host.remove(endpoint);
        }
        log::info!("detached {}", self.info.path);
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Descriptor as read from the device, before fixup.
    pub fn raw_descriptor(&self) -> &[u8] {
        &self.raw
    }

    /// Descriptor handed to the host parser.
    pub fn descriptor(&self) -> &[u8] {
        &self.descriptor
    }

    pub fn outcome(&self) -> &FixupOutcome {
        &self.outcome
    }

    pub fn summary(&self) -> &DescriptorSummary {
        &self.summary
    }

    pub fn surface(&self) -> &Arc<ControlSurface> {
        &self.surface
    }

    pub fn show(&self, endpoint: Endpoint) -> String {
        endpoint.show(&self.surface)
    }

    pub fn store(
        &self,
        endpoint: Endpoint,
        buf: &[u8],
    ) -> std::result::Result<usize, ControlError> {
        endpoint.store(&self.surface, buf)
    }
}
