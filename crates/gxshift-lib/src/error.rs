//! Unified error type for the gxshift-lib crate.
//!
//! [`GxshiftError`] wraps the module-specific errors (`DeviceError`,
//! `ControlError`, `RdescError`) plus I/O and configuration failures.
//! `From` impls allow `?` to propagate across module boundaries seamlessly.

use std::fmt;

use crate::control::ControlError;
use crate::device::DeviceError;
use crate::rdesc::RdescError;

/// Unified error type for gxshift-lib operations.
#[derive(Debug)]
pub enum GxshiftError {
    /// Device access error (open, descriptor read, endpoint setup).
    Device(DeviceError),
    /// Rejected control-surface write.
    Control(ControlError),
    /// Malformed report descriptor.
    Descriptor(RdescError),
    /// Standard I/O error (file read/write, config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
}

impl fmt::Display for GxshiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GxshiftError::Device(e) => write!(f, "{e}"),
            GxshiftError::Control(e) => write!(f, "{e}"),
            GxshiftError::Descriptor(e) => write!(f, "Descriptor error: {e}"),
            GxshiftError::Io(e) => write!(f, "I/O error: {e}"),
            GxshiftError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for GxshiftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GxshiftError::Device(e) => Some(e),
            GxshiftError::Control(e) => Some(e),
            GxshiftError::Descriptor(e) => Some(e),
            GxshiftError::Io(e) => Some(e),
            GxshiftError::Config(_) => None,
        }
    }
}

impl From<DeviceError> for GxshiftError {
    fn from(e: DeviceError) -> Self {
        GxshiftError::Device(e)
    }
}

impl From<ControlError> for GxshiftError {
    fn from(e: ControlError) -> Self {
        GxshiftError::Control(e)
    }
}

impl From<RdescError> for GxshiftError {
    fn from(e: RdescError) -> Self {
        GxshiftError::Descriptor(e)
    }
}

impl From<std::io::Error> for GxshiftError {
    fn from(e: std::io::Error) -> Self {
        GxshiftError::Io(e)
    }
}

/// Crate-level Result alias using [`GxshiftError`].
pub type Result<T> = std::result::Result<T, GxshiftError>;
