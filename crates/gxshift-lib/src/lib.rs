//! gxshift — report descriptor fixup and mode control for the GX100 shifter.

pub mod config;
pub mod control;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod fixup;
pub mod hooks;
#[doc(hidden)]
pub mod mock;
pub mod protocol;
pub mod rdesc;
pub mod session;

pub use error::GxshiftError;
