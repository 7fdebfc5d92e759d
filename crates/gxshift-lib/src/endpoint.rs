//! Text endpoints exposing the control surface (`mode`, `calibration_h`,
//! `calibration_seq`).

use std::fmt;

use crate::control::{CalibrationAxis, ControlError, ControlSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Mode,
    CalibrationH,
    CalibrationSeq,
}

impl Endpoint {
    /// All endpoints, in registration order.
    pub const ALL: [Endpoint; 3] = [
        Endpoint::Mode,
        Endpoint::CalibrationH,
        Endpoint::CalibrationSeq,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Mode => "mode",
            Endpoint::CalibrationH => "calibration_h",
            Endpoint::CalibrationSeq => "calibration_seq",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    fn axis(&self) -> Option<CalibrationAxis> {
        match self {
            Endpoint::Mode => None,
            Endpoint::CalibrationH => Some(CalibrationAxis::H),
            Endpoint::CalibrationSeq => Some(CalibrationAxis::Sequential),
        }
    }

    /// Render the current value, newline-terminated.
    pub fn show(&self, surface: &ControlSurface) -> String {
        match self.axis() {
            None => format!("{}\n", surface.mode().token()),
            Some(axis) => format!("{}\n", u8::from(surface.calibration(axis))),
        }
    }

    /// Apply a write. Returns the number of bytes consumed (all of `buf`).
    ///
    /// `mode` looks only at the leading byte; trailing bytes (typically the
    /// newline from `echo`) are ignored.
    pub fn store(&self, surface: &ControlSurface, buf: &[u8]) -> Result<usize, ControlError> {
        match self.axis() {
            None => {
                let &token = buf.first().ok_or(ControlError::Empty)?;
                surface.set_mode_token(token)?;
            }
            Some(axis) => surface.set_calibration_text(axis, buf)?,
        }
        Ok(buf.len())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::DeviceMode;

    #[test]
    fn names_roundtrip() {
        for ep in Endpoint::ALL {
            assert_eq!(Endpoint::from_name(ep.name()), Some(ep));
        }
        assert_eq!(Endpoint::from_name("calibration"), None);
        assert_eq!(Endpoint::from_name("MODE"), None);
    }

    #[test]
    fn show_defaults() {
        let surface = ControlSurface::default();
        assert_eq!(Endpoint::Mode.show(&surface), "H\n");
        assert_eq!(Endpoint::CalibrationH.show(&surface), "0\n");
        assert_eq!(Endpoint::CalibrationSeq.show(&surface), "0\n");
    }

    #[test]
    fn store_mode_with_trailing_newline() {
        let surface = ControlSurface::default();
        assert_eq!(Endpoint::Mode.store(&surface, b"S\n"), Ok(2));
        assert_eq!(surface.mode(), DeviceMode::Sequential);
        assert_eq!(Endpoint::Mode.show(&surface), "S\n");
    }

    #[test]
    fn store_mode_uses_leading_byte_only() {
        let surface = ControlSurface::default();
        assert_eq!(Endpoint::Mode.store(&surface, b"Sequential"), Ok(10));
        assert_eq!(surface.mode(), DeviceMode::Sequential);
    }

    #[test]
    fn store_mode_rejects_unknown_and_empty() {
        let surface = ControlSurface::default();
        assert_eq!(
            Endpoint::Mode.store(&surface, b"X"),
            Err(ControlError::UnknownMode(b'X'))
        );
        assert_eq!(Endpoint::Mode.store(&surface, b""), Err(ControlError::Empty));
        assert_eq!(Endpoint::Mode.show(&surface), "H\n");
    }

    #[test]
    fn store_calibration() {
        let surface = ControlSurface::default();
        assert_eq!(Endpoint::CalibrationSeq.store(&surface, b"1\n"), Ok(2));
        assert_eq!(Endpoint::CalibrationSeq.show(&surface), "1\n");
        assert_eq!(Endpoint::CalibrationH.show(&surface), "0\n");
    }

    #[test]
    fn store_calibration_rejects_out_of_range() {
        let surface = ControlSurface::default();
        assert_eq!(
            Endpoint::CalibrationH.store(&surface, b"2"),
            Err(ControlError::OutOfRange(2))
        );
        assert_eq!(Endpoint::CalibrationH.show(&surface), "0\n");
    }
}
