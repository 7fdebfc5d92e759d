//! Control surface — operating mode and calibration flags of one device session.
//!
//! State is a flat record `{mode, calib_h, calib_seq}` behind a mutex. Every
//! accepted write replaces a single field and is reported to the session's
//! [`DeviceNotifier`]; rejected writes leave the record untouched.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

/// Size of the scratch buffer the kernel attribute layer parses integers in.
/// Input must fit with room for a terminator.
pub const PARSE_BUF_LEN: usize = 32;

// ── Error type ──

/// Rejected control input. Every variant is an "invalid argument" condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    Empty,
    TooLong { len: usize, max: usize },
    NotANumber(String),
    OutOfRange(i64),
    UnknownMode(u8),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Empty => write!(f, "Invalid argument: empty input"),
            ControlError::TooLong { len, max } => {
                write!(f, "Invalid argument: input is {len} bytes (max {max})")
            }
            ControlError::NotANumber(s) => write!(f, "Invalid argument: not a number: {s:?}"),
            ControlError::OutOfRange(v) => {
                write!(f, "Invalid argument: {v} (expected 0 or 1)")
            }
            ControlError::UnknownMode(b) => write!(
                f,
                "Invalid argument: unknown mode {:?} (expected H or S)",
                char::from(*b)
            ),
        }
    }
}

impl std::error::Error for ControlError {}

// ── Values ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DeviceMode {
    #[default]
    HPattern,
    Sequential,
}

impl DeviceMode {
    /// Parse the single-byte mode token.
    pub fn from_token(token: u8) -> Result<Self, ControlError> {
        match token {
            b'H' => Ok(DeviceMode::HPattern),
            b'S' => Ok(DeviceMode::Sequential),
            other => Err(ControlError::UnknownMode(other)),
        }
    }

    pub fn token(&self) -> char {
        match self {
            DeviceMode::HPattern => 'H',
            DeviceMode::Sequential => 'S',
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMode::HPattern => write!(f, "H-pattern"),
            DeviceMode::Sequential => write!(f, "sequential"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalibrationAxis {
    H,
    Sequential,
}

impl CalibrationAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationAxis::H => "h",
            CalibrationAxis::Sequential => "seq",
        }
    }
}

/// Parse a calibration flag the way the attribute layer does: base-10 signed
/// integer, at most one trailing newline, value 0 or 1.
pub fn parse_flag(buf: &[u8]) -> Result<bool, ControlError> {
    if buf.len() >= PARSE_BUF_LEN {
        return Err(ControlError::TooLong {
            len: buf.len(),
            max: PARSE_BUF_LEN - 1,
        });
    }
    let text = std::str::from_utf8(buf)
        .map_err(|_| ControlError::NotANumber(String::from_utf8_lossy(buf).into_owned()))?;
    let text = text.strip_suffix('\n').unwrap_or(text);
    if text.is_empty() {
        return Err(ControlError::Empty);
    }
    let value: i64 = text
        .parse::<i32>()
        .map_err(|_| ControlError::NotANumber(text.to_string()))?
        .into();
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ControlError::OutOfRange(other)),
    }
}

// ── Notifier ──

/// Port invoked after every accepted write.
///
/// Called with the state lock held, so calls arrive in the order the state
/// changed. Implementations must not block; hand real device I/O off to
/// another thread.
pub trait DeviceNotifier: Send + Sync {
    fn mode_changed(&self, mode: DeviceMode);
    fn calibration_changed(&self, axis: CalibrationAxis, armed: bool);
}

/// Notifier that does nothing. The hardware command set for mode and
/// calibration changes is not known yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl DeviceNotifier for NullNotifier {
    fn mode_changed(&self, _mode: DeviceMode) {}
    fn calibration_changed(&self, _axis: CalibrationAxis, _armed: bool) {}
}

// ── State ──

/// Snapshot of the control state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControlState {
    pub mode: DeviceMode,
    pub calibration_h: bool,
    pub calibration_seq: bool,
}

impl ControlState {
    pub fn calibration(&self, axis: CalibrationAxis) -> bool {
        match axis {
            CalibrationAxis::H => self.calibration_h,
            CalibrationAxis::Sequential => self.calibration_seq,
        }
    }
}

/// Per-session control state plus its notifier.
pub struct ControlSurface {
    state: Mutex<ControlState>,
    notifier: Arc<dyn DeviceNotifier>,
}

impl fmt::Debug for ControlSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSurface")
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Default for ControlSurface {
    fn default() -> Self {
        Self::new(Arc::new(NullNotifier))
    }
}

impl ControlSurface {
    /// Fresh state: H-pattern, both calibrations disarmed.
    pub fn new(notifier: Arc<dyn DeviceNotifier>) -> Self {
        ControlSurface {
            state: Mutex::new(ControlState::default()),
            notifier,
        }
    }

    // State is plain data, so a poisoned lock still holds a valid record.
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> ControlState {
        *self.lock()
    }

    pub fn mode(&self) -> DeviceMode {
        self.lock().mode
    }

    pub fn set_mode(&self, mode: DeviceMode) {
        let mut state = self.lock();
        state.mode = mode;
        log::debug!("mode set to {mode}");
        self.notifier.mode_changed(mode);
    }

    /// Set the mode from its token (`H` or `S`). Anything else is rejected.
    pub fn set_mode_token(&self, token: u8) -> Result<(), ControlError> {
        let mode = DeviceMode::from_token(token)?;
        self.set_mode(mode);
        Ok(())
    }

    pub fn calibration(&self, axis: CalibrationAxis) -> bool {
        self.lock().calibration(axis)
    }

    pub fn set_calibration(&self, axis: CalibrationAxis, armed: bool) {
        let mut state = self.lock();
        match axis {
            CalibrationAxis::H => state.calibration_h = armed,
            CalibrationAxis::Sequential => state.calibration_seq = armed,
        }
        log::debug!("calibration {} set to {armed}", axis.as_str());
        self.notifier.calibration_changed(axis, armed);
    }

    /// Set a calibration flag from text (see [`parse_flag`]).
    pub fn set_calibration_text(
        &self,
        axis: CalibrationAxis,
        buf: &[u8],
    ) -> Result<(), ControlError> {
        let armed = parse_flag(buf)?;
        self.set_calibration(axis, armed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Notification, RecordingNotifier};

    fn recording() -> (ControlSurface, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        (ControlSurface::new(notifier.clone()), notifier)
    }

    // ── Defaults ──

    #[test]
    fn fresh_state_is_h_pattern_disarmed() {
        let surface = ControlSurface::default();
        assert_eq!(
            surface.snapshot(),
            ControlState {
                mode: DeviceMode::HPattern,
                calibration_h: false,
                calibration_seq: false,
            }
        );
    }

    // ── Mode ──

    #[test]
    fn set_mode_h_and_s() {
        let surface = ControlSurface::default();
        surface.set_mode_token(b'S').unwrap();
        assert_eq!(surface.mode(), DeviceMode::Sequential);
        surface.set_mode_token(b'H').unwrap();
        assert_eq!(surface.mode(), DeviceMode::HPattern);
    }

    #[test]
    fn unknown_mode_is_rejected_without_change() {
        let (surface, notifier) = recording();
        surface.set_mode_token(b'S').unwrap();
        assert_eq!(
            surface.set_mode_token(b'X'),
            Err(ControlError::UnknownMode(b'X'))
        );
        assert_eq!(surface.mode(), DeviceMode::Sequential);
        assert_eq!(notifier.take(), vec![Notification::Mode(DeviceMode::Sequential)]);
    }

    #[test]
    fn lowercase_mode_is_rejected() {
        let surface = ControlSurface::default();
        assert!(surface.set_mode_token(b's').is_err());
        assert_eq!(surface.mode(), DeviceMode::HPattern);
    }

    // ── Calibration ──

    #[test]
    fn calibration_axes_are_independent() {
        let surface = ControlSurface::default();
        surface.set_calibration_text(CalibrationAxis::H, b"1").unwrap();
        assert!(surface.calibration(CalibrationAxis::H));
        assert!(!surface.calibration(CalibrationAxis::Sequential));
        surface
            .set_calibration_text(CalibrationAxis::Sequential, b"1\n")
            .unwrap();
        surface.set_calibration_text(CalibrationAxis::H, b"0").unwrap();
        assert!(!surface.calibration(CalibrationAxis::H));
        assert!(surface.calibration(CalibrationAxis::Sequential));
    }

    #[test]
    fn invalid_calibration_text_is_rejected_without_change() {
        let (surface, notifier) = recording();
        surface.set_calibration(CalibrationAxis::H, true);
        notifier.take();
        for input in [&b"2"[..], b"abc", b"", b"-1", b"1.0", b" 1"] {
            assert!(
                surface.set_calibration_text(CalibrationAxis::H, input).is_err(),
                "{input:?} should be rejected"
            );
            assert!(surface.calibration(CalibrationAxis::H));
        }
        assert!(notifier.take().is_empty());
    }

    #[test]
    fn accepted_writes_notify_in_order() {
        let (surface, notifier) = recording();
        surface.set_mode_token(b'S').unwrap();
        surface.set_calibration_text(CalibrationAxis::Sequential, b"1").unwrap();
        surface.set_calibration_text(CalibrationAxis::H, b"0").unwrap();
        assert_eq!(
            notifier.take(),
            vec![
                Notification::Mode(DeviceMode::Sequential),
                Notification::Calibration(CalibrationAxis::Sequential, true),
                Notification::Calibration(CalibrationAxis::H, false),
            ]
        );
    }

    // ── parse_flag ──

    #[test]
    fn parse_flag_accepts_zero_and_one() {
        assert_eq!(parse_flag(b"0"), Ok(false));
        assert_eq!(parse_flag(b"1"), Ok(true));
        assert_eq!(parse_flag(b"+1"), Ok(true));
        assert_eq!(parse_flag(b"-0"), Ok(false));
        assert_eq!(parse_flag(b"01"), Ok(true));
        assert_eq!(parse_flag(b"1\n"), Ok(true));
    }

    #[test]
    fn parse_flag_rejects_other_integers() {
        assert_eq!(parse_flag(b"2"), Err(ControlError::OutOfRange(2)));
        assert_eq!(parse_flag(b"-1"), Err(ControlError::OutOfRange(-1)));
    }

    #[test]
    fn parse_flag_rejects_garbage() {
        assert!(matches!(parse_flag(b"abc"), Err(ControlError::NotANumber(_))));
        assert!(matches!(parse_flag(b"1x"), Err(ControlError::NotANumber(_))));
        assert!(matches!(parse_flag(b"1\n\n"), Err(ControlError::NotANumber(_))));
        assert!(matches!(parse_flag(&[0xFF]), Err(ControlError::NotANumber(_))));
    }

    #[test]
    fn parse_flag_rejects_empty() {
        assert_eq!(parse_flag(b""), Err(ControlError::Empty));
        assert_eq!(parse_flag(b"\n"), Err(ControlError::Empty));
    }

    #[test]
    fn parse_flag_rejects_overflow() {
        assert!(matches!(
            parse_flag(b"99999999999"),
            Err(ControlError::NotANumber(_))
        ));
    }

    #[test]
    fn parse_flag_length_limit() {
        let fits = format!("{}1", "0".repeat(PARSE_BUF_LEN - 2));
        assert_eq!(parse_flag(fits.as_bytes()), Ok(true));
        let too_long = "0".repeat(PARSE_BUF_LEN);
        assert_eq!(
            parse_flag(too_long.as_bytes()),
            Err(ControlError::TooLong {
                len: PARSE_BUF_LEN,
                max: PARSE_BUF_LEN - 1
            })
        );
    }

    // ── Concurrency ──

    #[test]
    fn concurrent_mode_writers_leave_one_written_value() {
        let surface = ControlSurface::default();
        std::thread::scope(|s| {
            for i in 0..8 {
                let surface = &surface;
                s.spawn(move || {
                    let token = if i % 2 == 0 { b'H' } else { b'S' };
                    for _ in 0..500 {
                        surface.set_mode_token(token).unwrap();
                    }
                });
            }
            let surface = &surface;
            s.spawn(move || {
                for _ in 0..500 {
                    let m = surface.mode();
                    assert!(matches!(m, DeviceMode::HPattern | DeviceMode::Sequential));
                }
            });
        });
        assert!(matches!(
            surface.mode(),
            DeviceMode::HPattern | DeviceMode::Sequential
        ));
    }

    #[test]
    fn concurrent_writers_to_different_fields_do_not_lose_updates() {
        let surface = ControlSurface::default();
        std::thread::scope(|s| {
            s.spawn(|| surface.set_mode(DeviceMode::Sequential));
            s.spawn(|| surface.set_calibration(CalibrationAxis::H, true));
            s.spawn(|| surface.set_calibration(CalibrationAxis::Sequential, true));
        });
        assert_eq!(
            surface.snapshot(),
            ControlState {
                mode: DeviceMode::Sequential,
                calibration_h: true,
                calibration_seq: true,
            }
        );
    }

    #[test]
    fn notifier_sees_every_accepted_write() {
        let (surface, notifier) = recording();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        surface.set_calibration(CalibrationAxis::H, true);
                    }
                });
            }
        });
        assert_eq!(notifier.take().len(), 400);
    }

    // ── Display ──

    #[test]
    fn error_display() {
        assert_eq!(
            ControlError::UnknownMode(b'X').to_string(),
            "Invalid argument: unknown mode 'X' (expected H or S)"
        );
        assert_eq!(
            ControlError::OutOfRange(2).to_string(),
            "Invalid argument: 2 (expected 0 or 1)"
        );
    }

    #[test]
    fn mode_tokens_roundtrip() {
        for mode in [DeviceMode::HPattern, DeviceMode::Sequential] {
            assert_eq!(DeviceMode::from_token(mode.token() as u8), Ok(mode));
        }
    }
}
