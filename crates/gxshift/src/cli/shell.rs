//! `shell` subcommand — attach a session and drive its endpoints from stdin.
//!
//! Each line is `<endpoint>` (show) or `<endpoint> <value>` (store). The
//! value is stored with a trailing newline, as `echo value > endpoint` would.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use gxshift_lib::control::{ControlSurface, DeviceNotifier, NullNotifier};
use gxshift_lib::endpoint::Endpoint;
use gxshift_lib::hooks::CommandHooks;
use gxshift_lib::session::{DeviceSession, EndpointHost};

use super::{Config, Result, open_shifter};

/// How long to wait for queued hook commands before exiting.
const HOOK_GRACE: Duration = Duration::from_secs(5);

/// Endpoint host that publishes endpoints as shell commands.
#[derive(Default)]
struct ShellHost {
    endpoints: Vec<(Endpoint, Arc<ControlSurface>)>,
}

impl ShellHost {
    fn lookup(&self, name: &str) -> Option<(Endpoint, &ControlSurface)> {
        let endpoint = Endpoint::from_name(name)?;
        self.endpoints
            .iter()
            .find(|(e, _)| *e == endpoint)
            .map(|(e, s)| (*e, s.as_ref()))
    }
}

impl EndpointHost for ShellHost {
    fn create(
        &mut self,
        endpoint: Endpoint,
        surface: &Arc<ControlSurface>,
    ) -> gxshift_lib::device::Result<()> {
        log::debug!("endpoint {endpoint} ready");
        self.endpoints.push((endpoint, Arc::clone(surface)));
        Ok(())
    }

    fn remove(&mut self, endpoint: Endpoint) {
        self.endpoints.retain(|(e, _)| *e != endpoint);
    }
}

pub(super) fn cmd_shell(file: Option<&Path>, config: &Config) -> Result<()> {
    let device = open_shifter(file, config)?;

    let hooks = CommandHooks::from_config(config);
    let notifier: Arc<dyn DeviceNotifier> = if hooks.is_empty() {
        Arc::new(NullNotifier)
    } else {
        Arc::new(hooks.clone())
    };

    let mut host = ShellHost::default();
    let session =
        DeviceSession::attach(device.as_ref(), &config.fixup_table(), notifier, &mut host)?;
    eprintln!(
        "Attached {} ({}), descriptor {}.",
        session.info().product,
        session.info().path,
        session.outcome()
    );
    eprintln!("Type `help` for commands, `quit` to exit.");

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_shell(&host, stdin.lock(), &mut stdout.lock())?;

    session.detach(&mut host);
    if !hooks.wait_idle(HOOK_GRACE) {
        log::warn!("exiting with hook commands still pending");
    }
    Ok(())
}

fn run_shell(host: &ShellHost, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                writeln!(out, "<endpoint>          show the current value")?;
                writeln!(out, "<endpoint> <value>  store a value")?;
                writeln!(out, "quit                exit")?;
                let names: Vec<&str> = host.endpoints.iter().map(|(e, _)| e.name()).collect();
                writeln!(out, "endpoints: {}", names.join(", "))?;
                continue;
            }
            _ => {}
        }

        let (name, value) = match line.split_once(char::is_whitespace) {
            Some((name, value)) => (name, Some(value.trim_start())),
            None => (line, None),
        };
        let Some((endpoint, surface)) = host.lookup(name) else {
            writeln!(out, "error: unknown endpoint '{name}'")?;
            continue;
        };
        match value {
            None => write!(out, "{}", endpoint.show(surface))?,
            Some(value) => {
                let buf = format!("{value}\n");
                if let Err(e) = endpoint.store(surface, buf.as_bytes()) {
                    writeln!(out, "error: {endpoint}: {e}")?;
                }
            }
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gxshift_lib::fixup::FixupTable;
    use gxshift_lib::mock::{MockDevice, Notification, RecordingNotifier};

    fn attached() -> (DeviceSession, ShellHost, Arc<RecordingNotifier>) {
        let dev = MockDevice::factory();
        let notifier = Arc::new(RecordingNotifier::default());
        let mut host = ShellHost::default();
        let session =
            DeviceSession::attach(&dev, &FixupTable::default(), notifier.clone(), &mut host)
                .unwrap();
        (session, host, notifier)
    }

    fn run(host: &ShellHost, script: &str) -> String {
        let mut out = Vec::new();
        run_shell(host, script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn host_publishes_all_endpoints() {
        let (_session, host, _) = attached();
        for e in Endpoint::ALL {
            assert!(host.lookup(e.name()).is_some());
        }
    }

    #[test]
    fn show_and_store() {
        let (session, host, notifier) = attached();
        let out = run(&host, "mode\nmode S\nmode\ncalibration_h 1\ncalibration_h\n");
        assert_eq!(out, "H\nS\n1\n");
        assert_eq!(session.show(Endpoint::Mode), "S\n");
        assert_eq!(
            notifier.take(),
            vec![
                Notification::Mode(gxshift_lib::control::DeviceMode::Sequential),
                Notification::Calibration(gxshift_lib::control::CalibrationAxis::H, true),
            ]
        );
    }

    #[test]
    fn invalid_values_report_errors_and_continue() {
        let (_session, host, _) = attached();
        let out = run(&host, "mode X\ncalibration_seq 2\ncalibration_seq\n");
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("error: mode: Invalid argument"));
        assert!(lines[1].starts_with("error: calibration_seq: Invalid argument"));
        assert_eq!(lines[2], "0");
    }

    #[test]
    fn unknown_endpoint() {
        let (_session, host, _) = attached();
        assert_eq!(run(&host, "gear 3\n"), "error: unknown endpoint 'gear'\n");
        assert!(host.lookup("MODE").is_none());
    }

    #[test]
    fn quit_stops_reading() {
        let (_session, host, _) = attached();
        assert_eq!(run(&host, "\nquit\nmode\n"), "");
    }

    #[test]
    fn help_lists_endpoints() {
        let (_session, host, _) = attached();
        let out = run(&host, "help\n");
        assert!(out.contains("endpoints: mode, calibration_h, calibration_seq"));
    }

    #[test]
    fn detach_unpublishes() {
        let (session, mut host, _) = attached();
        session.detach(&mut host);
        assert!(host.endpoints.is_empty());
        assert_eq!(run(&host, "mode\n"), "error: unknown endpoint 'mode'\n");
    }
}
