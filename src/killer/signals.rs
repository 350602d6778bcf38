// Signal delivery to the selected victim

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use thiserror::Error;

/// Why a termination attempt failed. None of these are worth an
/// immediate retry; the caller cools down instead.
#[derive(Debug, Error)]
pub enum TerminationFailure {
    /// Almost always means the daemon lacks privilege over the victim
    #[error("permission denied")]
    PermissionDenied,

    /// The victim exited between selection and delivery
    #[error("no such process")]
    Vanished,

    /// The sysrq trigger could not be used
    #[error("cannot use sysrq trigger: {0}")]
    TriggerUnavailable(io::Error),

    #[error("{0}")]
    Other(Errno),
}

/// Deliver a signal to the victim. `None` is the dry-run probe: the
/// kernel performs its deliverability checks (signal 0) without killing
/// anything. The probe value is never sent as a real signal.
pub fn terminate(pid: libc::pid_t, sig: Option<Signal>) -> Result<(), TerminationFailure> {
    match signal::kill(Pid::from_raw(pid), sig) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(TerminationFailure::Vanished),
        Err(Errno::EPERM) => Err(TerminationFailure::PermissionDenied),
        Err(e) => Err(TerminationFailure::Other(e)),
    }
}

/// Alternate strategy: ask the kernel to pick and kill a victim itself by
/// writing `f` into the sysrq trigger. The dry run only opens the trigger
/// to prove it is usable.
pub fn trigger_kernel_reaper(proc_root: &Path, dry_run: bool) -> Result<(), TerminationFailure> {
    let path = proc_root.join("sysrq-trigger");
    let mut trigger = OpenOptions::new()
        .write(true)
        .open(&path)
        .map_err(TerminationFailure::TriggerUnavailable)?;

    if !dry_run {
        trigger
            .write_all(b"f\n")
            .map_err(TerminationFailure::TriggerUnavailable)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_own_pid_succeeds() {
        let own = std::process::id() as libc::pid_t;
        assert!(terminate(own, None).is_ok());
    }

    #[test]
    fn test_probe_nonexistent_pid_reports_vanished() {
        // Far above any real pid_max
        let result = terminate(999_999_999, None);
        assert!(matches!(result, Err(TerminationFailure::Vanished)));
    }

    #[test]
    fn test_kernel_trigger_missing_file() {
        let root = tempfile::tempdir().unwrap();
        let result = trigger_kernel_reaper(root.path(), true);
        assert!(matches!(result, Err(TerminationFailure::TriggerUnavailable(_))));
    }

    #[test]
    fn test_kernel_trigger_dry_run_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("sysrq-trigger"), "").unwrap();

        trigger_kernel_reaper(root.path(), true).unwrap();
        assert_eq!(std::fs::read(root.path().join("sysrq-trigger")).unwrap(), b"");

        trigger_kernel_reaper(root.path(), false).unwrap();
        assert_eq!(
            std::fs::read(root.path().join("sysrq-trigger")).unwrap(),
            b"f\n"
        );
    }
}
