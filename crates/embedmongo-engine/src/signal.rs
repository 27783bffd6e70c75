//! Process signalling helpers.

use std::io;

#[cfg(unix)]
use libc::{ESRCH, SIGKILL, SIGTERM, kill};

/// Requests graceful termination of `pid`.
pub(crate) fn terminate(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        send(pid, SIGTERM)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "signalling detached processes requires a Unix platform",
        ))
    }
}

/// Forcibly kills `pid`.
pub(crate) fn force_kill(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        send(pid, SIGKILL)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "signalling detached processes requires a Unix platform",
        ))
    }
}

#[cfg(unix)]
fn send(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let target = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: `kill(2)` is memory-safe for any pid; invalid targets only yield
    // an error code.
    let result = unsafe { kill(target, signal) };
    if result == 0 {
        Ok(())
    } else {
        let error = io::Error::last_os_error();
        if error.raw_os_error() == Some(ESRCH) {
            Ok(())
        } else {
            Err(error)
        }
    }
}

/// Whether `pid` still refers to a live, unreaped process.
///
/// Zombies count as gone since they no longer serve anything.
pub(crate) fn is_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(target) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs permission and existence checks only.
        let result = unsafe { kill(target, 0) };
        if result != 0 {
            return io::Error::last_os_error().raw_os_error() != Some(ESRCH);
        }
        !is_zombie(pid)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .map(|(_, rest)| rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
const fn is_zombie(_pid: u32) -> bool {
    false
}
