//! Target selection by pid or executable name.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid as NixPid;
use std::path::Path;
use tracing::debug;

use crate::process::scanner::ProcessIterator;
use crate::process::table::{Pid, ProcessTable};

/// Outcome of a target lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLookup {
    /// A live user process we are allowed to signal.
    Found(Pid),
    /// The process exists but signals to it are refused.
    NoPermission(Pid),
    NotFound,
}

/// Whether `pid` accepts signals from us (`kill(pid, 0)`).
pub fn can_signal(pid: Pid) -> bool {
    match kill(NixPid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => false,
        Err(e) => {
            debug!("Signal check for pid {} failed: {}", pid, e);
            false
        }
    }
}

/// Looks up a target by pid.
pub fn find_by_pid<T: ProcessTable + ?Sized>(table: &T, pid: Pid) -> TargetLookup {
    find_by_pid_with(table, pid, can_signal)
}

/// [`find_by_pid`] with a custom signal permission check.
pub fn find_by_pid_with<T, F>(table: &T, pid: Pid, can_signal: F) -> TargetLookup
where
    T: ProcessTable + ?Sized,
    F: Fn(Pid) -> bool,
{
    match table.is_kernel_thread(pid) {
        Ok(false) if can_signal(pid) => TargetLookup::Found(pid),
        Ok(false) => TargetLookup::NoPermission(pid),
        _ => TargetLookup::NotFound,
    }
}

/// Whether an executable path matches a user-supplied name.
///
/// An absolute name must match the whole path; anything else must match the
/// trailing path components (`bash` matches `/bin/bash`, not `/bin/rbash`).
pub fn exe_matches(exe: &Path, name: &str) -> bool {
    let wanted = Path::new(name);
    if wanted.is_absolute() {
        exe == wanted
    } else {
        !name.is_empty() && exe.ends_with(wanted)
    }
}

/// Looks up a target by executable name or absolute path.
pub fn find_by_name<T: ProcessTable + ?Sized>(table: &T, name: &str) -> TargetLookup {
    find_by_name_with(table, name, can_signal)
}

/// [`find_by_name`] with a custom signal permission check.
///
/// Returns the first matching process we can signal. If every match refuses
/// signals, the last of them is reported as [`TargetLookup::NoPermission`].
pub fn find_by_name_with<T, F>(table: &T, name: &str, can_signal: F) -> TargetLookup
where
    T: ProcessTable + ?Sized,
    F: Fn(Pid) -> bool,
{
    let iter = match ProcessIterator::open(table) {
        Ok(iter) => iter,
        Err(e) => {
            debug!("Cannot scan process table for '{}': {}", name, e);
            return TargetLookup::NotFound;
        }
    };

    let mut result = TargetLookup::NotFound;
    for pid in iter {
        let exe = match table.exe_path(pid) {
            Ok(p) => p,
            Err(_) => continue,
        };
        if !exe_matches(&exe, name) {
            continue;
        }
        if can_signal(pid) {
            return TargetLookup::Found(pid);
        }
        result = TargetLookup::NoPermission(pid);
    }
    result
}
