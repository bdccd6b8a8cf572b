//! Ancestry resolution for newly observed processes.
//!
//! The process tree is only available as per-process parent links, read one
//! at a time from a table that keeps changing underneath the walk. When an
//! intermediate ancestor exits mid-walk the kernel reparents its children,
//! so the walk steps back to the child and re-reads its parent instead of
//! giving up.

use tracing::{debug, warn};

use crate::error::FamilyError;
use crate::family::PidIndex;
use crate::process::{Pid, ProcessTable, INIT_PID, NO_PARENT};

/// Upper bound on parent reads for a single walk.
pub const MAX_WALK_STEPS: usize = 4096;

/// Classification of a process relative to a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lineage {
    /// The root itself or one of its descendants.
    Member,
    /// Unrelated to the root.
    Outsider,
    /// The process exited before it could be classified.
    Vanished,
}

impl From<bool> for Lineage {
    fn from(is_member: bool) -> Self {
        if is_member {
            Lineage::Member
        } else {
            Lineage::Outsider
        }
    }
}

/// Where an index walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// Reached an indexed ancestor with this membership.
    Known(bool),
    /// Reached init without meeting any indexed ancestor.
    Unanchored,
}

/// Walks parent links upward from `pid` until `terminal` returns a verdict.
///
/// Returns `Ok(None)` if `pid` itself vanished, `Err(stuck_at)` if the walk
/// cycled or ran out of steps.
fn walk<T, R, F>(table: &T, pid: Pid, mut terminal: F) -> Result<Option<R>, Pid>
where
    T: ProcessTable + ?Sized,
    F: FnMut(Pid) -> Option<R>,
{
    if let Some(verdict) = terminal(pid) {
        return Ok(Some(verdict));
    }

    let mut path = vec![pid];
    let mut steps = 0;
    while let Some(&current) = path.last() {
        steps += 1;
        if steps > MAX_WALK_STEPS {
            return Err(current);
        }

        let parent = match table.parent_of(current) {
            Ok(parent) => parent,
            Err(e) => {
                // `current` is gone; its child has been reparented, re-read it.
                debug!("Ancestor {} of {} unreadable: {}", current, pid, e);
                path.pop();
                continue;
            }
        };

        if let Some(verdict) = terminal(parent) {
            return Ok(Some(verdict));
        }
        if path.contains(&parent) {
            return Err(parent);
        }
        path.push(parent);
    }

    Ok(None)
}

/// Classifies `pid` by walking OS parent links until `root` or init.
///
/// Used for the initial build, where nothing is indexed yet. A walk that
/// cannot complete means the process table is inconsistent and is reported
/// as [`FamilyError::BrokenAncestry`].
pub fn resolve_against_root<T>(table: &T, pid: Pid, root: Pid) -> Result<Lineage, FamilyError>
where
    T: ProcessTable + ?Sized,
{
    let terminal = |p: Pid| {
        if p == root {
            Some(true)
        } else if p == INIT_PID || p == NO_PARENT {
            Some(false)
        } else {
            None
        }
    };

    match walk(table, pid, terminal) {
        Ok(Some(is_member)) => Ok(Lineage::from(is_member)),
        Ok(None) => Ok(Lineage::Vanished),
        Err(stuck_at) => Err(FamilyError::BrokenAncestry { pid, stuck_at }),
    }
}

/// Classifies a not-yet-indexed `pid` by finding its youngest indexed
/// ancestor and inheriting that ancestor's membership.
///
/// An indexed pid only counts as an ancestor if its start epoch still
/// matches the live process. If no indexed ancestor is found, or the walk
/// breaks, the chain is re-walked against `root` through the OS. If that
/// also breaks the process is treated as an outsider. Always terminates.
pub fn resolve_against_index<T>(table: &T, pid: Pid, root: Pid, index: &PidIndex) -> Lineage
where
    T: ProcessTable + ?Sized,
{
    let terminal = |p: Pid| {
        if let Some(record) = index.get(&p) {
            if table.start_epoch_of(p).ok() == Some(record.start_time()) {
                return Some(Anchor::Known(record.is_member()));
            }
        }
        if p == INIT_PID || p == NO_PARENT {
            Some(Anchor::Unanchored)
        } else {
            None
        }
    };

    match walk(table, pid, terminal) {
        Ok(Some(Anchor::Known(is_member))) => return Lineage::from(is_member),
        Ok(None) => return Lineage::Vanished,
        Ok(Some(Anchor::Unanchored)) => {
            debug!("No indexed ancestor for {}, re-walking against root {}", pid, root);
        }
        Err(stuck_at) => {
            debug!("Index walk for {} broke at {}, re-walking against root {}", pid, stuck_at, root);
        }
    }

    match resolve_against_root(table, pid, root) {
        Ok(lineage) => lineage,
        Err(e) => {
            warn!("Treating {} as unrelated: {}", pid, e);
            Lineage::Outsider
        }
    }
}
