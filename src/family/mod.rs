//! Process family tracking.
//!
//! A [`ProcessFamily`] is a target process plus every descendant it spawns.
//! It indexes every live process it has observed (members and outsiders
//! alike, so later ancestry walks can stop at the first known ancestor) and
//! keeps an ordered list of the members.
//!
//! The family is rebuilt from the live process table, never persisted. The
//! table is racy, so refresh is self-healing rather than transactional:
//! missed observations are picked up on the next pass, and a pid whose start
//! epoch changed is treated as a brand new process.

pub mod ancestry;

use ahash::AHashMap as HashMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{FamilyError, ReadError};
use crate::process::{Pid, ProcessIterator, ProcessRecord, ProcessTable};

pub use ancestry::{resolve_against_index, resolve_against_root, Lineage};

/// Pid → record index owned by a family.
pub type PidIndex = HashMap<Pid, ProcessRecord>;

/// Index plus the ordered member list; both are only ever changed together.
#[derive(Debug, Default)]
struct Roster {
    index: PidIndex,
    members: Vec<Pid>,
}

impl Roster {
    /// Inserts `record`, replacing any record with the same pid.
    fn insert(&mut self, record: ProcessRecord) -> Option<ProcessRecord> {
        let pid = record.pid();
        let previous = self.remove(pid);
        if record.is_member() {
            self.members.push(pid);
        }
        self.index.insert(pid, record);
        previous
    }

    fn remove(&mut self, pid: Pid) -> Option<ProcessRecord> {
        let record = self.index.remove(&pid)?;
        if record.is_member() {
            if let Some(pos) = self.members.iter().position(|&p| p == pid) {
                self.members.remove(pos);
            }
        }
        Some(record)
    }
}

/// A target process and its descendants.
///
/// All mutating operations take `&mut self`; a host sharing a family across
/// threads must serialize access itself.
#[derive(Debug)]
pub struct ProcessFamily<T: ProcessTable> {
    table: T,
    root_pid: Pid,
    self_pid: Pid,
    roster: Roster,
}

impl<T: ProcessTable> ProcessFamily<T> {
    /// Builds the family of `root_pid` from a full scan of `table`.
    ///
    /// The calling process is never classified as a member.
    pub fn create(table: T, root_pid: Pid) -> Result<Self, FamilyError> {
        Self::create_excluding(table, root_pid, std::process::id())
    }

    /// Like [`ProcessFamily::create`], excluding `self_pid` instead of the
    /// calling process.
    pub fn create_excluding(table: T, root_pid: Pid, self_pid: Pid) -> Result<Self, FamilyError> {
        let mut family = Self {
            table,
            root_pid,
            self_pid,
            roster: Roster::default(),
        };

        let iter = ProcessIterator::open(&family.table)?;
        for pid in iter {
            let lineage = resolve_against_root(&family.table, pid, root_pid)?;
            let is_member = match lineage {
                Lineage::Vanished => continue,
                Lineage::Member => pid != self_pid,
                Lineage::Outsider => false,
            };
            match ProcessRecord::read(&family.table, pid, is_member) {
                Ok(record) => {
                    family.roster.insert(record);
                }
                Err(e) => debug!("Skipping pid {} during build: {}", pid, e),
            }
        }

        info!(
            "Family of {} built: {} members among {} processes",
            root_pid,
            family.member_count(),
            family.len()
        );
        Ok(family)
    }

    /// Scans for processes born since the last pass and classifies them.
    ///
    /// Returns the newly discovered members, in scan order. Processes that
    /// were not observed stay indexed until [`ProcessFamily::remove`] is
    /// called for them.
    pub fn refresh(&mut self) -> Result<Vec<Pid>, FamilyError> {
        let mut discovered = Vec::new();

        let iter = ProcessIterator::open(&self.table)?;
        for pid in iter {
            if let Some(known) = self.roster.index.get(&pid) {
                match self.table.start_epoch_of(pid) {
                    Ok(epoch) if epoch == known.start_time() => continue,
                    Ok(epoch) => {
                        debug!(
                            "Pid {} reused (start {} -> {}), replacing record",
                            pid,
                            known.start_time(),
                            epoch
                        );
                        self.roster.remove(pid);
                    }
                    Err(_) => continue,
                }
            }

            let lineage =
                resolve_against_index(&self.table, pid, self.root_pid, &self.roster.index);
            let is_member = match lineage {
                Lineage::Vanished => continue,
                Lineage::Member => pid != self.self_pid,
                Lineage::Outsider => false,
            };

            let record = match ProcessRecord::read(&self.table, pid, is_member) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Skipping pid {} during refresh: {}", pid, e);
                    continue;
                }
            };
            if is_member {
                debug!("New member {} in family of {}", pid, self.root_pid);
                discovered.push(pid);
            }
            self.roster.insert(record);
        }

        Ok(discovered)
    }

    /// Drops `pid` from the index and the member list. No-op if unknown.
    pub fn remove(&mut self, pid: Pid) -> Option<ProcessRecord> {
        self.roster.remove(pid)
    }

    /// Samples the CPU counter of an indexed process.
    pub fn sample(&mut self, pid: Pid, now: Instant) -> Result<Option<f64>, ReadError> {
        let record = self
            .roster
            .index
            .get_mut(&pid)
            .ok_or(ReadError::NotFound(pid))?;
        record.sample(&self.table, now)
    }

    /// Samples every member, returning each member's result in member order.
    pub fn sample_members(&mut self, now: Instant) -> Vec<(Pid, Result<Option<f64>, ReadError>)> {
        let Roster { index, members } = &mut self.roster;
        members
            .iter()
            .map(|&pid| {
                let result = match index.get_mut(&pid) {
                    Some(record) => record.sample(&self.table, now),
                    None => Err(ReadError::NotFound(pid)),
                };
                (pid, result)
            })
            .collect()
    }

    pub fn root_pid(&self) -> Pid {
        self.root_pid
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.roster.members.len()
    }

    /// Member pids in discovery order.
    pub fn member_pids(&self) -> &[Pid] {
        &self.roster.members
    }

    /// Member records in discovery order.
    pub fn members(&self) -> impl Iterator<Item = &ProcessRecord> + '_ {
        self.roster
            .members
            .iter()
            .filter_map(|pid| self.roster.index.get(pid))
    }

    /// Number of indexed processes, members or not.
    pub fn len(&self) -> usize {
        self.roster.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.index.is_empty()
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessRecord> {
        self.roster.index.get(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.roster.index.contains_key(&pid)
    }

    pub fn is_member(&self, pid: Pid) -> bool {
        self.get(pid).is_some_and(|r| r.is_member())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Tests for Roster
    // -------------------------------------------------------------------------

    #[test]
    fn test_roster_insert_and_remove_keep_members_in_sync() {
        let mut roster = Roster::default();
        roster.insert(ProcessRecord::new(10, 1, true));
        roster.insert(ProcessRecord::new(11, 1, false));
        roster.insert(ProcessRecord::new(12, 1, true));
        assert_eq!(roster.members, vec![10, 12]);
        assert_eq!(roster.index.len(), 3);

        assert!(roster.remove(10).is_some());
        assert_eq!(roster.members, vec![12]);
        assert!(!roster.index.contains_key(&10));

        assert!(roster.remove(10).is_none());
        assert_eq!(roster.index.len(), 2);
    }

    #[test]
    fn test_roster_insert_replaces_same_pid() {
        let mut roster = Roster::default();
        roster.insert(ProcessRecord::new(10, 1, true));
        let previous = roster.insert(ProcessRecord::new(10, 2, false)).unwrap();

        assert_eq!(previous.start_time(), 1);
        assert_eq!(roster.index[&10].start_time(), 2);
        assert!(roster.members.is_empty());
        assert_eq!(roster.index.len(), 1);
    }
}
