//! Process discovery over a [`ProcessTable`].
//!
//! [`ProcessIterator`] walks the live process table once per `open()`,
//! yielding user-space pids only. The table is a moving target: a yielded
//! pid may already be gone by the time the caller reads it.

use tracing::trace;

use crate::error::FamilyError;
use crate::process::table::{Pid, PidScan, ProcessTable};

/// Lazy scan of live, non-kernel-thread pids.
pub struct ProcessIterator<'a, T: ProcessTable + ?Sized> {
    table: &'a T,
    scan: Option<PidScan<'a>>,
}

impl<'a, T: ProcessTable + ?Sized> ProcessIterator<'a, T> {
    /// Begins a new scan of the process table.
    pub fn open(table: &'a T) -> Result<Self, FamilyError> {
        let scan = table.scan()?;
        Ok(Self {
            table,
            scan: Some(scan),
        })
    }

    /// True once the scan is exhausted and its handle released.
    pub fn is_closed(&self) -> bool {
        self.scan.is_none()
    }
}

impl<T: ProcessTable + ?Sized> Iterator for ProcessIterator<'_, T> {
    type Item = Pid;

    fn next(&mut self) -> Option<Pid> {
        let scan = self.scan.as_mut()?;
        for pid in scan.by_ref() {
            match self.table.is_kernel_thread(pid) {
                Ok(false) => return Some(pid),
                Ok(true) => continue,
                Err(e) => {
                    trace!("Skipping pid {} during scan: {}", pid, e);
                    continue;
                }
            }
        }
        // Exhausted: drop the scan to release the directory handle.
        self.scan = None;
        None
    }
}
