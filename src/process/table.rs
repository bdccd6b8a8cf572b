//! Capability interface over the operating system's process table.
//!
//! Everything platform specific lives behind [`ProcessTable`]. The family
//! tracker, the ancestry walk and the CPU sampler only ever talk to this
//! trait, which also lets tests drive them with a simulated table.

use std::path::PathBuf;

use crate::error::{FamilyError, ReadError};

/// Process identifier.
pub type Pid = u32;

/// The init process. Every live process is reachable from it.
pub const INIT_PID: Pid = 1;

/// Parent reported for init itself and for kernel threads.
pub const NO_PARENT: Pid = 0;

/// CPU counter and start epoch taken from a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuReading {
    pub ticks: u64,
    pub start_epoch: u64,
}

/// Raw pid stream produced by [`ProcessTable::scan`].
pub type PidScan<'a> = Box<dyn Iterator<Item = Pid> + 'a>;

/// Point-in-time reads against the live process table.
///
/// Every per-process read may fail with [`ReadError::NotFound`] because the
/// process exited between being listed and being read.
pub trait ProcessTable {
    /// Starts a fresh scan of the process table. The stream may contain
    /// kernel threads; [`super::ProcessIterator`] filters them out.
    fn scan(&self) -> Result<PidScan<'_>, FamilyError>;

    /// Parent pid of `pid`.
    fn parent_of(&self, pid: Pid) -> Result<Pid, ReadError>;

    /// Whether `pid` is a kernel thread (no user address space).
    fn is_kernel_thread(&self, pid: Pid) -> Result<bool, ReadError>;

    /// Cumulative user + system CPU time of `pid`, in ticks.
    fn cpu_time_of(&self, pid: Pid) -> Result<u64, ReadError>;

    /// Opaque start epoch of `pid`, stable for the lifetime of the process.
    fn start_epoch_of(&self, pid: Pid) -> Result<u64, ReadError>;

    /// Path of the executable `pid` is running.
    fn exe_path(&self, pid: Pid) -> Result<PathBuf, ReadError>;

    /// CPU counter together with the start epoch it belongs to.
    ///
    /// Backends that can read both at once should override this so the
    /// pair always describes the same process.
    fn cpu_reading(&self, pid: Pid) -> Result<CpuReading, ReadError> {
        let start_epoch = self.start_epoch_of(pid)?;
        let ticks = self.cpu_time_of(pid)?;
        Ok(CpuReading { ticks, start_epoch })
    }

    /// CPU-time ticks per second used by [`ProcessTable::cpu_time_of`].
    fn tick_rate(&self) -> f64;
}

impl<T: ProcessTable + ?Sized> ProcessTable for &T {
    fn scan(&self) -> Result<PidScan<'_>, FamilyError> {
        (**self).scan()
    }

    fn parent_of(&self, pid: Pid) -> Result<Pid, ReadError> {
        (**self).parent_of(pid)
    }

    fn is_kernel_thread(&self, pid: Pid) -> Result<bool, ReadError> {
        (**self).is_kernel_thread(pid)
    }

    fn cpu_time_of(&self, pid: Pid) -> Result<u64, ReadError> {
        (**self).cpu_time_of(pid)
    }

    fn start_epoch_of(&self, pid: Pid) -> Result<u64, ReadError> {
        (**self).start_epoch_of(pid)
    }

    fn exe_path(&self, pid: Pid) -> Result<PathBuf, ReadError> {
        (**self).exe_path(pid)
    }

    fn cpu_reading(&self, pid: Pid) -> Result<CpuReading, ReadError> {
        (**self).cpu_reading(pid)
    }

    fn tick_rate(&self) -> f64 {
        (**self).tick_rate()
    }
}
