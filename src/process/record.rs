//! Per-process record owned by a [`crate::family::ProcessFamily`].

use std::time::Instant;
use tracing::debug;

use crate::error::ReadError;
use crate::process::cpu::CpuSampler;
use crate::process::table::{Pid, ProcessTable};

/// Snapshot of one observed process plus its CPU usage estimator.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pid: Pid,
    start_time: u64,
    is_member: bool,
    sampler: CpuSampler,
}

impl ProcessRecord {
    /// Creates a record, reading the start epoch of `pid` once.
    pub fn read<T: ProcessTable + ?Sized>(
        table: &T,
        pid: Pid,
        is_member: bool,
    ) -> Result<Self, ReadError> {
        let start_time = table.start_epoch_of(pid)?;
        Ok(Self::new(pid, start_time, is_member))
    }

    pub fn new(pid: Pid, start_time: u64, is_member: bool) -> Self {
        Self {
            pid,
            start_time,
            is_member,
            sampler: CpuSampler::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Start epoch; together with the pid it identifies the process.
    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn is_member(&self) -> bool {
        self.is_member
    }

    pub fn sampler(&self) -> &CpuSampler {
        &self.sampler
    }

    /// Smoothed CPU usage, `None` before the second sample.
    pub fn cpu_usage(&self) -> Option<f64> {
        self.sampler.usage()
    }

    /// Reads the current CPU counter and folds it into the estimate.
    ///
    /// `Ok(None)` means the record has no estimate yet; `Err` means the
    /// counter could not be read (usually because the process is gone). A
    /// live process with a different start epoch reused the pid and is
    /// reported as [`ReadError::NotFound`]. A failed read leaves the
    /// estimator untouched.
    pub fn sample<T: ProcessTable + ?Sized>(
        &mut self,
        table: &T,
        now: Instant,
    ) -> Result<Option<f64>, ReadError> {
        let reading = table.cpu_reading(self.pid)?;
        if reading.start_epoch != self.start_time {
            debug!(
                "Pid {} reused (start {} -> {}), not sampling",
                self.pid, self.start_time, reading.start_epoch
            );
            return Err(ReadError::NotFound(self.pid));
        }
        Ok(self.sampler.fold(reading.ticks, now, table.tick_rate()))
    }
}
