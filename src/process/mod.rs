//! Process-level building blocks for family tracking.
//!
//! This module provides:
//! - `table`: the `ProcessTable` capability trait every backend implements
//! - `procfs`: the Linux `/proc` backend
//! - `scanner`: lazy iteration over live user processes
//! - `cpu`: tick rate detection and the CPU usage estimator
//! - `record`: per-process records owned by a family
//! - `lookup`: target selection by pid or executable name

pub mod cpu;
pub mod lookup;
pub mod procfs;
pub mod record;
pub mod scanner;
pub mod table;

// Re-export commonly used types
pub use cpu::{CpuSampler, ALPHA, CLK_TCK, CPU_COUNT};
pub use lookup::{find_by_name, find_by_pid, TargetLookup};
pub use procfs::{ProcFs, DEFAULT_PROC_ROOT};
pub use record::ProcessRecord;
pub use scanner::ProcessIterator;
pub use table::{CpuReading, Pid, PidScan, ProcessTable, INIT_PID, NO_PARENT};
