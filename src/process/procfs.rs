//! Linux `/proc` backend for [`ProcessTable`].
//!
//! All reads go through a configurable procfs root so the backend can be
//! pointed at a fabricated tree in tests. Every read re-opens the file it
//! needs into a local buffer; nothing is cached between calls.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FamilyError, ReadError};
use crate::process::cpu::CLK_TCK;
use crate::process::table::{CpuReading, Pid, PidScan, ProcessTable};

/// Default procfs mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Fields of `/proc/<pid>/stat` the tracker cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFields {
    pub ppid: Pid,
    pub utime: u64,
    pub stime: u64,
    pub starttime: u64,
}

/// Parses `/proc/<pid>/stat` content.
///
/// The command name (field 2) may contain spaces and parentheses, so fields
/// are counted from the last `)` rather than split from the start.
pub fn parse_stat(pid: Pid, content: &str) -> Result<StatFields, ReadError> {
    let malformed = |reason: &str| ReadError::Malformed {
        pid,
        file: "stat",
        reason: reason.to_string(),
    };

    let close = content.rfind(')').ok_or_else(|| malformed("missing ')'"))?;
    // fields[0] is field 3 (state)
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() <= 19 {
        return Err(malformed("not enough fields"));
    }

    let field = |idx: usize, name: &str| -> Result<u64, ReadError> {
        fields[idx]
            .parse::<u64>()
            .map_err(|_| malformed(&format!("invalid {name}")))
    };

    let ppid = fields[1]
        .parse::<Pid>()
        .map_err(|_| malformed("invalid ppid"))?;

    Ok(StatFields {
        ppid,
        utime: field(11, "utime")?,
        stime: field(12, "stime")?,
        starttime: field(19, "starttime")?,
    })
}

/// Process table backed by a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    tick_rate: f64,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tick_rate: *CLK_TCK,
        }
    }

    /// Overrides the tick rate (tests fabricate counters with a fixed rate).
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pid_file(&self, pid: Pid, file: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(file)
    }

    fn read(&self, pid: Pid, file: &'static str) -> Result<String, ReadError> {
        fs::read_to_string(self.pid_file(pid, file)).map_err(|e| read_error(pid, file, e))
    }

    /// Reads and parses `/proc/<pid>/stat`.
    pub fn read_stat(&self, pid: Pid) -> Result<StatFields, ReadError> {
        let content = self.read(pid, "stat")?;
        parse_stat(pid, &content)
    }
}

/// Maps an io error on a per-process file to a read error.
///
/// A process that exits while its directory is open surfaces as ESRCH rather
/// than ENOENT, so both mean "not found".
fn read_error(pid: Pid, file: &'static str, e: io::Error) -> ReadError {
    if e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(libc::ESRCH) {
        ReadError::NotFound(pid)
    } else {
        ReadError::Unreadable {
            pid,
            file,
            source: e,
        }
    }
}

/// Numeric entries of a procfs directory stream.
///
/// Holds the open directory handle; dropping the scan releases it.
struct ProcDirScan {
    entries: fs::ReadDir,
}

impl Iterator for ProcDirScan {
    type Item = Pid;

    fn next(&mut self) -> Option<Pid> {
        for entry in self.entries.by_ref().flatten() {
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(v) => v,
                None => continue,
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            match name.parse::<Pid>() {
                Ok(pid) if pid > 0 => return Some(pid),
                _ => continue,
            }
        }
        None
    }
}

impl ProcessTable for ProcFs {
    fn scan(&self) -> Result<PidScan<'_>, FamilyError> {
        let entries = fs::read_dir(&self.root).map_err(FamilyError::Scan)?;
        Ok(Box::new(ProcDirScan { entries }))
    }

    fn parent_of(&self, pid: Pid) -> Result<Pid, ReadError> {
        Ok(self.read_stat(pid)?.ppid)
    }

    fn is_kernel_thread(&self, pid: Pid) -> Result<bool, ReadError> {
        // Kernel threads have no address space: statm starts with a zero size.
        let statm = self.read(pid, "statm")?;
        match statm.split_whitespace().next() {
            Some(size) => Ok(size == "0"),
            None => Err(ReadError::Malformed {
                pid,
                file: "statm",
                reason: "empty".to_string(),
            }),
        }
    }

    fn cpu_time_of(&self, pid: Pid) -> Result<u64, ReadError> {
        let stat = self.read_stat(pid)?;
        Ok(stat.utime + stat.stime)
    }

    fn start_epoch_of(&self, pid: Pid) -> Result<u64, ReadError> {
        Ok(self.read_stat(pid)?.starttime)
    }

    fn cpu_reading(&self, pid: Pid) -> Result<CpuReading, ReadError> {
        let stat = self.read_stat(pid)?;
        Ok(CpuReading {
            ticks: stat.utime + stat.stime,
            start_epoch: stat.starttime,
        })
    }

    fn exe_path(&self, pid: Pid) -> Result<PathBuf, ReadError> {
        fs::read_link(self.pid_file(pid, "exe")).map_err(|e| read_error(pid, "exe", e))
    }

    fn tick_rate(&self) -> f64 {
        self.tick_rate
    }
}
