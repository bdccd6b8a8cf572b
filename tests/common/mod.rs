//! Simulated process table shared by the integration tests.

#![allow(dead_code)]

use herakles_cpulimit::process::{PidScan, INIT_PID};
use herakles_cpulimit::{FamilyError, Pid, ProcessTable, ReadError};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SimProc {
    pub ppid: Pid,
    pub start: u64,
    pub ticks: u64,
    pub kernel: bool,
    pub exe: PathBuf,
}

/// In-memory process table. Mutated through `&self` so a family can hold a
/// reference while the test keeps changing it.
#[derive(Debug)]
pub struct SimTable {
    procs: RefCell<BTreeMap<Pid, SimProc>>,
    clock: Cell<u64>,
    fail_scan: Cell<bool>,
    race: Cell<Option<Race>>,
}

/// Exit `victim` (reparenting its children to `reaper`) right after the
/// parent of `trigger` has been read.
#[derive(Debug, Clone, Copy)]
pub struct Race {
    pub trigger: Pid,
    pub victim: Pid,
    pub reaper: Pid,
}

impl SimTable {
    /// A table holding init (pid 1) and kthreadd (pid 2).
    pub fn new() -> Self {
        let table = Self {
            procs: RefCell::new(BTreeMap::new()),
            clock: Cell::new(0),
            fail_scan: Cell::new(false),
            race: Cell::new(None),
        };
        table.spawn(INIT_PID, 0);
        table.insert(
            2,
            SimProc {
                ppid: 0,
                start: 0,
                ticks: 0,
                kernel: true,
                exe: PathBuf::new(),
            },
        );
        table
    }

    fn insert(&self, pid: Pid, proc: SimProc) {
        self.procs.borrow_mut().insert(pid, proc);
    }

    /// Starts `pid` under `ppid` with a fresh start epoch.
    pub fn spawn(&self, pid: Pid, ppid: Pid) -> u64 {
        let start = self.clock.get() + 1;
        self.clock.set(start);
        self.insert(
            pid,
            SimProc {
                ppid,
                start,
                ticks: 0,
                kernel: false,
                exe: PathBuf::from(format!("/usr/bin/proc{pid}")),
            },
        );
        start
    }

    /// Starts a kernel thread under kthreadd.
    pub fn spawn_kernel_thread(&self, pid: Pid) {
        self.spawn(pid, 2);
        if let Some(p) = self.procs.borrow_mut().get_mut(&pid) {
            p.kernel = true;
        }
    }

    /// Terminates `pid` and reparents its children to init.
    pub fn exit(&self, pid: Pid) {
        self.exit_to(pid, INIT_PID);
    }

    /// Terminates `pid` and reparents its children to `reaper`.
    pub fn exit_to(&self, pid: Pid, reaper: Pid) {
        let mut procs = self.procs.borrow_mut();
        procs.remove(&pid);
        for p in procs.values_mut() {
            if p.ppid == pid {
                p.ppid = reaper;
            }
        }
    }

    /// Arms a one-shot exit triggered by a parent read.
    pub fn arm_race(&self, race: Race) {
        self.race.set(Some(race));
    }

    /// Rewrites a parent link without any other bookkeeping.
    pub fn set_parent(&self, pid: Pid, ppid: Pid) {
        if let Some(p) = self.procs.borrow_mut().get_mut(&pid) {
            p.ppid = ppid;
        }
    }

    pub fn set_ticks(&self, pid: Pid, ticks: u64) {
        if let Some(p) = self.procs.borrow_mut().get_mut(&pid) {
            p.ticks = ticks;
        }
    }

    pub fn fail_next_scans(&self, fail: bool) {
        self.fail_scan.set(fail);
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.procs.borrow().keys().copied().collect()
    }

    fn with<R>(&self, pid: Pid, f: impl FnOnce(&SimProc) -> R) -> Result<R, ReadError> {
        self.procs
            .borrow()
            .get(&pid)
            .map(f)
            .ok_or(ReadError::NotFound(pid))
    }

    /// Whether `pid` descends from `root` in the current table.
    pub fn descends_from(&self, pid: Pid, root: Pid) -> bool {
        let procs = self.procs.borrow();
        let mut current = pid;
        for _ in 0..procs.len() + 1 {
            if current == root {
                return true;
            }
            match procs.get(&current) {
                Some(p) => current = p.ppid,
                None => return false,
            }
        }
        false
    }
}

impl ProcessTable for SimTable {
    fn scan(&self) -> Result<PidScan<'_>, FamilyError> {
        if self.fail_scan.get() {
            return Err(FamilyError::Scan(std::io::Error::other("simulated failure")));
        }
        Ok(Box::new(self.pids().into_iter()))
    }

    fn parent_of(&self, pid: Pid) -> Result<Pid, ReadError> {
        let parent = self.with(pid, |p| p.ppid);
        if let Some(race) = self.race.get() {
            if race.trigger == pid {
                self.race.set(None);
                self.exit_to(race.victim, race.reaper);
            }
        }
        parent
    }

    fn is_kernel_thread(&self, pid: Pid) -> Result<bool, ReadError> {
        self.with(pid, |p| p.kernel)
    }

    fn cpu_time_of(&self, pid: Pid) -> Result<u64, ReadError> {
        self.with(pid, |p| p.ticks)
    }

    fn start_epoch_of(&self, pid: Pid) -> Result<u64, ReadError> {
        self.with(pid, |p| p.start)
    }

    fn exe_path(&self, pid: Pid) -> Result<PathBuf, ReadError> {
        self.with(pid, |p| p.exe.clone())
    }

    fn tick_rate(&self) -> f64 {
        100.0
    }
}
