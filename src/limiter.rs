//! Stop/continue throttling loop.
//!
//! Every time slot the family's combined CPU usage is compared against the
//! limit and the slot is split into a working part (members get SIGCONT) and
//! a sleeping part (members get SIGSTOP). The working share adapts every slot
//! so the measured usage converges on the limit.

use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use herakles_cpulimit::process::{find_by_name, find_by_pid, TargetLookup};
use herakles_cpulimit::{Pid, ProcFs, ProcessFamily, ProcessTable};

use crate::cli::TargetArgs;
use crate::config::{Config, DEFAULT_REFRESH_EVERY, DEFAULT_TIME_SLOT_MS};

/// How often a missing `--exe` target is looked up again.
const TARGET_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How the target process is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pid(Pid),
    Exe(String),
}

impl Target {
    pub fn from_args(args: &TargetArgs) -> Option<Self> {
        match (args.pid, args.exe.as_ref()) {
            (Some(pid), _) => Some(Target::Pid(pid)),
            (None, Some(exe)) => Some(Target::Exe(exe.clone())),
            (None, None) => None,
        }
    }

    /// Resolves the target against the live process table.
    pub fn lookup<T: ProcessTable + ?Sized>(&self, table: &T) -> TargetLookup {
        match self {
            Target::Pid(pid) => find_by_pid(table, *pid),
            Target::Exe(name) => find_by_name(table, name),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Pid(pid) => write!(f, "pid {}", pid),
            Target::Exe(name) => write!(f, "executable '{}'", name),
        }
    }
}

/// Effective limiter settings.
#[derive(Debug, Clone)]
pub struct LimiterSettings {
    /// Fraction of one CPU.
    pub limit: f64,
    pub time_slot: Duration,
    pub refresh_every: u32,
    pub lazy: bool,
    pub proc_root: PathBuf,
}

impl LimiterSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let limit = config
            .limit_fraction()
            .context("no CPU limit given (use --limit or limit_percent)")?;
        Ok(Self {
            limit,
            time_slot: Duration::from_millis(config.time_slot_ms.unwrap_or(DEFAULT_TIME_SLOT_MS)),
            refresh_every: config.refresh_every.unwrap_or(DEFAULT_REFRESH_EVERY),
            lazy: config.lazy.unwrap_or(false),
            proc_root: config.proc_root(),
        })
    }
}

/// Next working share of a time slot.
///
/// Without a usage estimate the limit itself is used; otherwise the previous
/// share is scaled by how far the measured usage is from the limit.
pub fn working_rate(previous: f64, pcpu: Option<f64>, limit: f64) -> f64 {
    match pcpu {
        None => limit.min(1.0),
        Some(p) if p <= 0.0 => 1.0,
        Some(p) => (previous / p * limit).min(1.0),
    }
}

/// Splits a time slot into its working and sleeping parts.
pub fn split_slot(slot: Duration, rate: f64) -> (Duration, Duration) {
    let twork = slot.mul_f64(rate.clamp(0.0, 1.0));
    (twork, slot.saturating_sub(twork))
}

/// Limits `target` until it is gone (and, unless lazy, no replacement shows
/// up) or `stop` is set.
pub async fn run(settings: &LimiterSettings, target: &Target, stop: Arc<AtomicBool>) -> Result<()> {
    let table = ProcFs::new(&settings.proc_root);
    info!(
        "Limiting {} to {:.1}% CPU (slot {:?}, refresh every {} slots)",
        target,
        settings.limit * 100.0,
        settings.time_slot,
        settings.refresh_every
    );

    loop {
        let Some(root) = wait_for_target(&table, target, settings.lazy, &stop).await? else {
            return Ok(());
        };
        info!("Found {} as process {}", target, root);

        limit_family(&table, root, settings, &stop).await?;

        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        if settings.lazy || matches!(target, Target::Pid(_)) {
            info!("Target process {} and its descendants are gone, exiting", root);
            return Ok(());
        }
        info!("Target process {} is gone, waiting for a new {}", root, target);
    }
}

/// Looks the target up, polling for `--exe` targets unless lazy.
async fn wait_for_target(
    table: &ProcFs,
    target: &Target,
    lazy: bool,
    stop: &AtomicBool,
) -> Result<Option<Pid>> {
    let mut announced = false;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        match target.lookup(table) {
            TargetLookup::Found(pid) => return Ok(Some(pid)),
            TargetLookup::NoPermission(pid) => {
                bail!("no permission to control process {}", pid);
            }
            TargetLookup::NotFound => {
                if lazy || matches!(target, Target::Pid(_)) {
                    bail!("no process found for {}", target);
                }
                if !announced {
                    warn!("No process found for {}, polling", target);
                    announced = true;
                }
                tokio::time::sleep(TARGET_POLL_INTERVAL).await;
            }
        }
    }
}

/// Runs the stop/continue cycle over the family of `root`.
///
/// Every member is resumed before returning, whatever the outcome.
async fn limit_family(
    table: &ProcFs,
    root: Pid,
    settings: &LimiterSettings,
    stop: &AtomicBool,
) -> Result<()> {
    let mut family = ProcessFamily::create(table, root)
        .with_context(|| format!("failed to build the process family of {}", root))?;
    info!("Controlling {} process(es) in family of {}", family.member_count(), root);

    let mut rate = settings.limit.min(1.0);
    let mut slot: u64 = 0;

    while !stop.load(Ordering::Relaxed) {
        slot += 1;
        if slot % u64::from(settings.refresh_every) == 0 {
            match family.refresh() {
                Ok(born) => {
                    for pid in born {
                        info!("Process {} joined family of {}", pid, root);
                    }
                }
                Err(e) => warn!("Family refresh failed: {}", e),
            }
        }

        let pcpu = sample_family(&mut family, Instant::now());
        if family.member_count() == 0 {
            debug!("Family of {} is empty", root);
            break;
        }

        rate = working_rate(rate, pcpu, settings.limit);
        let (twork, tsleep) = split_slot(settings.time_slot, rate);
        if slot % 10 == 0 {
            debug!(
                "pcpu={:.3} rate={:.3} work={:?} sleep={:?} members={}",
                pcpu.unwrap_or(-1.0),
                rate,
                twork,
                tsleep,
                family.member_count()
            );
        }

        if !twork.is_zero() {
            signal_family(&mut family, Signal::SIGCONT);
            tokio::time::sleep(twork).await;
        }
        if !tsleep.is_zero() {
            signal_family(&mut family, Signal::SIGSTOP);
            tokio::time::sleep(tsleep).await;
        }
    }

    signal_family(&mut family, Signal::SIGCONT);
    Ok(())
}

/// Samples every member, evicting the ones that are gone.
///
/// Returns the summed usage of members that have an estimate, `None` while
/// no member has one.
fn sample_family<T: ProcessTable>(family: &mut ProcessFamily<T>, now: Instant) -> Option<f64> {
    let mut pcpu: Option<f64> = None;
    let mut gone = Vec::new();

    for (pid, result) in family.sample_members(now) {
        match result {
            Ok(Some(usage)) => *pcpu.get_or_insert(0.0) += usage,
            Ok(None) => {}
            Err(e) if e.is_not_found() => gone.push(pid),
            Err(e) => debug!("Skipping sample of {}: {}", pid, e),
        }
    }

    for pid in gone {
        debug!("Process {} left the family", pid);
        family.remove(pid);
    }
    pcpu
}

/// Sends `signal` to every member, evicting the ones that no longer exist.
fn signal_family<T: ProcessTable>(family: &mut ProcessFamily<T>, signal: Signal) {
    let members = family.member_pids().to_vec();
    for pid in members {
        match kill(NixPid::from_raw(pid as i32), signal) {
            Ok(()) => {}
            Err(Errno::ESRCH) => {
                debug!("Process {} vanished before {:?}", pid, signal);
                family.remove(pid);
            }
            Err(e) => warn!("Failed to send {:?} to {}: {}", signal, pid, e),
        }
    }
}
