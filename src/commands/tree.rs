//! Tree command implementation.
//!
//! Builds the process family of a target and prints its members with their
//! CPU usage estimates.

use std::thread;
use std::time::{Duration, Instant};

use herakles_cpulimit::process::TargetLookup;
use herakles_cpulimit::{ProcFs, ProcessFamily, ProcessTable};

use crate::cli::TargetArgs;
use crate::config::Config;
use crate::limiter::Target;

/// Shows the family of a target over `samples` sampling rounds.
pub fn command_tree(
    target: &TargetArgs,
    samples: usize,
    interval_ms: u64,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = Target::from_args(target).ok_or("tree needs --pid or --exe")?;
    let table = ProcFs::new(config.proc_root());

    let root = match target.lookup(&table) {
        TargetLookup::Found(pid) | TargetLookup::NoPermission(pid) => pid,
        TargetLookup::NotFound => return Err(format!("no process found for {}", target).into()),
    };

    println!("🌳 Process family of {} (pid {})", target, root);
    println!("================================================");

    let start = Instant::now();
    let mut family = ProcessFamily::create(&table, root)?;
    println!(
        "   📁 Indexed {} processes in {:.2}ms, {} members",
        family.len(),
        start.elapsed().as_secs_f64() * 1000.0,
        family.member_count()
    );

    let interval = Duration::from_millis(interval_ms);
    for round in 1..=samples.max(1) {
        if round > 1 {
            thread::sleep(interval);
            for pid in family.refresh()? {
                println!("   ➕ New member: {}", pid);
            }
        }

        println!("\n🔄 Sample {}/{}:", round, samples.max(1));
        let results = family.sample_members(Instant::now());
        let mut total = 0.0;
        let mut gone = Vec::new();

        for (pid, result) in results {
            let ppid = table
                .parent_of(pid)
                .map(|p| p.to_string())
                .unwrap_or_else(|_| "-".into());
            let exe = table
                .exe_path(pid)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "?".into());
            match result {
                Ok(Some(usage)) => {
                    total += usage;
                    println!("   ├─ {:>7} (ppid {:>7}) {:>6.1}%  {}", pid, ppid, usage * 100.0, exe);
                }
                Ok(None) => {
                    println!("   ├─ {:>7} (ppid {:>7})      -   {}", pid, ppid, exe);
                }
                Err(e) if e.is_not_found() => gone.push(pid),
                Err(e) => println!("   ├─ ❌ {}: {}", pid, e),
            }
        }
        for pid in gone {
            println!("   ➖ Exited: {}", pid);
            family.remove(pid);
        }
        println!("   └─ Family total: {:.1}% over {} members", total * 100.0, family.member_count());
    }

    Ok(())
}
