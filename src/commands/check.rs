//! Check command implementation.
//!
//! Validates /proc access and configuration.

use herakles_cpulimit::process::{ProcessIterator, CLK_TCK, CPU_COUNT};
use herakles_cpulimit::{ProcFs, ProcessTable};

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles CPU Limiter - System Check");
    println!("======================================");

    let mut all_ok = true;
    let proc_root = config.proc_root();
    let table = ProcFs::new(&proc_root);

    println!("\n📁 Checking {}...", proc_root.display());
    match ProcessIterator::open(&table) {
        Ok(iter) => {
            let count = iter.count();
            if count == 0 {
                println!("   ❌ No user processes readable");
                all_ok = false;
            } else {
                println!("   ✅ {} user processes readable", count);
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    let me = std::process::id();
    match (table.parent_of(me), table.cpu_time_of(me)) {
        (Ok(ppid), Ok(ticks)) => {
            println!("   ✅ Own stat parsed: ppid={}, cpu ticks={}", ppid, ticks);
        }
        (Err(e), _) | (_, Err(e)) => {
            println!("   ❌ Cannot parse own stat: {}", e);
            all_ok = false;
        }
    }

    println!("\n🖥️  Host:");
    println!("   ├─ CPUs: {}", *CPU_COUNT);
    println!("   └─ Clock ticks: {}/s", *CLK_TCK);

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => match config.limit_percent {
            Some(limit) => println!("   ✅ Configuration is valid (limit {}%)", limit),
            None => println!("   ✅ Configuration is valid (no limit set, pass --limit)"),
        },
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
