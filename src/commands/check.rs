//! Check command implementation.
//!
//! Validates system requirements and configuration.

use anyhow::{bail, Result};
use herakles_procstat::{Host, Process};
use std::time::Duration;

use crate::commands::host_for;
use crate::config::{validate_effective_config, Config};
use crate::startup_checks::validate_requirements;

/// Exercises every handle operation on one process; returns the failures.
fn probe_handle(host: &Host, pid: u32) -> Vec<String> {
    let mut failures = Vec::new();
    let mut p = match Process::new(pid, host.clone()) {
        Ok(p) => p,
        Err(e) => return vec![format!("open: {e}")],
    };

    if let Err(e) = p.status() {
        failures.push(format!("status: {e}"));
    }
    if let Err(e) = p.times() {
        failures.push(format!("times: {e}"));
    }
    if let Err(e) = p.create_time() {
        failures.push(format!("create_time: {e}"));
    }
    if let Err(e) = p.memory_info() {
        failures.push(format!("memory_info: {e}"));
    }
    if let Err(e) = p.cpu_percent(Duration::ZERO) {
        failures.push(format!("cpu_percent: {e}"));
    }
    if let Err(e) = p.ancestors() {
        failures.push(format!("ancestors: {e}"));
    }
    failures
}

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<()> {
    println!("🔍 Herakles Procstat - System Check");
    println!("===================================");

    let mut all_ok = true;
    let root = config.proc_root();

    println!("\n📁 Checking procfs at {}...", root.display());
    match validate_requirements(&root) {
        Ok(()) => println!("   ✅ procfs readable, boot time and stat records available"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n🧪 Checking process handle operations...");
    match host_for(config).and_then(|host| {
        let pids = host.enumeration().list_pids()?;
        Ok((host, pids))
    }) {
        Ok((host, pids)) => {
            println!("   ✅ {} processes enumerated", pids.len());
            let pid = if pids.contains(&std::process::id()) {
                Some(std::process::id())
            } else {
                pids.first().copied()
            };
            match pid {
                Some(pid) => {
                    let failures = probe_handle(&host, pid);
                    if failures.is_empty() {
                        println!("   ✅ All handle operations succeed on pid {}", pid);
                    } else {
                        for f in &failures {
                            println!("   ❌ pid {}: {}", pid, f);
                        }
                        all_ok = false;
                    }
                }
                None => println!("   ⚠️  No processes to probe"),
            }
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
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
        bail!("system check failed");
    }
}
