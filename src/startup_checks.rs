//! Startup requirement validation for herakles-cpulimit.
//!
//! This module validates that the limiter has the permissions and system
//! interfaces it needs before it starts stopping processes.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges()?;
    check_proc_access(proc_root)?;

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() -> Result<(), ValidationError> {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - only processes owned by this user can be limited");
    } else {
        info!("✅ Running as root (uid=0)");
    }
    Ok(())
}

/// Check that the process table can be scanned and init's stat is readable
fn check_proc_access(proc_root: &Path) -> Result<(), ValidationError> {
    if let Err(e) = fs::read_dir(proc_root) {
        error!("❌ Cannot list {}: {}", proc_root.display(), e);
        return Err(ValidationError::ProcUnavailable(format!(
            "{}: {}",
            proc_root.display(),
            e
        )));
    }

    let init_stat = proc_root.join("1").join("stat");
    match fs::read_to_string(&init_stat) {
        Ok(_) => {
            info!("✅ {} access: parent links are readable", proc_root.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            error!("❌ Cannot read {} - insufficient permissions", init_stat.display());
            error!("   Ancestry walks need every process's stat file.");
            error!("   Check the hidepid= mount option of {}", proc_root.display());
            Err(ValidationError::InsufficientPermissions(e.to_string()))
        }
        Err(e) => {
            warn!("⚠️  Could not test {} access: {}", proc_root.display(), e);
            Ok(())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("Process table unavailable: {0}")]
    ProcUnavailable(String),
}
