//! Herakles CPU Limiter Library
//!
//! This library tracks a *process family* (a target process plus every
//! descendant it spawns) and estimates each member's CPU usage from the
//! kernel's cumulative CPU-time counters. The `herakles-cpulimit` binary
//! builds its stop/continue throttling loop on top of it.
//!
//! # Features
//!
//! - **Family Tracking**: Incremental membership with O(1) pid lookup
//! - **Racy-Table Tolerance**: Ancestry walks survive processes exiting mid-walk
//! - **Pid Reuse Detection**: Records are keyed by pid and validated by start epoch
//! - **Smoothed CPU Usage**: Exponential moving average over irregular intervals
//! - **Pluggable Backends**: Everything OS specific sits behind `ProcessTable`
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_cpulimit::{ProcFs, ProcessFamily};
//! use std::time::Instant;
//!
//! let mut family = ProcessFamily::create(ProcFs::default(), 4242)?;
//!
//! // Later, on every poll:
//! let born = family.refresh()?;
//! println!("{} new members", born.len());
//!
//! for (pid, usage) in family.sample_members(Instant::now()) {
//!     match usage {
//!         Ok(Some(u)) => println!("{pid}: {:.1}%", u * 100.0),
//!         Ok(None) => println!("{pid}: warming up"),
//!         Err(e) => println!("{pid}: {e}"),
//!     }
//! }
//! # Ok::<(), herakles_cpulimit::FamilyError>(())
//! ```

pub mod error;
pub mod family;
pub mod process;

// Re-export main types for convenience
pub use error::{FamilyError, ReadError};
pub use family::{Lineage, ProcessFamily};
pub use process::{Pid, ProcFs, ProcessIterator, ProcessRecord, ProcessTable};
