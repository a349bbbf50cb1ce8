//! One-off setup of scan targets and scan tasks on the engine.

mod targets;
mod tasks;

pub use targets::{load_targets, provision_targets};
pub use tasks::{assign_scans, cpu_core_count, ScanProfile};
