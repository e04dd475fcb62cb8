//! VM status codes and their symbolic mapping.

use serde::{Deserialize, Serialize};

/// Observed status of a VM, derived from the hypervisor's numeric state code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmStatus {
    /// VM is running (includes blocked-on-resource and booting states)
    Running,
    /// VM is suspended in memory
    Paused,
    /// VM is shut down or shutting down
    Shutdown,
    /// VM has crashed
    Crashed,
    /// Code not recognized by the mapping table
    Unknown,
}

impl VmStatus {
    /// Map a hypervisor state code to a status.
    ///
    /// The table follows the libvirt domain state codes: 0 (no state),
    /// 1 (running) and 2 (blocked) all report as running; 3 is paused;
    /// 4 (shutting down) and 5 (shut off) both report as shutdown; 6 is
    /// crashed. Anything else maps to [`VmStatus::Unknown`].
    pub fn from_code(code: u32) -> Self {
        match code {
            0..=2 => VmStatus::Running,
            3 => VmStatus::Paused,
            4 | 5 => VmStatus::Shutdown,
            6 => VmStatus::Crashed,
            _ => VmStatus::Unknown,
        }
    }

    /// The lowercase token used in results and filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            VmStatus::Running => "running",
            VmStatus::Paused => "paused",
            VmStatus::Shutdown => "shutdown",
            VmStatus::Crashed => "crashed",
            VmStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for VmStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
