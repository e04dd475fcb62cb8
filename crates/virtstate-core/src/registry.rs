//! VM Registry View: read-only bulk queries over the driver.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use virtstate_driver::{HypervisorDriver, VmStatus};

/// Point-in-time, per-VM resource snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInfoSnapshot {
    /// Mapped status
    pub status: VmStatus,
    /// Maximum memory allowed, in KiB
    pub max_mem: u64,
    /// Memory currently used, in KiB
    pub memory: u64,
    /// Number of virtual CPUs
    pub vcpus: u32,
    /// Cumulative CPU time, in nanoseconds
    pub cpu_time: u64,
    /// Host-autostart flag
    pub autostart: bool,
}

/// Snapshot of every VM on the connection, taken by the host `info` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostInfo {
    /// When the snapshot was taken
    pub queried_at: DateTime<Utc>,
    /// Per-VM snapshots, keyed by name
    pub vms: BTreeMap<String, VmInfoSnapshot>,
}

/// Enumerate VM names, optionally keeping only those whose current status
/// equals `filter`.
///
/// A VM whose status lookup fails while filtering (it may have disappeared
/// between enumeration and the query) is omitted and enumeration continues.
/// This is the one operation where partial failure is tolerated rather than
/// propagated.
pub async fn list_vms<D: HypervisorDriver>(
    driver: &D,
    filter: Option<VmStatus>,
) -> Result<Vec<String>> {
    let names = driver.list_names().await?;
    let Some(want) = filter else {
        return Ok(names);
    };

    let mut matching = Vec::new();
    for name in names {
        match driver.state_code(&name).await {
            Ok(code) => {
                if VmStatus::from_code(code) == want {
                    matching.push(name);
                }
            }
            Err(error) => {
                tracing::debug!(vm = %name, %error, "skipping VM whose status lookup failed");
            }
        }
    }
    Ok(matching)
}

/// Gather a [`HostInfo`] snapshot for every VM on the connection.
///
/// Unlike [`list_vms`], per-VM failures here are fatal: an info report with
/// silently missing VMs would be worse than an error.
pub async fn host_info<D: HypervisorDriver>(driver: &D) -> Result<HostInfo> {
    let queried_at = Utc::now();
    let mut vms = BTreeMap::new();
    for name in driver.list_names().await? {
        let raw = driver.vm_info(&name).await?;
        let autostart = driver.autostart(&name).await?;
        vms.insert(
            name,
            VmInfoSnapshot {
                status: VmStatus::from_code(raw.state_code),
                max_mem: raw.max_mem,
                memory: raw.memory,
                vcpus: raw.vcpus,
                cpu_time: raw.cpu_time,
                autostart,
            },
        );
    }
    Ok(HostInfo { queried_at, vms })
}
