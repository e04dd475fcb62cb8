//! Raw data shapes reported by a hypervisor driver.

use serde::{Deserialize, Serialize};

/// Point-in-time VM resource report, as returned by the hypervisor.
///
/// The state code is raw; map it through
/// [`VmStatus::from_code`](crate::VmStatus::from_code) for the symbolic
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVmInfo {
    /// Hypervisor-native state code
    pub state_code: u32,
    /// Maximum memory allowed, in KiB
    pub max_mem: u64,
    /// Memory currently used, in KiB
    pub memory: u64,
    /// Number of virtual CPUs
    pub vcpus: u32,
    /// Cumulative CPU time, in nanoseconds
    pub cpu_time: u64,
}

/// Host (node) hardware description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// CPU model string
    pub cpu_model: String,
    /// Physical memory in MiB
    pub memory_mib: u64,
    /// Number of active CPUs
    pub cpus: u32,
    /// Expected CPU frequency in MHz
    pub mhz: u32,
    /// Number of NUMA nodes
    pub numa_nodes: u32,
    /// Number of CPU sockets per node
    pub sockets: u32,
    /// Number of cores per socket
    pub cores: u32,
    /// Number of threads per core
    pub threads: u32,
}
