//! The HypervisorDriver trait - primitive operations the core reconciles over.

use crate::error::Result;
use crate::types::{NodeInfo, RawVmInfo};
use async_trait::async_trait;

/// Primitive hypervisor operations, addressed by VM name.
///
/// A driver represents one live hypervisor connection. Constructing the
/// driver (URI handling, auth) is the backend's concern; every method here
/// may be a long-latency IPC or network call and is surfaced as a fatal
/// error on failure — no retry logic lives behind this trait.
///
/// Name-addressed methods fail with
/// [`DriverError::VmNotFound`](crate::DriverError::VmNotFound) when no VM
/// with that name exists on the connection.
#[async_trait]
pub trait HypervisorDriver: Send + Sync {
    /// Names of all VMs visible on this connection, active or not.
    async fn list_names(&self) -> Result<Vec<String>>;

    /// Raw hypervisor state code for the named VM.
    async fn state_code(&self, name: &str) -> Result<u32>;

    /// Point-in-time resource report for the named VM.
    async fn vm_info(&self, name: &str) -> Result<RawVmInfo>;

    /// Boot the named VM from its persisted definition.
    async fn start(&self, name: &str) -> Result<()>;

    /// Forcefully terminate the named VM (virtual power pull).
    async fn destroy(&self, name: &str) -> Result<()>;

    /// Ask the named VM's OS to shut down gracefully.
    async fn shutdown(&self, name: &str) -> Result<()>;

    /// Suspend the named VM in memory.
    async fn suspend(&self, name: &str) -> Result<()>;

    /// Resume a suspended VM.
    async fn resume(&self, name: &str) -> Result<()>;

    /// Remove the named VM's persisted definition. `mask` selects which
    /// ancillary metadata (managed save, snapshots, nvram, ...) is removed
    /// alongside it; with a mask of 0 the call fails if such metadata
    /// exists.
    async fn undefine(&self, name: &str, mask: u32) -> Result<()>;

    /// Register a VM definition from a domain XML document. A definition
    /// with the same name may be overridden, or the call may fail with the
    /// [`ERR_DOMAIN_EXISTS`](crate::ERR_DOMAIN_EXISTS) API code depending on
    /// the backend.
    async fn define_xml(&self, xml: &str) -> Result<()>;

    /// The persisted (inactive) definition XML for the named VM.
    async fn inactive_xml(&self, name: &str) -> Result<String>;

    /// The live definition XML for the named VM.
    async fn active_xml(&self, name: &str) -> Result<String>;

    /// Whether the named VM is started with the host.
    async fn autostart(&self, name: &str) -> Result<bool>;

    /// Set the host-autostart flag for the named VM.
    async fn set_autostart(&self, name: &str, enabled: bool) -> Result<()>;

    /// Free memory on the host, in bytes.
    async fn free_memory(&self) -> Result<u64>;

    /// Host hardware description.
    async fn node_info(&self) -> Result<NodeInfo>;

    /// Hypervisor type string (e.g. "QEMU", "LXC").
    async fn hypervisor_type(&self) -> Result<String>;
}
