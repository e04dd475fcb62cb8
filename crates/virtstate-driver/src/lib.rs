//! # virtstate-driver
//!
//! Hypervisor driver abstraction for virtstate.
//!
//! This crate defines the [`HypervisorDriver`] trait — the set of primitive
//! operations the reconciliation core needs from a hypervisor management
//! layer (start, stop, define, undefine, status and host queries), addressed
//! by VM name. Concrete backends (libvirt, a remote management API, ...)
//! implement the trait and handle their own connection bootstrapping; the
//! core never sees a URI or a wire protocol.
//!
//! An in-memory [`MockDriver`] is shipped with the crate for tests and for
//! callers that want to dry-run reconciliation without a hypervisor.

mod driver;
mod error;
mod mock;
mod status;
mod types;

pub use driver::HypervisorDriver;
pub use error::{DriverError, Result, ERR_DOMAIN_EXISTS};
pub use mock::{MockDriver, MockVm};
pub use status::VmStatus;
pub use types::{NodeInfo, RawVmInfo};
