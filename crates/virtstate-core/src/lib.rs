//! # virtstate-core
//!
//! Idempotent VM lifecycle reconciliation over a hypervisor driver.
//!
//! Given a request declaring either a desired VM state (`running`, `paused`,
//! `shutdown`, `destroyed`) or an imperative command (`define`, `undefine`,
//! `start`, `list_vms`, ...), the [`Reconciler`] compares the
//! hypervisor-reported status with the request, issues the minimal set of
//! driver calls needed to converge, and reports whether anything changed.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   virtstate-core                    │
//! ├─────────────────────────────────────────────────────┤
//! │                                                     │
//! │  VirtRequest ──▶ ┌──────────────┐                   │
//! │                  │  Reconciler  │ ──▶ Outcome       │
//! │                  │  - run()     │     {changed,     │
//! │                  └──────┬───────┘      reason,      │
//! │                         │              detail}      │
//! │      ┌──────────────────┼───────────────┐           │
//! │      ▼                  ▼               ▼           │
//! │  flag composer    registry view    xml name scan    │
//! │  (undefine mask)  (list / info)    (define)         │
//! │                                                     │
//! └─────────────────────────┬───────────────────────────┘
//!                           │ HypervisorDriver trait
//!                           ▼
//! ┌─────────────────────────────────────────────────────┐
//! │       virtstate-driver (libvirt, mock, ...)         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use virtstate_core::{DesiredState, Reconciler, VirtRequest};
//! use virtstate_driver::MockDriver;
//!
//! # async fn example() -> virtstate_core::Result<()> {
//! let driver = MockDriver::new().with_vm("alpha", 3); // paused
//! let reconciler = Reconciler::new(driver);
//!
//! // Converge "alpha" onto running; a paused VM is resumed.
//! let outcome = reconciler
//!     .run(&VirtRequest::new().name("alpha").state(DesiredState::Running))
//!     .await?;
//! assert!(outcome.changed);
//!
//! // Running it again is a no-op.
//! let outcome = reconciler
//!     .run(&VirtRequest::new().name("alpha").state(DesiredState::Running))
//!     .await?;
//! assert!(!outcome.changed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - **Idempotency**: `changed == false` implies no mutating driver call
//!   was issued; re-running a converged request changes nothing.
//! - **Validation first**: caller-input errors are raised before any
//!   mutating driver call.
//! - **No retries**: every driver failure is fatal to the invocation;
//!   the one tolerated partial failure is a per-VM status lookup during a
//!   filtered listing.

mod error;
mod flags;
mod outcome;
mod reconcile;
mod registry;
mod request;
mod xml;

pub use error::{CoreError, Result};
pub use flags::{compose_undefine_flags, FORCE_UNDEFINE_MASK};
pub use outcome::{ChangeReason, Outcome};
pub use reconcile::Reconciler;
pub use registry::{host_info, list_vms, HostInfo, VmInfoSnapshot};
pub use request::{Command, DesiredState, UndefineFlag, VirtRequest};
