//! Reconciliation Engine: converge a VM onto a requested state or run a
//! command, with the minimal set of driver calls.

use crate::error::{CoreError, Result};
use crate::flags::compose_undefine_flags;
use crate::outcome::{ChangeReason, Outcome};
use crate::registry;
use crate::request::{Command, DesiredState, VirtRequest};
use crate::xml;
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;
use virtstate_driver::{DriverError, HypervisorDriver, VmStatus};

/// Drives one hypervisor connection toward requested states.
///
/// One invocation is one [`run`](Reconciler::run): the engine inspects the
/// current hypervisor-reported state, issues the driver calls needed to
/// converge, and reports whether anything changed. All driver calls within
/// a run are sequential; nothing is retried, and the first failure aborts
/// the invocation.
pub struct Reconciler<D> {
    driver: D,
}

impl<D: HypervisorDriver> Reconciler<D> {
    /// Wrap a connected driver.
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Access the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Consume the reconciler, returning the driver.
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Reconcile one request.
    ///
    /// Evaluation order:
    /// 1. `list_vms` combined with a `state` is a read-only filtered
    ///    listing, checked before any other reading of `state`. (A
    ///    surprising overload, kept for compatibility: `state` here is a
    ///    filter, never a target.)
    /// 2. An explicit `autostart` (except under `define`, which handles it
    ///    itself) is converged independently; if the request carries
    ///    neither state nor command, the run ends here.
    /// 3. A `state` is converged per the transition table and the run ends;
    ///    an accompanying command other than `list_vms` is never reached.
    /// 4. A `command` is dispatched to the driver primitive.
    ///
    /// With neither state nor command (and no autostart), the request is
    /// rejected with [`CoreError::MissingAction`].
    pub async fn run(&self, req: &VirtRequest) -> Result<Outcome> {
        let span = tracing::info_span!("reconcile", run_id = %Uuid::new_v4());
        self.run_inner(req).instrument(span).await
    }

    async fn run_inner(&self, req: &VirtRequest) -> Result<Outcome> {
        if req.command == Some(Command::ListVms) {
            if let Some(state) = req.state {
                return self.list_vms_filtered(state).await;
            }
        }

        let mut outcome = Outcome::unchanged();

        if let Some(autostart) = req.autostart {
            if req.command != Some(Command::Define) {
                let name = req
                    .name
                    .as_deref()
                    .ok_or_else(|| CoreError::MissingIdentity("autostart".to_string()))?;
                // Surface a missing VM before touching the autostart flag.
                self.driver.state_code(name).await?;
                if self.ensure_autostart(name, autostart).await? {
                    outcome.mark_changed(None);
                }
                if req.state.is_none() && req.command.is_none() {
                    return Ok(outcome);
                }
            }
        }

        if let Some(state) = req.state {
            let name = req
                .name
                .as_deref()
                .ok_or_else(|| CoreError::MissingIdentity("state change".to_string()))?;
            self.converge_state(name, state, &mut outcome).await?;
            return Ok(outcome);
        }

        if let Some(command) = req.command {
            return self.dispatch(command, req, outcome).await;
        }

        Err(CoreError::MissingAction)
    }

    /// Desired-state transition table: one driver call at most.
    async fn converge_state(
        &self,
        name: &str,
        desired: DesiredState,
        outcome: &mut Outcome,
    ) -> Result<()> {
        let current = self.status_of(name).await?;
        tracing::debug!(vm = %name, %current, desired = %desired, "Converging VM state");

        match desired {
            DesiredState::Running => match current {
                VmStatus::Paused => {
                    self.driver.resume(name).await?;
                    outcome.mark_changed(None);
                }
                VmStatus::Running => {}
                _ => {
                    self.driver.start(name).await?;
                    outcome.mark_changed(None);
                }
            },
            DesiredState::Shutdown => {
                if current != VmStatus::Shutdown {
                    self.driver.shutdown(name).await?;
                    outcome.mark_changed(None);
                }
            }
            DesiredState::Destroyed => {
                if current != VmStatus::Shutdown {
                    self.driver.destroy(name).await?;
                    outcome.mark_changed(None);
                }
            }
            DesiredState::Paused => {
                if current == VmStatus::Running {
                    self.driver.suspend(name).await?;
                    outcome.mark_changed(None);
                }
            }
        }

        if outcome.changed {
            tracing::info!(vm = %name, desired = %desired, "VM state transition issued");
        } else {
            tracing::debug!(vm = %name, desired = %desired, "VM already converged");
        }
        Ok(())
    }

    async fn dispatch(&self, command: Command, req: &VirtRequest, outcome: Outcome) -> Result<Outcome> {
        if command == Command::Define {
            return self.define(req, outcome).await;
        }
        if command.is_host_scoped() {
            return self.host_command(command, outcome).await;
        }

        let name = req
            .name
            .as_deref()
            .ok_or_else(|| CoreError::MissingIdentity(command.as_str().to_string()))?;

        if command == Command::Undefine {
            let mask = compose_undefine_flags(req.flags.as_deref(), req.force)?;
            tracing::info!(vm = %name, mask, "Undefining VM");
            self.driver.undefine(name, mask).await?;
            let mut outcome = outcome.with_detail(command.as_str(), json!(0));
            outcome.mark_changed(None);
            return Ok(outcome);
        }

        tracing::debug!(vm = %name, command = %command, "Dispatching VM command");
        let detail = match command {
            // `create` has always been an alias for booting the defined VM.
            Command::Create | Command::Start => {
                self.driver.start(name).await?;
                json!(0)
            }
            Command::Destroy => {
                self.driver.destroy(name).await?;
                json!(0)
            }
            Command::Shutdown => {
                self.driver.shutdown(name).await?;
                json!(0)
            }
            Command::Pause => {
                self.driver.suspend(name).await?;
                json!(0)
            }
            Command::Unpause => {
                self.driver.resume(name).await?;
                json!(0)
            }
            Command::Status => json!(self.status_of(name).await?.as_str()),
            Command::GetXml => json!(self.driver.active_xml(name).await?),
            // Define, Undefine and host commands are handled above.
            _ => unreachable!("non-VM command in VM dispatch"),
        };

        Ok(outcome.with_detail(command.as_str(), detail))
    }

    async fn host_command(&self, command: Command, outcome: Outcome) -> Result<Outcome> {
        tracing::debug!(command = %command, "Dispatching host command");
        let detail = match command {
            Command::Freemem => json!(self.driver.free_memory().await?),
            Command::Virttype => json!(self.driver.hypervisor_type().await?),
            Command::Nodeinfo => serde_json::to_value(self.driver.node_info().await?)?,
            Command::ListVms => json!(registry::list_vms(&self.driver, None).await?),
            Command::Info => serde_json::to_value(registry::host_info(&self.driver).await?)?,
            _ => unreachable!("non-host command in host dispatch"),
        };
        Ok(outcome.with_detail(command.as_str(), detail))
    }

    /// The read-only `list_vms` + `state` override. `destroyed` has no
    /// observable status and matches nothing.
    async fn list_vms_filtered(&self, state: DesiredState) -> Result<Outcome> {
        let names = match state.matching_status() {
            Some(status) => registry::list_vms(&self.driver, Some(status)).await?,
            None => Vec::new(),
        };
        Ok(Outcome::unchanged().with_detail(Command::ListVms.as_str(), json!(names)))
    }

    /// Idempotent define: diff the persisted XML across the call.
    async fn define(&self, req: &VirtRequest, mut outcome: Outcome) -> Result<Outcome> {
        let xml_text = req.xml.as_deref().ok_or(CoreError::MissingXml)?;
        if req.name.is_some() {
            // The definition's own name always wins over the argument.
            tracing::warn!("'xml' is given - ignoring 'name'");
        }
        let name = xml::domain_name(xml_text).ok_or(CoreError::XmlNameMissing)?;

        let existing_xml = match self.driver.inactive_xml(&name).await {
            Ok(xml) => Some(xml),
            Err(DriverError::VmNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        match self.driver.define_xml(xml_text).await {
            Ok(()) => {}
            // Some hypervisors refuse to override an existing definition
            // with this code; the XML diff below decides whether anything
            // actually changed.
            Err(e) if e.is_domain_exists() => {
                tracing::debug!(vm = %name, "define reported existing domain, continuing");
            }
            Err(e) => return Err(e.into()),
        }

        match existing_xml {
            Some(old) => {
                let new = self.driver.inactive_xml(&name).await?;
                if old != new {
                    outcome.mark_changed(Some(ChangeReason::ConfigChanged));
                    tracing::info!(vm = %name, "VM definition overridden");
                }
            }
            None => {
                outcome.mark_changed(Some(ChangeReason::Created));
                outcome = outcome.with_detail("created", json!(name));
                tracing::info!(vm = %name, "VM defined");
            }
        }

        if let Some(autostart) = req.autostart {
            if self.ensure_autostart(&name, autostart).await? {
                outcome.mark_changed(Some(ChangeReason::Autostart));
            }
        }

        Ok(outcome)
    }

    /// Toggle the autostart flag only when it differs.
    async fn ensure_autostart(&self, name: &str, enabled: bool) -> Result<bool> {
        if self.driver.autostart(name).await? == enabled {
            return Ok(false);
        }
        tracing::info!(vm = %name, enabled, "Setting VM autostart");
        self.driver.set_autostart(name, enabled).await?;
        Ok(true)
    }

    async fn status_of(&self, name: &str) -> Result<VmStatus> {
        let code = self.driver.state_code(name).await?;
        Ok(VmStatus::from_code(code))
    }
}
