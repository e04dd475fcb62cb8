//! Request model: desired state, commands, undefine flags.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use virtstate_driver::VmStatus;

/// Target VM state requested for idempotent reconciliation.
///
/// Distinct from [`VmStatus`]: `destroyed` is an action ("ensure shut down
/// via forced stop"), there is no corresponding observed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// VM should be running (resumed if paused, started otherwise)
    Running,
    /// VM should be suspended; only acted on when currently running
    Paused,
    /// VM should be shut down gracefully
    Shutdown,
    /// VM should be forced off
    Destroyed,
}

impl DesiredState {
    /// The observed status this desired state converges on, used when the
    /// state parameter acts as a read-only listing filter. `destroyed` has
    /// no observable counterpart and matches nothing.
    pub fn matching_status(&self) -> Option<VmStatus> {
        match self {
            DesiredState::Running => Some(VmStatus::Running),
            DesiredState::Paused => Some(VmStatus::Paused),
            DesiredState::Shutdown => Some(VmStatus::Shutdown),
            DesiredState::Destroyed => None,
        }
    }

    /// The lowercase request token.
    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Running => "running",
            DesiredState::Paused => "paused",
            DesiredState::Shutdown => "shutdown",
            DesiredState::Destroyed => "destroyed",
        }
    }
}

impl FromStr for DesiredState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(DesiredState::Running),
            "paused" => Ok(DesiredState::Paused),
            "shutdown" => Ok(DesiredState::Shutdown),
            "destroyed" => Ok(DesiredState::Destroyed),
            other => Err(CoreError::InvalidState(other.to_string())),
        }
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Imperative commands, dispatched directly without idempotency diffing
/// (`define` excepted — it diffs the persisted XML).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Boot a defined VM (alias of `start`)
    Create,
    /// Register a VM definition from XML
    Define,
    /// Force off a VM
    Destroy,
    /// Fetch the live definition XML
    GetXml,
    /// Suspend a VM
    Pause,
    /// Gracefully shut a VM down
    Shutdown,
    /// Boot a defined VM
    Start,
    /// Report a VM's status token
    Status,
    /// Remove a VM's persisted definition
    Undefine,
    /// Resume a suspended VM
    Unpause,
    /// Host: free memory in bytes
    Freemem,
    /// Host: per-VM resource snapshot
    Info,
    /// Host: VM name listing, optionally status-filtered
    ListVms,
    /// Host: node hardware description
    Nodeinfo,
    /// Host: hypervisor type string
    Virttype,
}

impl Command {
    /// True for commands that address the host rather than a named VM.
    pub fn is_host_scoped(&self) -> bool {
        matches!(
            self,
            Command::Freemem
                | Command::Info
                | Command::ListVms
                | Command::Nodeinfo
                | Command::Virttype
        )
    }

    /// The snake_case request token, also the key results are wrapped under.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Create => "create",
            Command::Define => "define",
            Command::Destroy => "destroy",
            Command::GetXml => "get_xml",
            Command::Pause => "pause",
            Command::Shutdown => "shutdown",
            Command::Start => "start",
            Command::Status => "status",
            Command::Undefine => "undefine",
            Command::Unpause => "unpause",
            Command::Freemem => "freemem",
            Command::Info => "info",
            Command::ListVms => "list_vms",
            Command::Nodeinfo => "nodeinfo",
            Command::Virttype => "virttype",
        }
    }
}

impl FromStr for Command {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Command::Create),
            "define" => Ok(Command::Define),
            "destroy" => Ok(Command::Destroy),
            "get_xml" => Ok(Command::GetXml),
            "pause" => Ok(Command::Pause),
            "shutdown" => Ok(Command::Shutdown),
            "start" => Ok(Command::Start),
            "status" => Ok(Command::Status),
            "undefine" => Ok(Command::Undefine),
            "unpause" => Ok(Command::Unpause),
            "freemem" => Ok(Command::Freemem),
            "info" => Ok(Command::Info),
            "list_vms" => Ok(Command::ListVms),
            "nodeinfo" => Ok(Command::Nodeinfo),
            "virttype" => Ok(Command::Virttype),
            other => Err(CoreError::UnrecognizedCommand(other.to_string())),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbolic undefine flags, each a distinct bit of the undefine mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefineFlag {
    /// Also remove any managed save image
    ManagedSave,
    /// Also remove snapshot metadata
    SnapshotsMetadata,
    /// Also remove nvram; conflicts with `keep_nvram`
    Nvram,
    /// Keep nvram behind; conflicts with `nvram`
    KeepNvram,
    /// Also remove checkpoint metadata
    CheckpointsMetadata,
}

impl UndefineFlag {
    /// The bit this flag contributes to the undefine mask.
    pub fn bit(&self) -> u32 {
        match self {
            UndefineFlag::ManagedSave => 1,
            UndefineFlag::SnapshotsMetadata => 2,
            UndefineFlag::Nvram => 4,
            UndefineFlag::KeepNvram => 8,
            UndefineFlag::CheckpointsMetadata => 16,
        }
    }

    /// The snake_case request token.
    pub fn as_str(&self) -> &'static str {
        match self {
            UndefineFlag::ManagedSave => "managed_save",
            UndefineFlag::SnapshotsMetadata => "snapshots_metadata",
            UndefineFlag::Nvram => "nvram",
            UndefineFlag::KeepNvram => "keep_nvram",
            UndefineFlag::CheckpointsMetadata => "checkpoints_metadata",
        }
    }
}

impl FromStr for UndefineFlag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "managed_save" => Ok(UndefineFlag::ManagedSave),
            "snapshots_metadata" => Ok(UndefineFlag::SnapshotsMetadata),
            "nvram" => Ok(UndefineFlag::Nvram),
            "keep_nvram" => Ok(UndefineFlag::KeepNvram),
            "checkpoints_metadata" => Ok(UndefineFlag::CheckpointsMetadata),
            other => Err(CoreError::UnknownFlag(other.to_string())),
        }
    }
}

impl std::fmt::Display for UndefineFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reconciliation request: a desired state or a command, plus the
/// arguments that go with it. All fields are optional; the engine validates
/// the combination.
///
/// # Example
///
/// ```
/// use virtstate_core::{DesiredState, VirtRequest};
///
/// let req = VirtRequest::new()
///     .name("alpha")
///     .state(DesiredState::Running)
///     .autostart(true);
/// assert_eq!(req.name.as_deref(), Some("alpha"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtRequest {
    /// VM name; required for VM-scoped operations
    pub name: Option<String>,
    /// Desired state for idempotent reconciliation
    pub state: Option<DesiredState>,
    /// Host-autostart flag to converge on
    pub autostart: Option<bool>,
    /// Imperative command
    pub command: Option<Command>,
    /// Undefine flags (only meaningful with `undefine`)
    pub flags: Option<Vec<UndefineFlag>>,
    /// Undefine with all metadata removed (only meaningful with `undefine`)
    pub force: Option<bool>,
    /// Domain XML descriptor (only meaningful with `define`)
    pub xml: Option<String>,
}

impl VirtRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the VM name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the desired state.
    pub fn state(mut self, state: DesiredState) -> Self {
        self.state = Some(state);
        self
    }

    /// Set the autostart flag.
    pub fn autostart(mut self, enabled: bool) -> Self {
        self.autostart = Some(enabled);
        self
    }

    /// Set the command.
    pub fn command(mut self, command: Command) -> Self {
        self.command = Some(command);
        self
    }

    /// Set the undefine flags.
    pub fn flags(mut self, flags: impl IntoIterator<Item = UndefineFlag>) -> Self {
        self.flags = Some(flags.into_iter().collect());
        self
    }

    /// Set the force flag.
    pub fn force(mut self, force: bool) -> Self {
        self.force = Some(force);
        self
    }

    /// Set the domain XML descriptor.
    pub fn xml(mut self, xml: impl Into<String>) -> Self {
        self.xml = Some(xml.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tokens_round_trip() {
        for token in ["running", "paused", "shutdown", "destroyed"] {
            let state: DesiredState = token.parse().unwrap();
            assert_eq!(state.as_str(), token);
        }
    }

    #[test]
    fn test_unknown_state_is_invalid() {
        let err = "rebooted".parse::<DesiredState>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(s) if s == "rebooted"));
    }

    #[test]
    fn test_command_tokens_round_trip() {
        for token in [
            "create", "define", "destroy", "get_xml", "pause", "shutdown", "start", "status",
            "undefine", "unpause", "freemem", "info", "list_vms", "nodeinfo", "virttype",
        ] {
            let command: Command = token.parse().unwrap();
            assert_eq!(command.as_str(), token);
        }
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let err = "reboot".parse::<Command>().unwrap_err();
        assert!(matches!(err, CoreError::UnrecognizedCommand(s) if s == "reboot"));
    }

    #[test]
    fn test_host_scoped_commands() {
        assert!(Command::ListVms.is_host_scoped());
        assert!(Command::Freemem.is_host_scoped());
        assert!(!Command::Start.is_host_scoped());
        assert!(!Command::Define.is_host_scoped());
    }

    #[test]
    fn test_flag_bits_are_distinct_powers_of_two() {
        let flags = [
            UndefineFlag::ManagedSave,
            UndefineFlag::SnapshotsMetadata,
            UndefineFlag::Nvram,
            UndefineFlag::KeepNvram,
            UndefineFlag::CheckpointsMetadata,
        ];
        let mut seen = 0u32;
        for flag in flags {
            assert!(flag.bit().is_power_of_two());
            assert_eq!(seen & flag.bit(), 0);
            seen |= flag.bit();
        }
        assert_eq!(seen, 31);
    }

    #[test]
    fn test_unknown_flag_token_is_rejected_at_parse() {
        let err = "managed-save".parse::<UndefineFlag>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownFlag(_)));
    }

    #[test]
    fn test_destroyed_matches_no_status() {
        assert!(DesiredState::Destroyed.matching_status().is_none());
        assert_eq!(
            DesiredState::Running.matching_status(),
            Some(VmStatus::Running)
        );
    }
}
