//! Flag Composer: symbolic undefine flags to a single driver bitmask.

use crate::error::{CoreError, Result};
use crate::request::UndefineFlag;

/// Mask used for `force`: every metadata bit except `keep_nvram`
/// (managed_save | snapshots_metadata | nvram | checkpoints_metadata).
pub const FORCE_UNDEFINE_MASK: u32 = 23;

/// Compose the undefine bitmask from symbolic flags and/or `force`.
///
/// Rules, in order:
/// 1. Non-empty `flags` win; `force` is then ignored (with a warning when
///    it was set to true). `nvram` together with `keep_nvram` is rejected.
/// 2. Otherwise `force == true` selects [`FORCE_UNDEFINE_MASK`].
/// 3. Otherwise the mask is 0 — a plain undefine, which the hypervisor
///    refuses when managed-save state, snapshots or nvram exist. That
///    refusal surfaces from the driver, not from here.
pub fn compose_undefine_flags(
    flags: Option<&[UndefineFlag]>,
    force: Option<bool>,
) -> Result<u32> {
    if let Some(flags) = flags.filter(|f| !f.is_empty()) {
        if force == Some(true) {
            tracing::warn!("ignoring 'force', because 'flags' are provided");
        }
        if flags.contains(&UndefineFlag::Nvram) && flags.contains(&UndefineFlag::KeepNvram) {
            return Err(CoreError::ConflictingFlags);
        }
        let mut mask = 0;
        for flag in flags {
            mask |= flag.bit();
        }
        return Ok(mask);
    }
    if force == Some(true) {
        return Ok(FORCE_UNDEFINE_MASK);
    }
    Ok(0)
}
