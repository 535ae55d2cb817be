//! Authorization core: entitlement resolution, session lifecycle, and token
//! signing.
pub mod error;
pub mod keys;
pub mod resolution;
pub mod session;
pub mod signer;
pub mod upstream;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) fn now_epoch_seconds() -> i64 {
    // Wall-clock time; verifiers apply their own leeway. Clamp to zero if the
    // clock sits before the epoch rather than panic.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}
