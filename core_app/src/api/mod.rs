//! # API Module
//!
//! Business rules of the shelter, each submodule owning one domain:
//!
//! - [`sponsorship`] - Sponsorship and adoption lifecycle of a user/pet pair
//! - [`walk`] - Walk scheduling, conflict detection and walk status

pub mod sponsorship;
pub mod walk;

use crate::{consts, errors};
use log::warn;

/// Runs `attempt` again when it lost a compare-and-swap, up to
/// [`consts::CAS_RETRIES`] times. Every attempt re-reads its records.
pub(crate) async fn retry_on_conflict<T, F, Fut>(mut attempt: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(err)
                if errors::is_concurrent_modification(&err) && retries < consts::CAS_RETRIES =>
            {
                retries += 1;
                warn!("retrying after concurrent modification: {err}");
            }
            result => return result,
        }
    }
}
