//! Image registry availability

use tracing::debug;

use crate::cluster::ClusterClient;
use crate::Result;

/// `managementState` value meaning the operator runs the registry
pub const MANAGED_STATE: &str = "Managed";

/// Check whether the internal image registry is operational
///
/// The registry counts as available only when its operator config is
/// `Managed`; `Unmanaged`, `Removed` or an unset state all mean it is not.
/// A failed read is returned as an error rather than guessed at.
pub async fn is_registry_available(client: &dyn ClusterClient) -> Result<bool> {
    let state = client.registry_management_state().await?;
    let available = state == MANAGED_STATE;
    debug!(management_state = %state, available, "Checked image registry status");
    Ok(available)
}
