//! Strategy sources for a sync cycle.

use std::sync::Arc;

use monstra_model::Strategy;
use tracing::{debug, info};

use super::remote::{RemoteError, RemoteStraClient};
use crate::store::{StoreError, StraStore};

/// Loads the native strategy set and, when configured, the partner set.
pub struct StraLoader {
    store: Arc<dyn StraStore>,
    remote: Option<RemoteStraClient>,
}

impl StraLoader {
    pub fn new(store: Arc<dyn StraStore>) -> Self {
        Self {
            store,
            remote: None,
        }
    }

    /// Also pull partner strategies through `client` every cycle.
    pub fn with_remote(mut self, client: RemoteStraClient) -> Self {
        self.remote = Some(client);
        self
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    /// All enabled strategies. An error here must abort the cycle.
    pub async fn load_active(&self) -> Result<Vec<Strategy>, StoreError> {
        let stras = self.store.list_effective().await?;
        debug!(count = stras.len(), "Loaded effective strategies");
        Ok(stras)
    }

    /// Partner strategies with timestamps moved to local time.
    ///
    /// Returns `None` when the integration is disabled.
    pub async fn load_supplementary(&self) -> Option<Result<Vec<Strategy>, RemoteError>> {
        let client = self.remote.as_ref()?;

        let result = client.fetch().await.map(|stras| {
            stras
                .into_iter()
                .map(Strategy::localize)
                .collect::<Vec<_>>()
        });

        if let Ok(stras) = &result {
            info!(url = %client.url(), count = stras.len(), "Fetched partner strategies");
        }

        Some(result)
    }
}
