//! Application state shared across request handlers.

use std::sync::Arc;

use crate::cache::SharedStraCache;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cache: SharedStraCache,
}

impl AppState {
    pub fn new(cache: SharedStraCache) -> Self {
        Self {
            inner: Arc::new(AppStateInner { cache }),
        }
    }

    /// Get a reference to the published strategy cache.
    pub fn cache(&self) -> &SharedStraCache {
        &self.inner.cache
    }
}
