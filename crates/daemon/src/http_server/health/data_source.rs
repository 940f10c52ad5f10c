use std::convert::Infallible;
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;

use common::store::DocumentStore;

use crate::public_jams::CacheState;
use crate::service_state::ServiceState;

#[async_trait]
pub trait DataSource {
    /// Check that the server can answer requests with fresh data
    async fn is_ready(&self) -> Result<(), DataSourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DataSourceError {
    #[error("one or more dependencies aren't available")]
    DependencyFailure,

    #[error("service is shutting down")]
    ShuttingDown,
}

pub type DynDataSource = Arc<dyn DataSource + Send + Sync>;

pub struct StateDataSource(DynDataSource);

impl Debug for StateDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDataSource").finish()
    }
}

impl StateDataSource {
    pub fn new(dds: DynDataSource) -> Self {
        Self(dds)
    }
}

impl Deref for StateDataSource {
    type Target = DynDataSource;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Ready once the first cache pass is done, while the store still answers
#[async_trait]
impl<S: DocumentStore> DataSource for ServiceState<S> {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        let cache = self.public_jams();
        match cache.state() {
            CacheState::Stopped => return Err(DataSourceError::ShuttingDown),
            CacheState::Uninitialized => return Err(DataSourceError::DependencyFailure),
            CacheState::Populated => {}
        }
        cache.probe_store().await.map_err(|e| {
            tracing::warn!(error = %e, "document store probe failed");
            DataSourceError::DependencyFailure
        })
    }
}

#[async_trait]
impl<S: DocumentStore> FromRequestParts<ServiceState<S>> for StateDataSource {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &ServiceState<S>,
    ) -> Result<Self, Self::Rejection> {
        Ok(StateDataSource(Arc::new(state.clone())))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Clone)]
    pub(crate) enum MockReadiness {
        DependencyFailure,
        Ready,
        ShuttingDown,
    }

    #[async_trait]
    impl DataSource for MockReadiness {
        async fn is_ready(&self) -> Result<(), DataSourceError> {
            use MockReadiness::*;

            match self {
                DependencyFailure => Err(DataSourceError::DependencyFailure),
                Ready => Ok(()),
                ShuttingDown => Err(DataSourceError::ShuttingDown),
            }
        }
    }
}
