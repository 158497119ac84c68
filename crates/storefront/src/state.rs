//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::pagarme::{PagarmeClient, PagarmeError};
use crate::services::print_service::{PrintServiceClient, PrintServiceError};
use crate::services::uploads::UploadStore;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment gateway client: {0}")]
    Pagarme(#[from] PagarmeError),
    #[error("estimation service client: {0}")]
    PrintService(#[from] PrintServiceError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    pagarme: PagarmeClient,
    print_service: PrintServiceClient,
    uploads: UploadStore,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if one of the HTTP clients cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let pagarme = PagarmeClient::new(&config.pagarme)?;
        let print_service = PrintServiceClient::new(&config.print_service)?;
        let uploads = UploadStore::new(config.uploads.max_bytes);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                pagarme,
                print_service,
                uploads,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the payment gateway client.
    #[must_use]
    pub fn pagarme(&self) -> &PagarmeClient {
        &self.inner.pagarme
    }

    /// Get a reference to the estimation service client.
    #[must_use]
    pub fn print_service(&self) -> &PrintServiceClient {
        &self.inner.print_service
    }

    /// Get a reference to the upload store.
    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.inner.uploads
    }
}
