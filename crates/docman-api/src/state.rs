//! Application state

use docman_auth::{AuthError, JwtManager, PasswordManager};
use docman_db::Database;
use docman_storage::StorageBackend;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::error::ApiError;

/// Handle used to render the Prometheus scrape output
pub type MetricsHandle = PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub storage: Arc<dyn StorageBackend>,
    pub jwt: Arc<JwtManager>,
    pub passwords: Arc<PasswordManager>,
    /// Request body limit for uploads, in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        db: Database,
        storage: Arc<dyn StorageBackend>,
        jwt: Arc<JwtManager>,
        passwords: Arc<PasswordManager>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            db,
            storage,
            jwt,
            passwords,
            max_upload_bytes,
        }
    }

    /// Hash a password on the blocking pool
    pub async fn hash_password(&self, plain: String) -> Result<String, ApiError> {
        let passwords = self.passwords.clone();
        tokio::task::spawn_blocking(move || passwords.hash(&plain))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(ApiError::from)
    }

    /// Check a login attempt on the blocking pool.
    ///
    /// A missing user still costs one verification, and every failure
    /// (including an unparseable stored hash) reads as invalid credentials.
    pub async fn verify_password(&self, plain: String, hash: Option<String>) -> Result<(), ApiError> {
        let passwords = self.passwords.clone();
        let verified =
            tokio::task::spawn_blocking(move || passwords.verify_or_dummy(&plain, hash.as_deref()))
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?;

        match verified {
            Ok(true) => Ok(()),
            Ok(false) | Err(AuthError::MalformedHash) => Err(AuthError::InvalidCredentials.into()),
            Err(e) => Err(e.into()),
        }
    }
}
