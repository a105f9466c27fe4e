//! First-run master account seeding

use docman_db::NewUser;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Credentials for the master account created on first start
#[derive(Debug, Clone)]
pub struct MasterAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Create the bootstrap master account unless a master already exists.
///
/// Returns `true` when an account was created.
pub async fn ensure_master(state: &AppState, account: &MasterAccount) -> Result<bool, ApiError> {
    if state.db.count_masters().await? > 0 {
        return Ok(false);
    }

    info!("No master account found, creating '{}'", account.name);
    let password_hash = state.hash_password(account.password.clone()).await?;
    state
        .db
        .insert_user(NewUser {
            name: account.name.clone(),
            email: account.email.clone(),
            password_hash,
            is_master: true,
        })
        .await?;

    info!("Master account '{}' created", account.name);
    Ok(true)
}
