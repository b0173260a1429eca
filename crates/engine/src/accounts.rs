//! Read access to remote account credentials.

use async_trait::async_trait;
use fanout_core::account::AccountCredentials;
use fanout_db::repositories::AccountRepo;
use fanout_db::DbPool;

/// Source of per-account credentials.
///
/// `Ok(None)` means the account does not exist; the task fails with
/// "Account not found" and is not retried automatically.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: &str) -> Result<Option<AccountCredentials>, sqlx::Error>;
}

/// [`AccountStore`] over the `accounts` table.
pub struct SqlAccountStore {
    pool: DbPool,
}

impl SqlAccountStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for SqlAccountStore {
    async fn get_account(&self, id: &str) -> Result<Option<AccountCredentials>, sqlx::Error> {
        let Some(account) = AccountRepo::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        account
            .credentials()
            .map(Some)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }
}
