//! Repository for the `accounts` table.

use chrono::Utc;
use fanout_core::account::AccountAuth;
use sqlx::SqlitePool;

use crate::models::account::{Account, CreateAccount};

/// Column list for `accounts` queries.
const COLUMNS: &str = "\
    id, name, auth_type, remote_account_id, api_token, auth_email, auth_key, \
    created_at, updated_at";

/// Read access to remote platform accounts, plus insertion for seeding.
pub struct AccountRepo;

impl AccountRepo {
    /// Insert an account, returning the created row.
    pub async fn create(pool: &SqlitePool, input: &CreateAccount) -> Result<Account, sqlx::Error> {
        let (api_token, auth_email, auth_key) = match &input.auth {
            AccountAuth::Token { api_token } => (Some(api_token.as_str()), None, None),
            AccountAuth::EmailKey { email, key } => (None, Some(email.as_str()), Some(key.as_str())),
        };

        let query = format!(
            "INSERT INTO accounts \
                (id, name, auth_type, remote_account_id, api_token, auth_email, auth_key, \
                 created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&query)
            .bind(&input.id)
            .bind(&input.name)
            .bind(input.auth.auth_type())
            .bind(&input.remote_account_id)
            .bind(api_token)
            .bind(auth_email)
            .bind(auth_key)
            .bind(Utc::now())
            .fetch_one(pool)
            .await
    }

    /// Find an account by ID.
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Account>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM accounts WHERE id = ?1");
        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
