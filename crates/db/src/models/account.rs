//! Remote platform account models.
//!
//! Secrets are stored in plain columns here; they are never serialized.

use fanout_core::account::{
    AccountAuth, AccountCredentials, AUTH_TYPE_EMAIL_KEY, AUTH_TYPE_TOKEN,
};
use fanout_core::error::CoreError;
use fanout_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub auth_type: String,
    pub remote_account_id: String,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub auth_email: Option<String>,
    #[serde(skip_serializing)]
    pub auth_key: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Account {
    /// Build the credentials a remote client needs.
    ///
    /// Fails when the row's secrets do not match its `auth_type`.
    pub fn credentials(&self) -> Result<AccountCredentials, CoreError> {
        let auth = match self.auth_type.as_str() {
            AUTH_TYPE_TOKEN => AccountAuth::Token {
                api_token: self.api_token.clone().ok_or_else(|| {
                    CoreError::Internal(format!("Account {} has no API token", self.id))
                })?,
            },
            AUTH_TYPE_EMAIL_KEY => match (&self.auth_email, &self.auth_key) {
                (Some(email), Some(key)) => AccountAuth::EmailKey {
                    email: email.clone(),
                    key: key.clone(),
                },
                _ => {
                    return Err(CoreError::Internal(format!(
                        "Account {} is missing its email or key",
                        self.id
                    )))
                }
            },
            other => {
                return Err(CoreError::Internal(format!(
                    "Account {} has unknown auth type {other}",
                    self.id
                )))
            }
        };

        Ok(AccountCredentials {
            id: self.id.clone(),
            name: self.name.clone(),
            remote_account_id: self.remote_account_id.clone(),
            auth,
        })
    }
}

/// DTO for inserting an account.
#[derive(Debug, Deserialize)]
pub struct CreateAccount {
    pub id: String,
    pub name: String,
    pub remote_account_id: String,
    pub auth: AccountAuth,
}
