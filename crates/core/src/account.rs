//! Credentials for one remote platform account.
//!
//! Accounts are owned by an external credential store; the engine only
//! reads them to build a remote client for each task.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Auth type name for API-token accounts.
pub const AUTH_TYPE_TOKEN: &str = "token";

/// Auth type name for email + global key accounts.
pub const AUTH_TYPE_EMAIL_KEY: &str = "email_key";

/// How requests against the remote platform are authenticated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountAuth {
    /// Scoped API token sent as a bearer token.
    Token { api_token: String },
    /// Legacy email + global API key pair.
    EmailKey { email: String, key: String },
}

impl AccountAuth {
    pub fn auth_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => AUTH_TYPE_TOKEN,
            Self::EmailKey { .. } => AUTH_TYPE_EMAIL_KEY,
        }
    }
}

// Secrets never reach the logs.
impl fmt::Debug for AccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token { .. } => f.debug_struct("Token").field("api_token", &"***").finish(),
            Self::EmailKey { email, .. } => f
                .debug_struct("EmailKey")
                .field("email", email)
                .field("key", &"***")
                .finish(),
        }
    }
}

/// Everything a remote client needs to act on behalf of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    /// Local identifier, referenced by `Task.account_id`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The platform-side account identifier used in API paths.
    pub remote_account_id: String,
    pub auth: AccountAuth,
}
