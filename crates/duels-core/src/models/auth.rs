//! Wire types for the authentication endpoints.

use serde::{Deserialize, Serialize};

use super::User;

/// Access/refresh credential pair as issued by `auth/sign-in-wallet` and
/// `auth/refresh`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

// Tokens are bearer secrets; keep them out of debug output and logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub address: &'a str,
    /// Base64 signature over the address bytes.
    pub secret: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    pub jwt_info: TokenPair,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefreshResponse {
    pub jwt_info: TokenPair,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserResponse {
    pub user: User,
}
