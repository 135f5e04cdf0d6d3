//! Identity provider adapter speaking the Identity Toolkit REST protocol

use crate::domain;
use crate::domain::identity::driven_ports::IdentityError;
use crate::domain::identity::{AuthFailure, AuthenticatedIdentity, Credentials, Identity, SignUp};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_IDENTITY_API_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Clone, Debug)]
pub struct HttpIdentityProvider {
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> HttpIdentityProvider {
        HttpIdentityProvider {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{method}?key={}", self.base_url, self.api_key)
    }

    /// POSTs [body] to one of the `accounts:*` methods, turning error payloads into [IdentityError]s
    async fn call<Req, Resp>(
        &self,
        method: &str,
        body: &Req,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Resp, IdentityError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let response = ext_cxn
            .http_client()
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .with_context(|| format!("calling accounts:{method}"))?;

        let status = response.status();
        if status.is_success() {
            let parsed = response
                .json::<Resp>()
                .await
                .with_context(|| format!("reading the accounts:{method} response"))?;
            return Ok(parsed);
        }

        let error_body = response
            .json::<ErrorEnvelope>()
            .await
            .with_context(|| format!("reading the accounts:{method} error ({status})"))?;
        let failure = failure_from_code(&error_body.error.message);
        if failure == AuthFailure::Unknown {
            warn!(
                "Identity provider rejected accounts:{method} with {status}: {}",
                error_body.error.message
            );
        } else {
            debug!("Identity provider refused accounts:{method}: {failure}");
        }

        Err(IdentityError::Rejected(failure))
    }
}

/// Maps a provider error code such as `WEAK_PASSWORD : Password should be at least 6 characters`
/// onto the failures the domain knows about
fn failure_from_code(message: &str) -> AuthFailure {
    let code = message
        .split(|character: char| character == ':' || character.is_whitespace())
        .next()
        .unwrap_or_default();

    match code {
        "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthFailure::NoAccount,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthFailure::IncorrectPassword,
        "INVALID_EMAIL" | "MISSING_EMAIL" => AuthFailure::InvalidEmail,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthFailure::Throttled,
        "EMAIL_EXISTS" => AuthFailure::AccountExists,
        "WEAK_PASSWORD" => AuthFailure::WeakPassword,
        _ => AuthFailure::Unknown,
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'req> {
    email: &'req str,
    password: &'req str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    id_token: String,
    email: Option<String>,
    display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'req> {
    id_token: &'req str,
    display_name: &'req str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'req> {
    id_token: &'req str,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    /// Milliseconds since the epoch, sent as a string
    created_at: Option<String>,
}

impl From<AccountInfo> for Identity {
    fn from(value: AccountInfo) -> Self {
        Identity {
            id: value.local_id,
            display_name: value.display_name.filter(|name| !name.is_empty()),
            email: value.email,
            photo_url: value.photo_url.filter(|url| !url.is_empty()),
            created_at: value
                .created_at
                .and_then(|millis| millis.parse::<i64>().ok())
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'req> {
    request_type: &'static str,
    email: &'req str,
}

#[derive(Deserialize)]
struct Ignored {}

impl HttpIdentityProvider {
    /// Fetches the full account behind [token]. Falls back to what the token exchange returned if
    /// the lookup comes back empty.
    async fn lookup(
        &self,
        token: TokenResponse,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let lookup: LookupResponse = self
            .call(
                "lookup",
                &LookupRequest {
                    id_token: &token.id_token,
                },
                ext_cxn,
            )
            .await?;

        let identity = match lookup.users.into_iter().next() {
            Some(account) => Identity::from(account),
            None => Identity {
                id: token.local_id,
                display_name: token.display_name,
                email: token.email,
                photo_url: None,
                created_at: None,
            },
        };

        Ok(AuthenticatedIdentity {
            identity,
            id_token: token.id_token,
        })
    }
}

impl domain::identity::driven_ports::IdentityProvider for HttpIdentityProvider {
    async fn sign_in(
        &self,
        credentials: &Credentials,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let token: TokenResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email: &credentials.email,
                    password: &credentials.password,
                    return_secure_token: true,
                },
                &*ext_cxn,
            )
            .await?;

        self.lookup(token, &*ext_cxn).await
    }

    async fn sign_up(
        &self,
        sign_up: &SignUp,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let token: TokenResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email: &sign_up.email,
                    password: &sign_up.password,
                    return_secure_token: true,
                },
                &*ext_cxn,
            )
            .await?;

        let _: Ignored = self
            .call(
                "update",
                &UpdateProfileRequest {
                    id_token: &token.id_token,
                    display_name: sign_up.name.trim(),
                    return_secure_token: false,
                },
                &*ext_cxn,
            )
            .await?;

        self.lookup(token, &*ext_cxn).await
    }

    async fn send_password_reset(
        &self,
        email: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), IdentityError> {
        let _: Ignored = self
            .call(
                "sendOobCode",
                &OobCodeRequest {
                    request_type: "PASSWORD_RESET",
                    email,
                },
                &*ext_cxn,
            )
            .await?;

        Ok(())
    }
}
