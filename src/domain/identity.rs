use crate::domain::identity::driving_ports::AuthError;
use crate::domain::user::{self, TodoUser};
use crate::external_connections::ExternalConnectivity;
use chrono::{DateTime, Utc};
use derive_more::Display;
use thiserror::Error;
use tracing::{info, warn};

/// An account as the identity provider describes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// An identity that just proved who it is, along with the token the provider issued for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub identity: Identity,
    pub id_token: String,
}

/// A signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: TodoUser,
    pub identity: Identity,
    pub id_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    #[display("sign in")]
    SignIn,
    #[display("sign up")]
    SignUp,
    #[display("sign out")]
    SignOut,
    #[display("reset password")]
    ResetPassword,
}

/// Reasons the identity provider gives for refusing a request
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[display("no account")]
    NoAccount,
    #[display("incorrect password")]
    IncorrectPassword,
    #[display("invalid email")]
    InvalidEmail,
    #[display("throttled")]
    Throttled,
    #[display("account exists")]
    AccountExists,
    #[display("weak password")]
    WeakPassword,
    #[display("unknown")]
    Unknown,
}

/// The user-facing explanation for a failed [action]. Only the failures a given action can
/// meaningfully report get a specific message, everything else falls back to a generic one.
pub fn user_message(action: AuthAction, failure: AuthFailure) -> &'static str {
    use AuthAction::*;
    use AuthFailure::*;

    match (action, failure) {
        (SignIn | ResetPassword, NoAccount) => "No account found with this email",
        (SignIn, IncorrectPassword) => "Incorrect password",
        (SignIn | SignUp, InvalidEmail) => "Invalid email address",
        (SignIn, Throttled) => "Too many failed attempts. Try again later",
        (SignUp, AccountExists) => "An account with this email already exists",
        (SignUp, WeakPassword) => "Password should be at least 6 characters",
        (SignIn, _) => "Failed to sign in",
        (SignUp, _) => "Failed to create account",
        (ResetPassword, _) => "Failed to send reset email",
        (SignOut, _) => "Failed to sign out",
    }
}

pub mod driven_ports {
    use super::*;
    use crate::external_connections::ExternalConnectivity;

    #[derive(Debug, Error)]
    pub enum IdentityError {
        #[error("the identity provider refused the request: {0}")]
        Rejected(AuthFailure),
        #[error("could not reach the identity provider: {0}")]
        Unavailable(#[from] anyhow::Error),
    }

    pub trait IdentityProvider {
        async fn sign_in(
            &self,
            credentials: &Credentials,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<AuthenticatedIdentity, IdentityError>;
        /// Creates an account and signs it in, setting [sign_up]'s name as the display name
        async fn sign_up(
            &self,
            sign_up: &SignUp,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<AuthenticatedIdentity, IdentityError>;
        async fn send_password_reset(
            &self,
            email: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), IdentityError>;
    }
}

pub mod driving_ports {
    use super::*;
    use crate::domain::user::driven_ports::{UserReader, UserWriter};
    use crate::external_connections::ExternalConnectivity;

    /// A failed authentication action. Displays as the message meant for the end user.
    #[derive(Debug, Error)]
    #[error("{}", user_message(self.action, self.failure))]
    pub struct AuthError {
        pub action: AuthAction,
        pub failure: AuthFailure,
        #[source]
        pub cause: Option<anyhow::Error>,
    }

    impl AuthError {
        pub fn new(action: AuthAction, failure: AuthFailure) -> AuthError {
            AuthError {
                action,
                failure,
                cause: None,
            }
        }

        pub(super) fn from_provider(action: AuthAction, err: driven_ports::IdentityError) -> AuthError {
            match err {
                driven_ports::IdentityError::Rejected(failure) => AuthError::new(action, failure),
                driven_ports::IdentityError::Unavailable(cause) => AuthError {
                    action,
                    failure: AuthFailure::Unknown,
                    cause: Some(cause),
                },
            }
        }

        pub fn user_message(&self) -> &'static str {
            user_message(self.action, self.failure)
        }
    }

    #[cfg(test)]
    #[allow(clippy::items_after_test_module)]
    mod auth_error_clone {
        use super::AuthError;
        use anyhow::anyhow;

        impl Clone for AuthError {
            fn clone(&self) -> Self {
                AuthError {
                    action: self.action,
                    failure: self.failure,
                    cause: self.cause.as_ref().map(|err| anyhow!(format!("{}", err))),
                }
            }
        }
    }

    pub trait SessionPort {
        async fn sign_in(
            &self,
            credentials: &Credentials,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
            identity_provider: &impl driven_ports::IdentityProvider,
            u_reader: &impl UserReader,
            u_writer: &impl UserWriter,
        ) -> Result<Session, AuthError>;
        async fn sign_up(
            &self,
            sign_up: &SignUp,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
            identity_provider: &impl driven_ports::IdentityProvider,
            u_reader: &impl UserReader,
            u_writer: &impl UserWriter,
        ) -> Result<Session, AuthError>;
        /// Ends a session. Tokens are held by the client, so there is nothing to revoke here.
        async fn sign_out(&self, user_id: &str) -> Result<(), AuthError>;
        async fn reset_password(
            &self,
            email: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            identity_provider: &impl driven_ports::IdentityProvider,
        ) -> Result<(), AuthError>;
    }
}

pub struct SessionService {}

/// Makes sure the signed-in identity has a user record and wraps both up in a [Session]
async fn open_session(
    action: AuthAction,
    authenticated: AuthenticatedIdentity,
    now: DateTime<Utc>,
    ext_cxn: &mut impl ExternalConnectivity,
    u_reader: &impl user::driven_ports::UserReader,
    u_writer: &impl user::driven_ports::UserWriter,
) -> Result<Session, AuthError> {
    let provisioned =
        user::provision_user(&authenticated.identity, now, ext_cxn, u_reader, u_writer).await;
    let user = provisioned.map_err(|err| {
        warn!("Could not provision user {}: {err}", authenticated.identity.id);
        AuthError {
            action,
            failure: AuthFailure::Unknown,
            cause: Some(err),
        }
    })?;

    Ok(Session {
        user,
        identity: authenticated.identity,
        id_token: authenticated.id_token,
    })
}

impl driving_ports::SessionPort for SessionService {
    async fn sign_in(
        &self,
        credentials: &Credentials,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
        identity_provider: &impl driven_ports::IdentityProvider,
        u_reader: &impl user::driven_ports::UserReader,
        u_writer: &impl user::driven_ports::UserWriter,
    ) -> Result<Session, AuthError> {
        let authenticated = identity_provider
            .sign_in(credentials, &mut *ext_cxn)
            .await
            .map_err(|err| AuthError::from_provider(AuthAction::SignIn, err))?;
        info!("Identity {} signed in", authenticated.identity.id);

        open_session(AuthAction::SignIn, authenticated, now, ext_cxn, u_reader, u_writer).await
    }

    async fn sign_up(
        &self,
        sign_up: &SignUp,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
        identity_provider: &impl driven_ports::IdentityProvider,
        u_reader: &impl user::driven_ports::UserReader,
        u_writer: &impl user::driven_ports::UserWriter,
    ) -> Result<Session, AuthError> {
        let mut authenticated = identity_provider
            .sign_up(sign_up, &mut *ext_cxn)
            .await
            .map_err(|err| AuthError::from_provider(AuthAction::SignUp, err))?;
        if authenticated.identity.display_name.is_none() {
            authenticated.identity.display_name = Some(sign_up.name.trim().to_owned());
        }
        info!("Identity {} signed up", authenticated.identity.id);

        open_session(AuthAction::SignUp, authenticated, now, ext_cxn, u_reader, u_writer).await
    }

    async fn sign_out(&self, user_id: &str) -> Result<(), AuthError> {
        info!("User {user_id} signed out");
        Ok(())
    }

    async fn reset_password(
        &self,
        email: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        identity_provider: &impl driven_ports::IdentityProvider,
    ) -> Result<(), AuthError> {
        identity_provider
            .send_password_reset(email, ext_cxn)
            .await
            .map_err(|err| AuthError::from_provider(AuthAction::ResetPassword, err))
    }
}
