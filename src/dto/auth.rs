use crate::domain;
use crate::dto::TodoUser;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// DTO for signing in with e-mail and password
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct SignInRequest {
    #[validate(length(min = 1, max = 320))]
    #[schema(example = "fawaz@demo.com")]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl From<SignInRequest> for domain::identity::Credentials {
    fn from(value: SignInRequest) -> Self {
        domain::identity::Credentials {
            email: value.email.trim().to_owned(),
            password: value.password,
        }
    }
}

/// DTO for creating an account
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct SignUpRequest {
    #[validate(length(min = 1, max = 320))]
    #[schema(example = "sarah@demo.com")]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Sarah Wilson")]
    pub name: String,
}

impl From<SignUpRequest> for domain::identity::SignUp {
    fn from(value: SignUpRequest) -> Self {
        domain::identity::SignUp {
            email: value.email.trim().to_owned(),
            password: value.password,
            name: value.name,
        }
    }
}

#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct SignOutRequest {
    #[validate(length(min = 1))]
    #[schema(example = "1")]
    pub user_id: String,
}

#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct PasswordResetRequest {
    #[validate(length(min = 1, max = 320))]
    #[schema(example = "fawaz@demo.com")]
    pub email: String,
}

/// DTO for a freshly opened session
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct SessionResponse {
    pub user: TodoUser,
    /// Token issued by the identity provider
    pub id_token: String,
}

impl From<domain::identity::Session> for SessionResponse {
    fn from(value: domain::identity::Session) -> Self {
        SessionResponse {
            user: value.user.into(),
            id_token: value.id_token,
        }
    }
}
