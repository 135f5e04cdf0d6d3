use crate::domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Serialize, Deserialize, ToSchema, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleDto {
    Normal,
    Superuser,
}

impl From<domain::user::Role> for RoleDto {
    fn from(value: domain::user::Role) -> Self {
        match value {
            domain::user::Role::Normal => RoleDto::Normal,
            domain::user::Role::Superuser => RoleDto::Superuser,
        }
    }
}

/// DTO for a user
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Eq, Debug))]
pub struct TodoUser {
    #[schema(example = "1")]
    pub id: String,
    #[schema(example = "Fawaz Ahamed")]
    pub name: String,
    #[schema(example = "fawaz@demo.com")]
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub role: RoleDto,
    pub created_at: DateTime<Utc>,
}

impl From<domain::user::TodoUser> for TodoUser {
    fn from(value: domain::user::TodoUser) -> Self {
        TodoUser {
            id: value.id,
            name: value.name,
            email: value.email,
            avatar: value.avatar,
            role: value.role.into(),
            created_at: value.created_at,
        }
    }
}

/// DTO for editing a user's own profile
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateProfile {
    #[validate(length(max = 100))]
    #[schema(example = "Sarah Wilson")]
    pub name: String,
    #[validate(url)]
    #[schema(example = "https://example.com/avatar.png")]
    pub avatar: Option<String>,
}

impl From<UpdateProfile> for domain::user::UpdateProfile {
    fn from(value: UpdateProfile) -> Self {
        domain::user::UpdateProfile {
            name: value.name,
            avatar: value.avatar,
        }
    }
}
