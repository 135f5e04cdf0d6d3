use crate::domain::identity::Identity;
use crate::domain::user::driving_ports::UserError;
use crate::domain::{FieldProblem, ValidationProblems};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use derive_more::Display;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    #[display("normal")]
    Normal,
    #[display("superuser")]
    Superuser,
}

impl Role {
    pub fn is_superuser(&self) -> bool {
        matches!(self, Role::Superuser)
    }

    /// The role a user ends up with after a super-admin flips it
    pub fn toggled(&self) -> Role {
        match self {
            Role::Normal => Role::Superuser,
            Role::Superuser => Role::Normal,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TodoUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to store a new user. The ID comes from the identity provider so an
/// account always maps to the same user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUser {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateProfile {
    pub name: String,
    pub avatar: Option<String>,
}

impl UpdateProfile {
    pub fn validate(&self) -> Result<(), ValidationProblems> {
        let mut problems = Vec::new();
        if self.name.trim().is_empty() {
            problems.push(FieldProblem {
                field: "name",
                code: "missing_name",
                message: "Name is required",
            });
        }

        ValidationProblems::into_result(problems)
    }
}

impl CreateUser {
    /// Builds the user record for someone signing in for the first time
    pub fn from_identity(identity: &Identity) -> CreateUser {
        let name = match identity.display_name.as_deref().map(str::trim) {
            Some(display_name) if !display_name.is_empty() => display_name.to_owned(),
            _ => identity
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .filter(|local_part| !local_part.is_empty())
                .unwrap_or("New user")
                .to_owned(),
        };

        CreateUser {
            id: identity.id.clone(),
            name,
            email: identity.email.clone(),
            avatar: identity.photo_url.clone(),
            role: Role::Normal,
        }
    }
}

pub mod driven_ports {
    use super::*;
    use crate::external_connections::ExternalConnectivity;

    pub trait UserReader {
        async fn get_all(
            &self,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<TodoUser>, anyhow::Error>;
        async fn get_by_id(
            &self,
            id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<TodoUser>, anyhow::Error>;
    }

    pub trait UserWriter {
        async fn create_user(
            &self,
            user: &CreateUser,
            created_at: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<TodoUser, anyhow::Error>;

        /// Replaces the stored user with the same ID. Returns false if there was nothing to replace.
        async fn replace_user(
            &self,
            user: &TodoUser,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;

        async fn delete_user(
            &self,
            id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }

    pub trait DetectUser {
        async fn user_exists(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use crate::domain::todo::driven_ports::TodoWriter;
    use crate::external_connections::ExternalConnectivity;

    #[derive(Debug, Error)]
    pub enum UserError {
        #[error("Only super-admins may do that.")]
        NotPermitted,
        #[error("The specified user did not exist.")]
        UserDoesNotExist,
        #[error(transparent)]
        Invalid(#[from] ValidationProblems),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[cfg(test)]
    #[allow(clippy::items_after_test_module)]
    mod user_error_clone {
        use super::UserError;
        use anyhow::anyhow;

        impl Clone for UserError {
            fn clone(&self) -> Self {
                match self {
                    Self::NotPermitted => Self::NotPermitted,
                    Self::UserDoesNotExist => Self::UserDoesNotExist,
                    Self::Invalid(problems) => Self::Invalid(problems.clone()),
                    Self::PortError(err) => Self::PortError(anyhow!(format!("{}", err))),
                }
            }
        }
    }

    pub trait UserPort {
        /// Lists every user. Restricted to super-admins.
        async fn get_users(
            &self,
            acting_user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
        ) -> Result<Vec<TodoUser>, UserError>;
        async fn get_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
        ) -> Result<TodoUser, UserError>;
        /// Returns the user belonging to [identity], creating it on first login
        async fn provision_user(
            &self,
            identity: &Identity,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
            u_writer: &impl driven_ports::UserWriter,
        ) -> Result<TodoUser, UserError>;
        async fn update_profile(
            &self,
            user_id: &str,
            update: &UpdateProfile,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
            u_writer: &impl driven_ports::UserWriter,
        ) -> Result<TodoUser, UserError>;
        /// Flips a user between normal and super-admin. Restricted to super-admins.
        async fn toggle_role(
            &self,
            acting_user_id: &str,
            target_user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
            u_writer: &impl driven_ports::UserWriter,
        ) -> Result<Option<TodoUser>, UserError>;
        /// Removes a user and everything they own. Restricted to super-admins.
        async fn delete_user(
            &self,
            acting_user_id: &str,
            target_user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
            u_writer: &impl driven_ports::UserWriter,
            todo_writer: &impl TodoWriter,
        ) -> Result<(), UserError>;
    }
}

pub struct UserService {}

#[derive(Debug, Error)]
pub(super) enum UserExistsErr {
    #[error("user with ID {0} does not exist")]
    UserDoesNotExist(String),

    #[error(transparent)]
    PortError(#[from] anyhow::Error),
}

pub(super) async fn verify_user_exists(
    id: &str,
    external_cxn: &mut impl ExternalConnectivity,
    user_detect: &impl driven_ports::DetectUser,
) -> Result<(), UserExistsErr> {
    let does_user_exist = user_detect.user_exists(id, external_cxn).await?;

    if does_user_exist {
        Ok(())
    } else {
        Err(UserExistsErr::UserDoesNotExist(id.to_owned()))
    }
}

/// Looks up the user belonging to [identity], creating it the first time that identity is seen
pub(super) async fn provision_user(
    identity: &Identity,
    now: DateTime<Utc>,
    ext_cxn: &mut impl ExternalConnectivity,
    u_reader: &impl driven_ports::UserReader,
    u_writer: &impl driven_ports::UserWriter,
) -> Result<TodoUser, anyhow::Error> {
    let existing = u_reader
        .get_by_id(&identity.id, &mut *ext_cxn)
        .await
        .context("Looking up user during provisioning")?;
    if let Some(user) = existing {
        return Ok(user);
    }

    let created = u_writer
        .create_user(&CreateUser::from_identity(identity), now, &mut *ext_cxn)
        .await
        .context("Creating user on first login")?;
    info!("Provisioned user {} on first login", created.id);

    Ok(created)
}

/// Capability check for anything behind the admin screens
async fn require_superuser(
    acting_user_id: &str,
    ext_cxn: &mut impl ExternalConnectivity,
    u_reader: &impl driven_ports::UserReader,
) -> Result<TodoUser, UserError> {
    let acting_user = u_reader
        .get_by_id(acting_user_id, ext_cxn)
        .await
        .context("Looking up the acting user")?;

    match acting_user {
        Some(user) if user.role.is_superuser() => Ok(user),
        _ => {
            warn!("User {acting_user_id} attempted an admin-only action");
            Err(UserError::NotPermitted)
        }
    }
}


impl driving_ports::UserPort for UserService {
    async fn get_users(
        &self,
        acting_user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
    ) -> Result<Vec<TodoUser>, UserError> {
        require_superuser(acting_user_id, &mut *ext_cxn, u_reader).await?;

        let all_users_result = u_reader.get_all(&mut *ext_cxn).await;
        if let Err(ref port_err) = all_users_result {
            error!("User fetch failure: {port_err}");
        }

        Ok(all_users_result.context("Failed fetching users")?)
    }

    async fn get_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
    ) -> Result<TodoUser, UserError> {
        u_reader
            .get_by_id(user_id, ext_cxn)
            .await
            .context("Fetching a single user")?
            .ok_or(UserError::UserDoesNotExist)
    }

    async fn provision_user(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
        u_writer: &impl driven_ports::UserWriter,
    ) -> Result<TodoUser, UserError> {
        Ok(provision_user(identity, now, ext_cxn, u_reader, u_writer).await?)
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &UpdateProfile,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
        u_writer: &impl driven_ports::UserWriter,
    ) -> Result<TodoUser, UserError> {
        update.validate()?;

        let existing = u_reader
            .get_by_id(user_id, &mut *ext_cxn)
            .await
            .context("Looking up user for a profile update")?
            .ok_or(UserError::UserDoesNotExist)?;
        let updated = TodoUser {
            name: update.name.trim().to_owned(),
            avatar: update.avatar.clone().filter(|avatar| !avatar.is_empty()),
            ..existing
        };

        u_writer
            .replace_user(&updated, &mut *ext_cxn)
            .await
            .context("Saving an updated profile")?;
        Ok(updated)
    }

    async fn toggle_role(
        &self,
        acting_user_id: &str,
        target_user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
        u_writer: &impl driven_ports::UserWriter,
    ) -> Result<Option<TodoUser>, UserError> {
        require_superuser(acting_user_id, &mut *ext_cxn, u_reader).await?;

        let target = u_reader
            .get_by_id(target_user_id, &mut *ext_cxn)
            .await
            .context("Looking up user to change their role")?;
        let Some(target) = target else {
            return Ok(None);
        };

        let updated = TodoUser {
            role: target.role.toggled(),
            ..target
        };
        u_writer
            .replace_user(&updated, &mut *ext_cxn)
            .await
            .context("Saving a changed role")?;
        info!(
            "User {acting_user_id} changed the role of {target_user_id} to {}",
            updated.role
        );

        Ok(Some(updated))
    }

    async fn delete_user(
        &self,
        acting_user_id: &str,
        target_user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
        u_writer: &impl driven_ports::UserWriter,
        todo_writer: &impl crate::domain::todo::driven_ports::TodoWriter,
    ) -> Result<(), UserError> {
        require_superuser(acting_user_id, &mut *ext_cxn, u_reader).await?;

        todo_writer
            .delete_todos_for_user(target_user_id, &mut *ext_cxn)
            .await
            .context("Deleting the todos of a user being removed")?;
        u_writer
            .delete_user(target_user_id, &mut *ext_cxn)
            .await
            .context("Deleting a user")?;
        info!("User {acting_user_id} deleted user {target_user_id}");

        Ok(())
    }
}
