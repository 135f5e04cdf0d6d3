use super::kv_store::{self, USERS_STORE};
use crate::domain;
use crate::domain::user::{CreateUser, Role, TodoUser};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub struct DbDetectUser;

#[derive(Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum RoleRecord {
    Normal,
    Superuser,
}

/// How a user looks inside the users store
#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct TodoUserRecord {
    id: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default = "normal_role")]
    role: RoleRecord,
    created_at: DateTime<Utc>,
}

fn normal_role() -> RoleRecord {
    RoleRecord::Normal
}

impl From<RoleRecord> for Role {
    fn from(value: RoleRecord) -> Self {
        match value {
            RoleRecord::Normal => Role::Normal,
            RoleRecord::Superuser => Role::Superuser,
        }
    }
}

impl From<Role> for RoleRecord {
    fn from(value: Role) -> Self {
        match value {
            Role::Normal => RoleRecord::Normal,
            Role::Superuser => RoleRecord::Superuser,
        }
    }
}

impl From<TodoUserRecord> for TodoUser {
    fn from(value: TodoUserRecord) -> Self {
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

impl From<&TodoUser> for TodoUserRecord {
    fn from(value: &TodoUser) -> Self {
        TodoUserRecord {
            id: value.id.clone(),
            name: value.name.clone(),
            email: value.email.clone(),
            avatar: value.avatar.clone(),
            role: value.role.into(),
            created_at: value.created_at,
        }
    }
}

async fn load_users(ext_cxn: &mut impl ExternalConnectivity) -> Result<Vec<TodoUserRecord>, Error> {
    let mut connection = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

    kv_store::load_collection(USERS_STORE, connection.borrow_connection()).await
}

impl domain::user::driven_ports::DetectUser for DbDetectUser {
    async fn user_exists(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let users = load_users(ext_cxn).await.context("Detecting user with ID")?;

        Ok(users.iter().any(|user| user.id == user_id))
    }
}

pub struct DbUserReader;

impl domain::user::driven_ports::UserReader for DbUserReader {
    async fn get_all(&self, ext_cxn: &mut impl ExternalConnectivity) -> Result<Vec<TodoUser>, Error> {
        let users: Vec<TodoUser> = load_users(ext_cxn)
            .await
            .context("Fetching all users")?
            .into_iter()
            .map(TodoUser::from)
            .collect();

        Ok(users)
    }

    async fn get_by_id(
        &self,
        id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<TodoUser>, Error> {
        let user = load_users(ext_cxn)
            .await
            .context("Fetching a user by id")?
            .into_iter()
            .find(|user| user.id == id);

        Ok(user.map(TodoUser::from))
    }
}

pub struct DbUserWriter;

impl domain::user::driven_ports::UserWriter for DbUserWriter {
    async fn create_user(
        &self,
        user: &CreateUser,
        created_at: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<TodoUser, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;
        let created = TodoUser {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            created_at,
        };

        // Two first logins racing each other must still leave a single record behind
        let stored = kv_store::update_collection(
            USERS_STORE,
            cxn_handle.borrow_connection(),
            |records: &mut Vec<TodoUserRecord>| {
                if let Some(existing) = records.iter().find(|record| record.id == created.id) {
                    return TodoUser::from(existing.clone());
                }

                records.push(TodoUserRecord::from(&created));
                created.clone()
            },
        )
        .await
        .context("Inserting new user")?;

        Ok(stored)
    }

    async fn replace_user(
        &self,
        user: &TodoUser,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let replaced = kv_store::update_collection(
            USERS_STORE,
            cxn_handle.borrow_connection(),
            |records: &mut Vec<TodoUserRecord>| match records.iter_mut().find(|record| record.id == user.id) {
                Some(record) => {
                    *record = TodoUserRecord::from(user);
                    true
                }
                None => false,
            },
        )
        .await
        .context("Replacing a user")?;

        Ok(replaced)
    }

    async fn delete_user(&self, id: &str, ext_cxn: &mut impl ExternalConnectivity) -> Result<(), Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        kv_store::update_collection(
            USERS_STORE,
            cxn_handle.borrow_connection(),
            |records: &mut Vec<TodoUserRecord>| records.retain(|record| record.id != id),
        )
        .await
        .context("Deleting a user")?;

        Ok(())
    }
}
