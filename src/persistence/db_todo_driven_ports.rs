use super::kv_store::{self, TODOS_STORE};
use crate::domain;
use crate::domain::todo::{NewTodo, Todo, UpdateTodo, toggle_complete};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

pub struct DbTodoReader;

/// How a todo looks inside the todos store
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoRecord {
    id: String,
    user_id: String,
    title: String,
    #[serde(default)]
    description: String,
    scheduled_at: DateTime<Utc>,
    #[serde(default)]
    completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<TodoRecord> for Todo {
    fn from(value: TodoRecord) -> Self {
        Todo {
            id: value.id,
            user_id: value.user_id,
            title: value.title,
            description: value.description,
            scheduled_at: value.scheduled_at,
            completed: value.completed,
            completed_at: value.completed_at,
            created_at: value.created_at,
        }
    }
}

impl From<&TodoRecord> for Todo {
    fn from(value: &TodoRecord) -> Self {
        Todo {
            id: value.id.clone(),
            user_id: value.user_id.clone(),
            title: value.title.clone(),
            description: value.description.clone(),
            scheduled_at: value.scheduled_at,
            completed: value.completed,
            completed_at: value.completed_at,
            created_at: value.created_at,
        }
    }
}

impl From<&Todo> for TodoRecord {
    fn from(value: &Todo) -> Self {
        TodoRecord {
            id: value.id.clone(),
            user_id: value.user_id.clone(),
            title: value.title.clone(),
            description: value.description.clone(),
            scheduled_at: value.scheduled_at,
            completed: value.completed,
            completed_at: value.completed_at,
            created_at: value.created_at,
        }
    }
}

impl domain::todo::driven_ports::TodoReader for DbTodoReader {
    async fn todos_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<Todo>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let todos: Vec<Todo> =
            kv_store::load_collection::<TodoRecord>(TODOS_STORE, cxn.borrow_connection())
                .await
                .context("trying to fetch todos for a user")?
                .into_iter()
                .filter(|record| record.user_id == user_id)
                .map(Todo::from)
                .collect();

        Ok(todos)
    }

    async fn todo_by_id(
        &self,
        todo_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Todo>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let todo = kv_store::load_collection::<TodoRecord>(TODOS_STORE, cxn.borrow_connection())
            .await
            .context("trying to fetch a todo by ID")?
            .into_iter()
            .find(|record| record.id == todo_id)
            .map(Todo::from);

        Ok(todo)
    }
}

pub struct DbTodoWriter;

impl domain::todo::driven_ports::TodoWriter for DbTodoWriter {
    async fn create_todo(
        &self,
        user_id: &str,
        new_todo: &NewTodo,
        created_at: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Todo, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;
        let created = Todo {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            title: new_todo.title.clone(),
            description: new_todo.description.clone(),
            scheduled_at: new_todo.scheduled_at,
            completed: false,
            completed_at: None,
            created_at,
        };

        kv_store::update_collection(
            TODOS_STORE,
            cxn.borrow_connection(),
            |records: &mut Vec<TodoRecord>| records.push(TodoRecord::from(&created)),
        )
        .await
        .context("trying to insert a new todo")?;

        Ok(created)
    }

    async fn update_todo(
        &self,
        user_id: &str,
        todo_id: &str,
        update: &UpdateTodo,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Todo>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let updated = modify_owned_todo(cxn.borrow_connection(), user_id, todo_id, |todo| {
            update.apply_to(todo)
        })
        .await
        .context("trying to update a todo")?;

        Ok(updated)
    }

    async fn toggle_todo(
        &self,
        user_id: &str,
        todo_id: &str,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Todo>, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let toggled = modify_owned_todo(cxn.borrow_connection(), user_id, todo_id, |todo| {
            toggle_complete(todo, now)
        })
        .await
        .context("trying to toggle a todo")?;

        Ok(toggled)
    }

    async fn delete_todo(
        &self,
        user_id: &str,
        todo_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        let deleted = kv_store::update_collection(
            TODOS_STORE,
            cxn.borrow_connection(),
            |records: &mut Vec<TodoRecord>| {
                let before = records.len();
                records.retain(|record| !(record.id == todo_id && record.user_id == user_id));
                records.len() != before
            },
        )
        .await
        .context("trying to remove a todo")?;

        Ok(deleted)
    }

    async fn delete_todos_for_user(
        &self,
        user_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await.map_err(super::anyhowify)?;

        kv_store::update_collection(
            TODOS_STORE,
            cxn.borrow_connection(),
            |records: &mut Vec<TodoRecord>| records.retain(|record| record.user_id != user_id),
        )
        .await
        .context("trying to remove a user's todos")?;

        Ok(())
    }
}

/// Rewrites the todo [todo_id] owned by [user_id] inside the store transaction, so the read and
/// the write happen under the same row lock
async fn modify_owned_todo(
    cxn: &mut PgConnection,
    user_id: &str,
    todo_id: &str,
    transform: impl FnOnce(&Todo) -> Todo,
) -> Result<Option<Todo>, Error> {
    kv_store::update_collection(TODOS_STORE, cxn, |records: &mut Vec<TodoRecord>| {
        let record = records
            .iter_mut()
            .find(|record| record.id == todo_id && record.user_id == user_id)?;
        let modified = transform(&Todo::from(&*record));
        *record = TodoRecord::from(&modified);
        Some(modified)
    })
    .await
}
