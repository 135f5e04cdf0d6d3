use crate::domain;
use crate::domain::todo::driven_ports::{TodoReader, TodoWriter};
use crate::domain::todo::driving_ports::TodoError;
use crate::domain::{FieldProblem, ValidationProblems};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use derive_more::Display;
use std::cmp::Reverse;
use tracing::{debug, info};

/// How many hours ahead the notification view looks for todos that are due soon
pub const DEFAULT_DUE_SOON_HOURS: u32 = 4;
/// Maximum number of todos reported as "completed today" in notifications
pub const MAX_COMPLETED_TODAY: usize = 10;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Todo {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
    pub completed: bool,
    /// Present exactly when [Todo::completed] is true
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The list views a user can pick from
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum TodoFilter {
    /// Everything, most recently created first
    #[default]
    #[display("all")]
    All,
    /// Not completed yet (regardless of whether the scheduled time passed), soonest first
    #[display("upcoming")]
    Upcoming,
    /// Completed, most recently completed first
    #[display("completed")]
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTodo {
    pub title: String,
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
}

/// What a user should be reminded about right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoNotifications {
    pub due_soon: Vec<Todo>,
    pub completed_today: Vec<Todo>,
}

/// The calendar day [instant] falls on for a viewer at [offset]
pub fn local_date(instant: &DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    instant.with_timezone(offset).date_naive()
}

pub fn todos_for_user<'todos>(todos: &'todos [Todo], user_id: &str) -> Vec<&'todos Todo> {
    todos.iter().filter(|todo| todo.user_id == user_id).collect()
}

/// Todos scheduled on [date] as seen by a viewer at [offset]. Matching is done on the local
/// calendar day, so a todo at 23:00 local time stays on its own day even when that instant is
/// already the next day in UTC.
pub fn todos_for_date<'todos>(
    todos: &'todos [Todo],
    date: NaiveDate,
    offset: &FixedOffset,
) -> Vec<&'todos Todo> {
    todos
        .iter()
        .filter(|todo| local_date(&todo.scheduled_at, offset) == date)
        .collect()
}

/// Completed todos whose completion happened on [date] for a viewer at [offset], most recently
/// completed first
pub fn completed_on_date<'todos>(
    todos: &'todos [Todo],
    date: NaiveDate,
    offset: &FixedOffset,
) -> Vec<&'todos Todo> {
    let mut completed: Vec<&Todo> = todos
        .iter()
        .filter(|todo| {
            todo.completed
                && todo
                    .completed_at
                    .is_some_and(|at| local_date(&at, offset) == date)
        })
        .collect();
    completed.sort_by_key(|todo| Reverse(todo.completed_at));

    completed
}

/// Selects a user's todos for one of the list views and orders them the way that view expects
pub fn filtered_and_sorted<'todos>(
    todos: &'todos [Todo],
    user_id: &str,
    filter: TodoFilter,
) -> Vec<&'todos Todo> {
    let mut user_todos = todos_for_user(todos, user_id);

    match filter {
        TodoFilter::All => {
            user_todos.sort_by_key(|todo| Reverse(todo.created_at));
        }
        TodoFilter::Upcoming => {
            user_todos.retain(|todo| !todo.completed);
            user_todos.sort_by_key(|todo| todo.scheduled_at);
        }
        TodoFilter::Completed => {
            user_todos.retain(|todo| todo.completed);
            // A completed todo without a completion time counts as completed at the epoch
            user_todos.sort_by_key(|todo| {
                Reverse(
                    todo.completed_at
                        .map(|at| at.timestamp_millis())
                        .unwrap_or(0),
                )
            });
        }
    }

    user_todos
}

/// Flips the completion state of a todo. Completing stamps [now] as the completion time,
/// un-completing clears it. The original record is left untouched.
pub fn toggle_complete(todo: &Todo, now: DateTime<Utc>) -> Todo {
    let completed = !todo.completed;

    Todo {
        completed,
        completed_at: completed.then_some(now),
        ..todo.clone()
    }
}

/// True if the todo is still pending and scheduled in `[now, now + hours)`. A window that runs
/// past the last representable instant has no upper bound.
pub fn is_due_within_hours(todo: &Todo, hours: u32, now: DateTime<Utc>) -> bool {
    let window_end = now.checked_add_signed(Duration::hours(i64::from(hours)));
    !todo.completed
        && todo.scheduled_at >= now
        && window_end.map_or(true, |end| todo.scheduled_at < end)
}

pub const MISSING_TITLE: &str = "missing_title";
pub const DATE_NOT_IN_FUTURE: &str = "date_must_be_future";

/// Checks the user-editable parts of a todo. Every problem found is reported, not just the first.
pub fn validate_todo_fields(
    title: &str,
    scheduled_at: &DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ValidationProblems> {
    let mut problems = Vec::new();

    if title.trim().is_empty() {
        problems.push(FieldProblem {
            field: "title",
            code: MISSING_TITLE,
            message: "Title is required",
        });
    }
    if *scheduled_at <= now {
        problems.push(FieldProblem {
            field: "scheduled_at",
            code: DATE_NOT_IN_FUTURE,
            message: "Scheduled date must be in the future",
        });
    }

    ValidationProblems::into_result(problems)
}

impl NewTodo {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationProblems> {
        validate_todo_fields(&self.title, &self.scheduled_at, now)
    }
}

impl UpdateTodo {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationProblems> {
        validate_todo_fields(&self.title, &self.scheduled_at, now)
    }

    /// Overwrites the editable fields of [todo], leaving ownership and completion alone
    pub fn apply_to(&self, todo: &Todo) -> Todo {
        Todo {
            title: self.title.trim().to_owned(),
            description: self.description.trim().to_owned(),
            scheduled_at: self.scheduled_at,
            ..todo.clone()
        }
    }
}

pub mod driven_ports {
    use super::*;
    use crate::external_connections::ExternalConnectivity;

    pub trait TodoReader {
        async fn todos_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<Todo>, anyhow::Error>;
        async fn todo_by_id(
            &self,
            todo_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Todo>, anyhow::Error>;
    }

    pub trait TodoWriter {
        /// Stores a new todo under a freshly generated ID and returns the stored record
        async fn create_todo(
            &self,
            user_id: &str,
            new_todo: &NewTodo,
            created_at: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Todo, anyhow::Error>;

        /// Applies [update] to the user's todo while holding the store's write lock. Returns
        /// None if the user owns no todo with that ID.
        async fn update_todo(
            &self,
            user_id: &str,
            todo_id: &str,
            update: &UpdateTodo,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Todo>, anyhow::Error>;

        /// Runs [toggle_complete] on the user's todo while holding the store's write lock.
        /// Returns None if the user owns no todo with that ID.
        async fn toggle_todo(
            &self,
            user_id: &str,
            todo_id: &str,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Todo>, anyhow::Error>;

        /// Returns false if the user owns no todo with that ID
        async fn delete_todo(
            &self,
            user_id: &str,
            todo_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;

        async fn delete_todos_for_user(
            &self,
            user_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use crate::domain;
    use crate::external_connections::ExternalConnectivity;
    use thiserror::Error;
    use tracing::error;

    #[derive(Debug, Error)]
    pub enum TodoError {
        #[error("The specified user did not exist.")]
        UserDoesNotExist,
        #[error(transparent)]
        Invalid(#[from] ValidationProblems),
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    impl From<domain::user::UserExistsErr> for TodoError {
        fn from(value: domain::user::UserExistsErr) -> Self {
            match value {
                domain::user::UserExistsErr::UserDoesNotExist(user_id) => {
                    error!("User {} didn't exist when working with todos.", user_id);
                    TodoError::UserDoesNotExist
                }
                domain::user::UserExistsErr::PortError(err) => {
                    TodoError::from(err.context("Checking the todo owner"))
                }
            }
        }
    }


    pub trait TodoPort {
        async fn todos_for_user(
            &self,
            user_id: &str,
            filter: TodoFilter,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl domain::user::driven_ports::DetectUser,
            todo_read: &impl driven_ports::TodoReader,
        ) -> Result<Vec<Todo>, TodoError>;
        async fn user_todo_by_id(
            &self,
            user_id: &str,
            todo_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl domain::user::driven_ports::DetectUser,
            todo_read: &impl driven_ports::TodoReader,
        ) -> Result<Option<Todo>, TodoError>;
        async fn todos_on_date(
            &self,
            user_id: &str,
            date: NaiveDate,
            offset: &FixedOffset,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl domain::user::driven_ports::DetectUser,
            todo_read: &impl driven_ports::TodoReader,
        ) -> Result<Vec<Todo>, TodoError>;
        async fn create_todo(
            &self,
            user_id: &str,
            new_todo: &NewTodo,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl domain::user::driven_ports::DetectUser,
            todo_write: &impl driven_ports::TodoWriter,
        ) -> Result<Todo, TodoError>;
        async fn update_todo(
            &self,
            user_id: &str,
            todo_id: &str,
            update: &UpdateTodo,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
            todo_write: &impl driven_ports::TodoWriter,
        ) -> Result<(), TodoError>;
        async fn delete_todo(
            &self,
            user_id: &str,
            todo_id: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            todo_write: &impl driven_ports::TodoWriter,
        ) -> Result<(), anyhow::Error>;
        async fn toggle_todo(
            &self,
            user_id: &str,
            todo_id: &str,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
            todo_write: &impl driven_ports::TodoWriter,
        ) -> Result<Option<Todo>, anyhow::Error>;
        async fn notifications(
            &self,
            user_id: &str,
            hours: u32,
            now: DateTime<Utc>,
            offset: &FixedOffset,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl domain::user::driven_ports::DetectUser,
            todo_read: &impl driven_ports::TodoReader,
        ) -> Result<TodoNotifications, TodoError>;
    }
}

pub struct TodoService {}

impl driving_ports::TodoPort for TodoService {
    async fn todos_for_user(
        &self,
        user_id: &str,
        filter: TodoFilter,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl domain::user::driven_ports::DetectUser,
        todo_read: &impl TodoReader,
    ) -> Result<Vec<Todo>, TodoError> {
        domain::user::verify_user_exists(user_id, &mut *ext_cxn, u_detect).await?;
        let todos = todo_read.todos_for_user(user_id, &mut *ext_cxn).await?;

        Ok(filtered_and_sorted(&todos, user_id, filter)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn user_todo_by_id(
        &self,
        user_id: &str,
        todo_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl domain::user::driven_ports::DetectUser,
        todo_read: &impl TodoReader,
    ) -> Result<Option<Todo>, TodoError> {
        domain::user::verify_user_exists(user_id, &mut *ext_cxn, u_detect).await?;
        let todo = todo_read
            .todo_by_id(todo_id, &mut *ext_cxn)
            .await?
            .filter(|todo| todo.user_id == user_id);

        Ok(todo)
    }

    async fn todos_on_date(
        &self,
        user_id: &str,
        date: NaiveDate,
        offset: &FixedOffset,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl domain::user::driven_ports::DetectUser,
        todo_read: &impl TodoReader,
    ) -> Result<Vec<Todo>, TodoError> {
        domain::user::verify_user_exists(user_id, &mut *ext_cxn, u_detect).await?;
        let todos = todo_read.todos_for_user(user_id, &mut *ext_cxn).await?;

        let mut on_date: Vec<Todo> = todos_for_date(&todos, date, offset)
            .into_iter()
            .cloned()
            .collect();
        on_date.sort_by_key(|todo| todo.scheduled_at);

        Ok(on_date)
    }

    async fn create_todo(
        &self,
        user_id: &str,
        new_todo: &NewTodo,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl domain::user::driven_ports::DetectUser,
        todo_write: &impl TodoWriter,
    ) -> Result<Todo, TodoError> {
        new_todo.validate(now)?;
        domain::user::verify_user_exists(user_id, &mut *ext_cxn, u_detect).await?;

        let normalized = NewTodo {
            title: new_todo.title.trim().to_owned(),
            description: new_todo.description.trim().to_owned(),
            scheduled_at: new_todo.scheduled_at,
        };
        let created = todo_write
            .create_todo(user_id, &normalized, now, &mut *ext_cxn)
            .await?;
        info!(todo_id = %created.id, "Created todo for user {user_id}");

        Ok(created)
    }

    async fn update_todo(
        &self,
        user_id: &str,
        todo_id: &str,
        update: &UpdateTodo,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
        todo_write: &impl TodoWriter,
    ) -> Result<(), TodoError> {
        update.validate(now)?;

        let updated = todo_write
            .update_todo(user_id, todo_id, update, &mut *ext_cxn)
            .await
            .context("updating a todo")?;
        if updated.is_none() {
            debug!("User {user_id} has no todo {todo_id}, nothing to update");
        }

        Ok(())
    }

    async fn delete_todo(
        &self,
        user_id: &str,
        todo_id: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        todo_write: &impl TodoWriter,
    ) -> Result<(), anyhow::Error> {
        let deleted = todo_write
            .delete_todo(user_id, todo_id, &mut *ext_cxn)
            .await
            .context("deleting a todo")?;
        if !deleted {
            debug!("User {user_id} has no todo {todo_id}, nothing to delete");
        }

        Ok(())
    }

    async fn toggle_todo(
        &self,
        user_id: &str,
        todo_id: &str,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
        todo_write: &impl TodoWriter,
    ) -> Result<Option<Todo>, anyhow::Error> {
        let toggled = todo_write
            .toggle_todo(user_id, todo_id, now, &mut *ext_cxn)
            .await
            .context("toggling a todo")?;
        if toggled.is_none() {
            debug!("User {user_id} has no todo {todo_id}, nothing to toggle");
        }

        Ok(toggled)
    }

    async fn notifications(
        &self,
        user_id: &str,
        hours: u32,
        now: DateTime<Utc>,
        offset: &FixedOffset,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl domain::user::driven_ports::DetectUser,
        todo_read: &impl TodoReader,
    ) -> Result<TodoNotifications, TodoError> {
        domain::user::verify_user_exists(user_id, &mut *ext_cxn, u_detect).await?;
        let todos = todo_read.todos_for_user(user_id, &mut *ext_cxn).await?;

        let mut due_soon: Vec<Todo> = todos
            .iter()
            .filter(|todo| is_due_within_hours(todo, hours, now))
            .cloned()
            .collect();
        due_soon.sort_by_key(|todo| todo.scheduled_at);

        let completed_today = completed_on_date(&todos, local_date(&now, offset), offset)
            .into_iter()
            .take(MAX_COMPLETED_TODAY)
            .cloned()
            .collect();

        Ok(TodoNotifications {
            due_soon,
            completed_today,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use crate::domain::todo::driving_ports::TodoPort;
    use crate::domain::user::test_util::InMemoryUserPersistence;
    use crate::external_connections;
    use speculoos::prelude::*;
    use std::sync::RwLock;

    fn users() -> RwLock<InMemoryUserPersistence> {
        RwLock::new(InMemoryUserPersistence::new_with_users(&[
            domain::user::test_util::user_default("u1"),
            domain::user::test_util::user_default("u2"),
        ]))
    }

    mod todos_for_user {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let user_persist = users();
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[
                todo_at("1", "u1", utc(2024, 6, 10, 14, 0)),
                todo_at("2", "u2", utc(2024, 6, 10, 9, 0)),
                todo_at("3", "u1", utc(2024, 6, 10, 9, 0)),
            ]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let fetched = TodoService {}
                .todos_for_user(
                    "u1",
                    TodoFilter::Upcoming,
                    &mut ext_cxn,
                    &user_persist,
                    &todo_persist,
                )
                .await;
            assert_that!(fetched).is_ok().matches(|todos| {
                matches!(todos.as_slice(), [
                    Todo { id: first, .. },
                    Todo { id: second, .. },
                ] if first == "3" && second == "1")
            });
        }

        #[tokio::test]
        async fn returns_error_on_nonexistent_user() {
            let user_persist = InMemoryUserPersistence::new_locked();
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let fetched = TodoService {}
                .todos_for_user(
                    "u1",
                    TodoFilter::All,
                    &mut ext_cxn,
                    &user_persist,
                    &todo_persist,
                )
                .await;
            let Err(TodoError::UserDoesNotExist) = fetched else {
                panic!("Got an unexpected result from todo lookup: {:#?}", fetched);
            };
        }
    }

    mod user_todo_by_id {
        use super::*;

        #[tokio::test]
        async fn does_not_return_other_users_todos() {
            let user_persist = users();
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[
                todo_at("1", "u1", utc(2024, 6, 10, 14, 0)),
                todo_at("2", "u2", utc(2024, 6, 10, 9, 0)),
            ]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let own = TodoService {}
                .user_todo_by_id("u1", "1", &mut ext_cxn, &user_persist, &todo_persist)
                .await;
            assert_that!(own)
                .is_ok()
                .is_some()
                .matches(|todo| todo.id == "1");

            let foreign = TodoService {}
                .user_todo_by_id("u1", "2", &mut ext_cxn, &user_persist, &todo_persist)
                .await;
            assert_that!(foreign).is_ok().is_none();
        }
    }

    mod todos_on_date {
        use super::*;

        #[tokio::test]
        async fn buckets_by_viewer_day() {
            let user_persist = users();
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[
                todo_at("1", "u1", utc(2024, 6, 10, 22, 30)),
                todo_at("2", "u1", utc(2024, 6, 10, 7, 0)),
                todo_at("3", "u1", utc(2024, 6, 11, 7, 0)),
            ]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let offset = FixedOffset::east_opt(2 * 3600).expect("valid offset");
            let june_11 = NaiveDate::from_ymd_opt(2024, 6, 11).expect("valid date");

            let on_date = TodoService {}
                .todos_on_date(
                    "u1",
                    june_11,
                    &offset,
                    &mut ext_cxn,
                    &user_persist,
                    &todo_persist,
                )
                .await;
            assert_that!(on_date).is_ok().matches(|todos| {
                matches!(todos.as_slice(), [
                    Todo { id: first, .. },
                    Todo { id: second, .. },
                ] if first == "1" && second == "3")
            });
        }
    }

    mod create_todo {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let user_persist = users();
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let now = utc(2024, 6, 10, 8, 0);
            let new_todo = NewTodo {
                title: "  Buy groceries ".to_owned(),
                description: " Milk and bread\n".to_owned(),
                scheduled_at: utc(2024, 6, 10, 18, 0),
            };

            let created = TodoService {}
                .create_todo("u1", &new_todo, now, &mut ext_cxn, &user_persist, &todo_persist)
                .await;
            assert_that!(created).is_ok().matches(|todo| {
                todo.id == "1"
                    && todo.user_id == "u1"
                    && todo.title == "Buy groceries"
                    && todo.description == "Milk and bread"
                    && !todo.completed
                    && todo.completed_at.is_none()
                    && todo.created_at == now
            });
        }

        #[tokio::test]
        async fn blank_title_leaves_collection_unchanged() {
            let user_persist = users();
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let new_todo = NewTodo {
                title: "   ".to_owned(),
                description: String::new(),
                scheduled_at: utc(2024, 6, 10, 18, 0),
            };

            let created = TodoService {}
                .create_todo(
                    "u1",
                    &new_todo,
                    utc(2024, 6, 10, 8, 0),
                    &mut ext_cxn,
                    &user_persist,
                    &todo_persist,
                )
                .await;
            let Err(TodoError::Invalid(problems)) = created else {
                panic!("Expected a validation failure, got {created:#?}");
            };
            assert!(problems.has(MISSING_TITLE));

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            assert_that!(locked.todos).is_empty();
        }

        #[tokio::test]
        async fn past_schedule_is_rejected() {
            let user_persist = users();
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let new_todo = NewTodo {
                title: "Too late".to_owned(),
                description: String::new(),
                scheduled_at: utc(2024, 6, 9, 18, 0),
            };

            let created = TodoService {}
                .create_todo(
                    "u1",
                    &new_todo,
                    utc(2024, 6, 10, 8, 0),
                    &mut ext_cxn,
                    &user_persist,
                    &todo_persist,
                )
                .await;
            let Err(TodoError::Invalid(problems)) = created else {
                panic!("Expected a validation failure, got {created:#?}");
            };
            assert!(problems.has(DATE_NOT_IN_FUTURE));
        }

        #[tokio::test]
        async fn does_not_allow_todos_for_nonexistent_user() {
            let user_persist = InMemoryUserPersistence::new_locked();
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let new_todo = NewTodo {
                title: "Something".to_owned(),
                description: String::new(),
                scheduled_at: utc(2024, 6, 10, 18, 0),
            };

            let created = TodoService {}
                .create_todo(
                    "u1",
                    &new_todo,
                    utc(2024, 6, 10, 8, 0),
                    &mut ext_cxn,
                    &user_persist,
                    &todo_persist,
                )
                .await;
            let Err(TodoError::UserDoesNotExist) = created else {
                panic!("Did not get expected error, instead got this: {created:#?}");
            };
        }
    }

    mod update_todo {
        use super::*;
        use crate::domain::test_util::Connectivity;

        fn rename(title: &str) -> UpdateTodo {
            UpdateTodo {
                title: title.to_owned(),
                description: String::new(),
                scheduled_at: utc(2024, 6, 12, 9, 0),
            }
        }

        #[tokio::test]
        async fn overwrites_editable_fields() {
            let mut completed = todo_at("1", "u1", utc(2024, 6, 10, 9, 0));
            completed.completed = true;
            completed.completed_at = Some(utc(2024, 6, 10, 8, 0));
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[completed]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let update = UpdateTodo {
                title: " Renamed ".to_owned(),
                description: "  New description\n".to_owned(),
                scheduled_at: utc(2024, 6, 12, 9, 0),
            };

            let result = TodoService {}
                .update_todo(
                    "u1",
                    "1",
                    &update,
                    utc(2024, 6, 10, 8, 30),
                    &mut ext_cxn,
                    &todo_persist,
                )
                .await;
            assert_that!(result).is_ok();

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            let stored = &locked.todos[0];
            assert_eq!("Renamed", stored.title);
            assert_eq!("New description", stored.description);
            assert_eq!(utc(2024, 6, 12, 9, 0), stored.scheduled_at);
            assert!(stored.completed);
            assert_that!(stored.completed_at).is_some();
        }

        #[tokio::test]
        async fn missing_todo_is_a_no_op() {
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .update_todo(
                    "u1",
                    "5",
                    &rename("Renamed"),
                    utc(2024, 6, 10, 8, 30),
                    &mut ext_cxn,
                    &todo_persist,
                )
                .await;
            assert_that!(result).is_ok();
        }

        #[tokio::test]
        async fn leaves_other_users_todos_alone() {
            let original = todo_at("1", "u2", utc(2024, 6, 10, 9, 0));
            let todo_persist =
                RwLock::new(InMemoryTodoPersistence::new_with_todos(&[original.clone()]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .update_todo(
                    "u1",
                    "1",
                    &rename("Hijacked"),
                    utc(2024, 6, 10, 8, 30),
                    &mut ext_cxn,
                    &todo_persist,
                )
                .await;
            assert_that!(result).is_ok();

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            assert_eq!(original, locked.todos[0]);
        }

        #[tokio::test]
        async fn does_not_undo_a_concurrent_toggle() {
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[todo_at(
                "1",
                "u1",
                utc(2024, 6, 10, 9, 0),
            )]));
            let mut update_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut toggle_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let now = utc(2024, 6, 10, 8, 30);
            let update = rename("Renamed");
            let todo_service = TodoService {};

            let (updated, toggled) = tokio::join!(
                todo_service.update_todo("u1", "1", &update, now, &mut update_cxn, &todo_persist),
                todo_service.toggle_todo("u1", "1", now, &mut toggle_cxn, &todo_persist),
            );
            assert_that!(updated).is_ok();
            assert_that!(toggled).is_ok().is_some();

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            let stored = &locked.todos[0];
            assert_eq!("Renamed", stored.title);
            assert!(stored.completed);
            assert_that!(stored.completed_at).is_some().is_equal_to(now);
        }

        #[tokio::test]
        async fn returns_port_err() {
            let mut raw_persist = InMemoryTodoPersistence::new();
            raw_persist.connected = Connectivity::Disconnected;
            let todo_persist = RwLock::new(raw_persist);
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .update_todo(
                    "u1",
                    "1",
                    &rename("Renamed"),
                    utc(2024, 6, 10, 8, 30),
                    &mut ext_cxn,
                    &todo_persist,
                )
                .await;
            assert_that!(result)
                .is_err()
                .matches(|err| matches!(err, TodoError::PortError(_)));
        }
    }

    mod delete_todo {
        use super::*;
        use crate::domain::test_util::Connectivity;

        #[tokio::test]
        async fn happy_path() {
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[
                todo_at("1", "u1", utc(2024, 6, 10, 9, 0)),
                todo_at("2", "u1", utc(2024, 6, 10, 9, 0)),
            ]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .delete_todo("u1", "2", &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(result).is_ok();

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            assert!(matches!(locked.todos.as_slice(), [Todo { id, .. }] if id == "1"));
        }

        #[tokio::test]
        async fn missing_todo_is_a_no_op() {
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .delete_todo("u1", "5", &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(result).is_ok();
        }

        #[tokio::test]
        async fn cannot_delete_another_users_todo() {
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[todo_at(
                "1",
                "u2",
                utc(2024, 6, 10, 9, 0),
            )]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .delete_todo("u1", "1", &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(result).is_ok();

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            assert_eq!(1, locked.todos.len());
        }

        #[tokio::test]
        async fn returns_port_err() {
            let todo_persist = InMemoryTodoPersistence::new_locked();
            {
                let mut locked = todo_persist.write().expect("todo rw lock poisoned");
                locked.connected = Connectivity::Disconnected;
            }
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .delete_todo("u1", "1", &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(result).is_err();
        }
    }

    mod toggle_todo {
        use super::*;

        fn single_pending_todo() -> RwLock<InMemoryTodoPersistence> {
            RwLock::new(InMemoryTodoPersistence::new_with_todos(&[todo_at(
                "1",
                "u1",
                utc(2024, 6, 10, 9, 0),
            )]))
        }

        #[tokio::test]
        async fn completes_and_reopens() {
            let todo_persist = single_pending_todo();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let now = utc(2024, 6, 10, 8, 0);

            let completed = TodoService {}
                .toggle_todo("u1", "1", now, &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(completed)
                .is_ok()
                .is_some()
                .matches(|todo| todo.completed && todo.completed_at == Some(now));
            {
                let locked = todo_persist.read().expect("todo rw lock poisoned");
                assert!(locked.todos[0].completed);
            }

            let reopened = TodoService {}
                .toggle_todo("u1", "1", now, &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(reopened)
                .is_ok()
                .is_some()
                .matches(|todo| !todo.completed && todo.completed_at.is_none());
        }

        #[tokio::test]
        async fn concurrent_toggles_cancel_out() {
            let todo_persist = single_pending_todo();
            let mut first_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let mut second_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let now = utc(2024, 6, 10, 8, 0);
            let todo_service = TodoService {};

            let (first, second) = tokio::join!(
                todo_service.toggle_todo("u1", "1", now, &mut first_cxn, &todo_persist),
                todo_service.toggle_todo("u1", "1", now, &mut second_cxn, &todo_persist),
            );
            let first_completed = first.expect("first toggle failed").map(|todo| todo.completed);
            let second_completed = second.expect("second toggle failed").map(|todo| todo.completed);
            assert_ne!(first_completed, second_completed);

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            assert!(!locked.todos[0].completed);
            assert_that!(locked.todos[0].completed_at).is_none();
        }

        #[tokio::test]
        async fn cannot_toggle_another_users_todo() {
            let todo_persist = single_pending_todo();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .toggle_todo("u2", "1", utc(2024, 6, 10, 8, 0), &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(result).is_ok().is_none();

            let locked = todo_persist.read().expect("todo rw lock poisoned");
            assert!(!locked.todos[0].completed);
        }

        #[tokio::test]
        async fn missing_todo_is_a_no_op() {
            let todo_persist = InMemoryTodoPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let result = TodoService {}
                .toggle_todo("u1", "9", utc(2024, 6, 10, 8, 0), &mut ext_cxn, &todo_persist)
                .await;
            assert_that!(result).is_ok().is_none();
        }
    }

    mod notifications {
        use super::*;

        #[tokio::test]
        async fn reports_due_soon_and_completed_today() {
            let user_persist = users();
            let now = utc(2024, 6, 10, 12, 0);
            let mut done_this_morning = todo_at("3", "u1", utc(2024, 6, 10, 9, 0));
            done_this_morning.completed = true;
            done_this_morning.completed_at = Some(utc(2024, 6, 10, 9, 30));
            let mut done_yesterday = todo_at("4", "u1", utc(2024, 6, 9, 9, 0));
            done_yesterday.completed = true;
            done_yesterday.completed_at = Some(utc(2024, 6, 9, 9, 30));
            let todo_persist = RwLock::new(InMemoryTodoPersistence::new_with_todos(&[
                todo_at("1", "u1", utc(2024, 6, 10, 15, 0)),
                todo_at("2", "u1", utc(2024, 6, 10, 17, 0)),
                done_this_morning,
                done_yesterday,
                todo_at("5", "u2", utc(2024, 6, 10, 13, 0)),
            ]));
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let offset = FixedOffset::east_opt(0).expect("valid offset");

            let notifications = TodoService {}
                .notifications(
                    "u1",
                    DEFAULT_DUE_SOON_HOURS,
                    now,
                    &offset,
                    &mut ext_cxn,
                    &user_persist,
                    &todo_persist,
                )
                .await;
            assert_that!(notifications).is_ok().matches(|found| {
                matches!(found.due_soon.as_slice(), [Todo { id, .. }] if id == "1")
                    && matches!(found.completed_today.as_slice(), [Todo { id, .. }] if id == "3")
            });
        }
    }
}
