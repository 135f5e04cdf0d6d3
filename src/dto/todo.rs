use crate::domain;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// DTO for a todo returned by the API
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Eq, Debug))]
pub struct Todo {
    #[schema(example = "0b5cbd4e-4d0b-4f6a-9a59-1ad5d3e3f0a2")]
    pub id: String,
    #[schema(example = "1")]
    pub user_id: String,
    #[schema(example = "Team Meeting")]
    pub title: String,
    #[schema(example = "Weekly sync with the development team")]
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<domain::todo::Todo> for Todo {
    fn from(value: domain::todo::Todo) -> Self {
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

/// DTO for creating a todo. The title must not be blank and the scheduled time must lie in the
/// future, both of which are reported as field problems.
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewTodo {
    #[validate(length(max = 200))]
    #[schema(example = "Team Meeting")]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    #[schema(example = "Weekly sync with the development team")]
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
}

impl From<NewTodo> for domain::todo::NewTodo {
    fn from(value: NewTodo) -> Self {
        domain::todo::NewTodo {
            title: value.title,
            description: value.description,
            scheduled_at: value.scheduled_at,
        }
    }
}

/// DTO for editing a todo. Every editable field is overwritten.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateTodo {
    #[validate(length(max = 200))]
    #[schema(example = "Project Review")]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    pub scheduled_at: DateTime<Utc>,
}

impl From<UpdateTodo> for domain::todo::UpdateTodo {
    fn from(value: UpdateTodo) -> Self {
        domain::todo::UpdateTodo {
            title: value.title,
            description: value.description,
            scheduled_at: value.scheduled_at,
        }
    }
}

/// Which todos a list request should include
#[derive(Deserialize, Serialize, ToSchema, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TodoFilterParam {
    #[default]
    All,
    Upcoming,
    Completed,
}

impl From<TodoFilterParam> for domain::todo::TodoFilter {
    fn from(value: TodoFilterParam) -> Self {
        match value {
            TodoFilterParam::All => domain::todo::TodoFilter::All,
            TodoFilterParam::Upcoming => domain::todo::TodoFilter::Upcoming,
            TodoFilterParam::Completed => domain::todo::TodoFilter::Completed,
        }
    }
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct TodoListQuery {
    /// Which list view to return
    #[serde(default)]
    pub filter: TodoFilterParam,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OnDateQuery {
    /// Calendar day in the viewer's time zone
    #[param(value_type = String, example = "2024-12-03")]
    pub date: NaiveDate,
    /// Viewer's offset from UTC in minutes, east positive
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Deserialize, IntoParams, Validate, Default)]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    /// How far ahead to look for pending todos, in hours
    #[validate(range(min = 1, max = 168))]
    pub hours: Option<u32>,
    /// Viewer's offset from UTC in minutes, east positive
    pub utc_offset_minutes: Option<i32>,
}

/// DTO for the reminder drawer
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct TodoNotifications {
    /// Pending todos scheduled within the requested window, soonest first
    pub due_soon: Vec<Todo>,
    /// Todos completed during the viewer's current day, most recent first
    pub completed_today: Vec<Todo>,
}

impl From<domain::todo::TodoNotifications> for TodoNotifications {
    fn from(value: domain::todo::TodoNotifications) -> Self {
        TodoNotifications {
            due_soon: value.due_soon.into_iter().map(Todo::from).collect(),
            completed_today: value.completed_today.into_iter().map(Todo::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::todo::test_util::utc;

    #[test]
    fn overlong_fields_get_rejected() {
        let bad_todo = NewTodo {
            title: (0..201).map(|_| "A").collect(),
            description: (0..2001).map(|_| "B").collect(),
            scheduled_at: utc(2030, 1, 1, 9, 0),
        };

        let validation_result = bad_todo.validate();
        assert!(validation_result.is_err());
        let validation_errors = validation_result.unwrap_err();
        let field_validations = validation_errors.field_errors();
        assert!(field_validations.contains_key("title"));
        assert!(field_validations.contains_key("description"));
    }

    #[test]
    fn filter_parses_lowercase_names() {
        let query: TodoListQuery =
            serde_json::from_str(r#"{"filter": "completed"}"#).expect("filter should parse");
        assert_eq!(TodoFilterParam::Completed, query.filter);

        let defaulted: TodoListQuery = serde_json::from_str("{}").expect("filter should default");
        assert_eq!(
            domain::todo::TodoFilter::All,
            domain::todo::TodoFilter::from(defaulted.filter)
        );
    }

    #[test]
    fn notification_window_is_bounded() {
        let too_long = NotificationsQuery {
            hours: Some(500),
            utc_offset_minutes: None,
        };
        assert!(too_long.validate().is_err());
        assert!(NotificationsQuery::default().validate().is_ok());
    }
}
