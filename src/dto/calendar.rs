use crate::domain;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    /// Any day inside the month to show. Defaults to the viewer's current month.
    #[param(value_type = Option<String>, example = "2024-12-01")]
    pub month: Option<NaiveDate>,
    /// Viewer's offset from UTC in minutes, east positive
    pub utc_offset_minutes: Option<i32>,
}

/// DTO for one cell of the month view
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct CalendarDay {
    #[schema(value_type = String, example = "2024-12-03")]
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub has_todos: bool,
    pub pending_count: usize,
    pub completed_count: usize,
}

impl From<domain::calendar::CalendarDay> for CalendarDay {
    fn from(value: domain::calendar::CalendarDay) -> Self {
        CalendarDay {
            has_todos: value.has_todos(),
            date: value.date,
            is_current_month: value.is_current_month,
            is_today: value.is_today,
            pending_count: value.pending_count,
            completed_count: value.completed_count,
        }
    }
}

/// DTO for a rendered month: always 6 weeks of 7 days, starting on a Sunday
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct CalendarMonth {
    #[schema(example = 2024)]
    pub year: i32,
    #[schema(example = 12)]
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
    pub fn new(reference: NaiveDate, days: Vec<domain::calendar::CalendarDay>) -> CalendarMonth {
        CalendarMonth {
            year: reference.year(),
            month: reference.month(),
            days: days.into_iter().map(CalendarDay::from).collect(),
        }
    }
}
