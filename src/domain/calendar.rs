use crate::domain::todo::{Todo, local_date};
use chrono::{Datelike, Days, FixedOffset, Months, NaiveDate};

/// Number of rows in a rendered month
pub const GRID_WEEKS: usize = 6;
/// Number of cells in a rendered month, 6 weeks of 7 days
pub const GRID_CELLS: usize = GRID_WEEKS * 7;

/// One day slot in a month grid. Slots before and after the displayed month are filled in with
/// days from the neighbouring months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
}

/// A [CalendarCell] annotated with the todos scheduled on that day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_current_month: bool,
    pub is_today: bool,
    pub pending_count: usize,
    pub completed_count: usize,
}

impl CalendarDay {
    pub fn has_todos(&self) -> bool {
        self.pending_count + self.completed_count > 0
    }
}

/// Builds the Sunday-first 6x7 grid for the month containing [reference].
///
/// The leading cells are the days of the previous month that share the first week, the trailing
/// cells continue into the following month until the grid is full. Every month produces exactly
/// [GRID_CELLS] cells in ascending date order, including months starting on a Sunday.
///
/// The first and last months chrono can represent have no room for their neighbouring days, so
/// a reference in one of them renders the nearest month whose grid fits.
pub fn month_grid(reference: NaiveDate) -> Vec<CalendarCell> {
    let first_of_month = renderable_month(reference);
    let leading_count = u64::from(first_of_month.weekday().num_days_from_sunday());
    let grid_start = first_of_month
        .checked_sub_days(Days::new(leading_count))
        .unwrap_or(first_of_month);

    grid_start
        .iter_days()
        .take(GRID_CELLS)
        .map(|date| CalendarCell {
            date,
            is_current_month: date.year() == first_of_month.year()
                && date.month() == first_of_month.month(),
        })
        .collect()
}

fn renderable_month(reference: NaiveDate) -> NaiveDate {
    let first_of = |date: NaiveDate| date.with_day(1).unwrap_or(date);
    let earliest = first_of(NaiveDate::MIN)
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MIN);
    let latest = first_of(NaiveDate::MAX)
        .checked_sub_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);

    first_of(reference).clamp(earliest, latest)
}

/// Builds the month grid for [reference] and counts the pending and completed todos that fall on
/// each cell's day in the viewer's [offset]. Todos outside the visible 42 days are ignored.
pub fn month_overview(
    reference: NaiveDate,
    today: NaiveDate,
    todos: &[Todo],
    offset: &FixedOffset,
) -> Vec<CalendarDay> {
    let grid = month_grid(reference);
    let mut days: Vec<CalendarDay> = grid
        .iter()
        .map(|cell| CalendarDay {
            date: cell.date,
            is_current_month: cell.is_current_month,
            is_today: cell.date == today,
            pending_count: 0,
            completed_count: 0,
        })
        .collect();

    let Some(grid_start) = grid.first().map(|cell| cell.date) else {
        return days;
    };
    for todo in todos {
        let scheduled_on = local_date(&todo.scheduled_at, offset);
        let Ok(index) = usize::try_from((scheduled_on - grid_start).num_days()) else {
            continue;
        };
        let Some(day) = days.get_mut(index) else {
            continue;
        };

        if todo.completed {
            day.completed_count += 1;
        } else {
            day.pending_count += 1;
        }
    }

    days
}
