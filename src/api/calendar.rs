use super::todo::todo_error_response;
use crate::domain::todo::TodoFilter;
use crate::domain::todo::driving_ports::TodoPort;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{BasicErrorResponse, Json, Query, resolve_utc_offset};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::{Path, State};
use axum::response::ErrorResponse;
use axum::routing::get;
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::instrument;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(paths(month_view))]
/// Defines the OpenAPI documentation for the calendar API
pub struct CalendarApi;
pub const CALENDAR_API_GROUP: &str = "Calendar";

pub fn calendar_routes() -> Router<Arc<SharedData>> {
    Router::new().route(
        "/users/:user_id/calendar",
        get(
            |State(app_state): AppState,
             Path(user_id): Path<String>,
             Query(query): Query<dto::CalendarQuery>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let todo_service = domain::todo::TodoService {};

                month_view(
                    user_id,
                    query,
                    Utc::now(),
                    app_state.default_utc_offset,
                    &mut ext_cxn,
                    &todo_service,
                )
                .await
            },
        ),
    )
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/calendar",
    tag = CALENDAR_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user whose calendar is shown"),
        dto::CalendarQuery,
    ),
    responses(
        (status = 200, description = "42 days covering the requested month, starting on a Sunday", body = dto::CalendarMonth),
        (status = 400, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(query, default_offset, ext_cxn, todo_service))]
/// Builds the month view for a user, marking which days hold pending or completed todos
async fn month_view(
    user_id: String,
    query: dto::CalendarQuery,
    now: DateTime<Utc>,
    default_offset: FixedOffset,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<Json<dto::CalendarMonth>, ErrorResponse> {
    let offset = resolve_utc_offset(query.utc_offset_minutes, default_offset)?;
    let today = domain::todo::local_date(&now, &offset);
    let reference = query.month.unwrap_or(today);
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let todo_read = persistence::db_todo_driven_ports::DbTodoReader;

    let todos = todo_service
        .todos_for_user(
            &user_id,
            TodoFilter::All,
            &mut *ext_cxn,
            &user_detect,
            &todo_read,
        )
        .await
        .map_err(todo_error_response)?;

    let days = domain::calendar::month_overview(reference, today, &todos, &offset);
    Ok(Json(dto::CalendarMonth::new(reference, days)))
}
