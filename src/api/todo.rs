use crate::domain::todo::driving_ports::{TodoError, TodoPort};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    BasicErrorResponse, GenericErrorResponse, InvalidInputResponse, Json, NotFoundResponse, Query,
    ValidationErrorResponse, resolve_utc_offset,
};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{ErrorResponse, IntoResponse, Response};
use axum::routing::{get, post};
use chrono::{FixedOffset, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(
    list_todos,
    create_todo,
    get_todo,
    todos_on_date,
    update_todo,
    delete_todo,
    toggle_todo,
    notifications
))]
/// Defines the OpenAPI documentation for the todo API
pub struct TodoApi;
/// Constant used to group todo endpoints in OpenAPI documentation
pub const TODO_API_GROUP: &str = "Todos";

/// Adds the routes for user-owned todos to the application router
pub fn todo_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/users/:user_id/todos",
            get(
                |State(app_state): AppState,
                 Path(user_id): Path<String>,
                 Query(query): Query<dto::TodoListQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    list_todos(user_id, query, &mut ext_cxn, &todo_service).await
                },
            )
            .post(
                |State(app_state): AppState,
                 Path(user_id): Path<String>,
                 Json(new_todo): Json<dto::NewTodo>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    create_todo(user_id, new_todo, &mut ext_cxn, &todo_service).await
                },
            ),
        )
        .route(
            "/users/:user_id/todos/on-date",
            get(
                |State(app_state): AppState,
                 Path(user_id): Path<String>,
                 Query(query): Query<dto::OnDateQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    todos_on_date(
                        user_id,
                        query,
                        app_state.default_utc_offset,
                        &mut ext_cxn,
                        &todo_service,
                    )
                    .await
                },
            ),
        )
        .route(
            "/users/:user_id/todos/:todo_id",
            get(
                |State(app_state): AppState,
                 Path((user_id, todo_id)): Path<(String, String)>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    get_todo(user_id, todo_id, &mut ext_cxn, &todo_service).await
                },
            )
            .patch(
                |State(app_state): AppState,
                 Path((user_id, todo_id)): Path<(String, String)>,
                 Json(update): Json<dto::UpdateTodo>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    update_todo(user_id, todo_id, update, &mut ext_cxn, &todo_service).await
                },
            )
            .delete(
                |State(app_state): AppState,
                 Path((user_id, todo_id)): Path<(String, String)>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    delete_todo(user_id, todo_id, &mut ext_cxn, &todo_service).await
                },
            ),
        )
        .route(
            "/users/:user_id/todos/:todo_id/toggle",
            post(
                |State(app_state): AppState,
                 Path((user_id, todo_id)): Path<(String, String)>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    toggle_todo(user_id, todo_id, &mut ext_cxn, &todo_service).await
                },
            ),
        )
        .route(
            "/users/:user_id/notifications",
            get(
                |State(app_state): AppState,
                 Path(user_id): Path<String>,
                 Query(query): Query<dto::NotificationsQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};

                    notifications(
                        user_id,
                        query,
                        app_state.default_utc_offset,
                        &mut ext_cxn,
                        &todo_service,
                    )
                    .await
                },
            ),
        )
}

/// Turns a failed todo operation into the matching API error
pub(super) fn todo_error_response(err: TodoError) -> ErrorResponse {
    match err {
        TodoError::UserDoesNotExist => NotFoundResponse.into(),
        TodoError::Invalid(problems) => InvalidInputResponse(problems).into(),
        TodoError::PortError(port_err) => GenericErrorResponse(port_err).into(),
    }
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/todos",
    tag = TODO_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user whose todos should be listed"),
        dto::TodoListQuery,
    ),
    responses(
        (status = 200, description = "The user's todos in the order the view calls for", body = [dto::Todo]),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(query, ext_cxn, todo_service))]
/// Lists a user's todos. "upcoming" is pending todos soonest first, "completed" is the most
/// recently completed first and "all" is the most recently created first.
async fn list_todos(
    user_id: String,
    query: dto::TodoListQuery,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<Json<Vec<dto::Todo>>, ErrorResponse> {
    info!("Listing {} todos", domain::todo::TodoFilter::from(query.filter));
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let todo_read = persistence::db_todo_driven_ports::DbTodoReader;

    let todos = todo_service
        .todos_for_user(
            &user_id,
            query.filter.into(),
            &mut *ext_cxn,
            &user_detect,
            &todo_read,
        )
        .await
        .map_err(todo_error_response)?;

    Ok(Json(todos.into_iter().map(dto::Todo::from).collect()))
}

#[utoipa::path(
    post,
    path = "/users/{user_id}/todos",
    tag = TODO_API_GROUP,
    params(("user_id" = String, Path, description = "The user who will own the todo")),
    request_body = dto::NewTodo,
    responses(
        (status = 201, description = "The todo was created", body = dto::Todo),
        (status = 400, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(new_todo, ext_cxn, todo_service))]
/// Creates a todo for a user
async fn create_todo(
    user_id: String,
    new_todo: dto::NewTodo,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<(StatusCode, Json<dto::Todo>), ErrorResponse> {
    info!("Creating a todo");
    new_todo.validate().map_err(ValidationErrorResponse::from)?;
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let todo_write = persistence::db_todo_driven_ports::DbTodoWriter;

    let created = todo_service
        .create_todo(
            &user_id,
            &new_todo.into(),
            Utc::now(),
            &mut *ext_cxn,
            &user_detect,
            &todo_write,
        )
        .await
        .map_err(todo_error_response)?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/todos/{todo_id}",
    tag = TODO_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user who owns the todo"),
        ("todo_id" = String, Path, description = "The todo to fetch"),
    ),
    responses(
        (status = 200, description = "The requested todo", body = dto::Todo),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(ext_cxn, todo_service))]
/// Fetches one of a user's todos
async fn get_todo(
    user_id: String,
    todo_id: String,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<Json<dto::Todo>, ErrorResponse> {
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let todo_read = persistence::db_todo_driven_ports::DbTodoReader;

    let todo = todo_service
        .user_todo_by_id(&user_id, &todo_id, &mut *ext_cxn, &user_detect, &todo_read)
        .await
        .map_err(todo_error_response)?
        .ok_or(NotFoundResponse)?;

    Ok(Json(todo.into()))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/todos/on-date",
    tag = TODO_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user whose day should be shown"),
        dto::OnDateQuery,
    ),
    responses(
        (status = 200, description = "Todos scheduled on the viewer's calendar day, earliest first", body = [dto::Todo]),
        (status = 400, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(query, default_offset, ext_cxn, todo_service), fields(date = %query.date))]
/// Lists the todos that fall on a day of the viewer's calendar
async fn todos_on_date(
    user_id: String,
    query: dto::OnDateQuery,
    default_offset: FixedOffset,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<Json<Vec<dto::Todo>>, ErrorResponse> {
    let offset = resolve_utc_offset(query.utc_offset_minutes, default_offset)?;
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let todo_read = persistence::db_todo_driven_ports::DbTodoReader;

    let todos = todo_service
        .todos_on_date(
            &user_id,
            query.date,
            &offset,
            &mut *ext_cxn,
            &user_detect,
            &todo_read,
        )
        .await
        .map_err(todo_error_response)?;

    Ok(Json(todos.into_iter().map(dto::Todo::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/notifications",
    tag = TODO_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user to build reminders for"),
        dto::NotificationsQuery,
    ),
    responses(
        (status = 200, description = "Todos due soon and todos completed today", body = dto::TodoNotifications),
        (status = 400, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(query, default_offset, ext_cxn, todo_service))]
/// Builds the reminder drawer: pending todos due within the window plus today's completions
async fn notifications(
    user_id: String,
    query: dto::NotificationsQuery,
    default_offset: FixedOffset,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<Json<dto::TodoNotifications>, ErrorResponse> {
    query.validate().map_err(ValidationErrorResponse::from)?;
    let offset = resolve_utc_offset(query.utc_offset_minutes, default_offset)?;
    let hours = query
        .hours
        .unwrap_or(domain::todo::DEFAULT_DUE_SOON_HOURS);
    let user_detect = persistence::db_user_driven_ports::DbDetectUser;
    let todo_read = persistence::db_todo_driven_ports::DbTodoReader;

    let reminders = todo_service
        .notifications(
            &user_id,
            hours,
            Utc::now(),
            &offset,
            &mut *ext_cxn,
            &user_detect,
            &todo_read,
        )
        .await
        .map_err(todo_error_response)?;

    Ok(Json(reminders.into()))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}/todos/{todo_id}",
    tag = TODO_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user who owns the todo"),
        ("todo_id" = String, Path, description = "The todo to edit"),
    ),
    request_body = dto::UpdateTodo,
    responses(
        (status = 200, description = "The todo was updated, or the user has no such todo"),
        (status = 400, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(update, ext_cxn, todo_service))]
/// Overwrites the title, description and schedule of a todo
async fn update_todo(
    user_id: String,
    todo_id: String,
    update: dto::UpdateTodo,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<StatusCode, ErrorResponse> {
    info!("Updating todo");
    update.validate().map_err(ValidationErrorResponse::from)?;
    let todo_write = persistence::db_todo_driven_ports::DbTodoWriter;

    todo_service
        .update_todo(
            &user_id,
            &todo_id,
            &update.into(),
            Utc::now(),
            &mut *ext_cxn,
            &todo_write,
        )
        .await
        .map_err(todo_error_response)?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}/todos/{todo_id}",
    tag = TODO_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user who owns the todo"),
        ("todo_id" = String, Path, description = "The todo to delete"),
    ),
    responses(
        (status = 200, description = "The user no longer has this todo"),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(ext_cxn, todo_service))]
/// Deletes a todo
async fn delete_todo(
    user_id: String,
    todo_id: String,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<StatusCode, ErrorResponse> {
    info!("Deleting todo");
    let todo_write = persistence::db_todo_driven_ports::DbTodoWriter;

    todo_service
        .delete_todo(&user_id, &todo_id, &mut *ext_cxn, &todo_write)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/users/{user_id}/todos/{todo_id}/toggle",
    tag = TODO_API_GROUP,
    params(
        ("user_id" = String, Path, description = "The user who owns the todo"),
        ("todo_id" = String, Path, description = "The todo to complete or reopen"),
    ),
    responses(
        (status = 200, description = "The todo after toggling", body = dto::Todo),
        (status = 204, description = "The user has no such todo, nothing changed"),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(ext_cxn, todo_service))]
/// Marks a pending todo completed or a completed todo pending again
async fn toggle_todo(
    user_id: String,
    todo_id: String,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
) -> Result<Response, ErrorResponse> {
    let todo_write = persistence::db_todo_driven_ports::DbTodoWriter;

    let toggled = todo_service
        .toggle_todo(&user_id, &todo_id, Utc::now(), &mut *ext_cxn, &todo_write)
        .await
        .map_err(GenericErrorResponse)?;

    Ok(match toggled {
        Some(todo) => Json(dto::Todo::from(todo)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
