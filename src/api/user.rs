use crate::domain::user::driving_ports::{UserError, UserPort};
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    ActingUser, BasicErrorResponse, ForbiddenResponse, GenericErrorResponse, InvalidInputResponse,
    Json, NotFoundResponse, ValidationErrorResponse,
};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{ErrorResponse, IntoResponse, Response};
use axum::routing::{get, patch, post};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(get_users, get_user, update_profile, toggle_role, delete_user))]
/// Defines the OpenAPI spec for user endpoints
pub struct UsersApi;
/// Used to group user endpoints together in the OpenAPI documentation
pub const USER_API_GROUP: &str = "Users";

/// Builds a router for all the user routes
pub fn user_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/users",
            get(|State(app_state): AppState, acting_user: ActingUser| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let user_service = domain::user::UserService {};

                get_users(acting_user, &mut ext_cxn, &user_service).await
            }),
        )
        .route(
            "/users/:user_id",
            get(
                |State(app_state): AppState, Path(user_id): Path<String>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};

                    get_user(user_id, &mut ext_cxn, &user_service).await
                },
            )
            .delete(
                |State(app_state): AppState,
                 acting_user: ActingUser,
                 Path(user_id): Path<String>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};

                    delete_user(acting_user, user_id, &mut ext_cxn, &user_service).await
                },
            ),
        )
        .route(
            "/users/:user_id/profile",
            patch(
                |State(app_state): AppState,
                 Path(user_id): Path<String>,
                 Json(update): Json<dto::UpdateProfile>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};

                    update_profile(user_id, update, &mut ext_cxn, &user_service).await
                },
            ),
        )
        .route(
            "/users/:user_id/role",
            post(
                |State(app_state): AppState,
                 acting_user: ActingUser,
                 Path(user_id): Path<String>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};

                    toggle_role(acting_user, user_id, &mut ext_cxn, &user_service).await
                },
            ),
        )
}

fn user_error_response(err: UserError) -> ErrorResponse {
    match err {
        UserError::NotPermitted => ForbiddenResponse.into(),
        UserError::UserDoesNotExist => NotFoundResponse.into(),
        UserError::Invalid(problems) => InvalidInputResponse(problems).into(),
        UserError::PortError(port_err) => GenericErrorResponse(port_err).into(),
    }
}

#[utoipa::path(
    get,
    path = "/users",
    tag = USER_API_GROUP,
    params(("x-user-id" = String, Header, description = "The super-admin making the request")),
    responses(
        (status = 200, description = "Every user in the system", body = [dto::TodoUser]),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(ext_cxn, user_service))]
/// Lists every user. Only super-admins may do this.
async fn get_users(
    ActingUser(acting_user_id): ActingUser,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<Json<Vec<dto::TodoUser>>, ErrorResponse> {
    info!("Requested users");
    let user_reader = persistence::db_user_driven_ports::DbUserReader;

    let users = user_service
        .get_users(&acting_user_id, &mut *ext_cxn, &user_reader)
        .await
        .map_err(user_error_response)?;

    Ok(Json(users.into_iter().map(dto::TodoUser::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = USER_API_GROUP,
    params(("user_id" = String, Path, description = "The user to fetch")),
    responses(
        (status = 200, description = "The requested user", body = dto::TodoUser),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(ext_cxn, user_service))]
/// Fetches a single user
async fn get_user(
    user_id: String,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<Json<dto::TodoUser>, ErrorResponse> {
    let user_reader = persistence::db_user_driven_ports::DbUserReader;

    let user = user_service
        .get_user(&user_id, &mut *ext_cxn, &user_reader)
        .await
        .map_err(user_error_response)?;

    Ok(Json(user.into()))
}

#[utoipa::path(
    patch,
    path = "/users/{user_id}/profile",
    tag = USER_API_GROUP,
    params(("user_id" = String, Path, description = "The user whose profile is being edited")),
    request_body = dto::UpdateProfile,
    responses(
        (status = 200, description = "The user after the edit", body = dto::TodoUser),
        (status = 400, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(update, ext_cxn, user_service))]
/// Changes a user's display name and avatar
async fn update_profile(
    user_id: String,
    update: dto::UpdateProfile,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<Json<dto::TodoUser>, ErrorResponse> {
    info!("Updating profile");
    update.validate().map_err(ValidationErrorResponse::from)?;
    let user_reader = persistence::db_user_driven_ports::DbUserReader;
    let user_writer = persistence::db_user_driven_ports::DbUserWriter;

    let updated = user_service
        .update_profile(
            &user_id,
            &update.into(),
            &mut *ext_cxn,
            &user_reader,
            &user_writer,
        )
        .await
        .map_err(user_error_response)?;

    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/users/{user_id}/role",
    tag = USER_API_GROUP,
    params(
        ("x-user-id" = String, Header, description = "The super-admin making the request"),
        ("user_id" = String, Path, description = "The user to promote or demote"),
    ),
    responses(
        (status = 200, description = "The user with their new role", body = dto::TodoUser),
        (status = 204, description = "The user did not exist, nothing changed"),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(ext_cxn, user_service))]
/// Switches a user between the normal and superuser roles
async fn toggle_role(
    ActingUser(acting_user_id): ActingUser,
    user_id: String,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<Response, ErrorResponse> {
    info!("Toggling role");
    let user_reader = persistence::db_user_driven_ports::DbUserReader;
    let user_writer = persistence::db_user_driven_ports::DbUserWriter;

    let toggled = user_service
        .toggle_role(
            &acting_user_id,
            &user_id,
            &mut *ext_cxn,
            &user_reader,
            &user_writer,
        )
        .await
        .map_err(user_error_response)?;

    Ok(match toggled {
        Some(user) => Json(dto::TodoUser::from(user)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = USER_API_GROUP,
    params(
        ("x-user-id" = String, Header, description = "The super-admin making the request"),
        ("user_id" = String, Path, description = "The user to remove along with their todos"),
    ),
    responses(
        (status = 200, description = "The user and their todos are gone"),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip(ext_cxn, user_service))]
/// Removes a user and every todo they own
async fn delete_user(
    ActingUser(acting_user_id): ActingUser,
    user_id: String,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<StatusCode, ErrorResponse> {
    info!("Deleting user");
    let user_reader = persistence::db_user_driven_ports::DbUserReader;
    let user_writer = persistence::db_user_driven_ports::DbUserWriter;
    let todo_writer = persistence::db_todo_driven_ports::DbTodoWriter;

    user_service
        .delete_user(
            &acting_user_id,
            &user_id,
            &mut *ext_cxn,
            &user_reader,
            &user_writer,
            &todo_writer,
        )
        .await
        .map_err(user_error_response)?;

    Ok(StatusCode::OK)
}
