use crate::domain::identity::driven_ports::IdentityProvider;
use crate::domain::identity::driving_ports::SessionPort;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{AuthErrorResponse, BasicErrorResponse, Json, ValidationErrorResponse};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::post;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(sign_in, sign_up, sign_out, request_password_reset))]
/// Defines the OpenAPI documentation for session endpoints
pub struct AuthApi;
pub const AUTH_API_GROUP: &str = "Authentication";

/// Adds routes under "/auth" to the application router
pub fn auth_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/auth/sign-in",
            post(
                |State(app_state): AppState, Json(request): Json<dto::SignInRequest>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let session_service = domain::identity::SessionService {};

                    sign_in(
                        request,
                        &mut ext_cxn,
                        &app_state.identity_provider,
                        &session_service,
                    )
                    .await
                },
            ),
        )
        .route(
            "/auth/sign-up",
            post(
                |State(app_state): AppState, Json(request): Json<dto::SignUpRequest>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let session_service = domain::identity::SessionService {};

                    sign_up(
                        request,
                        &mut ext_cxn,
                        &app_state.identity_provider,
                        &session_service,
                    )
                    .await
                },
            ),
        )
        .route(
            "/auth/sign-out",
            post(|Json(request): Json<dto::SignOutRequest>| async move {
                let session_service = domain::identity::SessionService {};

                sign_out(request, &session_service).await
            }),
        )
        .route(
            "/auth/password-reset",
            post(
                |State(app_state): AppState,
                 Json(request): Json<dto::PasswordResetRequest>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let session_service = domain::identity::SessionService {};

                    request_password_reset(
                        request,
                        &mut ext_cxn,
                        &app_state.identity_provider,
                        &session_service,
                    )
                    .await
                },
            ),
        )
}

#[utoipa::path(
    post,
    path = "/auth/sign-in",
    tag = AUTH_API_GROUP,
    request_body = dto::SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = dto::SessionResponse),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 429, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip_all)]
/// Signs in with e-mail and password, creating the local user record on first sign-in
async fn sign_in(
    request: dto::SignInRequest,
    ext_cxn: &mut impl ExternalConnectivity,
    identity_provider: &impl IdentityProvider,
    session_service: &impl SessionPort,
) -> Result<Json<dto::SessionResponse>, ErrorResponse> {
    request.validate().map_err(ValidationErrorResponse::from)?;
    let user_reader = persistence::db_user_driven_ports::DbUserReader;
    let user_writer = persistence::db_user_driven_ports::DbUserWriter;

    let session = session_service
        .sign_in(
            &request.into(),
            Utc::now(),
            &mut *ext_cxn,
            identity_provider,
            &user_reader,
            &user_writer,
        )
        .await
        .map_err(AuthErrorResponse)?;
    info!(user_id = %session.user.id, "Signed in");

    Ok(Json(session.into()))
}

#[utoipa::path(
    post,
    path = "/auth/sign-up",
    tag = AUTH_API_GROUP,
    request_body = dto::SignUpRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = dto::SessionResponse),
        (status = 400, response = BasicErrorResponse),
        (status = 409, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip_all)]
/// Creates an account with the identity provider and signs into it
async fn sign_up(
    request: dto::SignUpRequest,
    ext_cxn: &mut impl ExternalConnectivity,
    identity_provider: &impl IdentityProvider,
    session_service: &impl SessionPort,
) -> Result<(StatusCode, Json<dto::SessionResponse>), ErrorResponse> {
    request.validate().map_err(ValidationErrorResponse::from)?;
    let user_reader = persistence::db_user_driven_ports::DbUserReader;
    let user_writer = persistence::db_user_driven_ports::DbUserWriter;

    let session = session_service
        .sign_up(
            &request.into(),
            Utc::now(),
            &mut *ext_cxn,
            identity_provider,
            &user_reader,
            &user_writer,
        )
        .await
        .map_err(AuthErrorResponse)?;
    info!(user_id = %session.user.id, "Signed up");

    Ok((StatusCode::CREATED, Json(session.into())))
}

#[utoipa::path(
    post,
    path = "/auth/sign-out",
    tag = AUTH_API_GROUP,
    request_body = dto::SignOutRequest,
    responses(
        (status = 204, description = "Signed out"),
        (status = 400, response = BasicErrorResponse),
    ),
)]
#[instrument(skip_all, fields(user_id = %request.user_id))]
/// Ends a session
async fn sign_out(
    request: dto::SignOutRequest,
    session_service: &impl SessionPort,
) -> Result<StatusCode, ErrorResponse> {
    request.validate().map_err(ValidationErrorResponse::from)?;
    session_service
        .sign_out(&request.user_id)
        .await
        .map_err(AuthErrorResponse)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/auth/password-reset",
    tag = AUTH_API_GROUP,
    request_body = dto::PasswordResetRequest,
    responses(
        (status = 204, description = "A reset e-mail is on its way"),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 429, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
#[instrument(skip_all)]
/// Asks the identity provider to send a password reset e-mail
async fn request_password_reset(
    request: dto::PasswordResetRequest,
    ext_cxn: &mut impl ExternalConnectivity,
    identity_provider: &impl IdentityProvider,
    session_service: &impl SessionPort,
) -> Result<StatusCode, ErrorResponse> {
    request.validate().map_err(ValidationErrorResponse::from)?;
    session_service
        .reset_password(request.email.trim(), &mut *ext_cxn, identity_provider)
        .await
        .map_err(AuthErrorResponse)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util::{ErrorBody, deserialize_body};
    use crate::domain::identity::driving_ports::AuthError;
    use crate::domain::identity::test_util::{FakeIdentityProvider, MockSessionService};
    use crate::domain::identity::{AuthAction, AuthFailure, Identity, Session};
    use crate::domain::user::test_util::{user_default, user_from_create};
    use crate::external_connections;
    use axum::response::IntoResponse;
    use speculoos::prelude::*;
    use std::sync::Mutex;

    fn session_for(id: &str) -> Session {
        Session {
            user: user_from_create(&user_default(id), Utc::now()),
            identity: Identity {
                id: id.to_owned(),
                display_name: Some("First Last".to_owned()),
                email: Some("first@last.com".to_owned()),
                photo_url: None,
                created_at: None,
            },
            id_token: format!("token-for-{id}"),
        }
    }

    mod sign_in {
        use super::*;

        fn request(password: &str) -> dto::SignInRequest {
            dto::SignInRequest {
                email: "fawaz@demo.com".to_owned(),
                password: password.to_owned(),
            }
        }

        #[tokio::test]
        async fn happy_path() {
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity_provider = FakeIdentityProvider::new_locked();
            session_service_raw
                .sign_in_result
                .set_returned_result(Ok(session_for("uid-1")));
            let session_service = Mutex::new(session_service_raw);

            let response = sign_in(
                request("demo123"),
                &mut ext_cxn,
                &identity_provider,
                &session_service,
            )
            .await;
            let Ok(Json(session)) = response else {
                panic!("Expected a session");
            };
            assert_eq!("uid-1", session.user.id);
            assert_eq!("token-for-uid-1", session.id_token);

            let locked_session_service = session_service
                .lock()
                .expect("session service mutex poisoned");
            let calls = locked_session_service.sign_in_result.calls();
            assert_eq!(1, calls.len());
            assert_eq!("fawaz@demo.com", calls[0].email);
        }

        #[tokio::test]
        async fn wrong_password_is_401_with_message() {
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity_provider = FakeIdentityProvider::new_locked();
            session_service_raw
                .sign_in_result
                .set_returned_result(Err(AuthError::new(
                    AuthAction::SignIn,
                    AuthFailure::IncorrectPassword,
                )));
            let session_service = Mutex::new(session_service_raw);

            let response = sign_in(
                request("nope"),
                &mut ext_cxn,
                &identity_provider,
                &session_service,
            )
            .await
            .into_response();

            assert_eq!(StatusCode::UNAUTHORIZED, response.status());
            let body: ErrorBody = deserialize_body(response.into_body()).await;
            assert_eq!("incorrect_password", body.error_code);
            assert_eq!("Incorrect password", body.error_description);
        }

        #[tokio::test]
        async fn blank_password_never_reaches_the_service() {
            let session_service = Mutex::new(MockSessionService::new());
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity_provider = FakeIdentityProvider::new_locked();

            let response = sign_in(request(""), &mut ext_cxn, &identity_provider, &session_service)
                .await
                .into_response();

            assert_eq!(StatusCode::BAD_REQUEST, response.status());
            let locked_session_service = session_service
                .lock()
                .expect("session service mutex poisoned");
            assert!(locked_session_service.sign_in_result.calls().is_empty());
        }
    }

    mod sign_up {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity_provider = FakeIdentityProvider::new_locked();
            session_service_raw
                .sign_up_result
                .set_returned_result(Ok(session_for("uid-7")));
            let session_service = Mutex::new(session_service_raw);

            let response = sign_up(
                dto::SignUpRequest {
                    email: "sarah@demo.com".to_owned(),
                    password: "hunter22".to_owned(),
                    name: "Sarah Wilson".to_owned(),
                },
                &mut ext_cxn,
                &identity_provider,
                &session_service,
            )
            .await;
            let Ok((status, Json(session))) = response else {
                panic!("Expected a session");
            };
            assert_eq!(StatusCode::CREATED, status);
            assert_eq!("uid-7", session.user.id);

            let locked_session_service = session_service
                .lock()
                .expect("session service mutex poisoned");
            let calls = locked_session_service.sign_up_result.calls();
            assert_eq!(1, calls.len());
            assert_eq!("Sarah Wilson", calls[0].name);
        }

        #[tokio::test]
        async fn existing_account_is_409() {
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity_provider = FakeIdentityProvider::new_locked();
            session_service_raw
                .sign_up_result
                .set_returned_result(Err(AuthError::new(
                    AuthAction::SignUp,
                    AuthFailure::AccountExists,
                )));
            let session_service = Mutex::new(session_service_raw);

            let response = sign_up(
                dto::SignUpRequest {
                    email: "sarah@demo.com".to_owned(),
                    password: "hunter22".to_owned(),
                    name: "Sarah Wilson".to_owned(),
                },
                &mut ext_cxn,
                &identity_provider,
                &session_service,
            )
            .await
            .into_response();

            assert_eq!(StatusCode::CONFLICT, response.status());
            let body: ErrorBody = deserialize_body(response.into_body()).await;
            assert_eq!("account_exists", body.error_code);
        }
    }

    mod sign_out {
        use super::*;

        #[tokio::test]
        async fn always_answers_204() {
            let mut session_service_raw = MockSessionService::new();
            session_service_raw.sign_out_result.set_returned_result(Ok(()));
            let session_service = Mutex::new(session_service_raw);

            let response = sign_out(
                dto::SignOutRequest {
                    user_id: "1".to_owned(),
                },
                &session_service,
            )
            .await;
            assert_that!(response.map_err(|_| ())).is_ok_containing(StatusCode::NO_CONTENT);

            let locked_session_service = session_service
                .lock()
                .expect("session service mutex poisoned");
            assert_that!(locked_session_service.sign_out_result.calls())
                .is_equal_to(&["1".to_owned()][..]);
        }
    }

    mod request_password_reset {
        use super::*;

        #[tokio::test]
        async fn trims_email() {
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity_provider = FakeIdentityProvider::new_locked();
            session_service_raw
                .reset_password_result
                .set_returned_result(Ok(()));
            let session_service = Mutex::new(session_service_raw);

            let response = request_password_reset(
                dto::PasswordResetRequest {
                    email: " fawaz@demo.com ".to_owned(),
                },
                &mut ext_cxn,
                &identity_provider,
                &session_service,
            )
            .await;
            assert_that!(response.map_err(|_| ())).is_ok_containing(StatusCode::NO_CONTENT);

            let locked_session_service = session_service
                .lock()
                .expect("session service mutex poisoned");
            assert_that!(locked_session_service.reset_password_result.calls())
                .is_equal_to(&["fawaz@demo.com".to_owned()][..]);
        }

        #[tokio::test]
        async fn unknown_account_is_401() {
            let mut session_service_raw = MockSessionService::new();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let identity_provider = FakeIdentityProvider::new_locked();
            session_service_raw
                .reset_password_result
                .set_returned_result(Err(AuthError::new(
                    AuthAction::ResetPassword,
                    AuthFailure::NoAccount,
                )));
            let session_service = Mutex::new(session_service_raw);

            let response = request_password_reset(
                dto::PasswordResetRequest {
                    email: "ghost@demo.com".to_owned(),
                },
                &mut ext_cxn,
                &identity_provider,
                &session_service,
            )
            .await
            .into_response();

            assert_eq!(StatusCode::UNAUTHORIZED, response.status());
            let body: ErrorBody = deserialize_body(response.into_body()).await;
            assert_eq!("no_account", body.error_code);
        }
    }
}
