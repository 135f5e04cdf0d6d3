use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_macros::{FromRequest, FromRequestParts};
use chrono::FixedOffset;
use serde::Serialize;
use tracing::error;
use utoipa::openapi::{RefOr, Schema};
use utoipa::{ToResponse, ToSchema, openapi};
use validator::ValidationErrors;

use crate::domain::identity::AuthFailure;
use crate::domain::identity::driving_ports::AuthError;
use crate::domain::{FieldProblem, ValidationProblems};

/// Header naming the user an administrative request is made on behalf of
pub const ACTING_USER_HEADER: &str = "x-user-id";

/// Contains diagnostic information about an API failure
#[derive(Serialize, Debug, ToResponse)]
#[response(examples(
    ("Not Found" = (
        summary = "Entity could not be found (404)",
        value = json!({
            "error_code": "not_found",
            "error_description": "The requested entity could not be found.",
            "extra_info": null
        })
    )),

    ("Forbidden" = (
        summary = "The acting user may not perform this action (403)",
        value = json!({
            "error_code": "forbidden",
            "error_description": "Only super-admins may do that.",
            "extra_info": null
        })
    )),

    ("Internal Failure" = (
        summary = "Something unexpected went wrong inside the server (500)",
        value = json!({
            "error_code": "internal_error",
            "error_description": "Could not access data to complete your request",
            "extra_info": null
        })
    )),

    ("Invalid Input" = (
        summary = "Invalid request body was passed (400)",
        value = json!({
            "error_code": "invalid_input",
            "error_description": "Submitted data was invalid.",
            "extra_info": [
                {
                    "field": "title",
                    "code": "missing_title",
                    "message": "Title is required"
                }
            ]
        })
    )),

    ("Authentication Failure" = (
        summary = "The identity provider refused the request (401)",
        value = json!({
            "error_code": "incorrect_password",
            "error_description": "Incorrect password",
            "extra_info": null
        })
    )),

    ("Malformed JSON" = (
        summary = "Invalid JSON passed to server (400)",
        value = json!({
            "error_code": "invalid_json",
            "error_description": "The passed request body contained malformed or unreadable JSON.",
            "extra_info": "Failed to parse the request body as JSON: EOF while parsing an object at line 4 column 0"
        })
    ))
))]
pub struct BasicErrorResponse {
    error_code: String,
    error_description: String,
    extra_info: Option<ExtraInfo>,
}

impl BasicErrorResponse {
    fn new(error_code: &str, error_description: impl Into<String>) -> BasicErrorResponse {
        BasicErrorResponse {
            error_code: error_code.to_owned(),
            error_description: error_description.into(),
            extra_info: None,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(untagged)]
pub enum ExtraInfo {
    ValidationIssues(ValidationErrorSchema),
    FieldIssues(Vec<FieldIssue>),
    Message(String),
}

/// Stand-in OpenAPI schema for [ValidationErrors] which just provides an empty object
#[derive(Serialize, Debug)]
#[serde(transparent)]
pub struct ValidationErrorSchema(ValidationErrors);

impl<'schem> ToSchema<'schem> for ValidationErrorSchema {
    fn schema() -> (&'schem str, RefOr<Schema>) {
        (
            "ValidationErrorSchema",
            openapi::ObjectBuilder::new().into(),
        )
    }
}

/// A problem with one field of the submitted data
#[derive(Serialize, Debug, ToSchema)]
pub struct FieldIssue {
    #[schema(example = "title")]
    field: String,
    #[schema(example = "missing_title")]
    code: String,
    #[schema(example = "Title is required")]
    message: String,
}

impl From<&FieldProblem> for FieldIssue {
    fn from(value: &FieldProblem) -> Self {
        FieldIssue {
            field: value.field.to_owned(),
            code: value.code.to_owned(),
            message: value.message.to_owned(),
        }
    }
}

/// Response type that wraps validation errors and turns them into [BasicErrorResponse]s
pub struct ValidationErrorResponse(ValidationErrors);

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(BasicErrorResponse {
                error_code: "invalid_input".into(),
                error_description: "Submitted data was invalid.".to_owned(),
                extra_info: Some(ExtraInfo::ValidationIssues(ValidationErrorSchema(self.0))),
            }),
        )
            .into_response()
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(value: ValidationErrors) -> Self {
        Self(value)
    }
}

/// Response type for input the domain refused, listing every problem that was found
pub struct InvalidInputResponse(pub ValidationProblems);

impl IntoResponse for InvalidInputResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(BasicErrorResponse {
                error_code: "invalid_input".into(),
                error_description: "Submitted data was invalid.".to_owned(),
                extra_info: Some(ExtraInfo::FieldIssues(
                    self.0.0.iter().map(FieldIssue::from).collect(),
                )),
            }),
        )
            .into_response()
    }
}

impl From<ValidationProblems> for InvalidInputResponse {
    fn from(value: ValidationProblems) -> Self {
        Self(value)
    }
}

/// Response type for unexpected failures. Logs the error and answers with a generic 500.
pub struct GenericErrorResponse(pub anyhow::Error);

impl IntoResponse for GenericErrorResponse {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(BasicErrorResponse::new(
                "internal_error",
                "Could not access data to complete your request",
            )),
        )
            .into_response()
    }
}

/// Response type for entities that don't exist
pub struct NotFoundResponse;

impl IntoResponse for NotFoundResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::NOT_FOUND,
            Json(BasicErrorResponse::new(
                "not_found",
                "The requested entity could not be found.",
            )),
        )
            .into_response()
    }
}

/// Response type for actions the acting user lacks the role for
pub struct ForbiddenResponse;

impl IntoResponse for ForbiddenResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(BasicErrorResponse::new(
                "forbidden",
                "Only super-admins may do that.",
            )),
        )
            .into_response()
    }
}

/// Response type for failed sign-in, sign-up and password reset attempts. The description is the
/// message meant for the person at the keyboard.
pub struct AuthErrorResponse(pub AuthError);

impl IntoResponse for AuthErrorResponse {
    fn into_response(self) -> Response {
        let (status, error_code) = match self.0.failure {
            AuthFailure::NoAccount => (StatusCode::UNAUTHORIZED, "no_account"),
            AuthFailure::IncorrectPassword => (StatusCode::UNAUTHORIZED, "incorrect_password"),
            AuthFailure::InvalidEmail => (StatusCode::BAD_REQUEST, "invalid_email"),
            AuthFailure::Throttled => (StatusCode::TOO_MANY_REQUESTS, "too_many_attempts"),
            AuthFailure::AccountExists => (StatusCode::CONFLICT, "account_exists"),
            AuthFailure::WeakPassword => (StatusCode::BAD_REQUEST, "weak_password"),
            AuthFailure::Unknown => (StatusCode::INTERNAL_SERVER_ERROR, "auth_failed"),
        };
        if let Some(ref cause) = self.0.cause {
            error!("Could not {}: {:#}", self.0.action, cause);
        }

        (
            status,
            Json(BasicErrorResponse::new(error_code, self.0.user_message())),
        )
            .into_response()
    }
}

impl From<AuthError> for AuthErrorResponse {
    fn from(value: AuthError) -> Self {
        Self(value)
    }
}

/// Wrapper for [axum::Json] which customizes the error response to use our
/// data structure for API errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JsonErrorResponse))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Response type representing JSON parse errors
pub struct JsonErrorResponse {
    parse_problem: String,
}

impl From<JsonRejection> for JsonErrorResponse {
    fn from(value: JsonRejection) -> Self {
        JsonErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for JsonErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(BasicErrorResponse {
                error_code: "invalid_json".into(),
                error_description:
                    "The passed request body contained malformed or unreadable JSON.".into(),
                extra_info: Some(ExtraInfo::Message(self.parse_problem)),
            }),
        )
            .into_response()
    }
}

/// Wrapper for [axum::extract::Query] which reports bad query strings with our API error format
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(QueryErrorResponse))]
pub struct Query<T>(pub T);

/// Response type representing unparseable query strings
pub struct QueryErrorResponse {
    parse_problem: String,
}

impl From<QueryRejection> for QueryErrorResponse {
    fn from(value: QueryRejection) -> Self {
        QueryErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for QueryErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(BasicErrorResponse {
                error_code: "invalid_query".into(),
                error_description: "The query string could not be understood.".into(),
                extra_info: Some(ExtraInfo::Message(self.parse_problem)),
            }),
        )
            .into_response()
    }
}

/// The user named by the [ACTING_USER_HEADER] header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser(pub String);

/// Rejection for requests that don't say who is acting
pub struct MissingActingUserResponse;

impl IntoResponse for MissingActingUserResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(BasicErrorResponse::new(
                "missing_acting_user",
                format!("The {ACTING_USER_HEADER} header must name the user making this request."),
            )),
        )
            .into_response()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = MissingActingUserResponse;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(ACTING_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
            .map(|user_id| ActingUser(user_id.to_owned()))
            .ok_or(MissingActingUserResponse)
    }
}

/// Picks the UTC offset a request's dates are interpreted in: the requested number of minutes
/// east of UTC if given, otherwise [default]
pub fn resolve_utc_offset(
    requested_minutes: Option<i32>,
    default: FixedOffset,
) -> Result<FixedOffset, InvalidInputResponse> {
    let Some(minutes) = requested_minutes else {
        return Ok(default);
    };

    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            InvalidInputResponse(ValidationProblems(vec![FieldProblem {
                field: "utc_offset_minutes",
                code: "invalid_offset",
                message: "UTC offset must be less than 24 hours in either direction",
            }]))
        })
}
