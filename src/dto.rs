use utoipa::OpenApi;

pub mod auth;
pub mod calendar;
pub mod todo;
pub mod user;

pub use auth::*;
pub use calendar::*;
pub use todo::*;
pub use user::*;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            Todo,
            NewTodo,
            UpdateTodo,
            TodoFilterParam,
            TodoNotifications,
            TodoUser,
            RoleDto,
            UpdateProfile,
            CalendarDay,
            CalendarMonth,
            SignInRequest,
            SignUpRequest,
            SignOutRequest,
            PasswordResetRequest,
            SessionResponse,
            crate::routing_utils::ExtraInfo,
            crate::routing_utils::FieldIssue,
            crate::routing_utils::ValidationErrorSchema,
        ),
        responses(crate::routing_utils::BasicErrorResponse),
    )
)]
/// Captures OpenAPI schemas and canned responses defined in the DTO module
pub struct OpenApiSchemas;
