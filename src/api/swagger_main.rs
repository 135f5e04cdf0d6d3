use crate::dto;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(info(
    title = "Todo Planner API",
    description = "Schedule todos, browse them by calendar day and manage who can sign in"
))]
struct TodoPlannerApi;

/// Constructs the route on the API that renders the swagger UI and returns the OpenAPI schema.
/// Merges in OpenAPI definitions from other locations in the app, such as the [dto] package
/// and submodules of [api][crate::api]
pub fn build_documentation() -> SwaggerUi {
    let mut api_docs = TodoPlannerApi::openapi();
    api_docs.merge(dto::OpenApiSchemas::openapi());
    api_docs.merge(super::auth::AuthApi::openapi());
    api_docs.merge(super::user::UsersApi::openapi());
    api_docs.merge(super::todo::TodoApi::openapi());
    api_docs.merge(super::calendar::CalendarApi::openapi());

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_docs)
}
