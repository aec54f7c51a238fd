//! Extension endpoints.
//!
//! An extension fixes the scope its items draw typecodes from. `Project`
//! extensions must reference an existing project; `Shared` and `Hybris`
//! extensions must not reference one.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use tracing::error;

use super::{
    invalid_body, non_empty,
    storage::{self, NewExtension},
    types::{
        CreateExtensionRequest, ExtensionEnvelope, ExtensionsEnvelope, UpdateExtensionRequest,
    },
};
use crate::typecode::Scope;

#[utoipa::path(
    get,
    path = "/extensions",
    responses(
        (status = 200, description = "List extensions with their item count.", body = ExtensionsEnvelope),
    ),
    tag = "extensions"
)]
pub async fn list_extensions(pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::fetch_extensions(&pool, None).await {
        Ok(extensions) => {
            (StatusCode::OK, Json(ExtensionsEnvelope { extensions })).into_response()
        }
        Err(err) => {
            error!("Failed to list extensions: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/extensions/{scope}",
    params(("scope" = String, Path, description = "Shared, Project or Hybris (case-insensitive)")),
    responses(
        (status = 200, description = "List extensions of one scope.", body = ExtensionsEnvelope),
        (status = 400, description = "Invalid scope.", body = String),
    ),
    tag = "extensions"
)]
pub async fn list_extensions_by_scope(
    Path(scope): Path<String>,
    pool: Extension<PgPool>,
) -> impl IntoResponse {
    let Ok(scope) = scope.parse::<Scope>() else {
        return (StatusCode::BAD_REQUEST, "Invalid scope.").into_response();
    };

    match storage::fetch_extensions(&pool, Some(scope)).await {
        Ok(extensions) => {
            (StatusCode::OK, Json(ExtensionsEnvelope { extensions })).into_response()
        }
        Err(err) => {
            error!("Failed to list {scope} extensions: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/extensions",
    request_body = CreateExtensionRequest,
    responses(
        (status = 201, description = "Extension created.", body = ExtensionEnvelope),
        (status = 400, description = "Invalid input.", body = String),
        (status = 404, description = "Referenced project not found.", body = String),
    ),
    tag = "extensions"
)]
/// Creates an extension. The scope is stored in its canonical spelling.
pub async fn create_extension(
    pool: Extension<PgPool>,
    payload: Result<Json<CreateExtensionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };

    let Some(name) = non_empty(Some(payload.name.as_str())) else {
        return (StatusCode::BAD_REQUEST, "Extension name is required.").into_response();
    };
    let Some(scope) = non_empty(Some(payload.scope.as_str())) else {
        return (StatusCode::BAD_REQUEST, "Extension scope is required.").into_response();
    };
    let Ok(scope) = scope.parse::<Scope>() else {
        return (StatusCode::BAD_REQUEST, "Invalid scope.").into_response();
    };

    match (scope.requires_project(), payload.project_id) {
        (true, Some(project_id)) if project_id > 0 => {}
        (true, _) => {
            return (
                StatusCode::BAD_REQUEST,
                "Project scope requires a valid project_id.",
            )
                .into_response();
        }
        (false, Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                "Only Project scope extensions may reference a project.",
            )
                .into_response();
        }
        (false, None) => {}
    }

    let extension = NewExtension {
        name,
        description: payload.description.as_deref().unwrap_or_default().trim(),
        scope,
        project_id: payload.project_id,
    };

    match storage::insert_extension(&pool, &extension).await {
        Ok(extension) => (
            StatusCode::CREATED,
            [(LOCATION, format!("/extensions/{}", extension.id))],
            Json(ExtensionEnvelope { extension }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/extensions/{id}",
    request_body = UpdateExtensionRequest,
    params(("id" = i64, Path, description = "Extension id")),
    responses(
        (status = 204, description = "Extension updated."),
        (status = 400, description = "Invalid input."),
        (status = 404, description = "Extension not found."),
    ),
    tag = "extensions"
)]
/// Updates name and description. Scope and project are fixed at creation.
pub async fn update_extension(
    Path(id): Path<i64>,
    pool: Extension<PgPool>,
    payload: Result<Json<UpdateExtensionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };

    let name = non_empty(payload.name.as_deref());
    let description = payload.description.as_deref().unwrap_or_default().trim();

    match storage::update_extension(&pool, id, name, description).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update extension: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/extensions/{id}",
    params(("id" = i64, Path, description = "Extension id")),
    responses(
        (status = 204, description = "Extension and its items deleted."),
        (status = 404, description = "Extension not found."),
    ),
    tag = "extensions"
)]
pub async fn delete_extension(Path(id): Path<i64>, pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::delete_extension(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to delete extension: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
