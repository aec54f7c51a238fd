//! Project endpoints.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use tracing::error;

use super::{
    invalid_body, non_empty, storage,
    types::{CreateProjectRequest, ProjectEnvelope, ProjectsEnvelope, UpdateProjectRequest},
};

#[utoipa::path(
    get,
    path = "/projects",
    responses(
        (status = 200, description = "List projects.", body = ProjectsEnvelope),
    ),
    tag = "projects"
)]
pub async fn list_projects(pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::fetch_projects(&pool).await {
        Ok(projects) => (StatusCode::OK, Json(ProjectsEnvelope { projects })).into_response(),
        Err(err) => {
            error!("Failed to list projects: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project found.", body = ProjectEnvelope),
        (status = 400, description = "Invalid project id."),
        (status = 404, description = "Project not found."),
    ),
    tag = "projects"
)]
pub async fn get_project(Path(id): Path<i64>, pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::fetch_project(&pool, id).await {
        Ok(Some(project)) => (StatusCode::OK, Json(ProjectEnvelope { project })).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch project: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created.", body = ProjectEnvelope),
        (status = 400, description = "Invalid input.", body = String),
    ),
    tag = "projects"
)]
/// Creates a project and points `Location` at it.
pub async fn create_project(
    pool: Extension<PgPool>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };

    let Some(name) = non_empty(Some(payload.name.as_str())) else {
        return (StatusCode::BAD_REQUEST, "Project name is required.").into_response();
    };
    let description = payload.description.as_deref().unwrap_or_default().trim();

    match storage::insert_project(&pool, name, description).await {
        Ok(project) => (
            StatusCode::CREATED,
            [(LOCATION, format!("/projects/{}", project.id))],
            Json(ProjectEnvelope { project }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to create project: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    request_body = UpdateProjectRequest,
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project updated."),
        (status = 400, description = "Invalid input."),
        (status = 404, description = "Project not found."),
    ),
    tag = "projects"
)]
/// Updates a project. An empty name keeps the current one; the description is replaced.
pub async fn update_project(
    Path(id): Path<i64>,
    pool: Extension<PgPool>,
    payload: Result<Json<UpdateProjectRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };

    let name = non_empty(payload.name.as_deref());
    let description = payload.description.as_deref().unwrap_or_default().trim();

    match storage::update_project(&pool, id, name, description).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update project: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    params(("id" = i64, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project, its extensions and their items deleted."),
        (status = 404, description = "Project not found."),
    ),
    tag = "projects"
)]
pub async fn delete_project(Path(id): Path<i64>, pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::delete_project(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to delete project: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
