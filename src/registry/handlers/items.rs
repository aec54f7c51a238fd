//! Item endpoints.
//!
//! Creating an item allocates its typecode from the extension's scope; the
//! code never changes afterwards and is released when the item is deleted.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use tracing::{error, instrument};

use super::{
    invalid_body, non_empty,
    storage::{self, NewItem},
    types::{CreateItemRequest, ItemEnvelope, ItemsEnvelope, UpdateItemRequest},
};
use crate::typecode::TypecodeAllocator;

#[utoipa::path(
    get,
    path = "/items",
    responses(
        (status = 200, description = "List items.", body = ItemsEnvelope),
    ),
    tag = "items"
)]
pub async fn list_items(pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::fetch_items(&pool).await {
        Ok(items) => (StatusCode::OK, Json(ItemsEnvelope { items })).into_response(),
        Err(err) => {
            error!("Failed to list items: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/items/{id}",
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item found.", body = ItemEnvelope),
        (status = 400, description = "Invalid item id."),
        (status = 404, description = "Item not found."),
    ),
    tag = "items"
)]
pub async fn get_item(Path(id): Path<i64>, pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::fetch_item(&pool, id).await {
        Ok(Some(item)) => (StatusCode::OK, Json(ItemEnvelope { item })).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch item: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created with a new typecode.", body = ItemEnvelope),
        (status = 400, description = "Invalid input.", body = String),
        (status = 404, description = "Extension not found.", body = String),
        (status = 500, description = "Typecode range exhausted, scope not supported or database error."),
        (status = 503, description = "Typecode allocation kept losing to concurrent requests.", body = String),
    ),
    tag = "items"
)]
/// Creates an item and allocates the lowest free typecode of its extension's domain.
#[instrument(skip_all, fields(extension_id = tracing::field::Empty))]
pub async fn create_item(
    pool: Extension<PgPool>,
    allocator: Extension<TypecodeAllocator>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };
    tracing::Span::current().record("extension_id", payload.extension_id);

    let Some(name) = non_empty(Some(payload.name.as_str())) else {
        return (StatusCode::BAD_REQUEST, "Item name is required.").into_response();
    };
    let Some(table_name) = non_empty(Some(payload.table_name.as_str())) else {
        return (StatusCode::BAD_REQUEST, "Item table_name is required.").into_response();
    };
    if payload.extension_id < 1 {
        return (StatusCode::BAD_REQUEST, "A valid extension_id is required.").into_response();
    }

    let item = NewItem {
        name,
        table_name,
        extension_id: payload.extension_id,
    };

    match storage::create_item(&pool, &allocator, &item).await {
        Ok(item) => (
            StatusCode::CREATED,
            [(LOCATION, format!("/items/{}", item.id))],
            Json(ItemEnvelope { item }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/items/{id}",
    request_body = UpdateItemRequest,
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 204, description = "Item updated; the typecode is unchanged."),
        (status = 400, description = "Invalid input.", body = String),
        (status = 404, description = "Item not found."),
    ),
    tag = "items"
)]
pub async fn update_item(
    Path(id): Path<i64>,
    pool: Extension<PgPool>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_body(&rejection),
    };

    if payload.id.is_some_and(|body_id| body_id != id) {
        return (StatusCode::BAD_REQUEST, "Item id does not match the path.").into_response();
    }
    let Some(name) = non_empty(Some(payload.name.as_str())) else {
        return (StatusCode::BAD_REQUEST, "Item name is required.").into_response();
    };
    let Some(table_name) = non_empty(Some(payload.table_name.as_str())) else {
        return (StatusCode::BAD_REQUEST, "Item table_name is required.").into_response();
    };

    match storage::update_item(&pool, id, name, table_name).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update item: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/items/{id}",
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 204, description = "Item deleted; its typecode becomes reusable."),
        (status = 404, description = "Item not found."),
    ),
    tag = "items"
)]
pub async fn delete_item(Path(id): Path<i64>, pool: Extension<PgPool>) -> impl IntoResponse {
    match storage::delete_item(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to delete item: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
