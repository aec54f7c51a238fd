//! SQL storage for projects, extensions and items.
//!
//! Handlers validate input and call into this module; it owns every query and
//! the mapping from rows to response DTOs. Item creation runs the
//! allocate-then-insert loop that relies on the `(allocation_domain, typecode)`
//! unique constraint.

use axum::{http::StatusCode, response::IntoResponse};
use sqlx::{postgres::PgRow, PgExecutor, PgPool, Row};
use tracing::{debug, error, warn};

use super::types::{ExtensionResponse, ItemResponse, ProjectResponse};
use crate::typecode::{
    AllocationError, PgTypecodeStore, Scope, TypecodeAllocator, MAX_ALLOCATION_ATTEMPTS,
};

const PROJECT_COLUMNS: &str = r#"
    p.id, p.name, p.description,
    to_char(p.creation_date AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS creation_date
"#;

const EXTENSION_SELECT: &str = r#"
    SELECT e.id, e.project_id, e.name, e.description, e.scope,
        to_char(e.creation_date AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS creation_date,
        (SELECT COUNT(*) FROM item i WHERE i.extension_id = e.id) AS item_count
    FROM extension e
"#;

const ITEM_SELECT: &str = r#"
    SELECT i.id, e.scope, COALESCE(p.name, '-') AS project, i.name, i.table_name,
        i.extension_id, i.typecode,
        to_char(i.creation_date AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS creation_date
    FROM item i
    JOIN extension e ON e.id = i.extension_id
    LEFT JOIN project p ON p.id = e.project_id
"#;

#[derive(Debug)]
pub(super) enum RegistryError {
    NotFound(&'static str),
    Allocation(AllocationError),
    /// Concurrent writers kept taking the computed typecode.
    Contention,
    Database(sqlx::Error),
}

impl IntoResponse for RegistryError {
    /// Maps storage failures to stable HTTP responses.
    /// Allocation and database errors are logged server-side and surfaced without details.
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message).into_response(),
            Self::Allocation(err) if err.is_invalid_input() => {
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
            Self::Allocation(err) => {
                error!(typecode = err.typecode(), "Typecode allocation failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Contention => {
                warn!("Typecode allocation gave up after {MAX_ALLOCATION_ATTEMPTS} attempts");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Typecode allocation is contended, retry later.",
                )
                    .into_response()
            }
            Self::Database(err) => {
                error!("Database error: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

pub(super) struct NewExtension<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub scope: Scope,
    pub project_id: Option<i64>,
}

pub(super) struct NewItem<'a> {
    pub name: &'a str,
    pub table_name: &'a str,
    pub extension_id: i64,
}

fn project_from_row(row: &PgRow) -> ProjectResponse {
    ProjectResponse {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        creation_date: row.get("creation_date"),
    }
}

fn extension_from_row(row: &PgRow) -> ExtensionResponse {
    ExtensionResponse {
        id: row.get("id"),
        project_id: row.get("project_id"),
        name: row.get("name"),
        description: row.get("description"),
        scope: row.get("scope"),
        creation_date: row.get("creation_date"),
        item_count: row.get("item_count"),
    }
}

fn item_from_row(row: &PgRow) -> ItemResponse {
    ItemResponse {
        id: row.get("id"),
        scope: row.get("scope"),
        project: row.get("project"),
        name: row.get("name"),
        table_name: row.get("table_name"),
        extension_id: row.get("extension_id"),
        typecode: row.get("typecode"),
        creation_date: row.get("creation_date"),
    }
}

pub(super) async fn fetch_projects(pool: &PgPool) -> Result<Vec<ProjectResponse>, sqlx::Error> {
    let query = format!("SELECT {PROJECT_COLUMNS} FROM project p ORDER BY p.id");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    Ok(rows.iter().map(project_from_row).collect())
}

pub(super) async fn fetch_project(
    pool: &PgPool,
    id: i64,
) -> Result<Option<ProjectResponse>, sqlx::Error> {
    let query = format!("SELECT {PROJECT_COLUMNS} FROM project p WHERE p.id = $1");
    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(project_from_row))
}

pub(super) async fn insert_project(
    pool: &PgPool,
    name: &str,
    description: &str,
) -> Result<ProjectResponse, sqlx::Error> {
    let query = format!(
        "INSERT INTO project AS p (name, description) VALUES ($1, $2) RETURNING {PROJECT_COLUMNS}"
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(description)
        .fetch_one(pool)
        .await?;
    Ok(project_from_row(&row))
}

/// Updates a project. `None` keeps the current name. Returns `false` when the project does not exist.
pub(super) async fn update_project(
    pool: &PgPool,
    id: i64,
    name: Option<&str>,
    description: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE project
        SET name = COALESCE($2, name), description = $3
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes a project together with its extensions and their items in one transaction.
/// Returns `false` when the project does not exist.
pub(super) async fn delete_project(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let items = sqlx::query(
        r"
        DELETE FROM item
        WHERE extension_id IN (SELECT id FROM extension WHERE project_id = $1)
        ",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let extensions = sqlx::query("DELETE FROM extension WHERE project_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let project = sqlx::query("DELETE FROM project WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if project.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    debug!(
        project_id = id,
        extensions = extensions.rows_affected(),
        items = items.rows_affected(),
        "Deleted project"
    );
    Ok(true)
}

pub(super) async fn fetch_extensions(
    pool: &PgPool,
    scope: Option<Scope>,
) -> Result<Vec<ExtensionResponse>, sqlx::Error> {
    let rows = match scope {
        Some(scope) => {
            let query = format!("{EXTENSION_SELECT} WHERE e.scope = $1 ORDER BY e.id");
            sqlx::query(&query)
                .bind(scope.as_str())
                .fetch_all(pool)
                .await?
        }
        None => {
            let query = format!("{EXTENSION_SELECT} ORDER BY e.id");
            sqlx::query(&query).fetch_all(pool).await?
        }
    };
    Ok(rows.iter().map(extension_from_row).collect())
}

async fn fetch_extension_with<'e, E>(
    executor: E,
    id: i64,
) -> Result<Option<ExtensionResponse>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let query = format!("{EXTENSION_SELECT} WHERE e.id = $1");
    let row = sqlx::query(&query).bind(id).fetch_optional(executor).await?;
    Ok(row.as_ref().map(extension_from_row))
}

/// Inserts an extension. A reference to a missing project maps to `404`.
pub(super) async fn insert_extension(
    pool: &PgPool,
    extension: &NewExtension<'_>,
) -> Result<ExtensionResponse, RegistryError> {
    let mut tx = pool.begin().await?;

    let insert = sqlx::query(
        r"
        INSERT INTO extension (project_id, name, description, scope)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(extension.project_id)
    .bind(extension.name)
    .bind(extension.description)
    .bind(extension.scope.as_str())
    .fetch_one(&mut *tx)
    .await;

    let id: i64 = match insert {
        Ok(row) => row.get("id"),
        Err(err) => {
            let _ = tx.rollback().await;
            if is_foreign_key_violation(&err) {
                return Err(RegistryError::NotFound("Project not found."));
            }
            return Err(RegistryError::Database(err));
        }
    };

    let created = fetch_extension_with(&mut *tx, id)
        .await?
        .ok_or(RegistryError::NotFound("Extension not found."))?;
    tx.commit().await?;
    Ok(created)
}

pub(super) async fn update_extension(
    pool: &PgPool,
    id: i64,
    name: Option<&str>,
    description: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        UPDATE extension
        SET name = COALESCE($2, name), description = $3
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(name)
    .bind(description)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes an extension and its items in one transaction.
pub(super) async fn delete_extension(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let items = sqlx::query("DELETE FROM item WHERE extension_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let extension = sqlx::query("DELETE FROM extension WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if extension.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    debug!(
        extension_id = id,
        items = items.rows_affected(),
        "Deleted extension"
    );
    Ok(true)
}

pub(super) async fn fetch_items(pool: &PgPool) -> Result<Vec<ItemResponse>, sqlx::Error> {
    let query = format!("{ITEM_SELECT} ORDER BY i.id");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    Ok(rows.iter().map(item_from_row).collect())
}

async fn fetch_item_with<'e, E>(executor: E, id: i64) -> Result<Option<ItemResponse>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let query = format!("{ITEM_SELECT} WHERE i.id = $1");
    let row = sqlx::query(&query).bind(id).fetch_optional(executor).await?;
    Ok(row.as_ref().map(item_from_row))
}

pub(super) async fn fetch_item(pool: &PgPool, id: i64) -> Result<Option<ItemResponse>, sqlx::Error> {
    fetch_item_with(pool, id).await
}

/// Creates an item with a freshly allocated typecode.
///
/// Each attempt runs in its own transaction: load the extension, compute the
/// lowest free code through a store bound to the transaction, insert. The
/// store locks the allocation domain until commit, so concurrent requests for
/// the same domain queue instead of racing. A unique violation on
/// `(allocation_domain, typecode)` still rolls the attempt back and recomputes,
/// covering writers that bypass the lock.
/// Dropping the future drops the open transaction, which rolls it back.
pub(super) async fn create_item(
    pool: &PgPool,
    allocator: &TypecodeAllocator,
    item: &NewItem<'_>,
) -> Result<ItemResponse, RegistryError> {
    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
        let mut tx = pool.begin().await?;

        let extension = sqlx::query("SELECT scope, project_id FROM extension WHERE id = $1")
            .bind(item.extension_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(extension) = extension else {
            let _ = tx.rollback().await;
            return Err(RegistryError::NotFound("Extension not found."));
        };
        let scope: String = extension.get("scope");
        let project_id: Option<i64> = extension.get("project_id");

        let allocation = {
            let mut store = PgTypecodeStore::new(&mut *tx);
            allocator
                .calculate_typecode(&scope, project_id, &mut store)
                .await
        };
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(err) => {
                let _ = tx.rollback().await;
                return Err(RegistryError::Allocation(err));
            }
        };

        let insert = sqlx::query(
            r"
            INSERT INTO item (extension_id, name, table_name, typecode, allocation_domain)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(item.extension_id)
        .bind(item.name)
        .bind(item.table_name)
        .bind(allocation.typecode())
        .bind(allocation.domain().key())
        .fetch_one(&mut *tx)
        .await;

        let id: i64 = match insert {
            Ok(row) => row.get("id"),
            Err(err) => {
                let _ = tx.rollback().await;
                if is_unique_violation(&err) {
                    debug!(
                        attempt,
                        domain = %allocation.domain(),
                        typecode = allocation.typecode(),
                        "Typecode taken by a concurrent insert, recomputing"
                    );
                    continue;
                }
                if is_foreign_key_violation(&err) {
                    return Err(RegistryError::NotFound("Extension not found."));
                }
                return Err(RegistryError::Database(err));
            }
        };

        let created = fetch_item_with(&mut *tx, id)
            .await?
            .ok_or(RegistryError::NotFound("Item not found."))?;
        tx.commit().await?;

        debug!(
            item_id = id,
            domain = %allocation.domain(),
            typecode = allocation.typecode(),
            "Allocated typecode"
        );
        return Ok(created);
    }

    Err(RegistryError::Contention)
}

/// Renames an item. The typecode is never touched.
pub(super) async fn update_item(
    pool: &PgPool,
    id: i64,
    name: &str,
    table_name: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE item SET name = $2, table_name = $3 WHERE id = $1")
        .bind(id)
        .bind(name)
        .bind(table_name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn delete_item(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM item WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23503"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typecode::{AllocationDomain, PROJECT_RANGE};

    #[test]
    fn registry_errors_map_to_status_codes() {
        let cases = [
            (
                RegistryError::Allocation(AllocationError::InvalidInput("invalid scope")),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::Allocation(AllocationError::RangeExhausted {
                    domain: AllocationDomain::Project(1),
                    range: PROJECT_RANGE,
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RegistryError::Allocation(AllocationError::Unimplemented(Scope::Hybris)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                RegistryError::NotFound("Item not found."),
                StatusCode::NOT_FOUND,
            ),
            (RegistryError::Contention, StatusCode::SERVICE_UNAVAILABLE),
            (
                RegistryError::Database(sqlx::Error::PoolTimedOut),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let label = format!("{err:?}");
            assert_eq!(err.into_response().status(), status, "{label}");
        }
    }
}
