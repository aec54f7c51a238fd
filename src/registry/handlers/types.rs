//! Request/response types for the registry API.
//!
//! Every response body is wrapped in a named envelope (`{"project": ..}`,
//! `{"items": [..]}`) and these payloads are shared with `OpenAPI` generation.
//! Request fields default to empty so that missing values are reported by the
//! handlers as `400` with a specific message.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateProjectRequest {
    /// Empty or missing keeps the current name.
    pub name: Option<String>,
    /// Replaces the current description; missing clears it.
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateExtensionRequest {
    pub name: String,
    /// `Shared`, `Project` or `Hybris`, case-insensitive.
    pub scope: String,
    pub description: Option<String>,
    /// Required for `Project` scope, rejected otherwise.
    pub project_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateExtensionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateItemRequest {
    pub name: String,
    pub table_name: String,
    pub extension_id: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateItemRequest {
    /// When present it must match the id in the path.
    pub id: Option<i64>,
    pub name: String,
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub creation_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExtensionResponse {
    pub id: i64,
    pub project_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub scope: String,
    pub creation_date: String,
    pub item_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub id: i64,
    pub scope: String,
    /// Project name, or `-` for items of extensions without a project.
    pub project: String,
    pub name: String,
    pub table_name: String,
    pub extension_id: i64,
    pub typecode: i32,
    pub creation_date: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectsEnvelope {
    pub projects: Vec<ProjectResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProjectEnvelope {
    pub project: ProjectResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtensionsEnvelope {
    pub extensions: Vec<ExtensionResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtensionEnvelope {
    pub extension: ExtensionResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemsEnvelope {
    pub items: Vec<ItemResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemEnvelope {
    pub item: ItemResponse,
}
