//! Allocation scopes.
//!
//! A scope names the namespace an extension draws typecodes from. The set is
//! closed: every variant maps either to a working allocation strategy or to an
//! explicit unsupported error in the allocator.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Scope {
    /// One allocation domain shared by every extension with this scope.
    Shared,
    /// One allocation domain per project.
    Project,
    /// Reserved range; allocation is not supported.
    Hybris,
}

impl Scope {
    pub const ALL: [Self; 3] = [Self::Shared, Self::Project, Self::Hybris];

    /// Canonical spelling, as stored in `extension.scope`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "Shared",
            Self::Project => "Project",
            Self::Hybris => "Hybris",
        }
    }

    /// Whether extensions of this scope must reference a project.
    #[must_use]
    pub const fn requires_project(self) -> bool {
        matches!(self, Self::Project)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scope: {0:?}")]
pub struct ParseScopeError(String);

impl FromStr for Scope {
    type Err = ParseScopeError;

    /// Parses a scope name, ignoring ASCII case and surrounding whitespace.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseScopeError(value.to_string()))
    }
}
