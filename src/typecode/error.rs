use super::{AllocationDomain, Scope, TypecodeRange};

/// Numeric placeholder for "no typecode". Never carried by a successful allocation.
pub const INVALID_TYPECODE: i32 = -1;

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    /// Caller-correctable input problem, never retried.
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("typecode range {range} exhausted for {domain}")]
    RangeExhausted {
        domain: AllocationDomain,
        range: TypecodeRange,
    },
    #[error("typecode allocation for scope {0} is not implemented")]
    Unimplemented(Scope),
    /// The store answered with a code outside the requested range.
    #[error("store returned typecode {code} outside {range} for {domain}")]
    OutOfRange {
        domain: AllocationDomain,
        range: TypecodeRange,
        code: i32,
    },
    #[error("typecode store failure: {0}")]
    Store(#[from] sqlx::Error),
}

impl AllocationError {
    /// The numeric code that accompanies a failed allocation.
    #[must_use]
    pub const fn typecode(&self) -> i32 {
        INVALID_TYPECODE
    }

    /// Whether the caller can fix the request and try again.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
