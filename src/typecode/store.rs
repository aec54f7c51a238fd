use std::future::Future;

use super::{AllocationDomain, TypecodeRange};

/// Read side of the persisted used-code set.
///
/// Implementations answer a single question per domain: which is the smallest
/// code of `range` that no item of `domain` holds. Both the shared and the
/// per-project strategies are expressed through it, so a store only needs one
/// query shape.
pub trait TypecodeStore {
    /// Returns `Ok(None)` when every code of `range` is taken in `domain`.
    fn lowest_unused(
        &mut self,
        domain: AllocationDomain,
        range: TypecodeRange,
    ) -> impl Future<Output = Result<Option<i32>, sqlx::Error>> + Send;
}
