use std::fmt;

use super::{AllocationError, RangeRegistry, Scope, TypecodeRange, TypecodeStore};

/// Upper bound on allocate-then-insert attempts when concurrent writers keep
/// claiming the code that was just computed.
pub const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// Uniqueness boundary for typecodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationDomain {
    /// Every item whose extension is `Shared`, whatever the project.
    Shared,
    /// Items of `Project` extensions that reference this project.
    Project(i64),
}

impl AllocationDomain {
    /// Stable storage key, written next to the typecode and covered by the
    /// `(allocation_domain, typecode)` unique index.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AllocationDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Project(id) => write!(f, "project:{id}"),
        }
    }
}

/// A typecode together with the domain it is unique in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    domain: AllocationDomain,
    typecode: i32,
}

impl Allocation {
    #[must_use]
    pub const fn domain(&self) -> AllocationDomain {
        self.domain
    }

    #[must_use]
    pub const fn typecode(&self) -> i32 {
        self.typecode
    }
}

/// Computes the lowest free typecode of an allocation domain.
///
/// The allocator only reads. Callers insert the item themselves and must treat
/// a uniqueness violation on insert as a lost race, recomputing at most
/// [`MAX_ALLOCATION_ATTEMPTS`] times.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypecodeAllocator {
    ranges: RangeRegistry,
}

impl TypecodeAllocator {
    #[must_use]
    pub const fn new(ranges: RangeRegistry) -> Self {
        Self { ranges }
    }

    #[must_use]
    pub const fn ranges(&self) -> &RangeRegistry {
        &self.ranges
    }

    /// Lowest free code of `range` in the shared domain.
    ///
    /// # Errors
    /// [`AllocationError::RangeExhausted`] when every code is used, or the store error.
    pub async fn allocate_shared<S>(
        &self,
        store: &mut S,
        range: TypecodeRange,
    ) -> Result<Allocation, AllocationError>
    where
        S: TypecodeStore + Send,
    {
        allocate(store, AllocationDomain::Shared, range).await
    }

    /// Lowest free code of `range` among the items of `project_id`.
    ///
    /// # Errors
    /// [`AllocationError::InvalidInput`] for a non-positive project id,
    /// [`AllocationError::RangeExhausted`] when every code is used, or the store error.
    pub async fn allocate_project<S>(
        &self,
        store: &mut S,
        project_id: i64,
        range: TypecodeRange,
    ) -> Result<Allocation, AllocationError>
    where
        S: TypecodeStore + Send,
    {
        if project_id < 1 {
            return Err(AllocationError::InvalidInput("invalid project reference"));
        }
        allocate(store, AllocationDomain::Project(project_id), range).await
    }

    /// Dispatches on the extension scope and allocates from the configured range.
    ///
    /// # Errors
    /// * `InvalidInput("scope required")` for an empty scope
    /// * `InvalidInput("invalid scope")` for an unknown scope
    /// * `InvalidInput` when the project reference does not match the scope
    /// * `Unimplemented(Hybris)` for the reserved scope
    /// * `RangeExhausted` or `Store` from the selected strategy
    pub async fn calculate_typecode<S>(
        &self,
        scope: &str,
        project_ref: Option<i64>,
        store: &mut S,
    ) -> Result<Allocation, AllocationError>
    where
        S: TypecodeStore + Send,
    {
        let scope = scope.trim();
        if scope.is_empty() {
            return Err(AllocationError::InvalidInput("scope required"));
        }

        let scope: Scope = scope
            .parse()
            .map_err(|_| AllocationError::InvalidInput("invalid scope"))?;

        match scope {
            Scope::Shared => {
                if project_ref.is_some() {
                    return Err(AllocationError::InvalidInput(
                        "shared scope cannot reference a project",
                    ));
                }
                self.allocate_shared(store, self.ranges.shared()).await
            }
            Scope::Project => {
                let project_id = project_ref
                    .ok_or(AllocationError::InvalidInput("project reference required"))?;
                self.allocate_project(store, project_id, self.ranges.project())
                    .await
            }
            Scope::Hybris => Err(AllocationError::Unimplemented(Scope::Hybris)),
        }
    }
}

async fn allocate<S>(
    store: &mut S,
    domain: AllocationDomain,
    range: TypecodeRange,
) -> Result<Allocation, AllocationError>
where
    S: TypecodeStore + Send,
{
    match store.lowest_unused(domain, range).await? {
        Some(typecode) if range.contains(typecode) => Ok(Allocation { domain, typecode }),
        Some(code) => Err(AllocationError::OutOfRange {
            domain,
            range,
            code,
        }),
        None => Err(AllocationError::RangeExhausted { domain, range }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typecode::{memory::MemoryStore, INVALID_TYPECODE, PROJECT_RANGE, SHARED_RANGE};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn range(start: i32, end: i32) -> TypecodeRange {
        TypecodeRange::new(start, end).unwrap()
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn domain_keys() {
        assert_eq!(AllocationDomain::Shared.key(), "shared");
        assert_eq!(AllocationDomain::Project(42).key(), "project:42");
    }

    #[tokio::test]
    async fn shared_fresh_domain_starts_at_range_start() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::default();
        let allocation = allocator
            .calculate_typecode("Shared", None, &mut store)
            .await
            .unwrap();
        assert_eq!(allocation.typecode(), 20_000);
        assert_eq!(allocation.domain(), AllocationDomain::Shared);
    }

    #[tokio::test]
    async fn shared_one_used() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::with_used(AllocationDomain::Shared, [20_000]);
        let allocation = allocator
            .calculate_typecode("Shared", None, &mut store)
            .await
            .unwrap();
        assert_eq!(allocation.typecode(), 20_001);
    }

    #[tokio::test]
    async fn shared_exhausted_at_top_of_range() {
        let top = range(i32::MAX - 1, i32::MAX);
        let ranges = RangeRegistry::new(top, PROJECT_RANGE, range(0, 10_000)).unwrap();
        let allocator = TypecodeAllocator::new(ranges);
        let mut store =
            MemoryStore::with_used(AllocationDomain::Shared, [i32::MAX - 1, i32::MAX]);

        let err = allocator
            .calculate_typecode("Shared", None, &mut store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::RangeExhausted {
                domain: AllocationDomain::Shared,
                range: r,
            } if r == top
        ));
        assert_eq!(err.typecode(), INVALID_TYPECODE);
    }

    #[tokio::test]
    async fn shared_reuses_gap_below_lowest_used() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::with_used(AllocationDomain::Shared, [i32::MAX]);
        let allocation = allocator
            .allocate_shared(&mut store, SHARED_RANGE)
            .await
            .unwrap();
        assert_eq!(allocation.typecode(), 20_000);
    }

    #[tokio::test]
    async fn project_gap_in_middle() {
        let allocator = TypecodeAllocator::default();
        let mut store =
            MemoryStore::with_used(AllocationDomain::Project(7), [14_000, 14_001, 14_003]);
        let allocation = allocator
            .calculate_typecode("Project", Some(7), &mut store)
            .await
            .unwrap();
        assert_eq!(allocation.typecode(), 14_002);
        assert_eq!(allocation.domain(), AllocationDomain::Project(7));
    }

    #[tokio::test]
    async fn project_full_range_is_exhausted() {
        let narrow = range(14_000, 14_002);
        let allocator = TypecodeAllocator::default();
        let mut store =
            MemoryStore::with_used(AllocationDomain::Project(1), [14_000, 14_001, 14_002]);
        let err = allocator
            .allocate_project(&mut store, 1, narrow)
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::RangeExhausted { .. }));
    }

    #[tokio::test]
    async fn invalid_scope() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::default();
        let err = allocator
            .calculate_typecode("Bogus", None, &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidInput("invalid scope")));
        assert_eq!(err.typecode(), INVALID_TYPECODE);
    }

    #[tokio::test]
    async fn empty_scope_is_required() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::default();
        for scope in ["", "   "] {
            let err = allocator
                .calculate_typecode(scope, None, &mut store)
                .await
                .unwrap_err();
            assert!(matches!(err, AllocationError::InvalidInput("scope required")));
        }
    }

    #[tokio::test]
    async fn scope_is_case_insensitive() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::default();
        let allocation = allocator
            .calculate_typecode("project", Some(3), &mut store)
            .await
            .unwrap();
        assert_eq!(allocation.typecode(), 14_000);
    }

    #[tokio::test]
    async fn project_reference_must_match_scope() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::default();

        let err = allocator
            .calculate_typecode("Project", None, &mut store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InvalidInput("project reference required")
        ));

        let err = allocator
            .calculate_typecode("Shared", Some(1), &mut store)
            .await
            .unwrap_err();
        assert!(err.is_invalid_input());

        let err = allocator
            .calculate_typecode("Project", Some(0), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InvalidInput("invalid project reference")
        ));
    }

    #[tokio::test]
    async fn hybris_is_unimplemented() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::default();
        let err = allocator
            .calculate_typecode("Hybris", None, &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::Unimplemented(Scope::Hybris)));
        assert!(!err.is_invalid_input());
    }

    #[tokio::test]
    async fn store_errors_propagate_unchanged() {
        let allocator = TypecodeAllocator::default();
        let mut store = MemoryStore::default();
        store.fail_next();
        let err = allocator
            .calculate_typecode("Shared", None, &mut store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Store(sqlx::Error::PoolTimedOut)
        ));

        // the failure is one-shot
        assert!(allocator
            .calculate_typecode("Shared", None, &mut store)
            .await
            .is_ok());
    }

    #[test]
    fn out_of_range_answers_are_rejected() {
        struct Liar;

        impl TypecodeStore for Liar {
            async fn lowest_unused(
                &mut self,
                _domain: AllocationDomain,
                range: TypecodeRange,
            ) -> Result<Option<i32>, sqlx::Error> {
                Ok(Some(range.end().wrapping_add(1)))
            }
        }

        let allocator = TypecodeAllocator::default();
        let err = block_on(allocator.allocate_project(&mut Liar, 1, PROJECT_RANGE)).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::OutOfRange { code: 20_000, .. }
        ));
    }

    proptest! {
        #[test]
        fn allocation_is_minimal_unused(
            used in proptest::collection::btree_set(14_000i32..14_040, 0..40),
        ) {
            let narrow = range(14_000, 14_039);
            let allocator = TypecodeAllocator::default();
            let mut store = MemoryStore::with_used(AllocationDomain::Project(1), used.iter().copied());
            let result = block_on(allocator.allocate_project(&mut store, 1, narrow));
            match (narrow.start()..=narrow.end()).find(|code| !used.contains(code)) {
                Some(expected) => prop_assert_eq!(result.unwrap().typecode(), expected),
                None => {
                    let exhausted = matches!(result, Err(AllocationError::RangeExhausted { .. }));
                    prop_assert!(exhausted);
                }
            }
        }

        #[test]
        fn projects_are_isolated(
            first in 1i64..1_000,
            offset in 1i64..1_000,
            used in proptest::collection::btree_set(14_000i32..14_100, 0..50),
        ) {
            let second = first + offset;
            let allocator = TypecodeAllocator::default();
            let mut store = MemoryStore::with_used(AllocationDomain::Project(first), used.iter().copied());

            // the second project does not see the first project's codes
            let allocation = block_on(allocator.calculate_typecode("Project", Some(second), &mut store)).unwrap();
            prop_assert_eq!(allocation.typecode(), 14_000);

            let allocation = block_on(allocator.calculate_typecode("Project", Some(first), &mut store)).unwrap();
            prop_assert!(!used.contains(&allocation.typecode()));
        }

        #[test]
        fn scopes_never_collide(
            shared in proptest::collection::btree_set(20_000i32..20_050, 0..20),
            project in proptest::collection::btree_set(14_000i32..14_050, 0..20),
            project_id in 1i64..100,
        ) {
            let allocator = TypecodeAllocator::default();
            let store = MemoryStore::with_used(AllocationDomain::Shared, shared.iter().copied());
            store.extend(AllocationDomain::Project(project_id), project.iter().copied());

            let mut codes = BTreeSet::new();
            for _ in 0..5 {
                let mut handle = store.clone();
                let shared = block_on(allocator.calculate_typecode("Shared", None, &mut handle)).unwrap();
                prop_assert!(store.claim(shared.domain(), shared.typecode()));
                let project = block_on(allocator.calculate_typecode("Project", Some(project_id), &mut handle)).unwrap();
                prop_assert!(store.claim(project.domain(), project.typecode()));
                prop_assert!(SHARED_RANGE.contains(shared.typecode()));
                prop_assert!(PROJECT_RANGE.contains(project.typecode()));
                prop_assert!(codes.insert(shared.typecode()));
                prop_assert!(codes.insert(project.typecode()));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_are_distinct_and_dense() {
        const TASKS: usize = 32;

        let allocator = TypecodeAllocator::default();
        let preused = [14_000, 14_002, 14_005];
        let store = MemoryStore::with_used(AllocationDomain::Project(9), preused);
        // stands in for the per-domain advisory lock held until commit
        let domain_lock = std::sync::Arc::new(tokio::sync::Mutex::new(()));

        let mut handles = Vec::with_capacity(TASKS);
        for _ in 0..TASKS {
            let mut store = store.clone();
            let domain_lock = domain_lock.clone();
            handles.push(tokio::spawn(async move {
                let _guard = domain_lock.lock().await;
                for _ in 0..MAX_ALLOCATION_ATTEMPTS {
                    let allocation = allocator
                        .calculate_typecode("Project", Some(9), &mut store)
                        .await?;
                    if store.claim(allocation.domain(), allocation.typecode()) {
                        return Ok::<_, AllocationError>(Some(allocation.typecode()));
                    }
                }
                Ok(None)
            }));
        }

        let mut codes = Vec::with_capacity(TASKS);
        for handle in handles {
            let code = handle.await.unwrap().unwrap();
            codes.push(code.expect("allocated within the attempt budget"));
        }
        codes.sort_unstable();

        let expected: Vec<i32> = (14_000..)
            .filter(|code| !preused.contains(code))
            .take(TASKS)
            .collect();
        assert_eq!(codes, expected);
    }
}
