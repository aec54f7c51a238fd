//! Typecode allocation.
//!
//! Every item receives a typecode that is unique inside its allocation domain:
//! the shared domain for `Shared` extensions, or one domain per project for
//! `Project` extensions. The allocator returns the lowest code of the scope's
//! range that the domain does not use yet, reusing gaps left by deleted items.
//!
//! The allocator only reads through a [`TypecodeStore`]. Uniqueness under
//! concurrent writers is enforced by the storage layer, see
//! [`MAX_ALLOCATION_ATTEMPTS`].

mod allocator;
mod error;
mod postgres;
mod range;
mod scope;
mod store;

#[cfg(test)]
pub(crate) mod memory;
#[cfg(test)]
pub(crate) use self::range::lowest_unused;

pub use self::{
    allocator::{Allocation, AllocationDomain, TypecodeAllocator, MAX_ALLOCATION_ATTEMPTS},
    error::{AllocationError, INVALID_TYPECODE},
    postgres::PgTypecodeStore,
    range::{RangeError, RangeRegistry, TypecodeRange, HYBRIS_RANGE, PROJECT_RANGE, SHARED_RANGE},
    scope::{ParseScopeError, Scope},
    store::TypecodeStore,
};
