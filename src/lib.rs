//! # Typecode Registry
//!
//! `typecode-registry` keeps a registry of projects, extensions and items and
//! hands every new item a numeric typecode.
//!
//! ## Scopes and Allocation Domains
//!
//! Each extension has a scope that selects a reserved typecode range:
//!
//! - **Shared** `[20000, 2147483647]`: one domain for all shared extensions.
//! - **Project** `[14000, 19999]`: one domain per project, so two projects may
//!   hold the same code.
//! - **Hybris** `[0, 10000]`: reserved, allocation is rejected.
//!
//! A new item receives the lowest code of the range that its domain does not
//! use. Codes of deleted items are reused. Ranges can be overridden at startup.
//!
//! ## Concurrency
//!
//! Item creation computes the code and inserts in one transaction that holds
//! an advisory lock on the allocation domain, so requests for the same domain
//! are served one after another. Items also store their domain next to the
//! code under a unique constraint, and creation recomputes if that constraint
//! ever rejects a code.

pub mod cli;
pub mod registry;
pub mod typecode;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
