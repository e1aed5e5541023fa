// The error enums in error.rs, config.rs, paths.rs and compartment/error.rs
// have struct-variant fields read only from #[error("...{field}...")], which
// the unused_assignments lint misreports through the derive.
#![allow(unused_assignments)]

//! # policy-lens
//!
//! Inventories every access-control policy statement in a tenancy's
//! compartment tree, classifies each one, and answers filter queries over the
//! result.
//!
//! ## Architecture
//!
//! - **Parser** (`parser`): positional decomposition of
//!   `allow <subject> to <verb> <resource> in <location> [where <condition>]`
//! - **Compartments** (`compartment`): tree enumeration and memoized
//!   ancestry-path resolution
//! - **Collector** (`collector`): bounded rayon pool, four mutex-guarded
//!   buckets, channel-fed progress
//! - **Cache** (`cache`): per-bucket JSON blobs behind a key-value backend
//!   (files, redb or memory)
//! - **Query** (`query`, `report`): conjunctive substring filters and JSON export
//! - **Audit** (`audit`): dynamic groups no statement references
//!
//! ## Library usage
//!
//! ```no_run
//! use policy_lens::analyzer::{AnalyzeOptions, Analyzer};
//! use policy_lens::cache::CacheStore;
//! use policy_lens::query::{StatementFilter, filter};
//! use policy_lens::source::SnapshotSource;
//!
//! let source = SnapshotSource::open(std::path::Path::new("tenancy.json")).unwrap();
//! let cache = CacheStore::in_memory();
//! let options = AnalyzeOptions {
//!     tenancy_id: source.tenancy_id().to_string(),
//!     recursive: true,
//!     use_cache: false,
//!     workers: 5,
//! };
//! let analysis = Analyzer::new(options, Some(&source), &cache)
//!     .analyze(|_| {})
//!     .unwrap();
//! let admins = filter(&analysis.results, &StatementFilter::new().subject("admins"));
//! println!("{}", admins.counts());
//! ```

pub mod analyzer;
pub mod audit;
pub mod cache;
pub mod collector;
pub mod compartment;
pub mod config;
pub mod error;
pub mod parser;
pub mod paths;
pub mod query;
pub mod report;
pub mod source;
pub mod statement;
