//! Rich diagnostic error types for policy-lens.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so operators know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::compartment::CompartmentError;
use crate::config::ConfigError;
use crate::paths::PathError;
use crate::statement::BucketKind;

/// Top-level error type for policy-lens.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum LensError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compartment(#[from] CompartmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Paths(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Data source errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("compartment not found: {id}")]
    #[diagnostic(
        code(lens::source::compartment_not_found),
        help(
            "The data source has no compartment with this id. \
             Check the tenancy OCID, or that the caller can see the compartment."
        )
    )]
    CompartmentNotFound { id: String },

    #[error("data source unavailable: {message}")]
    #[diagnostic(
        code(lens::source::unavailable),
        help(
            "The remote call failed. Transient failures for a single compartment \
             are skipped; retry the run if the whole source is unreachable."
        )
    )]
    Unavailable { message: String },

    #[error("unknown page token: {token}")]
    #[diagnostic(
        code(lens::source::bad_page),
        help("Page tokens are opaque. Only pass tokens returned by a previous page.")
    )]
    BadPageToken { token: String },

    #[error("failed to read snapshot {path}")]
    #[diagnostic(
        code(lens::source::snapshot_io),
        help("Check that the snapshot file exists and is readable.")
    )]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot {path}: {message}")]
    #[diagnostic(
        code(lens::source::snapshot_parse),
        help(
            "The snapshot must be a JSON document with `tenancy_id`, \
             `compartments`, `policies` and optionally `dynamic_groups`."
        )
    )]
    SnapshotParse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Collector errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CollectError {
    #[error("invalid worker count: {workers}")]
    #[diagnostic(
        code(lens::collect::workers),
        help("The worker pool needs at least one thread. Pass `--threads 1` or more.")
    )]
    InvalidWorkerCount { workers: usize },

    #[error("failed to build worker pool: {message}")]
    #[diagnostic(
        code(lens::collect::pool),
        help("The OS refused to spawn worker threads. Lower `--threads` and retry.")
    )]
    ThreadPool { message: String },
}

// ---------------------------------------------------------------------------
// Cache errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(lens::cache::io),
        help(
            "A filesystem operation failed. Check that the cache directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(lens::cache::redb),
        help(
            "The embedded cache database encountered a transaction error. \
             Delete the cache directory and run a live collection to rebuild it."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(lens::cache::serde),
        help("Failed to serialize a bucket. This is a bug; please report it.")
    )]
    Serialization { message: String },

    #[error("no cached {kind} bucket for tenancy {tenant}")]
    #[diagnostic(
        code(lens::cache::bucket_unavailable),
        help(
            "The cache has no usable copy of this bucket. \
             Run `policy-lens analyze` without --usecache to populate it."
        )
    )]
    BucketUnavailable { kind: BucketKind, tenant: String },
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    #[error("failed to write report {path}")]
    #[diagnostic(
        code(lens::report::write),
        help("Ensure the output directory exists and you have write permissions.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {message}")]
    #[diagnostic(code(lens::report::serde))]
    Serialization { message: String },
}

/// Convenience alias for functions returning policy-lens results.
pub type LensResult<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_converts_to_lens_error() {
        let err = SourceError::CompartmentNotFound {
            id: "ocid1.compartment.oc1..x".into(),
        };
        let lens: LensError = err.into();
        assert!(matches!(
            lens,
            LensError::Source(SourceError::CompartmentNotFound { .. })
        ));
    }

    #[test]
    fn cache_error_converts_to_lens_error() {
        let err = CacheError::Redb {
            message: "commit failed".into(),
        };
        let lens: LensError = err.into();
        assert!(matches!(lens, LensError::Cache(CacheError::Redb { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = CollectError::InvalidWorkerCount { workers: 0 };
        let msg = format!("{err}");
        assert!(msg.contains("worker count"));
        assert!(msg.contains('0'));
    }
}
