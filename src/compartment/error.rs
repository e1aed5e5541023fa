//! Compartment-specific error types with rich diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use crate::error::SourceError;

/// Errors arising from walking the compartment tree.
#[derive(Debug, Error, Diagnostic)]
pub enum CompartmentError {
    #[error("cannot resolve tenancy root {id}")]
    #[diagnostic(
        code(lens::compartment::root_unavailable),
        help(
            "The root compartment could not be fetched. This is a setup problem, \
             not an empty tenancy: check the tenancy OCID and the credentials \
             used by the data source."
        )
    )]
    RootUnavailable {
        id: String,
        #[source]
        source: SourceError,
    },

    #[error("failed to enumerate compartments under {root}")]
    #[diagnostic(
        code(lens::compartment::enumeration),
        help(
            "Listing the compartment subtree failed part-way. No partial result \
             is returned; rerun once the data source is reachable, or drop \
             `--recurse` to analyze root-level policies only."
        )
    )]
    EnumerationFailed {
        root: String,
        #[source]
        source: SourceError,
    },

    #[error("cycle in compartment parents at {id}")]
    #[diagnostic(
        code(lens::compartment::cycle),
        help("The data source returned a parent chain that loops back on itself.")
    )]
    ParentCycle { id: String },

    #[error("compartment {id} is nested deeper than {max_depth} levels")]
    #[diagnostic(
        code(lens::compartment::depth_exceeded),
        help("The parent chain is implausibly long; the data source is likely inconsistent.")
    )]
    DepthExceeded { id: String, max_depth: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),
}

/// Result type for compartment operations.
pub type CompartmentResult<T> = Result<T, CompartmentError>;
