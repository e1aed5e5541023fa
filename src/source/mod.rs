//! The remote data source: compartments, policies and dynamic groups.
//!
//! The network client that talks to the cloud provider is an external
//! collaborator; this module only fixes the shape of the data it returns and
//! the calls the analyzer needs. [`SnapshotSource`] serves a tenancy described
//! by a JSON document through the same interface.

pub mod snapshot;

use serde::{Deserialize, Serialize};

use crate::compartment::{CompartmentNode, LifecycleState};
use crate::error::SourceError;

pub use snapshot::{SnapshotSource, SourceStats, TenancySnapshot};

/// Result type for data source calls.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// A named policy attached to a compartment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub id: String,
    /// The compartment the policy is attached to.
    pub compartment_id: String,
    /// Raw statement lines, as authored.
    #[serde(default)]
    pub statements: Vec<String>,
}

/// A dynamic group: a set of resources matched by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub matching_rule: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` on the last page.
    pub next_page: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }
}

/// Read-only access to a tenancy's identity data.
///
/// Implementations are shared across collector workers, so they must be
/// `Sync`. Retries and backoff belong to the implementation, not the caller.
pub trait PolicySource: Send + Sync {
    /// Fetch a single compartment by OCID.
    fn get_compartment(&self, id: &str) -> SourceResult<CompartmentNode>;

    /// All policies attached directly to a compartment (possibly none).
    fn list_policies(&self, compartment_id: &str) -> SourceResult<Vec<Policy>>;

    /// One page of the compartments below `root_id` (the root itself excluded),
    /// restricted to the given lifecycle state.
    fn list_compartments(
        &self,
        root_id: &str,
        lifecycle_state: LifecycleState,
        page: Option<&str>,
    ) -> SourceResult<Page<CompartmentNode>>;

    /// One page of the tenancy's dynamic groups.
    fn list_dynamic_groups(
        &self,
        tenancy_id: &str,
        page: Option<&str>,
    ) -> SourceResult<Page<DynamicGroup>>;
}

/// Follow continuation tokens until the listing is exhausted.
///
/// A token seen twice is reported as [`SourceError::BadPageToken`] rather than
/// looping forever.
pub fn list_all<T, F>(mut fetch: F) -> SourceResult<Vec<T>>
where
    F: FnMut(Option<&str>) -> SourceResult<Page<T>>,
{
    let mut items = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut token: Option<String> = None;
    loop {
        let page = fetch(token.as_deref())?;
        items.extend(page.items);
        match page.next_page {
            Some(next) => {
                if !seen.insert(next.clone()) {
                    return Err(SourceError::BadPageToken { token: next });
                }
                token = Some(next);
            }
            None => return Ok(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_all_follows_tokens() {
        let pages = vec![
            Page {
                items: vec![1, 2],
                next_page: Some("a".to_string()),
            },
            Page {
                items: vec![3],
                next_page: Some("b".to_string()),
            },
            Page::last(vec![4, 5]),
        ];
        let mut calls = Vec::new();
        let all = list_all(|token| {
            calls.push(token.map(str::to_string));
            Ok(pages[calls.len() - 1].clone())
        })
        .unwrap();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls, vec![None, Some("a".into()), Some("b".into())]);
    }

    #[test]
    fn list_all_rejects_repeated_token() {
        let result: SourceResult<Vec<u8>> = list_all(|_| {
            Ok(Page {
                items: vec![1],
                next_page: Some("same".to_string()),
            })
        });
        assert!(matches!(result, Err(SourceError::BadPageToken { .. })));
    }

    #[test]
    fn list_all_propagates_errors() {
        let result: SourceResult<Vec<u8>> = list_all(|_| {
            Err(SourceError::Unavailable {
                message: "503".into(),
            })
        });
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
    }
}
