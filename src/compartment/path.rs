//! Ancestry path resolution: `"Apps/Team1/Dev"` for a compartment node.
//!
//! Paths are built by following parent links up to the tenancy root, one
//! remote read per ancestor. The root contributes no name, so a compartment
//! directly under the tenancy has a single-segment path and the root itself
//! has the empty path.
//!
//! Resolved paths are memoized by compartment id for the lifetime of the
//! resolver (one collection run). The memo is a concurrent map so workers can
//! share it; two workers racing on the same ancestor both fetch it and write
//! the same value.

use std::collections::HashSet;

use dashmap::DashMap;

use super::error::{CompartmentError, CompartmentResult};
use super::node::CompartmentNode;
use crate::source::PolicySource;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Parent chains longer than this are treated as corrupt data.
pub const MAX_DEPTH: usize = 64;

/// Resolves and memoizes compartment ancestry paths.
pub struct PathResolver<'a, S: PolicySource + ?Sized> {
    source: &'a S,
    memo: DashMap<String, String>,
}

impl<S: PolicySource + ?Sized> std::fmt::Debug for PathResolver<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathResolver")
            .field("memoized", &self.memo.len())
            .finish()
    }
}

impl<'a, S: PolicySource + ?Sized> PathResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            memo: DashMap::new(),
        }
    }

    /// Full ancestry path of `node`, root-to-leaf, without leading or trailing
    /// separators.
    pub fn resolve(&self, node: &CompartmentNode) -> CompartmentResult<String> {
        if node.is_root() {
            return Ok(String::new());
        }
        if let Some(known) = self.memo.get(&node.id) {
            return Ok(known.value().clone());
        }

        // Walk up until the root or an ancestor whose path is already known.
        let mut chain = vec![(node.id.clone(), node.name.clone())];
        let mut visited = HashSet::from([node.id.clone()]);
        let mut base = String::new();
        let mut parent_id = node.parent_id.clone();

        while let Some(pid) = parent_id {
            if let Some(known) = self.memo.get(&pid) {
                base = known.value().clone();
                break;
            }
            if !visited.insert(pid.clone()) {
                return Err(CompartmentError::ParentCycle { id: pid });
            }
            if chain.len() > MAX_DEPTH {
                return Err(CompartmentError::DepthExceeded {
                    id: node.id.clone(),
                    max_depth: MAX_DEPTH,
                });
            }

            let parent = self.source.get_compartment(&pid)?;
            tracing::debug!(
                compartment = %parent.name,
                id = %parent.id,
                "fetched ancestor"
            );
            if parent.is_root() {
                self.memo.insert(parent.id, String::new());
                break;
            }
            chain.push((parent.id, parent.name));
            parent_id = parent.parent_id;
        }

        let mut path = base;
        for (id, name) in chain.into_iter().rev() {
            if !path.is_empty() {
                path.push(PATH_SEPARATOR);
            }
            path.push_str(&name);
            self.memo.insert(id, path.clone());
        }
        Ok(path)
    }

    /// Number of memoized paths.
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }
}
