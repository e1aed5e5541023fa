//! Compartment tree enumeration.
//!
//! A shallow walk yields the root alone; a recursive walk yields the root
//! followed by every `ACTIVE` compartment of the accessible subtree. Any
//! failure here is fatal for the run: a partial compartment list would
//! silently under-report policies.

use super::error::{CompartmentError, CompartmentResult};
use super::node::{CompartmentNode, LifecycleState};
use crate::source::{PolicySource, list_all};

/// Enumerates the compartments a collection run should visit.
#[derive(Debug)]
pub struct TreeWalker<'a, S: PolicySource + ?Sized> {
    source: &'a S,
}

impl<'a, S: PolicySource + ?Sized> TreeWalker<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// List the compartments under (and including) `root_id`.
    ///
    /// The root comes first. Pagination is exhausted before returning.
    pub fn enumerate(
        &self,
        root_id: &str,
        recursive: bool,
    ) -> CompartmentResult<Vec<CompartmentNode>> {
        let root = self
            .source
            .get_compartment(root_id)
            .map_err(|e| CompartmentError::RootUnavailable {
                id: root_id.to_string(),
                source: e,
            })?;

        if !recursive {
            tracing::info!(root = %root.name, "loaded 1 compartment, no recursion");
            return Ok(vec![root]);
        }

        let descendants = list_all(|page| {
            self.source
                .list_compartments(root_id, LifecycleState::Active, page)
        })
        .map_err(|e| CompartmentError::EnumerationFailed {
            root: root_id.to_string(),
            source: e,
        })?;

        let mut compartments = Vec::with_capacity(descendants.len() + 1);
        compartments.push(root);
        let mut dropped = 0usize;
        for node in descendants {
            if node.is_active() && node.id != root_id {
                compartments.push(node);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!(dropped, "ignored inactive or duplicate root compartments");
        }

        tracing::info!(
            count = compartments.len(),
            "loaded compartments using recursion"
        );
        Ok(compartments)
    }
}
