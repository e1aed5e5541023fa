//! File-backed data source: a tenancy captured as one JSON document.
//!
//! ```json
//! {
//!   "tenancy_id": "ocid1.tenancy.oc1..root",
//!   "compartments": [
//!     { "id": "ocid1.tenancy.oc1..root", "name": "acme", "parent_id": null, "lifecycle_state": "ACTIVE" },
//!     { "id": "ocid1.compartment.oc1..fin", "name": "Finance", "parent_id": "ocid1.tenancy.oc1..root", "lifecycle_state": "ACTIVE" }
//!   ],
//!   "policies": [
//!     { "name": "fin-admins", "id": "ocid1.policy.oc1..p1", "compartment_id": "ocid1.compartment.oc1..fin",
//!       "statements": ["allow group FinAdmins to manage all-resources in compartment Finance"] }
//!   ],
//!   "dynamic_groups": []
//! }
//! ```
//!
//! Listings are paginated with a configurable page size so callers exercise the
//! same continuation-token handling they need against the live service.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use super::{DynamicGroup, Page, Policy, PolicySource, SourceResult};
use crate::compartment::{CompartmentNode, LifecycleState};
use crate::error::SourceError;

/// Default number of items per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Serialized tenancy description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenancySnapshot {
    /// OCID of the root compartment.
    pub tenancy_id: String,
    /// Every compartment, root included.
    #[serde(default)]
    pub compartments: Vec<CompartmentNode>,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub dynamic_groups: Vec<DynamicGroup>,
}

impl TenancySnapshot {
    /// An empty tenancy whose root compartment is named `name`.
    pub fn new(tenancy_id: &str, name: &str) -> Self {
        Self {
            tenancy_id: tenancy_id.to_string(),
            compartments: vec![CompartmentNode::root(tenancy_id, name)],
            policies: Vec::new(),
            dynamic_groups: Vec::new(),
        }
    }

    pub fn with_compartment(mut self, node: CompartmentNode) -> Self {
        self.compartments.push(node);
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn with_dynamic_group(mut self, group: DynamicGroup) -> Self {
        self.dynamic_groups.push(group);
        self
    }

    /// Read a snapshot from a JSON file.
    pub fn load(path: &Path) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SourceError::SnapshotIo {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| SourceError::SnapshotParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Per-call counters, for run summaries and tests.
#[derive(Debug, Default)]
pub struct SourceStats {
    pub get_compartment: AtomicUsize,
    pub list_policies: AtomicUsize,
    pub list_compartments: AtomicUsize,
    pub list_dynamic_groups: AtomicUsize,
}

impl SourceStats {
    pub fn total(&self) -> usize {
        self.get_compartment.load(Ordering::Relaxed)
            + self.list_policies.load(Ordering::Relaxed)
            + self.list_compartments.load(Ordering::Relaxed)
            + self.list_dynamic_groups.load(Ordering::Relaxed)
    }
}

/// [`PolicySource`] over an in-memory [`TenancySnapshot`].
#[derive(Debug)]
pub struct SnapshotSource {
    snapshot: TenancySnapshot,
    page_size: usize,
    by_id: HashMap<String, usize>,
    children: HashMap<String, Vec<usize>>,
    policies_by_compartment: HashMap<String, Vec<usize>>,
    stats: SourceStats,
}

impl SnapshotSource {
    pub fn new(snapshot: TenancySnapshot) -> Self {
        let mut by_id = HashMap::new();
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, node) in snapshot.compartments.iter().enumerate() {
            by_id.insert(node.id.clone(), idx);
            if let Some(parent) = &node.parent_id {
                children.entry(parent.clone()).or_default().push(idx);
            }
        }
        let mut policies_by_compartment: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, policy) in snapshot.policies.iter().enumerate() {
            policies_by_compartment
                .entry(policy.compartment_id.clone())
                .or_default()
                .push(idx);
        }
        Self {
            snapshot,
            page_size: DEFAULT_PAGE_SIZE,
            by_id,
            children,
            policies_by_compartment,
            stats: SourceStats::default(),
        }
    }

    /// Load a snapshot file and serve it.
    pub fn open(path: &Path) -> SourceResult<Self> {
        Ok(Self::new(TenancySnapshot::load(path)?))
    }

    /// Override the listing page size (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn tenancy_id(&self) -> &str {
        &self.snapshot.tenancy_id
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    /// Breadth-first descendants of `root_id`, root excluded.
    fn descendants(&self, root_id: &str) -> Vec<&CompartmentNode> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut queue = VecDeque::from([root_id.to_string()]);
        while let Some(id) = queue.pop_front() {
            for &idx in self.children.get(&id).map(Vec::as_slice).unwrap_or(&[]) {
                let node = &self.snapshot.compartments[idx];
                if seen.insert(node.id.as_str()) {
                    out.push(node);
                    queue.push_back(node.id.clone());
                }
            }
        }
        out
    }

    fn paginate<T: Clone>(&self, items: &[T], page: Option<&str>) -> SourceResult<Page<T>> {
        let offset = match page {
            None => 0,
            Some(token) => token
                .strip_prefix("offset-")
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|&n| n <= items.len())
                .ok_or_else(|| SourceError::BadPageToken {
                    token: token.to_string(),
                })?,
        };
        let end = (offset + self.page_size).min(items.len());
        let next_page = (end < items.len()).then(|| format!("offset-{end}"));
        Ok(Page {
            items: items[offset..end].to_vec(),
            next_page,
        })
    }
}

impl PolicySource for SnapshotSource {
    fn get_compartment(&self, id: &str) -> SourceResult<CompartmentNode> {
        self.stats.get_compartment.fetch_add(1, Ordering::Relaxed);
        self.by_id
            .get(id)
            .map(|&idx| self.snapshot.compartments[idx].clone())
            .ok_or_else(|| SourceError::CompartmentNotFound { id: id.to_string() })
    }

    fn list_policies(&self, compartment_id: &str) -> SourceResult<Vec<Policy>> {
        self.stats.list_policies.fetch_add(1, Ordering::Relaxed);
        if !self.by_id.contains_key(compartment_id) {
            return Err(SourceError::CompartmentNotFound {
                id: compartment_id.to_string(),
            });
        }
        Ok(self
            .policies_by_compartment
            .get(compartment_id)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&idx| self.snapshot.policies[idx].clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_compartments(
        &self,
        root_id: &str,
        lifecycle_state: LifecycleState,
        page: Option<&str>,
    ) -> SourceResult<Page<CompartmentNode>> {
        self.stats.list_compartments.fetch_add(1, Ordering::Relaxed);
        if !self.by_id.contains_key(root_id) {
            return Err(SourceError::CompartmentNotFound {
                id: root_id.to_string(),
            });
        }
        let matching: Vec<CompartmentNode> = self
            .descendants(root_id)
            .into_iter()
            .filter(|node| node.lifecycle_state == lifecycle_state)
            .cloned()
            .collect();
        self.paginate(&matching, page)
    }

    fn list_dynamic_groups(
        &self,
        tenancy_id: &str,
        page: Option<&str>,
    ) -> SourceResult<Page<DynamicGroup>> {
        self.stats.list_dynamic_groups.fetch_add(1, Ordering::Relaxed);
        if tenancy_id != self.snapshot.tenancy_id {
            return Err(SourceError::CompartmentNotFound {
                id: tenancy_id.to_string(),
            });
        }
        self.paginate(&self.snapshot.dynamic_groups, page)
    }
}
