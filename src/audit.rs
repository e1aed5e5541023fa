//! Dynamic group usage audit.
//!
//! A dynamic group is unused when no dynamic-group statement mentions it. The
//! match is a case-insensitive substring test of the group's name (or OCID)
//! against each statement subject, so `dynamic-group 'Default'/'fn-dg'` and
//! `dynamic-group id ocid1.dynamicgroup...` both count as uses.

use crate::source::{DynamicGroup, PolicySource, SourceResult, list_all};
use crate::statement::PolicyStatement;

/// Fetch every dynamic group in the tenancy, following pagination.
pub fn fetch_dynamic_groups<S: PolicySource + ?Sized>(
    source: &S,
    tenancy_id: &str,
) -> SourceResult<Vec<DynamicGroup>> {
    let groups = list_all(|page| source.list_dynamic_groups(tenancy_id, page))?;
    tracing::info!(count = groups.len(), "loaded dynamic groups");
    Ok(groups)
}

/// Whether any statement subject references `group`.
pub fn is_referenced(group: &DynamicGroup, statements: &[PolicyStatement]) -> bool {
    let name = group.name.to_lowercase();
    let id = group.id.to_lowercase();
    statements.iter().any(|s| {
        let subject = s.subject.to_lowercase();
        (!name.is_empty() && subject.contains(&name)) || (!id.is_empty() && subject.contains(&id))
    })
}

/// Groups not referenced by any statement in `dynamic_group_bucket`.
///
/// Input order is preserved.
pub fn unused_dynamic_groups(
    groups: &[DynamicGroup],
    dynamic_group_bucket: &[PolicyStatement],
) -> Vec<DynamicGroup> {
    let unused: Vec<DynamicGroup> = groups
        .iter()
        .filter(|g| !is_referenced(g, dynamic_group_bucket))
        .cloned()
        .collect();
    tracing::info!(
        total = groups.len(),
        unused = unused.len(),
        "dynamic group audit complete"
    );
    unused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parsed, parse};
    use crate::source::{SnapshotSource, TenancySnapshot};
    use crate::statement::Lineage;

    fn group(id: &str, name: &str) -> DynamicGroup {
        DynamicGroup {
            id: id.into(),
            name: name.into(),
            matching_rule: "ALL {resource.type = 'fnfunc'}".into(),
        }
    }

    fn statement(raw: &str) -> PolicyStatement {
        match parse(raw, "") {
            Parsed::Statement(tuple) => PolicyStatement::new(
                tuple,
                Lineage {
                    compartment_path: String::new(),
                    policy_name: "p".into(),
                    policy_id: "ocid1.policy.oc1..p".into(),
                    policy_compartment_id: "ocid1.tenancy.oc1..t".into(),
                    raw_text: raw.into(),
                },
            ),
            Parsed::Special(_) => panic!("expected a grant: {raw}"),
        }
    }

    #[test]
    fn referenced_by_name_or_id() {
        let bucket = vec![
            statement("allow dynamic-group FnFuncs to use keys in tenancy"),
            statement("allow dynamic-group id ocid1.dynamicgroup.oc1..byid to read buckets in tenancy"),
        ];
        let groups = vec![
            group("ocid1.dynamicgroup.oc1..a", "fnfuncs"),
            group("ocid1.dynamicgroup.oc1..byid", "renamed"),
            group("ocid1.dynamicgroup.oc1..c", "Orphan"),
        ];
        let unused = unused_dynamic_groups(&groups, &bucket);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].name, "Orphan");
    }

    #[test]
    fn empty_bucket_means_all_unused() {
        let groups = vec![group("a", "one"), group("b", "two")];
        assert_eq!(unused_dynamic_groups(&groups, &[]), groups);
    }

    #[test]
    fn fetch_follows_pagination() {
        let mut snapshot = TenancySnapshot::new("root", "acme");
        for i in 0..7 {
            snapshot = snapshot.with_dynamic_group(group(&format!("dg{i}"), &format!("group-{i}")));
        }
        let source = SnapshotSource::new(snapshot).with_page_size(3);
        let groups = fetch_dynamic_groups(&source, "root").unwrap();
        assert_eq!(groups.len(), 7);
        assert_eq!(source.stats().list_dynamic_groups.load(std::sync::atomic::Ordering::Relaxed), 3);
    }
}
