//! Filtering a [`ResultSet`] down to what the user asked to see.
//!
//! Field filters are case-insensitive substring matches, combined with AND.
//! An empty filter matches everything. Special statements have no fields, so
//! they can only be shown or hidden as a whole.

use serde::{Deserialize, Serialize};

use crate::statement::{BucketKind, PolicyStatement, ResultSet};

/// A filtered copy of a [`ResultSet`]. The source set is never modified.
pub type FilteredView = ResultSet;

/// Which buckets appear in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketToggles {
    pub special: bool,
    pub dynamic_group: bool,
    pub service: bool,
    pub regular: bool,
}

impl Default for BucketToggles {
    fn default() -> Self {
        Self {
            special: true,
            dynamic_group: true,
            service: true,
            regular: true,
        }
    }
}

impl BucketToggles {
    pub fn shows(&self, kind: BucketKind) -> bool {
        match kind {
            BucketKind::Special => self.special,
            BucketKind::DynamicGroup => self.dynamic_group,
            BucketKind::Service => self.service,
            BucketKind::Regular => self.regular,
        }
    }
}

/// Substring filters over statement fields plus bucket visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementFilter {
    pub subject: Option<String>,
    pub verb: Option<String>,
    pub resource: Option<String>,
    pub location: Option<String>,
    pub condition: Option<String>,
    /// Matched against the lineage's compartment path.
    pub hierarchy: Option<String>,
    #[serde(default)]
    pub show: BucketToggles,
}

impl StatementFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, needle: impl Into<String>) -> Self {
        self.subject = Some(needle.into());
        self
    }

    pub fn verb(mut self, needle: impl Into<String>) -> Self {
        self.verb = Some(needle.into());
        self
    }

    pub fn resource(mut self, needle: impl Into<String>) -> Self {
        self.resource = Some(needle.into());
        self
    }

    pub fn location(mut self, needle: impl Into<String>) -> Self {
        self.location = Some(needle.into());
        self
    }

    pub fn condition(mut self, needle: impl Into<String>) -> Self {
        self.condition = Some(needle.into());
        self
    }

    pub fn hierarchy(mut self, needle: impl Into<String>) -> Self {
        self.hierarchy = Some(needle.into());
        self
    }

    pub fn with_toggles(mut self, show: BucketToggles) -> Self {
        self.show = show;
        self
    }

    /// Whether `statement` passes every field filter.
    pub fn matches(&self, statement: &PolicyStatement) -> bool {
        contains(&statement.subject, self.subject.as_deref())
            && contains(&statement.verb, self.verb.as_deref())
            && contains(&statement.resource, self.resource.as_deref())
            && contains(&statement.location, self.location.as_deref())
            && contains(&statement.condition, self.condition.as_deref())
            && contains(
                &statement.lineage.compartment_path,
                self.hierarchy.as_deref(),
            )
    }
}

fn contains(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

fn keep(statements: &[PolicyStatement], filter: &StatementFilter, shown: bool) -> Vec<PolicyStatement> {
    if !shown {
        return Vec::new();
    }
    statements
        .iter()
        .filter(|s| filter.matches(s))
        .cloned()
        .collect()
}

/// Apply `filter` to `results`, returning fresh bucket sequences.
pub fn filter(results: &ResultSet, filter: &StatementFilter) -> FilteredView {
    let view = FilteredView {
        special: if filter.show.special {
            results.special.clone()
        } else {
            Vec::new()
        },
        dynamic_group: keep(&results.dynamic_group, filter, filter.show.dynamic_group),
        service: keep(&results.service, filter, filter.show.service),
        regular: keep(&results.regular, filter, filter.show.regular),
    };
    tracing::debug!(
        before = %results.counts(),
        after = %view.counts(),
        "applied statement filter"
    );
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::statement::Lineage;
    use proptest::prelude::*;

    fn lineage(path: &str) -> Lineage {
        Lineage {
            compartment_path: path.into(),
            policy_name: "p".into(),
            policy_id: "ocid1.policy.oc1..p".into(),
            policy_compartment_id: "ocid1.compartment.oc1..c".into(),
            raw_text: String::new(),
        }
    }

    fn fixture() -> ResultSet {
        let mut rs = ResultSet::new();
        for (raw, path) in [
            ("allow group Admins to manage all-resources in tenancy", ""),
            ("allow group NetOps to use virtual-network-family in compartment Net", "Prod/Net"),
            ("allow group DBAs to read database-family in compartment Db where request.user.id = 'x'", "Prod/Db"),
            ("allow dynamic-group fn-dg to read secret-family in compartment Vault", "Sec"),
            ("allow service blockstorage to use keys in tenancy", ""),
            ("define tenancy other as ocid1.tenancy.oc1..o", ""),
        ] {
            rs.push(parse(raw, path), lineage(path));
        }
        rs
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let rs = fixture();
        let view = filter(&rs, &StatementFilter::new());
        assert_eq!(view, rs);
        assert_eq!(filter(&rs, &StatementFilter::new().subject("")), rs);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rs = fixture();
        let view = filter(&rs, &StatementFilter::new().subject("ADMINS"));
        assert_eq!(view.regular.len(), 1);
        assert_eq!(view.regular[0].subject, "group admins");
        assert!(view.dynamic_group.is_empty());
        assert!(view.service.is_empty());
        // special statements are not field-filterable
        assert_eq!(view.special.len(), 1);
    }

    #[test]
    fn hierarchy_and_condition_filters() {
        let rs = fixture();
        let view = filter(&rs, &StatementFilter::new().hierarchy("prod"));
        assert_eq!(view.regular.len(), 2);

        let view = filter(&rs, &StatementFilter::new().condition("request.user"));
        assert_eq!(view.regular.len(), 1);
        assert_eq!(view.regular[0].verb, "read");
    }

    #[test]
    fn filters_are_conjunctive() {
        let rs = fixture();
        let view = filter(
            &rs,
            &StatementFilter::new().verb("use").location("tenancy"),
        );
        assert!(view.regular.is_empty());
        assert_eq!(view.service.len(), 1);
    }

    #[test]
    fn toggles_hide_buckets() {
        let rs = fixture();
        let view = filter(
            &rs,
            &StatementFilter::new().with_toggles(BucketToggles {
                special: false,
                service: false,
                ..BucketToggles::default()
            }),
        );
        assert!(view.special.is_empty());
        assert!(view.service.is_empty());
        assert_eq!(view.regular.len(), 3);
        assert_eq!(view.dynamic_group.len(), 1);
    }

    #[test]
    fn source_is_untouched() {
        let rs = fixture();
        let before = rs.clone();
        let _ = filter(&rs, &StatementFilter::new().subject("nobody"));
        assert_eq!(rs, before);
    }

    fn word() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["a", "b", "ab", "group a", "use", "read", "tenancy", "x"])
            .prop_map(String::from)
    }

    fn statement_text() -> impl Strategy<Value = String> {
        (word(), word(), word(), word()).prop_map(|(s, v, r, l)| {
            format!("allow group {s} to {v} {r} in compartment {l}")
        })
    }

    proptest! {
        #[test]
        fn sequential_equals_simultaneous(
            texts in prop::collection::vec(statement_text(), 0..24),
            subject in word(),
            verb in word(),
            resource in word(),
        ) {
            let mut rs = ResultSet::new();
            for text in &texts {
                rs.push(parse(text, "A/B"), lineage("A/B"));
            }
            let step = filter(&rs, &StatementFilter::new().subject(subject.clone()));
            let step = filter(&step, &StatementFilter::new().verb(verb.clone()));
            let step = filter(&step, &StatementFilter::new().resource(resource.clone()));
            let all = filter(
                &rs,
                &StatementFilter::new().subject(subject).verb(verb).resource(resource),
            );
            prop_assert_eq!(step, all);
        }
    }
}
