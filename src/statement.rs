//! Core statement types: decomposed grants, special statements, and the
//! four-bucket [`ResultSet`] a collection run produces.
//!
//! Classification happens exactly once, when a parsed statement is pushed into a
//! result set. Nothing downstream re-classifies.

use serde::{Deserialize, Serialize};

use crate::parser::{Parsed, StatementTuple};

/// Provenance of a statement: where it was written and by which policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lineage {
    /// Ancestry path of the policy's home compartment (`"a/b/c"`, empty at root).
    pub compartment_path: String,
    /// Name of the policy the statement belongs to.
    pub policy_name: String,
    /// OCID of the policy.
    pub policy_id: String,
    /// OCID of the compartment the policy lives in.
    pub policy_compartment_id: String,
    /// The statement text as returned by the data source.
    pub raw_text: String,
}

/// A permission grant decomposed into its positional parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub subject: String,
    pub verb: String,
    pub resource: String,
    pub location: String,
    pub condition: String,
    pub lineage: Lineage,
}

impl PolicyStatement {
    /// Attach lineage to a parsed tuple.
    pub fn new(tuple: StatementTuple, lineage: Lineage) -> Self {
        Self {
            subject: tuple.subject,
            verb: tuple.verb,
            resource: tuple.resource,
            location: tuple.location,
            condition: tuple.condition,
            lineage,
        }
    }

    /// The bucket this statement belongs to, by the subject substring rule.
    pub fn bucket(&self) -> BucketKind {
        classify_subject(&self.subject)
    }
}

/// An `endorse` / `admit` / `define` statement, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpecialStatement {
    /// Case-normalized statement text.
    pub statement: String,
    pub lineage: Lineage,
}

/// Which of the four result buckets a statement lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketKind {
    Special,
    DynamicGroup,
    Service,
    Regular,
}

impl BucketKind {
    /// All buckets, in reporting order.
    pub const ALL: [BucketKind; 4] = [
        BucketKind::Special,
        BucketKind::DynamicGroup,
        BucketKind::Service,
        BucketKind::Regular,
    ];

    /// Short tag used in cache keys.
    pub fn cache_tag(self) -> &'static str {
        match self {
            Self::Special => "special",
            Self::DynamicGroup => "dg",
            Self::Service => "svc",
            Self::Regular => "statement",
        }
    }
}

impl std::fmt::Display for BucketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Special => write!(f, "special"),
            Self::DynamicGroup => write!(f, "dynamic-group"),
            Self::Service => write!(f, "service"),
            Self::Regular => write!(f, "regular"),
        }
    }
}

/// Classify a (non-special) statement by its subject.
///
/// `"dynamic-group "` is checked before `"service "`, so a subject naming both
/// is a dynamic-group statement. An empty subject is regular.
pub fn classify_subject(subject: &str) -> BucketKind {
    if subject.contains("dynamic-group ") {
        BucketKind::DynamicGroup
    } else if subject.contains("service ") {
        BucketKind::Service
    } else {
        BucketKind::Regular
    }
}

/// The four buckets of one collection run (or one cache load).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub special: Vec<SpecialStatement>,
    pub dynamic_group: Vec<PolicyStatement>,
    pub service: Vec<PolicyStatement>,
    pub regular: Vec<PolicyStatement>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a parse result into its bucket, returning the bucket chosen.
    pub fn push(&mut self, parsed: Parsed, lineage: Lineage) -> BucketKind {
        match parsed {
            Parsed::Special(statement) => {
                self.special.push(SpecialStatement { statement, lineage });
                BucketKind::Special
            }
            Parsed::Statement(tuple) => {
                let statement = PolicyStatement::new(tuple, lineage);
                let kind = statement.bucket();
                self.statements_mut(kind).push(statement);
                kind
            }
        }
    }

    /// The decomposed statements of a non-special bucket.
    ///
    /// Returns an empty slice for [`BucketKind::Special`]; use
    /// [`ResultSet::special`] for those.
    pub fn statements(&self, kind: BucketKind) -> &[PolicyStatement] {
        match kind {
            BucketKind::Special => &[],
            BucketKind::DynamicGroup => &self.dynamic_group,
            BucketKind::Service => &self.service,
            BucketKind::Regular => &self.regular,
        }
    }

    fn statements_mut(&mut self, kind: BucketKind) -> &mut Vec<PolicyStatement> {
        match kind {
            BucketKind::DynamicGroup => &mut self.dynamic_group,
            BucketKind::Service => &mut self.service,
            // Special statements never reach here; they are not decomposed.
            BucketKind::Regular | BucketKind::Special => &mut self.regular,
        }
    }

    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            special: self.special.len(),
            dynamic_group: self.dynamic_group.len(),
            service: self.service.len(),
            regular: self.regular.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Per-bucket statement counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub special: usize,
    pub dynamic_group: usize,
    pub service: usize,
    pub regular: usize,
}

impl BucketCounts {
    pub fn total(&self) -> usize {
        self.special + self.dynamic_group + self.service + self.regular
    }
}

impl std::fmt::Display for BucketCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{} special/DG/SVC/regular statements",
            self.special, self.dynamic_group, self.service, self.regular
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn lineage(path: &str) -> Lineage {
        Lineage {
            compartment_path: path.into(),
            policy_name: "p".into(),
            policy_id: "ocid1.policy.oc1..p".into(),
            policy_compartment_id: "ocid1.compartment.oc1..c".into(),
            raw_text: String::new(),
        }
    }

    #[test]
    fn classify_subject_rules() {
        assert_eq!(classify_subject("dynamic-group dg1"), BucketKind::DynamicGroup);
        assert_eq!(classify_subject("service objectstorage"), BucketKind::Service);
        assert_eq!(classify_subject("group admins"), BucketKind::Regular);
        assert_eq!(classify_subject(""), BucketKind::Regular);
        // dynamic-group wins over service when both appear
        assert_eq!(
            classify_subject("dynamic-group x, service y"),
            BucketKind::DynamicGroup
        );
        // no trailing space, no match
        assert_eq!(classify_subject("any-service"), BucketKind::Regular);
    }

    #[test]
    fn push_routes_each_statement_to_exactly_one_bucket() {
        let mut rs = ResultSet::new();
        let inputs = [
            "endorse group x to read buckets in tenancy y",
            "allow dynamic-group dg1 to read objects in tenancy",
            "allow service blockstorage to use keys in tenancy",
            "allow group admins to manage all-resources in tenancy",
            "garbage",
        ];
        for raw in inputs {
            rs.push(parse(raw, ""), lineage(""));
        }
        let counts = rs.counts();
        assert_eq!(counts.special, 1);
        assert_eq!(counts.dynamic_group, 1);
        assert_eq!(counts.service, 1);
        assert_eq!(counts.regular, 2);
        assert_eq!(rs.total(), inputs.len());
    }

    #[test]
    fn statements_accessor_matches_fields() {
        let mut rs = ResultSet::new();
        let kind = rs.push(
            parse("allow service faas to read repos in tenancy", ""),
            lineage(""),
        );
        assert_eq!(kind, BucketKind::Service);
        assert_eq!(rs.statements(BucketKind::Service).len(), 1);
        assert!(rs.statements(BucketKind::Special).is_empty());
    }

    #[test]
    fn counts_display() {
        let counts = BucketCounts {
            special: 1,
            dynamic_group: 2,
            service: 3,
            regular: 4,
        };
        assert_eq!(counts.total(), 10);
        assert_eq!(
            counts.to_string(),
            "1/2/3/4 special/DG/SVC/regular statements"
        );
    }

    #[test]
    fn bucket_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&BucketKind::DynamicGroup).unwrap();
        assert_eq!(json, "\"dynamic-group\"");
    }
}
