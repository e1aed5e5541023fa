//! JSON export of a filtered query result.
//!
//! One document per run: the tenancy, the filter that was applied, per-bucket
//! counts, and every statement tagged with its bucket type and lineage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::query::{FilteredView, StatementFilter};
use crate::statement::{BucketCounts, PolicyStatement, SpecialStatement};

/// Result type for report operations.
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// A statement in the report, tagged with its bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReportEntry {
    Special(SpecialStatement),
    DynamicGroup(PolicyStatement),
    Service(PolicyStatement),
    Regular(PolicyStatement),
}

/// The persisted query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReport {
    pub tenancy_id: String,
    /// Seconds since the Unix epoch.
    pub generated_at: u64,
    pub filter: StatementFilter,
    pub counts: BucketCounts,
    pub statements: Vec<ReportEntry>,
}

impl QueryReport {
    /// Build a report from a filtered view.
    pub fn new(tenancy_id: &str, filter: &StatementFilter, view: &FilteredView) -> Self {
        let mut statements = Vec::with_capacity(view.total());
        statements.extend(view.special.iter().cloned().map(ReportEntry::Special));
        statements.extend(
            view.dynamic_group
                .iter()
                .cloned()
                .map(ReportEntry::DynamicGroup),
        );
        statements.extend(view.service.iter().cloned().map(ReportEntry::Service));
        statements.extend(view.regular.iter().cloned().map(ReportEntry::Regular));

        Self {
            tenancy_id: tenancy_id.to_string(),
            generated_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            filter: filter.clone(),
            counts: view.counts(),
            statements,
        }
    }

    /// Default output file name for a tenancy.
    pub fn default_file_name(tenancy_id: &str) -> PathBuf {
        PathBuf::from(format!("policyoutput-{tenancy_id}.json"))
    }

    pub fn to_json(&self) -> ReportResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ReportError::Serialization {
            message: e.to_string(),
        })
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> ReportResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ReportError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| ReportError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
        tracing::info!(
            path = %path.display(),
            statements = self.statements.len(),
            "wrote query report"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::query::filter;
    use crate::statement::{Lineage, ResultSet};
    use tempfile::TempDir;

    fn view() -> FilteredView {
        let mut rs = ResultSet::new();
        for raw in [
            "admit group a of tenancy b to read buckets in tenancy",
            "allow dynamic-group dg to use keys in tenancy",
            "allow any-user to inspect users in tenancy where request.principal.type = 'service'",
        ] {
            rs.push(
                parse(raw, ""),
                Lineage {
                    compartment_path: String::new(),
                    policy_name: "root-policy".into(),
                    policy_id: "ocid1.policy.oc1..r".into(),
                    policy_compartment_id: "ocid1.tenancy.oc1..t".into(),
                    raw_text: raw.into(),
                },
            );
        }
        filter(&rs, &StatementFilter::new())
    }

    #[test]
    fn entries_are_type_tagged() {
        let report = QueryReport::new("ocid1.tenancy.oc1..t", &StatementFilter::new(), &view());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let types: Vec<_> = json["statements"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types, vec!["special", "dynamic-group", "regular"]);
        assert_eq!(json["counts"]["dynamic_group"], 1);
        assert_eq!(
            json["statements"][1]["lineage"]["policy_name"],
            "root-policy"
        );
    }

    #[test]
    fn write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");
        let filter = StatementFilter::new().verb("use");
        let report = QueryReport::new("t", &filter, &view());
        report.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: QueryReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.filter.verb.as_deref(), Some("use"));
    }

    #[test]
    fn default_name_embeds_tenancy() {
        assert_eq!(
            QueryReport::default_file_name("ocid1.tenancy.oc1..x"),
            PathBuf::from("policyoutput-ocid1.tenancy.oc1..x.json")
        );
    }
}
