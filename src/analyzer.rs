//! End-to-end analysis: produce the four-bucket result set for one tenancy.
//!
//! Live mode walks the compartment tree, collects every policy statement and
//! snapshots the buckets into the cache. Cache mode loads the last snapshot
//! and makes no data source calls at all.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheResult, CacheStore};
use crate::collector::{CollectReport, Collector, Progress};
use crate::compartment::TreeWalker;
use crate::config::LensConfig;
use crate::error::{CacheError, LensResult, SourceError};
use crate::source::PolicySource;
use crate::statement::{BucketKind, ResultSet};

/// Where the results of an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Live,
    Cache,
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Cache => write!(f, "cache"),
        }
    }
}

/// Per-run settings, usually derived from [`LensConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub tenancy_id: String,
    pub recursive: bool,
    pub use_cache: bool,
    pub workers: usize,
}

impl AnalyzeOptions {
    pub fn from_config(config: &LensConfig, tenancy_id: &str) -> Self {
        Self {
            tenancy_id: tenancy_id.to_string(),
            recursive: config.recursive,
            use_cache: config.use_cache,
            workers: config.threads,
        }
    }
}

/// The outcome of [`Analyzer::analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    pub tenancy_id: String,
    pub mode: AnalysisMode,
    pub results: ResultSet,
    /// Compartments visited; zero in cache mode.
    pub compartments: usize,
    /// Collector bookkeeping, present for live runs.
    pub collect: Option<CollectReport>,
    /// Buckets the cache was missing or could not decode. Always empty live.
    pub unavailable: Vec<BucketKind>,
}

impl Analysis {
    /// Fail unless `kind` was actually served, so an empty bucket is not
    /// mistaken for a cold cache.
    pub fn require_bucket(&self, kind: BucketKind) -> CacheResult<()> {
        if self.unavailable.contains(&kind) {
            return Err(CacheError::BucketUnavailable {
                kind,
                tenant: self.tenancy_id.clone(),
            });
        }
        Ok(())
    }
}

/// Drives one analysis run against a data source and a cache.
pub struct Analyzer<'a, S: PolicySource + ?Sized> {
    options: AnalyzeOptions,
    source: Option<&'a S>,
    cache: &'a CacheStore,
    cancel: Arc<AtomicBool>,
}

impl<'a, S: PolicySource + ?Sized> Analyzer<'a, S> {
    /// `source` may be `None` for cache-only runs.
    pub fn new(options: AnalyzeOptions, source: Option<&'a S>, cache: &'a CacheStore) -> Self {
        Self {
            options,
            source,
            cache,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancellation flag passed through to the collector.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the analysis. `on_progress` fires once per collected compartment.
    pub fn analyze<F>(&self, on_progress: F) -> LensResult<Analysis>
    where
        F: FnMut(&Progress),
    {
        if self.options.use_cache {
            Ok(self.from_cache())
        } else {
            self.live(on_progress)
        }
    }

    fn from_cache(&self) -> Analysis {
        let tenancy_id = &self.options.tenancy_id;
        let load = self.cache.load(tenancy_id);
        if !load.found_any() {
            tracing::warn!(
                tenancy = %tenancy_id,
                backend = self.cache.backend_name(),
                "no cached results for tenancy; run once without --usecache to populate the cache"
            );
        }
        let mut unavailable = load.missing;
        unavailable.extend(load.corrupt);
        Analysis {
            tenancy_id: tenancy_id.clone(),
            mode: AnalysisMode::Cache,
            results: load.results,
            compartments: 0,
            collect: None,
            unavailable,
        }
    }

    fn live<F>(&self, on_progress: F) -> LensResult<Analysis>
    where
        F: FnMut(&Progress),
    {
        let source = self.source.ok_or_else(|| SourceError::Unavailable {
            message: "live analysis needs a data source".into(),
        })?;
        let tenancy_id = &self.options.tenancy_id;

        let compartments = TreeWalker::new(source).enumerate(tenancy_id, self.options.recursive)?;
        let report = Collector::new(source, self.options.workers)
            .with_cancel_flag(Arc::clone(&self.cancel))
            .collect(&compartments, on_progress)?;

        // A partial run must not replace the last complete snapshot.
        if report.skipped > 0 {
            tracing::warn!(
                skipped = report.skipped,
                "collection cancelled; keeping previous cache snapshot"
            );
        } else if let Err(e) = self.cache.save(tenancy_id, &report.results) {
            tracing::warn!(error = %e, "failed to save results to cache; continuing");
        }

        Ok(Analysis {
            tenancy_id: tenancy_id.clone(),
            mode: AnalysisMode::Live,
            results: report.results.clone(),
            compartments: compartments.len(),
            collect: Some(report),
            unavailable: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartment::{CompartmentError, CompartmentNode};
    use crate::error::LensError;
    use crate::source::{Policy, SnapshotSource, TenancySnapshot};

    fn source() -> SnapshotSource {
        SnapshotSource::new(
            TenancySnapshot::new("root", "acme")
                .with_compartment(CompartmentNode::child("fin", "Finance", "root"))
                .with_compartment(CompartmentNode::child("ap", "Payables", "fin"))
                .with_policy(Policy {
                    name: "root-pol".into(),
                    id: "p0".into(),
                    compartment_id: "root".into(),
                    statements: vec![
                        "Allow group Admins to manage all-resources in tenancy".into(),
                        "endorse group X to read buckets in tenancy Y".into(),
                    ],
                })
                .with_policy(Policy {
                    name: "ap-pol".into(),
                    id: "p1".into(),
                    compartment_id: "ap".into(),
                    statements: vec![
                        "allow dynamic-group Inv to read objects in compartment Invoices".into(),
                    ],
                }),
        )
    }

    fn options(recursive: bool, use_cache: bool) -> AnalyzeOptions {
        AnalyzeOptions {
            tenancy_id: "root".into(),
            recursive,
            use_cache,
            workers: 2,
        }
    }

    #[test]
    fn shallow_live_run_sees_root_only() {
        let source = source();
        let cache = CacheStore::in_memory();
        let analysis = Analyzer::new(options(false, false), Some(&source), &cache)
            .analyze(|_| {})
            .unwrap();
        assert_eq!(analysis.mode, AnalysisMode::Live);
        assert_eq!(analysis.compartments, 1);
        assert_eq!(analysis.results.regular.len(), 1);
        assert_eq!(analysis.results.special.len(), 1);
        assert!(analysis.results.dynamic_group.is_empty());
    }

    #[test]
    fn recursive_live_run_resolves_paths() {
        let source = source();
        let cache = CacheStore::in_memory();
        let analysis = Analyzer::new(options(true, false), Some(&source), &cache)
            .analyze(|_| {})
            .unwrap();
        assert_eq!(analysis.compartments, 3);
        let dg = &analysis.results.dynamic_group[0];
        assert_eq!(dg.lineage.compartment_path, "Finance/Payables");
        assert_eq!(dg.location, "compartment finance/payables:invoices");
        let report = analysis.collect.unwrap();
        assert_eq!(report.succeeded, 3);
    }

    #[test]
    fn cache_mode_replays_last_live_run_without_source_calls() {
        let source = source();
        let cache = CacheStore::in_memory();
        let live = Analyzer::new(options(true, false), Some(&source), &cache)
            .analyze(|_| {})
            .unwrap();

        let cached = Analyzer::<SnapshotSource>::new(options(true, true), None, &cache)
            .analyze(|_| panic!("no progress in cache mode"))
            .unwrap();
        assert_eq!(cached.mode, AnalysisMode::Cache);
        assert_eq!(cached.results, live.results);
        assert!(cached.collect.is_none());
    }

    #[test]
    fn cancelled_run_keeps_previous_cache() {
        let source = source();
        let cache = CacheStore::in_memory();
        let first = Analyzer::new(options(true, false), Some(&source), &cache)
            .analyze(|_| {})
            .unwrap();
        assert!(!first.results.is_empty());

        let cancelled = Analyzer::new(options(true, false), Some(&source), &cache)
            .with_cancel_flag(Arc::new(AtomicBool::new(true)))
            .analyze(|_| {})
            .unwrap();
        assert_eq!(cancelled.collect.as_ref().unwrap().skipped, 3);
        assert!(cancelled.results.is_empty());

        let load = cache.load("root");
        assert_eq!(load.results, first.results);
    }

    #[test]
    fn cold_cache_is_empty_not_an_error() {
        let cache = CacheStore::in_memory();
        let analysis = Analyzer::<SnapshotSource>::new(options(false, true), None, &cache)
            .analyze(|_| {})
            .unwrap();
        assert!(analysis.results.is_empty());
        assert_eq!(analysis.unavailable.len(), BucketKind::ALL.len());
    }

    #[test]
    fn cold_cache_cannot_serve_a_required_bucket() {
        let cache = CacheStore::in_memory();
        let analysis = Analyzer::<SnapshotSource>::new(options(false, true), None, &cache)
            .analyze(|_| {})
            .unwrap();
        let err = analysis.require_bucket(BucketKind::DynamicGroup).unwrap_err();
        assert!(matches!(
            err,
            CacheError::BucketUnavailable { kind: BucketKind::DynamicGroup, .. }
        ));
    }

    #[test]
    fn warm_cache_serves_empty_buckets() {
        let source = source();
        let cache = CacheStore::in_memory();
        // Shallow run: the dynamic-group bucket is saved, but empty.
        Analyzer::new(options(false, false), Some(&source), &cache)
            .analyze(|_| {})
            .unwrap();
        let cached = Analyzer::<SnapshotSource>::new(options(false, true), None, &cache)
            .analyze(|_| {})
            .unwrap();
        assert!(cached.unavailable.is_empty());
        assert!(cached.results.dynamic_group.is_empty());
        assert!(cached.require_bucket(BucketKind::DynamicGroup).is_ok());
    }

    #[test]
    fn live_without_source_is_an_error() {
        let cache = CacheStore::in_memory();
        let err = Analyzer::<SnapshotSource>::new(options(false, false), None, &cache)
            .analyze(|_| {})
            .unwrap_err();
        assert!(matches!(
            err,
            LensError::Source(SourceError::Unavailable { .. })
        ));
    }

    #[test]
    fn unknown_tenancy_is_fatal() {
        let source = source();
        let cache = CacheStore::in_memory();
        let mut opts = options(true, false);
        opts.tenancy_id = "elsewhere".into();
        let err = Analyzer::new(opts, Some(&source), &cache)
            .analyze(|_| {})
            .unwrap_err();
        assert!(matches!(
            err,
            LensError::Compartment(CompartmentError::RootUnavailable { .. })
        ));
    }

    #[test]
    fn options_follow_config() {
        let config = LensConfig {
            threads: 9,
            recursive: true,
            ..LensConfig::default()
        };
        let opts = AnalyzeOptions::from_config(&config, "t");
        assert_eq!(opts.workers, 9);
        assert!(opts.recursive);
        assert!(!opts.use_cache);
    }
}
