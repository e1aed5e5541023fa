//! Concurrent collection: fetch, parse and classify every compartment's policies.
//!
//! Each compartment is one unit of work on a fixed-size rayon pool. Workers
//! append into four mutex-guarded buckets, one lock per bucket, one append per
//! lock acquisition. Completions travel over a channel to the calling thread,
//! which owns the progress counter and invokes the caller's callback once per
//! finished unit. The channel closing is the barrier: it only happens after
//! every submitted unit has dropped its sender.
//!
//! A failure inside one unit (listing policies, resolving the path) is logged
//! and the compartment contributes nothing. Nothing a unit does can abort the
//! run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use rayon::ThreadPoolBuilder;

use crate::compartment::{CompartmentNode, CompartmentResult, PathResolver};
use crate::error::CollectError;
use crate::parser::{self, Parsed};
use crate::source::PolicySource;
use crate::statement::{
    BucketKind, Lineage, PolicyStatement, ResultSet, SpecialStatement, classify_subject,
};

/// Default worker pool size.
pub const DEFAULT_WORKERS: usize = 5;

/// Result type for collector operations.
pub type CollectResult<T> = std::result::Result<T, CollectError>;

/// One progress notification, sent after each finished unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Units finished so far (succeeded or failed), including this one.
    pub completed: usize,
    /// Units in the run.
    pub total: usize,
    pub compartment_id: String,
    pub compartment_name: String,
    /// Statements this unit contributed.
    pub statements: usize,
    /// Whether this unit's retrieval failed.
    pub failed: bool,
}

impl Progress {
    /// Whole-percent completion.
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.completed * 100 / self.total
        }
    }
}

/// Outcome of a collection run.
#[derive(Debug, Clone, Default)]
pub struct CollectReport {
    pub results: ResultSet,
    /// Compartments handed to the collector.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Units never started because the run was cancelled.
    pub skipped: usize,
    /// Statements that parsed without a subject.
    pub malformed: usize,
}

/// Message from a worker to the reporter.
struct Completion {
    compartment_id: String,
    compartment_name: String,
    outcome: CompartmentResult<UnitStats>,
}

#[derive(Debug, Clone, Copy, Default)]
struct UnitStats {
    statements: usize,
    malformed: usize,
}

/// Thread-safe append-only buckets for one run.
#[derive(Default)]
struct SharedBuckets {
    special: Mutex<Vec<SpecialStatement>>,
    dynamic_group: Mutex<Vec<PolicyStatement>>,
    service: Mutex<Vec<PolicyStatement>>,
    regular: Mutex<Vec<PolicyStatement>>,
}

impl SharedBuckets {
    fn append(&self, parsed: Parsed, lineage: Lineage) -> BucketKind {
        match parsed {
            Parsed::Special(statement) => {
                lock(&self.special).push(SpecialStatement { statement, lineage });
                BucketKind::Special
            }
            Parsed::Statement(tuple) => {
                let kind = classify_subject(&tuple.subject);
                let bucket = match kind {
                    BucketKind::DynamicGroup => &self.dynamic_group,
                    BucketKind::Service => &self.service,
                    BucketKind::Regular | BucketKind::Special => &self.regular,
                };
                lock(bucket).push(PolicyStatement::new(tuple, lineage));
                kind
            }
        }
    }

    fn into_result_set(self) -> ResultSet {
        ResultSet {
            special: into_inner(self.special),
            dynamic_group: into_inner(self.dynamic_group),
            service: into_inner(self.service),
            regular: into_inner(self.regular),
        }
    }
}

// A worker that panicked mid-append leaves a complete Vec behind; keep it.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex.into_inner().unwrap_or_else(PoisonError::into_inner)
}

/// Runs per-compartment retrieval and parsing on a bounded worker pool.
pub struct Collector<'a, S: PolicySource + ?Sized> {
    source: &'a S,
    workers: usize,
    cancel: Arc<AtomicBool>,
}

impl<S: PolicySource + ?Sized> std::fmt::Debug for Collector<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("workers", &self.workers)
            .field("cancelled", &self.cancel.load(Ordering::Relaxed))
            .finish()
    }
}

impl<'a, S: PolicySource + ?Sized> Collector<'a, S> {
    pub fn new(source: &'a S, workers: usize) -> Self {
        Self {
            source,
            workers,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned cancellation flag (e.g. set from a signal handler).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops the run from starting further units once set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Collect every statement from `compartments`.
    ///
    /// `on_progress` runs on the calling thread, once per finished unit, with a
    /// strictly increasing `completed` count. Returns only after all started
    /// units have finished.
    pub fn collect<F>(
        &self,
        compartments: &[CompartmentNode],
        mut on_progress: F,
    ) -> CollectResult<CollectReport>
    where
        F: FnMut(&Progress),
    {
        if self.workers == 0 {
            return Err(CollectError::InvalidWorkerCount {
                workers: self.workers,
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("lens-worker-{i}"))
            .build()
            .map_err(|e| CollectError::ThreadPool {
                message: e.to_string(),
            })?;

        let total = compartments.len();
        let buckets = SharedBuckets::default();
        let resolver = PathResolver::new(self.source);
        let (tx, rx) = mpsc::channel::<Completion>();
        let mut report = CollectReport {
            total,
            ..Default::default()
        };

        tracing::info!(
            compartments = total,
            workers = self.workers,
            "starting policy collection"
        );

        std::thread::scope(|scope| {
            let buckets = &buckets;
            let resolver = &resolver;
            scope.spawn(move || {
                pool.scope(|s| {
                    for node in compartments {
                        if self.cancel.load(Ordering::Relaxed) {
                            tracing::warn!("collection cancelled, not starting remaining compartments");
                            break;
                        }
                        let tx = tx.clone();
                        s.spawn(move |_| {
                            if self.cancel.load(Ordering::Relaxed) {
                                return;
                            }
                            let outcome = self.load_compartment(node, resolver, buckets);
                            let _ = tx.send(Completion {
                                compartment_id: node.id.clone(),
                                compartment_name: node.name.clone(),
                                outcome,
                            });
                        });
                    }
                });
            });

            let mut completed = 0usize;
            for done in rx {
                completed += 1;
                let (statements, failed) = match done.outcome {
                    Ok(stats) => {
                        report.succeeded += 1;
                        report.malformed += stats.malformed;
                        (stats.statements, false)
                    }
                    Err(err) => {
                        report.failed += 1;
                        tracing::warn!(
                            compartment = %done.compartment_name,
                            id = %done.compartment_id,
                            error = %err,
                            "skipping compartment after retrieval failure"
                        );
                        (0, true)
                    }
                };
                let progress = Progress {
                    completed,
                    total,
                    compartment_id: done.compartment_id,
                    compartment_name: done.compartment_name,
                    statements,
                    failed,
                };
                tracing::debug!(
                    completed,
                    total,
                    percent = progress.percent(),
                    "compartment finished"
                );
                on_progress(&progress);
            }
        });

        report.skipped = total - report.succeeded - report.failed;
        report.results = buckets.into_result_set();
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "finished policy collection: {}",
            report.results.counts()
        );
        Ok(report)
    }

    /// One unit of work: list, resolve path (only if needed), parse, append.
    fn load_compartment(
        &self,
        node: &CompartmentNode,
        resolver: &PathResolver<'_, S>,
        buckets: &SharedBuckets,
    ) -> CompartmentResult<UnitStats> {
        let policies = self.source.list_policies(&node.id)?;
        if policies.is_empty() {
            tracing::debug!(compartment = %node.name, "no policies");
            return Ok(UnitStats::default());
        }

        let path = resolver.resolve(node)?;
        tracing::debug!(compartment = %node.name, path = %path, "compartment path");

        let mut stats = UnitStats::default();
        for policy in &policies {
            tracing::debug!(policy = %policy.name, id = %policy.id, "policy");
            for (index, raw) in policy.statements.iter().enumerate() {
                let parsed = parser::parse(raw, &path);
                if let Parsed::Statement(tuple) = &parsed {
                    if tuple.is_malformed() {
                        stats.malformed += 1;
                        tracing::warn!(
                            policy = %policy.name,
                            statement = index + 1,
                            text = %raw,
                            "statement has no subject, keeping it as regular"
                        );
                    }
                }
                let lineage = Lineage {
                    compartment_path: path.clone(),
                    policy_name: policy.name.clone(),
                    policy_id: policy.id.clone(),
                    policy_compartment_id: policy.compartment_id.clone(),
                    raw_text: raw.clone(),
                };
                buckets.append(parsed, lineage);
                stats.statements += 1;
            }
        }
        Ok(stats)
    }
}
