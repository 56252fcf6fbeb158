//! Scan orchestration across a source of artifacts.
//!
//! A [`Runner`] validates its [`ScanOptions`], lists artifacts from an
//! [`ArtifactSource`], and drives each one through an [`Inspector`] and a
//! [`ScanDriver`]. Artifacts run concurrently; each has its own timeout and
//! cancellation token, and its failure is recorded on its own entry in the
//! [`Report`] without affecting the others.
//!
//! | Failure | Effect |
//! |---------|--------|
//! | invalid options | run aborted, no report |
//! | source cannot list | run aborted, no report |
//! | inspection, detection, cache miss, timeout, cancel | recorded on the artifact, report is partial |

mod collector;

pub use collector::ResultCollector;

use crate::config::IgnoreConfig;
use crate::error::ScanError;
use crate::model::{Artifact, ArtifactId, ArtifactOutcome, ArtifactResult, FailureKind, Report};
use crate::options::ScanOptions;
use crate::scanner::{Inspector, ScanDriver, ScanRequest};
use crate::source::ArtifactSource;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 5;

pub struct Runner {
    inspector: Arc<dyn Inspector>,
    scanner: Arc<dyn ScanDriver>,
    options: ScanOptions,
    concurrency: usize,
    timeout: Option<Duration>,
    ignore: IgnoreConfig,
    cancel: Mutex<CancellationToken>,
    in_flight: Mutex<HashMap<ArtifactId, CancellationToken>>,
}

impl Runner {
    pub fn new(
        inspector: Arc<dyn Inspector>,
        scanner: Arc<dyn ScanDriver>,
        options: ScanOptions,
    ) -> Self {
        Self {
            inspector,
            scanner,
            options,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
            ignore: IgnoreConfig::default(),
            cancel: Mutex::new(CancellationToken::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Per-artifact timeout. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    /// Token whose cancellation stops every unfinished artifact of the
    /// current run, or of the next one if none is running. A cancelled token
    /// is replaced when its run ends, so the runner can be run again.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Cancels one in-flight artifact. Returns `false` if it is not running.
    pub fn cancel_artifact(&self, id: &ArtifactId) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        match in_flight.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Scans every artifact of `source` and aggregates the results.
    ///
    /// # Errors
    ///
    /// [`ScanError::Validation`] if the options are inconsistent and
    /// [`ScanError::ArtifactSource`] if the source cannot be listed. Both
    /// happen before any artifact is scanned. Per-artifact failures are
    /// recorded in the report instead.
    pub async fn run(&self, source: &dyn ArtifactSource) -> Result<Report, ScanError> {
        self.options.validate()?;

        let context = source.context();
        let artifacts = source
            .list_artifacts()
            .await
            .map_err(ScanError::ArtifactSource)?;
        let artifacts = dedup(artifacts);

        info!(context = %context, artifacts = artifacts.len(), concurrency = self.concurrency, "Starting scan");

        let cancel = self.cancellation_token();
        let parent = cancel.clone();
        let (tx, rx) = mpsc::channel(self.concurrency);
        // The sender lives in this future, so the channel closes when the last worker ends.
        let workers = async move {
            stream::iter(artifacts)
                .map(|artifact| {
                    let tx = tx.clone();
                    let token = parent.child_token();
                    async move {
                        let outcome = self.scan_artifact(&artifact, token).await;
                        let result = ArtifactResult { artifact, outcome };
                        if tx.send(result).await.is_err() {
                            warn!("Result collector closed early");
                        }
                    }
                })
                .buffer_unordered(self.concurrency)
                .for_each(|()| async {})
                .await;
        };

        let ((), collector) = tokio::join!(workers, ResultCollector::new().drain(rx));
        let report = collector.into_report(context);

        if cancel.is_cancelled() {
            let mut current = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
            if current.is_cancelled() {
                *current = CancellationToken::new();
            }
        }

        info!(
            context = %report.context,
            status = ?report.status,
            failed = report.failed().count(),
            vulnerabilities = report.vulnerability_count(),
            "Scan finished"
        );
        Ok(report)
    }

    async fn scan_artifact(&self, artifact: &Artifact, token: CancellationToken) -> ArtifactOutcome {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(artifact.id.clone(), token.clone());

        let work = async {
            let reference = self.inspector.inspect(artifact).await.map_err(|e| {
                ArtifactOutcome::failed(FailureKind::Inspection, format!("{:#}", e))
            })?;
            let request = ScanRequest::new(&reference, self.options.clone());
            self.scanner
                .scan(&request)
                .await
                .map_err(|e| ArtifactOutcome::failed(e.kind(), e.to_string()))
        };

        let bounded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                    Err(ArtifactOutcome::failed(
                        FailureKind::Timeout,
                        format!("scan exceeded {}s", limit.as_secs_f64()),
                    ))
                }),
                None => work.await,
            }
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ArtifactOutcome::failed(FailureKind::Cancelled, "scan cancelled")),
            result = bounded => result,
        };

        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&artifact.id);

        match result {
            Ok(mut results) => {
                let before = results.vulnerabilities.len();
                results.vulnerabilities.retain(|v| !self.ignore.should_ignore(v));
                debug!(
                    artifact = %artifact.id,
                    vulnerabilities = results.vulnerabilities.len(),
                    ignored = before - results.vulnerabilities.len(),
                    eosl = results.eosl(),
                    "Artifact scanned"
                );
                ArtifactOutcome::Scanned(results)
            }
            Err(outcome) => {
                if let ArtifactOutcome::Failed { kind, message } = &outcome {
                    warn!(artifact = %artifact.id, kind = %kind, "{}", message);
                }
                outcome
            }
        }
    }
}

fn dedup(artifacts: Vec<Artifact>) -> Vec<Artifact> {
    let mut seen = HashSet::new();
    artifacts
        .into_iter()
        .filter(|a| {
            let fresh = seen.insert(a.id.clone());
            if !fresh {
                debug!(artifact = %a.id, "Skipping duplicate artifact");
            }
            fresh
        })
        .collect()
}
