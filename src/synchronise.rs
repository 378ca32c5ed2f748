//! Coordinating module for the resolve-walk-derive-upsert pipeline.
//!
//! The pipeline is strictly phased: the bucket name is resolved first, the
//! tree is walked second, and only then are uploads dispatched. Precondition
//! failures (unresolvable bucket, missing root) therefore abort before a
//! single upload is attempted. Per-file failures are collected and reported
//! at the end so one bad file never blocks the rest of the site.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::config::{BucketSource, SyncConfig};
use crate::policy::{object_spec, ObjectSpec};
use crate::resolve::{BucketResolver, ResolveError};
use crate::store::{ObjectStore, PutObject, StoreError};
use crate::walk::{walk_tree, WalkError};

/// Immutable description of one sync run, built after resolution.
#[derive(Debug, Clone)]
pub struct SyncTarget {
    pub bucket: String,
    pub local_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Object written (create-or-overwrite; the store does not distinguish).
    Uploaded,
    /// This file failed; the rest of the run continued.
    Failed(String),
    /// Not attempted because the run aborted first.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    pub outcome: UploadOutcome,
}

/// Aggregate outcome of a completed (possibly partially failed) run.
#[derive(Debug)]
pub struct SyncReport {
    pub bucket: String,
    pub results: Vec<UploadResult>,
}

impl SyncReport {
    pub fn uploaded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == UploadOutcome::Uploaded)
            .count()
    }

    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                UploadOutcome::Failed(reason) => Some((r.key.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Walk(#[from] WalkError),
    /// Credentials rejected mid-run; remaining uploads were not issued.
    #[error("storage credentials rejected, aborted remaining uploads: {0}")]
    Auth(StoreError),
}

const UPLOAD_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Full pipeline: resolve the bucket from the config's source, then sync.
pub async fn run_sync(
    config: &SyncConfig,
    resolver: &dyn BucketResolver,
    store: &dyn ObjectStore,
) -> Result<SyncReport, SyncError> {
    let bucket = match &config.bucket {
        BucketSource::Name(name) => name.clone(),
        BucketSource::StackOutput { reference, output } => {
            resolver.resolve_output(reference, output).await?
        }
    };
    let target = SyncTarget {
        bucket,
        local_root: config.local_root.clone(),
    };
    synchronise(&target, store, config.concurrency).await
}

/// Walk the target's local root and upsert every file into its bucket.
///
/// Uploads run concurrently up to `concurrency`; object keys are disjoint so
/// requests share no state. An auth rejection stops new dispatches, lets
/// in-flight uploads finish and fails the run.
pub async fn synchronise(
    target: &SyncTarget,
    store: &dyn ObjectStore,
    concurrency: usize,
) -> Result<SyncReport, SyncError> {
    info!(
        bucket = %target.bucket,
        root = %target.local_root.display(),
        "Starting site synchronisation"
    );

    let specs: Vec<ObjectSpec> = walk_tree(&target.local_root)?
        .into_iter()
        .map(object_spec)
        .collect();
    info!(files = specs.len(), "Derived object specs from tree walk");

    let auth_failure: Arc<Mutex<Option<StoreError>>> = Arc::new(Mutex::new(None));
    let results: Vec<UploadResult> = stream::iter(specs)
        .map(|spec| {
            let auth_failure = Arc::clone(&auth_failure);
            let bucket = target.bucket.as_str();
            async move { upload_one(store, bucket, spec, auth_failure).await }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    if let Some(auth_err) = auth_failure.lock().expect("auth flag lock").take() {
        error!(bucket = %target.bucket, "Synchronisation aborted on auth failure");
        return Err(SyncError::Auth(auth_err));
    }

    let report = SyncReport {
        bucket: target.bucket.clone(),
        results,
    };
    info!(
        uploaded = report.uploaded(),
        failed = report.failures().len(),
        "Synchronisation pass complete"
    );
    Ok(report)
}

/// Upsert one object: read the source file, write the object, retrying
/// transient store failures with linear backoff.
async fn upload_one(
    store: &dyn ObjectStore,
    bucket: &str,
    spec: ObjectSpec,
    auth_failure: Arc<Mutex<Option<StoreError>>>,
) -> UploadResult {
    if auth_failure.lock().expect("auth flag lock").is_some() {
        return UploadResult {
            key: spec.key,
            outcome: UploadOutcome::Skipped,
        };
    }

    // The file was enumerated earlier; it may have vanished since. That is
    // a per-file failure, not a run failure.
    let bytes = match tokio::fs::read(&spec.source_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %spec.key, error = %e, "Source file unreadable after enumeration");
            return UploadResult {
                key: spec.key,
                outcome: UploadOutcome::Failed(format!("source read failed: {e}")),
            };
        }
    };

    let mut attempt = 1;
    loop {
        let req = PutObject {
            bucket: bucket.to_string(),
            key: spec.key.clone(),
            bytes: bytes.clone(),
            content_type: spec.content_type.to_string(),
            cache_control: spec.cache_control.to_string(),
        };
        match store.put_object(req).await {
            Ok(()) => {
                info!(
                    key = %spec.key,
                    content_type = spec.content_type,
                    cache_control = spec.cache_control,
                    "Uploaded object"
                );
                return UploadResult {
                    key: spec.key,
                    outcome: UploadOutcome::Uploaded,
                };
            }
            Err(StoreError::Auth { status }) => {
                let e = StoreError::Auth { status };
                error!(key = %spec.key, error = %e, "Auth failure, aborting remaining uploads");
                let reason = e.to_string();
                auth_failure
                    .lock()
                    .expect("auth flag lock")
                    .get_or_insert(e);
                return UploadResult {
                    key: spec.key,
                    outcome: UploadOutcome::Failed(reason),
                };
            }
            Err(e) if e.is_retryable() && attempt < UPLOAD_ATTEMPTS => {
                warn!(key = %spec.key, attempt, error = %e, "Transient upload failure, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                error!(key = %spec.key, error = %e, "Upload failed");
                return UploadResult {
                    key: spec.key,
                    outcome: UploadOutcome::Failed(e.to_string()),
                };
            }
        }
    }
}
