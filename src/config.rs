// site-sync/src/config.rs

use std::path::PathBuf;

use tracing::{debug, info};

use crate::resolve::StackRef;

/// Where the destination bucket name comes from.
#[derive(Debug, Clone)]
pub enum BucketSource {
    /// Explicit bucket name (environment override or static config).
    Name(String),
    /// Read the name from another deployment's published outputs.
    StackOutput { reference: StackRef, output: String },
}

/// Everything one sync run needs, assembled once at startup.
///
/// Components never read the environment themselves; secrets and overrides
/// are injected here by `load_config`.
#[derive(Debug)]
pub struct SyncConfig {
    pub bucket: BucketSource,
    pub local_root: PathBuf,
    pub concurrency: usize,
    /// Bearer token for the object store API.
    pub storage_token: String,
    /// Access token for the deployment service; only needed when `bucket`
    /// is a stack reference.
    pub deploy_token: Option<String>,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        match &self.bucket {
            BucketSource::Name(name) => {
                info!(bucket = %name, "Bucket taken from explicit name");
            }
            BucketSource::StackOutput { reference, output } => {
                info!(
                    stack = %reference.qualified_name(),
                    output = %output,
                    "Bucket source is a stack reference"
                );
            }
        }
        info!(
            local_root = %self.local_root.display(),
            concurrency = self.concurrency,
            "Loaded SyncConfig"
        );
        debug!(local_root = ?self.local_root, "SyncConfig local root (full debug)");
    }
}
