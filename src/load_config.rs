use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info};

use crate::config::{BucketSource, SyncConfig};
use crate::resolve::StackRef;

/// Default sibling directory produced by the static-site build.
const DEFAULT_LOCAL_ROOT: &str = "out";
const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_OUTPUT_NAME: &str = "websiteBucket";

#[derive(Deserialize, Default)]
struct StaticConfig {
    #[serde(default)]
    root: Option<PathBuf>,
    #[serde(default)]
    concurrency: Option<usize>,
    #[serde(default)]
    bucket: Option<BucketYaml>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum BucketYaml {
    #[serde(rename = "name")]
    Name { name: String },
    #[serde(rename = "stack_output")]
    StackOutput {
        organization: String,
        project: String,
        stack: String,
        #[serde(default)]
        output: Option<String>,
    },
}

/// Loads the static YAML config (no secrets) and injects env vars for
/// secrets and overrides. Returns a fully merged SyncConfig or an error.
///
/// Merge order: `SITE_BUCKET` env beats the config's bucket section; the
/// `--root` flag beats the config's root. `STORAGE_TOKEN` is always
/// required; `PULUMI_ACCESS_TOKEN` only when the bucket comes from a
/// stack reference.
pub fn load_config(path: Option<&Path>, root_flag: Option<PathBuf>) -> Result<SyncConfig> {
    let static_conf = match path {
        Some(path_ref) => {
            info!(config_path = ?path_ref, "Loading configuration from file");
            let config_content = fs::read_to_string(path_ref).map_err(|e| {
                error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
                anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
            })?;
            serde_yaml::from_str::<StaticConfig>(&config_content).map_err(|e| {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                anyhow::anyhow!("Failed to parse config YAML: {e}")
            })?
        }
        None => {
            info!("No config file given, using defaults and environment");
            StaticConfig::default()
        }
    };

    let bucket = match std::env::var("SITE_BUCKET") {
        Ok(name) if !name.is_empty() => {
            info!(bucket = %name, "SITE_BUCKET set, overriding config bucket source");
            BucketSource::Name(name)
        }
        _ => match static_conf.bucket {
            Some(BucketYaml::Name { name }) => BucketSource::Name(name),
            Some(BucketYaml::StackOutput {
                organization,
                project,
                stack,
                output,
            }) => BucketSource::StackOutput {
                reference: StackRef {
                    organization,
                    project,
                    stack,
                },
                output: output.unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string()),
            },
            None => {
                error!("No bucket source: neither SITE_BUCKET nor a config bucket section");
                anyhow::bail!(
                    "No destination bucket: set SITE_BUCKET or configure a bucket \
                     section (name or stack_output) in the config file"
                );
            }
        },
    };

    let storage_token = std::env::var("STORAGE_TOKEN")
        .context("STORAGE_TOKEN environment variable not set")?;

    let deploy_token = match &bucket {
        BucketSource::StackOutput { .. } => Some(
            std::env::var("PULUMI_ACCESS_TOKEN").context(
                "PULUMI_ACCESS_TOKEN environment variable not set \
                 (required to resolve a stack_output bucket source)",
            )?,
        ),
        BucketSource::Name(_) => None,
    };

    let local_root = root_flag
        .or(static_conf.root)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_ROOT));
    let concurrency = static_conf.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1);

    info!(
        local_root = %local_root.display(),
        concurrency,
        "Config loaded and merged successfully"
    );

    Ok(SyncConfig {
        bucket,
        local_root,
        concurrency,
        storage_token,
        deploy_token,
    })
}
