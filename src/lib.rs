pub mod config;
pub mod load_config;
pub mod policy;
pub mod resolve;
pub mod store;
pub mod synchronise;
pub mod walk;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::load_config::load_config;
use crate::resolve::StackOutputResolver;
use crate::store::GcsStore;
use crate::synchronise::{run_sync, UploadOutcome};

#[derive(Parser)]
#[clap(
    name = "site-sync",
    version,
    about = "Publish a static site build directory to its storage bucket"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upsert every file under the local root into the destination bucket
    Sync {
        /// Path to the YAML config file (optional; env and defaults apply)
        #[clap(long)]
        config: Option<PathBuf>,
        /// Local build-output directory (default: ./out)
        #[clap(long)]
        root: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, root } => {
            let config = load_config(config.as_deref(), root)?;
            config.trace_loaded();

            let resolver =
                StackOutputResolver::new(config.deploy_token.clone().unwrap_or_default());
            let store = GcsStore::new(config.storage_token.clone());

            println!("Synchronise starting...");
            let report = match run_sync(&config, &resolver, &store).await {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("[ERROR] Synchronisation failed: {e}");
                    return Err(e.into());
                }
            };

            for result in &report.results {
                match &result.outcome {
                    UploadOutcome::Uploaded => {
                        println!("uploaded gs://{}/{}", report.bucket, result.key);
                    }
                    UploadOutcome::Failed(reason) => {
                        eprintln!("failed   {}: {}", result.key, reason);
                    }
                    UploadOutcome::Skipped => {
                        eprintln!("skipped  {}", result.key);
                    }
                }
            }

            if report.is_success() {
                println!(
                    "Synchronise complete: {} objects uploaded to gs://{}",
                    report.uploaded(),
                    report.bucket
                );
                Ok(())
            } else {
                let failures = report.failures();
                eprintln!(
                    "[ERROR] {} of {} files failed to upload",
                    failures.len(),
                    report.results.len()
                );
                Err(anyhow::anyhow!("{} files failed to upload", failures.len()))
            }
        }
    }
}
