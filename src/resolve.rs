//! Cross-deployment value resolution.
//!
//! The bucket is created by a separate provisioning stack; this module reads
//! that stack's published outputs and extracts the one value the sync run
//! needs. Resolution is read-only and must complete before any upload work
//! starts — there is no safe fallback bucket, so every failure here is fatal.

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;
use tracing::{debug, info};

/// Address of a deployment whose outputs we read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StackRef {
    pub organization: String,
    pub project: String,
    pub stack: String,
}

impl StackRef {
    pub fn qualified_name(&self) -> String {
        format!("{}/{}/{}", self.organization, self.project, self.stack)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("stack reference {0} not found")]
    StackNotFound(String),
    #[error("stack {stack} has no output named {output:?}")]
    MissingOutput { stack: String, output: String },
    #[error("failed to read stack state: {0}")]
    Transport(String),
}

/// Reads one string-valued output from a referenced deployment.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait BucketResolver: Send + Sync {
    async fn resolve_output(
        &self,
        reference: &StackRef,
        output: &str,
    ) -> Result<String, ResolveError>;
}

/// HTTP resolver against the deployment service's stack-export endpoint.
pub struct StackOutputResolver {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

const DEPLOYMENT_API_BASE: &str = "https://api.pulumi.com";

impl StackOutputResolver {
    /// `token` is the deployment-service access token supplied by the
    /// config layer.
    pub fn new(token: String) -> Self {
        Self::with_api_base(token, DEPLOYMENT_API_BASE.to_string())
    }

    pub fn with_api_base(token: String, api_base: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            api_base,
        }
    }
}

#[async_trait]
impl BucketResolver for StackOutputResolver {
    async fn resolve_output(
        &self,
        reference: &StackRef,
        output: &str,
    ) -> Result<String, ResolveError> {
        let url = format!(
            "{}/api/stacks/{}/{}/{}/export",
            self.api_base, reference.organization, reference.project, reference.stack
        );
        debug!(stack = %reference.qualified_name(), output, "Reading stack export");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("token {}", self.token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolveError::StackNotFound(reference.qualified_name()));
        }
        if !response.status().is_success() {
            return Err(ResolveError::Transport(format!(
                "stack export returned status {}",
                response.status()
            )));
        }

        let export: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;
        let value = extract_stack_output(&export, output).ok_or_else(|| {
            ResolveError::MissingOutput {
                stack: reference.qualified_name(),
                output: output.to_string(),
            }
        })?;
        info!(stack = %reference.qualified_name(), output, value = %value, "Resolved stack output");
        Ok(value)
    }
}

/// Pull a string output out of an exported deployment: the stack resource's
/// `outputs` map carries everything the deployment exported.
pub fn extract_stack_output(export: &serde_json::Value, output: &str) -> Option<String> {
    export
        .get("deployment")?
        .get("resources")?
        .as_array()?
        .iter()
        .find(|r| r.get("type").and_then(|t| t.as_str()) == Some("pulumi:pulumi:Stack"))?
        .get("outputs")?
        .get(output)?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_export() -> serde_json::Value {
        serde_json::json!({
            "version": 3,
            "deployment": {
                "resources": [
                    {
                        "type": "pulumi:pulumi:Stack",
                        "urn": "urn:pulumi:prod::website-infra::pulumi:pulumi:Stack::website-infra-prod",
                        "outputs": {
                            "websiteBucket": "my-site-bucket",
                            "endpointIp": "203.0.113.10"
                        }
                    },
                    { "type": "gcp:storage/bucket:Bucket", "outputs": {} }
                ]
            }
        })
    }

    #[test]
    fn extracts_the_named_output_from_the_stack_resource() {
        let value = extract_stack_output(&sample_export(), "websiteBucket");
        assert_eq!(value.as_deref(), Some("my-site-bucket"));
    }

    #[test]
    fn absent_output_name_yields_none() {
        assert_eq!(extract_stack_output(&sample_export(), "cdnHost"), None);
    }

    #[test]
    fn malformed_export_yields_none() {
        let export = serde_json::json!({ "deployment": {} });
        assert_eq!(extract_stack_output(&export, "websiteBucket"), None);
    }
}
