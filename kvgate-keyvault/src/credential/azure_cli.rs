//! Azure CLI session credential

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use super::{epoch_field, resource_for_scope, AccessToken, CredentialError, TokenCredential};

const NAME: &str = "AzureCliCredential";

/// Tokens from `az account get-access-token`, for developer machines
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new("az")
    }
}

impl AzureCliCredential {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let resource = resource_for_scope(scope);
        let mut command = Command::new(&self.program);
        command.args(["account", "get-access-token", "--output", "json", "--resource", resource]);

        debug!(program = %self.program, resource = %resource, "Requesting Azure CLI token");

        let output = command.output().await.map_err(|e| {
            CredentialError::unavailable(NAME, format!("failed to run '{}': {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("az login") || stderr.contains("az account set") {
                return Err(CredentialError::unavailable(
                    NAME,
                    "no Azure CLI session, run 'az login'",
                ));
            }
            return Err(CredentialError::authentication(NAME, stderr.trim().to_string()));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, CredentialError> {
    let body: Value = serde_json::from_slice(stdout).map_err(|e| {
        CredentialError::authentication(NAME, format!("unreadable CLI output: {}", e))
    })?;

    let token = body
        .get("accessToken")
        .and_then(Value::as_str)
        .ok_or_else(|| CredentialError::authentication(NAME, "CLI output has no accessToken"))?;

    // Newer CLIs emit `expires_on` (epoch); older ones only local-time `expiresOn`
    let expires_on = epoch_field(&body, "expires_on")
        .or_else(|| {
            let local = body.get("expiresOn").and_then(Value::as_str)?;
            let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f").ok()?;
            Local
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .ok_or_else(|| CredentialError::authentication(NAME, "CLI output has no expiry"))?;

    Ok(AccessToken::new(token, expires_on))
}
