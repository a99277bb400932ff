//! Device-code authentication against Microsoft Entra ID
//!
//! Tokens are held in memory for the lifetime of one run; nothing is written
//! to disk. The well-known public client ids are tried in order because
//! tenants commonly block some of them - the first one that completes the
//! device-code flow wins. A `GRAPH_ACCESS_TOKEN` environment variable skips
//! the flow entirely (useful for scripting and CI).

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;

pub const AUTHORITY_BASE_URL: &str = "https://login.microsoftonline.com";
const SCOPE: &str = "https://graph.microsoft.com/.default";
const TOKEN_ENV_VAR: &str = "GRAPH_ACCESS_TOKEN";

/// Public client ids known to work without app registration:
/// Azure CLI, Graph Explorer, Graph PowerShell.
pub const WELL_KNOWN_CLIENT_IDS: &[&str] = &[
    "1950a258-227b-4e31-a9cf-717495945fc2",
    "04b07795-8ddb-461a-bbee-02f9e1bf7b46",
    "1fec8e78-bce4-4aaf-ab1b-5451cc387264",
];

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    #[serde(default = "default_interval")]
    interval: u64,
    expires_in: u64,
    #[serde(default)]
    message: Option<String>,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenPollResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Acquires Graph access tokens via the OAuth2 device-code flow
#[derive(Debug, Clone)]
pub struct AuthManager {
    http: reqwest::Client,
    authority_base: String,
    tenant_id: String,
    client_ids: Vec<String>,
}

impl AuthManager {
    pub fn new(tenant_id: impl Into<String>, client_ids: Vec<String>) -> Self {
        Self::with_authority(AUTHORITY_BASE_URL, tenant_id, client_ids)
    }

    pub fn with_authority(
        authority_base: impl Into<String>,
        tenant_id: impl Into<String>,
        client_ids: Vec<String>,
    ) -> Self {
        AuthManager {
            http: reqwest::Client::new(),
            authority_base: authority_base.into().trim_end_matches('/').to_string(),
            tenant_id: tenant_id.into(),
            client_ids,
        }
    }

    /// Obtain an access token: environment override first, then the
    /// device-code flow with each configured client id until one succeeds.
    pub async fn acquire_token(&self) -> Result<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                log::info!("Using access token from {}", TOKEN_ENV_VAR);
                return Ok(token.trim().to_string());
            }
        }

        for (i, client_id) in self.client_ids.iter().enumerate() {
            log::info!(
                "Trying authentication method {} of {}",
                i + 1,
                self.client_ids.len()
            );
            match self.device_code_flow(client_id).await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    log::warn!("Authentication with client {} failed: {:#}", client_id, e);
                }
            }
        }

        bail!(
            "All authentication methods failed. If your organization blocks these \
             applications, set {} to a token obtained elsewhere.",
            TOKEN_ENV_VAR
        )
    }

    /// Run one device-code flow: request a code, show the prompt, poll until
    /// the user completes sign-in in their browser.
    async fn device_code_flow(&self, client_id: &str) -> Result<String> {
        let device_endpoint = format!(
            "{}/{}/oauth2/v2.0/devicecode",
            self.authority_base, self.tenant_id
        );
        let token_endpoint = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_base, self.tenant_id
        );

        let response = self
            .http
            .post(&device_endpoint)
            .form(&[("client_id", client_id), ("scope", SCOPE)])
            .send()
            .await
            .context("device code request failed")?;
        if !response.status().is_success() {
            bail!("device code request rejected: {}", response.status());
        }
        let code: DeviceCodeResponse = response
            .json()
            .await
            .context("invalid device code response")?;

        match &code.message {
            Some(message) => println!("{}", message),
            None => println!(
                "To sign in, open {} and enter the code {}",
                code.verification_uri, code.user_code
            ),
        }

        let mut interval = code.interval.max(1);
        let deadline = std::time::Instant::now() + Duration::from_secs(code.expires_in);

        loop {
            if std::time::Instant::now() >= deadline {
                bail!("device code expired before sign-in completed");
            }
            tokio::time::sleep(Duration::from_secs(interval)).await;

            let poll: TokenPollResponse = self
                .http
                .post(&token_endpoint)
                .form(&[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("client_id", client_id),
                    ("device_code", &code.device_code),
                ])
                .send()
                .await
                .context("token poll failed")?
                .json()
                .await
                .context("invalid token response")?;

            if let Some(token) = poll.access_token {
                return Ok(token);
            }
            match poll.error.as_deref() {
                Some("authorization_pending") => continue,
                Some("slow_down") => {
                    interval += 5;
                }
                Some(other) => bail!(
                    "authentication failed: {} ({})",
                    other,
                    poll.error_description.unwrap_or_default()
                ),
                None => bail!("token endpoint returned neither a token nor an error"),
            }
        }
    }
}
