//! HTTP client for the Microsoft Graph API
//!
//! Thin wrapper over reqwest that handles bearer auth, JSON bodies, ETag
//! preconditions, and maps HTTP status classes onto the error taxonomy the
//! pipeline relies on (401 aborts a batch, 403 fails one operation, 5xx and
//! transport errors are transient).

use serde_json::Value;

pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Errors from Graph calls, classified by how the batch pipeline must react
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401: the token is no longer valid. Fatal for the remaining batch;
    /// the caller must re-authenticate.
    AuthExpired,
    /// 403: the operation is not permitted. Fatal for this operation only.
    PermissionDenied { message: String },
    /// Network failure or 5xx/429. The attempted step fails, the batch continues.
    Transient { message: String },
    /// Any other 4xx: the request itself was rejected.
    Request { status: u16, message: String },
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::AuthExpired => {
                write!(f, "Authentication expired (401) - sign in again")
            }
            ApiError::PermissionDenied { message } => {
                write!(f, "Access denied (403): {}", message)
            }
            ApiError::Transient { message } => {
                write!(f, "Transient remote error: {}", message)
            }
            ApiError::Request { status, message } => {
                write!(f, "Request rejected ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transient {
            message: err.to_string(),
        }
    }
}

impl ApiError {
    /// Whether this error must abort the rest of the batch
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, ApiError::AuthExpired)
    }

    /// Classify a non-success HTTP status together with its response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body);
        match status {
            401 => ApiError::AuthExpired,
            403 => ApiError::PermissionDenied { message },
            429 => ApiError::Transient { message },
            s if s >= 500 => ApiError::Transient { message },
            s => ApiError::Request { status: s, message },
        }
    }
}

/// Pull the human-readable message out of a Graph error body, if present
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(300).collect()
    }
}

/// Authenticated Graph client
///
/// The base URL is injectable so tests can point it at a local mock server.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GraphClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(GRAPH_BASE_URL, token)
    }

    pub fn with_base_url(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        GraphClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
    }

    /// GET a JSON resource
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        self.get_json_with_headers(path, &[]).await
    }

    /// GET a JSON resource with extra headers (e.g. `ConsistencyLevel: eventual`)
    pub async fn get_json_with_headers(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<Value, ApiError> {
        let mut req = self.authed(self.http.get(self.url(path)));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let response = req.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            log::debug!("GET {} -> {}", path, status);
            return Err(ApiError::from_status(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Transient {
            message: format!("invalid JSON in response: {}", e),
        })
    }

    /// GET a resource and return its body together with the ETag precondition
    /// tag the service expects back on the next write.
    pub async fn get_with_etag(&self, path: &str) -> Result<(Value, String), ApiError> {
        let response = self.authed(self.http.get(self.url(path))).send().await?;
        let status = response.status().as_u16();
        let header_etag = response
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(status, &body));
        }
        let value: Value = serde_json::from_str(&body).map_err(|e| ApiError::Transient {
            message: format!("invalid JSON in response: {}", e),
        })?;
        // Graph sends the tag both as a header and as @odata.etag in the body
        let etag = header_etag
            .or_else(|| {
                value
                    .get("@odata.etag")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .ok_or_else(|| ApiError::Transient {
                message: format!("no ETag on response from {}", path),
            })?;
        Ok((value, etag))
    }

    /// POST a JSON body, returning the created resource
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let response = self
            .authed(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        if !(200..300).contains(&status) {
            log::debug!("POST {} -> {}", path, status);
            return Err(ApiError::from_status(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Transient {
            message: format!("invalid JSON in response: {}", e),
        })
    }

    /// PATCH a resource guarded by an `If-Match` precondition tag.
    /// 200 and 204 both count as success for Planner PATCHes.
    pub async fn patch_with_etag(
        &self,
        path: &str,
        etag: &str,
        body: &Value,
    ) -> Result<(), ApiError> {
        let response = self
            .authed(self.http.patch(self.url(path)))
            .header("If-Match", etag)
            .json(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            log::debug!("PATCH {} -> {}", path, status);
            return Err(ApiError::from_status(status, &text));
        }
        Ok(())
    }
}
