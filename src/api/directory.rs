//! Directory query capability over `/users`
//!
//! The directory is picky about matching syntax: an exact `$filter` equality,
//! a `startswith` prefix filter, and the free-text `$search` operator behave
//! differently and have different header requirements. The resolver layers its
//! strategy on top of these three query kinds.

use async_trait::async_trait;

use super::client::{ApiError, GraphClient};
use super::models::{DirectoryUser, ListResponse};

const USER_SELECT: &str = "id,displayName,mail,userPrincipalName";

/// The three query syntaxes the directory supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserQuery {
    /// `$filter=displayName eq '...'`
    Exact,
    /// `$filter=startswith(displayName, '...')`
    Prefix,
    /// `$search="displayName:..."` (requires `ConsistencyLevel: eventual`)
    Text,
}

impl std::fmt::Display for UserQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserQuery::Exact => write!(f, "exact"),
            UserQuery::Prefix => write!(f, "prefix"),
            UserQuery::Text => write!(f, "text"),
        }
    }
}

/// Remote user directory search, the seam the name resolver is tested through
#[async_trait]
pub trait DirectorySearch {
    async fn search_users(
        &self,
        term: &str,
        query: UserQuery,
    ) -> Result<Vec<DirectoryUser>, ApiError>;
}

/// Escape a string literal for use inside an OData filter expression
fn odata_quote(term: &str) -> String {
    term.replace('\'', "''")
}

#[async_trait]
impl DirectorySearch for GraphClient {
    async fn search_users(
        &self,
        term: &str,
        query: UserQuery,
    ) -> Result<Vec<DirectoryUser>, ApiError> {
        let value = match query {
            UserQuery::Exact => {
                let filter = format!("displayName eq '{}'", odata_quote(term));
                let path = format!(
                    "/users?$filter={}&$select={}",
                    urlencoding::encode(&filter),
                    USER_SELECT
                );
                self.get_json(&path).await?
            }
            UserQuery::Prefix => {
                let filter = format!("startswith(displayName,'{}')", odata_quote(term));
                let path = format!(
                    "/users?$filter={}&$select={}",
                    urlencoding::encode(&filter),
                    USER_SELECT
                );
                self.get_json(&path).await?
            }
            UserQuery::Text => {
                let search = format!("\"displayName:{}\"", term.replace('"', ""));
                let path = format!(
                    "/users?$search={}&$select={}",
                    urlencoding::encode(&search),
                    USER_SELECT
                );
                self.get_json_with_headers(&path, &[("ConsistencyLevel", "eventual")])
                    .await?
            }
        };

        let parsed: ListResponse<DirectoryUser> =
            serde_json::from_value(value).map_err(|e| ApiError::Transient {
                message: format!("unexpected user list shape: {}", e),
            })?;
        log::debug!(
            "directory {} query for '{}' returned {} users",
            query,
            term,
            parsed.value.len()
        );
        Ok(parsed.value)
    }
}
