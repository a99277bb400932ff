//! Directory Resolver: free-text assignee names to directory identities
//!
//! The strategy is an ordered list tried with early exit, not nested
//! conditionals: candidate terms (full name, original string, first, last)
//! crossed with query kinds (exact filter, prefix filter, free-text search).
//! Acceptance always prefers strict full-name equality - the policy trades
//! recall for precision because spreadsheet names are unstructured and
//! directories are picky about matching syntax.

use crate::api::client::ApiError;
use crate::api::directory::{DirectorySearch, UserQuery};
use crate::api::models::DirectoryUser;

use super::name::ParsedName;

/// A resolved directory identity, carrying the query string that produced it
/// so enrichment can be mapped back onto records by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub mail: Option<String>,
    /// The free-text query this identity was resolved from
    pub query: String,
}

impl Identity {
    fn from_user(user: &DirectoryUser, query: &str) -> Identity {
        Identity {
            id: user.id.clone(),
            display_name: user.display_name.clone(),
            mail: user.mail.clone(),
            query: query.to_string(),
        }
    }
}

const QUERY_KINDS: &[UserQuery] = &[UserQuery::Exact, UserQuery::Prefix, UserQuery::Text];

/// Pick an acceptable entry from one directory response.
///
/// Preference order: display name equals the parsed full name
/// (case-insensitive); display name contains both first and last tokens;
/// for exact-filter queries only, the first returned entry as a last resort.
fn accept<'a>(
    users: &'a [DirectoryUser],
    parsed: &ParsedName,
    query: UserQuery,
) -> Option<&'a DirectoryUser> {
    let full_lower = parsed.full.to_lowercase();
    let first_lower = parsed.first.to_lowercase();
    let last_lower = parsed.last.to_lowercase();

    if let Some(user) = users
        .iter()
        .find(|u| u.display_name.to_lowercase() == full_lower)
    {
        return Some(user);
    }

    if let Some(user) = users.iter().find(|u| {
        let name = u.display_name.to_lowercase();
        name.contains(&first_lower) && name.contains(&last_lower)
    }) {
        return Some(user);
    }

    if query == UserQuery::Exact {
        return users.first();
    }
    None
}

/// Resolve one free-text assignee name against the directory.
///
/// Deterministic per query string; the enrichment cache guarantees each
/// distinct string hits this at most once per batch. Only authorization
/// expiry propagates as an error - transient failures of one strategy fall
/// through to the next, and exhaustion yields `None`.
pub async fn resolve_assignee(
    directory: &impl DirectorySearch,
    raw_name: &str,
) -> Result<Option<Identity>, ApiError> {
    let trimmed = raw_name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let parsed = ParsedName::parse(trimmed);

    for term in parsed.candidate_terms() {
        for &query in QUERY_KINDS {
            let users = match directory.search_users(term, query).await {
                Ok(users) => users,
                Err(e) if e.is_batch_fatal() => return Err(e),
                Err(e) => {
                    log::debug!("{} query for '{}' failed: {}", query, term, e);
                    continue;
                }
            };
            if let Some(user) = accept(&users, &parsed, query) {
                log::debug!(
                    "resolved '{}' to '{}' via {} query on '{}'",
                    trimmed,
                    user.display_name,
                    query,
                    term
                );
                return Ok(Some(Identity::from_user(user, trimmed)));
            }
        }
    }

    log::debug!("no directory match for '{}'", trimmed);
    Ok(None)
}
