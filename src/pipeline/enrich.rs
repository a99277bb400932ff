//! Batch enrichment: resolve every distinct lookup once, then fan results
//! back out onto the records that referenced them.
//!
//! Records are never mutated in place; enrichment produces new
//! `EnrichedRecord`s keyed by the record's stable batch index. A failed
//! lookup marks that record's category as failed and the batch continues;
//! only authorization expiry aborts the run.

use crate::api::client::ApiError;
use crate::api::directory::DirectorySearch;
use crate::api::models::Bucket;
use crate::records::TaskRecord;
use crate::resolve::bucket::{self, BucketMatch};
use crate::resolve::directory::{Identity, resolve_assignee};

use super::cache::EnrichmentCache;

/// Per-record, per-category lookup fate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Every lookup in the category succeeded (and there was at least one)
    Resolved,
    /// At least one lookup in the category found nothing
    Failed,
    /// The record had nothing to look up in this category
    NotApplicable,
}

/// One record after enrichment, keyed by its index in the input batch
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub index: usize,
    pub record: TaskRecord,
    /// Identities resolved for this record's assignee names, input order
    pub assignees: Vec<Identity>,
    /// Assignee names the directory could not resolve
    pub missing_assignees: Vec<String>,
    /// Bucket reconciliation, absent when the record names no bucket
    pub bucket: Option<BucketMatch>,
    pub assignee_outcome: LookupOutcome,
    pub bucket_outcome: LookupOutcome,
}

/// Aggregate lookup counts; each record contributes exactly one fate per
/// category, so the three counts always sum to the batch size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub assignees_resolved: usize,
    pub assignees_failed: usize,
    pub assignees_not_applicable: usize,
    pub buckets_resolved: usize,
    pub buckets_failed: usize,
    pub buckets_not_applicable: usize,
}

impl EnrichStats {
    fn count_assignee(&mut self, outcome: LookupOutcome) {
        match outcome {
            LookupOutcome::Resolved => self.assignees_resolved += 1,
            LookupOutcome::Failed => self.assignees_failed += 1,
            LookupOutcome::NotApplicable => self.assignees_not_applicable += 1,
        }
    }

    fn count_bucket(&mut self, outcome: LookupOutcome) {
        match outcome {
            LookupOutcome::Resolved => self.buckets_resolved += 1,
            LookupOutcome::Failed => self.buckets_failed += 1,
            LookupOutcome::NotApplicable => self.buckets_not_applicable += 1,
        }
    }
}

/// Result of enriching one batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub records: Vec<EnrichedRecord>,
    pub stats: EnrichStats,
}

/// Distinct non-empty strings in first-appearance order
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.iter().any(|s| s == trimmed) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}

/// Enrich a batch of records.
///
/// Each distinct assignee name is resolved against the directory at most
/// once; each distinct bucket name is reconciled at most once. Re-running
/// with a cold cache over the same inputs yields a structurally equal result.
pub async fn enrich(
    records: &[TaskRecord],
    directory: &impl DirectorySearch,
    available_buckets: &[Bucket],
    cache: &mut EnrichmentCache,
) -> Result<BatchResult, ApiError> {
    // Phase 1: resolve every distinct assignee name not already cached
    let assignee_names = distinct(
        records
            .iter()
            .flat_map(|r| r.assignee_names.iter().map(String::as_str)),
    );
    for name in &assignee_names {
        if cache.assignee(name).is_some() {
            continue;
        }
        let identity = resolve_assignee(directory, name).await?;
        match &identity {
            Some(found) => log::info!("resolved assignee '{}' -> '{}'", name, found.display_name),
            None => log::warn!("assignee '{}' not found in directory", name),
        }
        cache.insert_assignee(name, identity);
    }

    // Phase 2: reconcile every distinct bucket name not already cached
    let bucket_names = distinct(records.iter().filter_map(|r| r.bucket_name.as_deref()));
    for name in &bucket_names {
        if cache.bucket(name).is_some() {
            continue;
        }
        let m = bucket::reconcile(name, available_buckets);
        if !m.is_matched() {
            log::warn!("bucket '{}' has no match on the target plan", name);
        }
        cache.insert_bucket(name, m);
    }

    // Phase 3: fan cached results back out onto each record
    let mut enriched = Vec::with_capacity(records.len());
    let mut stats = EnrichStats::default();
    for (index, record) in records.iter().enumerate() {
        let mut assignees = Vec::new();
        let mut missing_assignees = Vec::new();
        for name in &record.assignee_names {
            match cache.assignee(name) {
                Some(Some(identity)) => assignees.push(identity.clone()),
                _ => missing_assignees.push(name.clone()),
            }
        }
        let assignee_outcome = if record.assignee_names.is_empty() {
            LookupOutcome::NotApplicable
        } else if missing_assignees.is_empty() {
            LookupOutcome::Resolved
        } else {
            LookupOutcome::Failed
        };

        let bucket_match = record
            .bucket_name
            .as_deref()
            .and_then(|name| cache.bucket(name))
            .cloned();
        let bucket_outcome = match &bucket_match {
            None => LookupOutcome::NotApplicable,
            Some(m) if m.is_matched() => LookupOutcome::Resolved,
            Some(_) => LookupOutcome::Failed,
        };

        stats.count_assignee(assignee_outcome);
        stats.count_bucket(bucket_outcome);
        enriched.push(EnrichedRecord {
            index,
            record: record.clone(),
            assignees,
            missing_assignees,
            bucket: bucket_match,
            assignee_outcome,
            bucket_outcome,
        });
    }

    Ok(BatchResult {
        records: enriched,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::directory::UserQuery;
    use crate::api::models::DirectoryUser;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Directory fake that answers exact queries from a name table and
    /// counts how many times each raw term was queried.
    #[derive(Default)]
    struct CountingDirectory {
        users: HashMap<String, DirectoryUser>,
        call_counts: Mutex<HashMap<String, usize>>,
    }

    impl CountingDirectory {
        fn with_user(mut self, name: &str, id: &str) -> Self {
            self.users.insert(
                name.to_string(),
                DirectoryUser {
                    id: id.to_string(),
                    display_name: name.to_string(),
                    mail: None,
                    user_principal_name: None,
                },
            );
            self
        }

        fn calls_for(&self, term: &str) -> usize {
            *self.call_counts.lock().unwrap().get(term).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl DirectorySearch for CountingDirectory {
        async fn search_users(
            &self,
            term: &str,
            _query: UserQuery,
        ) -> Result<Vec<DirectoryUser>, ApiError> {
            *self
                .call_counts
                .lock()
                .unwrap()
                .entry(term.to_string())
                .or_insert(0) += 1;
            Ok(self.users.get(term).cloned().into_iter().collect())
        }
    }

    fn record(title: &str, assignees: &[&str], bucket: Option<&str>) -> TaskRecord {
        TaskRecord {
            title: title.to_string(),
            description: String::new(),
            start_date: None,
            due_date: None,
            assignee_names: assignees.iter().map(|s| s.to_string()).collect(),
            assignee_display: if assignees.is_empty() {
                None
            } else {
                Some(assignees.join(", "))
            },
            bucket_name: bucket.map(str::to_string),
            status: None,
        }
    }

    fn buckets(names: &[&str]) -> Vec<Bucket> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Bucket::new(format!("b{}", i), *name))
            .collect()
    }

    #[tokio::test]
    async fn test_shared_assignee_resolved_once_and_fanned_out() {
        let directory = CountingDirectory::default().with_user("John Smith", "u1");
        let records = vec![
            record("Task 1", &["John Smith"], None),
            record("Task 2", &["John Smith"], None),
            record("Task 3", &[], None),
        ];
        let mut cache = EnrichmentCache::new();

        let result = enrich(&records, &directory, &[], &mut cache).await.unwrap();

        // exactly one remote call for the shared name
        assert_eq!(directory.calls_for("John Smith"), 1);
        assert_eq!(result.stats.assignees_resolved, 2);
        assert_eq!(result.stats.assignees_failed, 0);
        assert_eq!(result.stats.assignees_not_applicable, 1);
        assert_eq!(result.records[0].assignees[0].id, "u1");
        assert_eq!(result.records[1].assignees[0].id, "u1");
        assert!(result.records[2].assignees.is_empty());
    }

    #[tokio::test]
    async fn test_misses_are_cached_not_retried() {
        let directory = CountingDirectory::default();
        let records = vec![
            record("Task 1", &["Ghost Person"], None),
            record("Task 2", &["Ghost Person"], None),
        ];
        let mut cache = EnrichmentCache::new();

        let result = enrich(&records, &directory, &[], &mut cache).await.unwrap();

        // the resolver exhausts its strategies once; the second record reuses
        // the memoized miss instead of querying again
        let first_pass_calls = directory.calls_for("Ghost Person");
        assert!(first_pass_calls >= 1);
        assert_eq!(result.stats.assignees_failed, 2);
        assert_eq!(result.records[0].missing_assignees, vec!["Ghost Person"]);

        // a second enrich over the same cache performs no further calls
        enrich(&records, &directory, &[], &mut cache).await.unwrap();
        assert_eq!(directory.calls_for("Ghost Person"), first_pass_calls);
    }

    #[tokio::test]
    async fn test_idempotent_with_fresh_caches() {
        let directory = CountingDirectory::default().with_user("Jane Doe", "u2");
        let records = vec![
            record("Task 1", &["Jane Doe", "Ghost"], Some("Backlog")),
            record("Task 2", &[], Some("Nowhere")),
        ];
        let available = buckets(&["Backlog"]);

        let mut cache_a = EnrichmentCache::new();
        let first = enrich(&records, &directory, &available, &mut cache_a)
            .await
            .unwrap();
        let mut cache_b = EnrichmentCache::new();
        let second = enrich(&records, &directory, &available, &mut cache_b)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_partial_assignee_failure_marks_record_failed() {
        let directory = CountingDirectory::default().with_user("Jane Doe", "u2");
        let records = vec![record("Task", &["Jane Doe", "Ghost"], None)];
        let mut cache = EnrichmentCache::new();

        let result = enrich(&records, &directory, &[], &mut cache).await.unwrap();
        let enriched = &result.records[0];
        assert_eq!(enriched.assignee_outcome, LookupOutcome::Failed);
        // the resolved identity is still available for materialization
        assert_eq!(enriched.assignees.len(), 1);
        assert_eq!(enriched.missing_assignees, vec!["Ghost"]);
    }

    #[tokio::test]
    async fn test_bucket_outcomes() {
        let directory = CountingDirectory::default();
        let records = vec![
            record("A", &[], Some("Backlog")),
            record("B", &[], Some("Nowhere Near")),
            record("C", &[], None),
        ];
        let available = buckets(&["Backlog"]);
        let mut cache = EnrichmentCache::new();

        let result = enrich(&records, &directory, &available, &mut cache)
            .await
            .unwrap();
        assert_eq!(result.records[0].bucket_outcome, LookupOutcome::Resolved);
        assert_eq!(result.records[1].bucket_outcome, LookupOutcome::Failed);
        assert_eq!(result.records[2].bucket_outcome, LookupOutcome::NotApplicable);
        assert_eq!(result.stats.buckets_resolved, 1);
        assert_eq!(result.stats.buckets_failed, 1);
        assert_eq!(result.stats.buckets_not_applicable, 1);
    }

    #[tokio::test]
    async fn test_stats_sum_to_batch_size() {
        let directory = CountingDirectory::default().with_user("Jane Doe", "u2");
        let records = vec![
            record("A", &["Jane Doe"], Some("Backlog")),
            record("B", &["Ghost"], None),
            record("C", &[], Some("Unknown")),
            record("D", &[], None),
        ];
        let available = buckets(&["Backlog"]);
        let mut cache = EnrichmentCache::new();

        let result = enrich(&records, &directory, &available, &mut cache)
            .await
            .unwrap();
        let s = result.stats;
        assert_eq!(
            s.assignees_resolved + s.assignees_failed + s.assignees_not_applicable,
            records.len()
        );
        assert_eq!(
            s.buckets_resolved + s.buckets_failed + s.buckets_not_applicable,
            records.len()
        );
    }

    /// Directory that always reports an expired token
    struct ExpiredDirectory;

    #[async_trait]
    impl DirectorySearch for ExpiredDirectory {
        async fn search_users(
            &self,
            _term: &str,
            _query: UserQuery,
        ) -> Result<Vec<DirectoryUser>, ApiError> {
            Err(ApiError::AuthExpired)
        }
    }

    #[tokio::test]
    async fn test_auth_expiry_aborts_enrichment() {
        let records = vec![record("Task", &["Jane Doe"], None)];
        let mut cache = EnrichmentCache::new();
        let err = enrich(&records, &ExpiredDirectory, &[], &mut cache)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::AuthExpired);
    }
}
