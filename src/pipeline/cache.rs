//! Per-batch enrichment cache
//!
//! Owned by exactly one pipeline run and dropped with it, so stale results
//! can never leak across batches. Misses are memoized alongside hits: a name
//! the directory could not resolve is not retried within the same batch.

use std::collections::HashMap;

use crate::api::models::Bucket;
use crate::resolve::bucket::BucketMatch;
use crate::resolve::directory::Identity;

/// Lookup memoization for one batch run
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    /// normalized assignee query -> resolved identity or memoized miss
    assignees: HashMap<String, Option<Identity>>,
    /// normalized bucket query -> reconciliation outcome (including unmatched)
    buckets: HashMap<String, BucketMatch>,
}

fn key(query: &str) -> String {
    query.trim().to_string()
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assignee(&self, query: &str) -> Option<&Option<Identity>> {
        self.assignees.get(&key(query))
    }

    pub fn insert_assignee(&mut self, query: &str, identity: Option<Identity>) {
        self.assignees.insert(key(query), identity);
    }

    pub fn bucket(&self, query: &str) -> Option<&BucketMatch> {
        self.buckets.get(&key(query))
    }

    pub fn insert_bucket(&mut self, query: &str, m: BucketMatch) {
        self.buckets.insert(key(query), m);
    }

    /// Record a bucket created on demand, replacing the unmatched entry so
    /// later records referencing the same name land in the new bucket.
    pub fn mark_bucket_created(&mut self, query: &str, bucket: &Bucket) {
        self.buckets
            .insert(key(query), BucketMatch::created(key(query), bucket));
    }

    /// Bucket queries currently memoized as unmatched
    pub fn unmatched_buckets(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .buckets
            .iter()
            .filter(|(_, m)| !m.is_matched())
            .map(|(query, _)| query.clone())
            .collect();
        names.sort();
        names
    }

    pub fn assignee_count(&self) -> usize {
        self.assignees.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::bucket::BucketMatchKind;

    fn identity(id: &str, query: &str) -> Identity {
        Identity {
            id: id.to_string(),
            display_name: "Jane Doe".to_string(),
            mail: None,
            query: query.to_string(),
        }
    }

    #[test]
    fn test_misses_are_memoized() {
        let mut cache = EnrichmentCache::new();
        assert!(cache.assignee("Ghost").is_none());

        cache.insert_assignee("Ghost", None);
        // present in the cache, but a recorded miss
        assert_eq!(cache.assignee("Ghost"), Some(&None));
    }

    #[test]
    fn test_keys_are_trimmed() {
        let mut cache = EnrichmentCache::new();
        cache.insert_assignee(" Jane Doe ", Some(identity("u1", "Jane Doe")));
        assert!(cache.assignee("Jane Doe").is_some());
        assert_eq!(cache.assignee_count(), 1);
    }

    #[test]
    fn test_mark_bucket_created_replaces_unmatched() {
        let mut cache = EnrichmentCache::new();
        cache.insert_bucket("New Work", BucketMatch::unmatched("New Work"));
        assert_eq!(cache.unmatched_buckets(), vec!["New Work"]);

        let bucket = Bucket::new("b9", "New Work");
        cache.mark_bucket_created("New Work", &bucket);
        let m = cache.bucket("New Work").unwrap();
        assert_eq!(m.kind, BucketMatchKind::Created);
        assert_eq!(m.bucket_id.as_deref(), Some("b9"));
        assert!(cache.unmatched_buckets().is_empty());
    }
}
