//! Bucket Reconciler: free-text bucket labels to existing board buckets
//!
//! Exact name equality (case-insensitive) always outranks fuzzy matching.
//! The fuzzy tier only considers pairs where one name contains the other
//! (case-insensitive) and scores them by length ratio, so an unrelated short
//! string inside a long one does not pass as an abbreviation.

use crate::api::models::Bucket;

/// How a queried bucket name was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketMatchKind {
    /// Case-insensitive name equality
    Exact,
    /// Substring containment with length ratio above the threshold
    Fuzzy,
    /// Bucket was created on demand for this query
    Created,
    /// No acceptable match
    Unmatched,
}

impl std::fmt::Display for BucketMatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketMatchKind::Exact => write!(f, "exact"),
            BucketMatchKind::Fuzzy => write!(f, "fuzzy"),
            BucketMatchKind::Created => write!(f, "created"),
            BucketMatchKind::Unmatched => write!(f, "unmatched"),
        }
    }
}

/// Outcome of reconciling one queried bucket name
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMatch {
    /// The name as it appeared in the spreadsheet
    pub query: String,
    pub kind: BucketMatchKind,
    /// Target bucket id, absent when unmatched
    pub bucket_id: Option<String>,
    /// Canonical bucket name on the board, absent when unmatched
    pub name: Option<String>,
    /// 1.0 for exact/created, the length ratio for fuzzy, 0.0 for unmatched
    pub score: f64,
}

impl BucketMatch {
    pub fn unmatched(query: impl Into<String>) -> BucketMatch {
        BucketMatch {
            query: query.into(),
            kind: BucketMatchKind::Unmatched,
            bucket_id: None,
            name: None,
            score: 0.0,
        }
    }

    /// A match for a bucket newly created for this query
    pub fn created(query: impl Into<String>, bucket: &Bucket) -> BucketMatch {
        BucketMatch {
            query: query.into(),
            kind: BucketMatchKind::Created,
            bucket_id: Some(bucket.id.clone()),
            name: Some(bucket.name.clone()),
            score: 1.0,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.kind != BucketMatchKind::Unmatched
    }
}

/// Acceptance threshold for the fuzzy tier (strict)
const FUZZY_THRESHOLD: f64 = 0.5;

/// Similarity of two bucket names: `len(shorter) / len(longer)`, defined only
/// when one is a case-insensitive substring of the other.
fn similarity(a: &str, b: &str) -> Option<f64> {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    if !a_lower.contains(&b_lower) && !b_lower.contains(&a_lower) {
        return None;
    }
    let a_len = a_lower.chars().count();
    let b_len = b_lower.chars().count();
    let (shorter, longer) = if a_len <= b_len { (a_len, b_len) } else { (b_len, a_len) };
    if longer == 0 {
        return None;
    }
    Some(shorter as f64 / longer as f64)
}

/// Reconcile a queried bucket name against the buckets of the target plan
pub fn reconcile(query: &str, available: &[Bucket]) -> BucketMatch {
    let trimmed = query.trim();

    // Tier 1: exact, case-insensitive
    if let Some(bucket) = available
        .iter()
        .find(|b| b.name.trim().eq_ignore_ascii_case(trimmed))
    {
        return BucketMatch {
            query: trimmed.to_string(),
            kind: BucketMatchKind::Exact,
            bucket_id: Some(bucket.id.clone()),
            name: Some(bucket.name.clone()),
            score: 1.0,
        };
    }

    // Tier 2: best containment candidate by length ratio
    let mut best: Option<(&Bucket, f64)> = None;
    for bucket in available {
        if let Some(score) = similarity(trimmed, bucket.name.trim()) {
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((bucket, score));
            }
        }
    }

    match best {
        Some((bucket, score)) if score > FUZZY_THRESHOLD => {
            log::debug!(
                "fuzzy bucket match '{}' -> '{}' (score {:.2})",
                trimmed,
                bucket.name,
                score
            );
            BucketMatch {
                query: trimmed.to_string(),
                kind: BucketMatchKind::Fuzzy,
                bucket_id: Some(bucket.id.clone()),
                name: Some(bucket.name.clone()),
                score,
            }
        }
        _ => BucketMatch::unmatched(trimmed),
    }
}
