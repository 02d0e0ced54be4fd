//! Fuzzy search over the cached fund directory.
//!
//! Matching is a case-insensitive substring test against code or name. Matches
//! are bucketed into tiers by match quality and sorted alphabetically within a
//! tier:
//!
//! | tier | condition              | tie-break |
//! |------|------------------------|-----------|
//! | 0    | code equals query      | code      |
//! | 1    | code starts with query | code      |
//! | 2    | name starts with query | name      |
//! | 3    | any other substring    | name      |

use super::{DirectorySnapshot, FundCache, FundRecord, MatchKeys};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Upper bound on results per query.
pub const MAX_LIMIT: usize = 100;

/// The cache has not been populated by a successful refresh yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("fund directory is still loading")]
pub struct NotReady;

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub funds: Vec<FundRecord>,
    /// Size of the whole snapshot, not the match count.
    pub total_count: usize,
    pub returned_count: usize,
    pub cache_time: DateTime<Utc>,
}

/// Search the current snapshot held by `cache`.
///
/// `limit` is clamped to `1..=MAX_LIMIT`. An empty (after trimming) query
/// returns the first `limit` records in snapshot order.
pub fn search(cache: &FundCache, query: &str, limit: usize) -> Result<SearchResult, NotReady> {
    let snapshot = cache.get().ok_or(NotReady)?;
    Ok(search_snapshot(&snapshot, query, limit))
}

pub fn search_snapshot(snapshot: &DirectorySnapshot, query: &str, limit: usize) -> SearchResult {
    let limit = limit.clamp(1, MAX_LIMIT);
    let query = query.trim().to_lowercase();

    let funds: Vec<FundRecord> = if query.is_empty() {
        snapshot.records().iter().take(limit).cloned().collect()
    } else {
        let mut matches: Vec<(Tier, &FundRecord)> = snapshot
            .records()
            .iter()
            .zip(snapshot.keys())
            .filter_map(|(record, keys)| Tier::classify(keys, &query).map(|t| (t, record)))
            .collect();
        matches.sort_by(|(ta, a), (tb, b)| ta.cmp(tb).then_with(|| ta.tie_break(a, b)));
        matches.into_iter().take(limit).map(|(_, r)| r.clone()).collect()
    };

    SearchResult {
        returned_count: funds.len(),
        funds,
        total_count: snapshot.len(),
        cache_time: snapshot.captured_at(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Tier {
    ExactCode = 0,
    CodePrefix = 1,
    NamePrefix = 2,
    Substring = 3,
}

impl Tier {
    /// Classify a record against an already-lowercased, non-empty query.
    /// Returns `None` when the record does not match at all.
    fn classify(keys: &MatchKeys, query: &str) -> Option<Self> {
        if keys.code == query {
            Some(Self::ExactCode)
        } else if keys.code.starts_with(query) {
            Some(Self::CodePrefix)
        } else if keys.name.starts_with(query) {
            Some(Self::NamePrefix)
        } else if keys.code.contains(query) || keys.name.contains(query) {
            Some(Self::Substring)
        } else {
            None
        }
    }

    fn tie_break(self, a: &FundRecord, b: &FundRecord) -> Ordering {
        match self {
            Self::ExactCode | Self::CodePrefix => a.code.cmp(&b.code),
            Self::NamePrefix | Self::Substring => a.name.cmp(&b.name),
        }
    }
}
