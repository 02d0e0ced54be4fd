//! Fund directory: records, snapshots, and the cache/search/refresh machinery built on them.

pub mod cache;
pub mod refresh;
pub mod search;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub use cache::FundCache;
pub use refresh::Refresher;
pub use search::{MAX_LIMIT, NotReady, SearchResult, search};

/// One row of the fund directory as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundRecord {
    pub code: String,
    pub name: String,
    /// Fund type as reported upstream (e.g. "混合型-灵活"); may be empty.
    #[serde(rename = "type")]
    pub category: String,
    pub net_value: f64,
    pub daily_growth: f64,
    #[serde(rename = "total_value")]
    pub cumulative_value: f64,
}

/// An unvalidated row straight from a [`FundSource`](crate::eastmoney::FundSource).
///
/// Fields are kept as loose JSON values because upstream payloads are positional
/// arrays with no schema guarantees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFundRow {
    pub code: Option<Value>,
    pub name: Option<Value>,
    pub category: Option<Value>,
    pub net_value: Option<Value>,
    pub daily_growth: Option<Value>,
    pub cumulative_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowParseError {
    #[error("row has no usable `{0}` field")]
    Missing(&'static str),
    #[error("row field `{field}` has unexpected type: {found}")]
    WrongType { field: &'static str, found: String },
}

/// Normalize a raw upstream row into a [`FundRecord`].
///
/// Code and name must be non-empty after trimming. Numeric display fields fall
/// back to `0.0` when absent or unparseable.
pub fn normalize(row: RawFundRow) -> Result<FundRecord, RowParseError> {
    let code = required_text(row.code.as_ref(), "code")?;
    let name = required_text(row.name.as_ref(), "name")?;
    let category = row
        .category
        .as_ref()
        .and_then(|v| text(v, "category").ok())
        .unwrap_or_default();

    Ok(FundRecord {
        code,
        name,
        category,
        net_value: number_or_zero(row.net_value.as_ref()),
        daily_growth: number_or_zero(row.daily_growth.as_ref()),
        cumulative_value: number_or_zero(row.cumulative_value.as_ref()),
    })
}

fn required_text(value: Option<&Value>, field: &'static str) -> Result<String, RowParseError> {
    let s = text(value.ok_or(RowParseError::Missing(field))?, field)?;
    if s.is_empty() {
        return Err(RowParseError::Missing(field));
    }
    Ok(s)
}

/// Strings are trimmed; numeric codes (e.g. `1` from a sloppy feed) are stringified.
fn text(value: &Value, field: &'static str) -> Result<String, RowParseError> {
    match value {
        Value::String(s) => Ok(s.trim().to_owned()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Err(RowParseError::Missing(field)),
        other => Err(RowParseError::WrongType {
            field,
            found: json_type_name(other).to_owned(),
        }),
    }
}

fn number_or_zero(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lowercased match keys, computed once per snapshot rather than per query.
#[derive(Debug, Clone)]
pub(crate) struct MatchKeys {
    pub(crate) code: String,
    pub(crate) name: String,
}

/// An immutable point-in-time capture of the fund directory.
///
/// Never mutated after construction; refreshes build a new one and swap it in.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    records: Vec<FundRecord>,
    keys: Vec<MatchKeys>,
    captured_at: DateTime<Utc>,
}

impl DirectorySnapshot {
    pub fn new(records: Vec<FundRecord>, captured_at: DateTime<Utc>) -> Self {
        let keys = records
            .iter()
            .map(|r| MatchKeys {
                code: r.code.to_lowercase(),
                name: r.name.to_lowercase(),
            })
            .collect();
        Self {
            records,
            keys,
            captured_at,
        }
    }

    /// Build a snapshot from raw rows, silently dropping rows that fail normalization.
    ///
    /// Returns the snapshot and the number of skipped rows.
    pub fn from_rows(rows: Vec<RawFundRow>, captured_at: DateTime<Utc>) -> (Self, usize) {
        let total = rows.len();
        let records: Vec<FundRecord> = rows.into_iter().filter_map(|r| normalize(r).ok()).collect();
        let skipped = total - records.len();
        (Self::new(records, captured_at), skipped)
    }

    pub fn records(&self) -> &[FundRecord] {
        &self.records
    }

    pub(crate) fn keys(&self) -> &[MatchKeys] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Exact (case-insensitive) lookup by fund code.
    pub fn find_by_code(&self, code: &str) -> Option<&FundRecord> {
        let needle = code.trim().to_lowercase();
        self.keys
            .iter()
            .position(|k| k.code == needle)
            .map(|i| &self.records[i])
    }
}
