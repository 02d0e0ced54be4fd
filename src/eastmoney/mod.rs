//! Eastmoney fund data client and the [`FundSource`] seam the rest of the crate
//! consumes.

pub mod errors;
pub mod json;

pub use errors::SourceError;

use crate::funds::RawFundRow;
use crate::utils::with_retry;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Asia::Shanghai;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://fund.eastmoney.com";

/// One trading day of a fund's price history.
#[derive(Debug, Clone, PartialEq)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub net_value: Option<f64>,
    /// Percent change versus the previous trading day.
    pub daily_growth: f64,
    pub cumulative_value: Option<f64>,
}

/// External source of fund reference and price data.
#[async_trait]
pub trait FundSource: Send + Sync {
    /// The full fund directory as raw, unvalidated rows.
    async fn fetch_directory(&self) -> Result<Vec<RawFundRow>, SourceError>;

    /// Daily NAV history for one fund, sorted by date.
    async fn fetch_history(&self, code: &str) -> Result<Vec<NavPoint>, SourceError>;
}

pub struct EastmoneyClient {
    http: reqwest::Client,
    base_url: String,
}

impl EastmoneyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("jj-serve/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let http = &self.http;
        let response = with_retry(
            move || async move {
                http.get(url)
                    .header(header::REFERER, "https://fund.eastmoney.com/")
                    .send()
                    .await
            },
            2,
            500,
        )
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl FundSource for EastmoneyClient {
    async fn fetch_directory(&self) -> Result<Vec<RawFundRow>, SourceError> {
        let url = format!("{}/js/fundcode_search.js", self.base_url);
        debug!(url = %url, "requesting fund directory");
        let body = self.get_text(&url).await?;
        parse_directory(&body).map_err(|e| match e {
            DirectoryError::Empty => SourceError::Empty,
            DirectoryError::Malformed(source) => SourceError::Malformed { url, source },
        })
    }

    async fn fetch_history(&self, code: &str) -> Result<Vec<NavPoint>, SourceError> {
        let url = format!("{}/pingzhongdata/{code}.js", self.base_url);
        debug!(url = %url, "requesting fund history");
        let body = self.get_text(&url).await?;
        parse_history(&body).map_err(|source| SourceError::Malformed { url, source })
    }
}

enum DirectoryError {
    Empty,
    Malformed(anyhow::Error),
}

/// Parse `var r = [["code","abbr","name","type","pinyin"], ...];`.
///
/// Rows are mapped positionally without validation; entries that are not
/// arrays become empty rows and are dropped during normalization.
fn parse_directory(body: &str) -> Result<Vec<RawFundRow>, DirectoryError> {
    let array = json::extract_js_array(body, "r").ok_or_else(|| {
        DirectoryError::Malformed(anyhow::anyhow!("no `var r = [...]` assignment in payload"))
    })?;
    let entries: Vec<Value> =
        json::parse_json_with_context(array).map_err(DirectoryError::Malformed)?;
    if entries.is_empty() {
        return Err(DirectoryError::Empty);
    }

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            Value::Array(cols) => {
                let mut cols = cols.into_iter();
                let code = cols.next();
                let name = cols.nth(1);
                let category = cols.next();
                RawFundRow {
                    code,
                    name,
                    category,
                    ..Default::default()
                }
            }
            _ => RawFundRow::default(),
        })
        .collect())
}

#[derive(Deserialize)]
struct NetWorthPoint {
    x: i64,
    y: Option<Value>,
    #[serde(rename = "equityReturn", default)]
    equity_return: Option<Value>,
}

/// Parse `Data_netWorthTrend` (and `Data_ACWorthTrend` when present) out of a
/// `pingzhongdata/{code}.js` payload.
fn parse_history(body: &str) -> anyhow::Result<Vec<NavPoint>> {
    let trend = json::extract_js_array(body, "Data_netWorthTrend")
        .ok_or_else(|| anyhow::anyhow!("no `Data_netWorthTrend` in payload"))?;
    let trend: Vec<NetWorthPoint> = json::parse_json_with_context(trend)?;

    let accumulated: Vec<(i64, Option<f64>)> =
        match json::extract_js_array(body, "Data_ACWorthTrend") {
            Some(raw) => json::parse_json_with_context(raw)?,
            None => Vec::new(),
        };
    let accumulated: std::collections::HashMap<NaiveDate, f64> = accumulated
        .into_iter()
        .filter_map(|(ms, v)| Some((shanghai_date(ms)?, v?)))
        .collect();

    let mut points: Vec<NavPoint> = trend
        .into_iter()
        .filter_map(|p| {
            let date = shanghai_date(p.x)?;
            Some(NavPoint {
                date,
                net_value: p.y.as_ref().and_then(as_number),
                daily_growth: p.equity_return.as_ref().and_then(as_number).unwrap_or(0.0),
                cumulative_value: accumulated.get(&date).copied(),
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    Ok(points)
}

/// Eastmoney timestamps are midnight China Standard Time in epoch millis.
fn shanghai_date(epoch_ms: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(epoch_ms).map(|t| t.with_timezone(&Shanghai).date_naive())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
