//! Fund directory search, lookup, and price history handlers.

use axum::extract::{Query, State};
use axum::response::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use tokio::time;
use tracing::{debug, warn};

use crate::eastmoney::{NavPoint, SourceError};
use crate::funds::{self, FundRecord};
use crate::state::AppState;
use crate::web::error::{ApiError, Success, success};

const DEFAULT_LIMIT: usize = 20;
const DEFAULT_START_DATE: &str = "20230101";
const CACHE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const MAX_CODE_LEN: usize = 16;

#[derive(Debug, Deserialize)]
pub struct FundListParams {
    #[serde(default)]
    pub query: String,
    /// Kept as text so a non-numeric value maps to our own 400 envelope.
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FundListResponse {
    pub funds: Vec<FundRecord>,
    pub total_count: usize,
    pub returned_count: usize,
    pub cache_time: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeParams {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FundInfoResponse {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct FundDataParams {
    pub code: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HistoryItem {
    pub date: String,
    pub daily_growth: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_value: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FundDataResponse {
    pub list: Vec<HistoryItem>,
    pub fund_code: String,
    pub start_date: String,
    pub end_date: String,
    pub count: usize,
}

/// `GET /api/fund_list?query=&limit=`
pub(super) async fn fund_list(
    State(state): State<AppState>,
    Query(params): Query<FundListParams>,
) -> Result<Json<Success<FundListResponse>>, ApiError> {
    let limit = parse_limit(params.limit.as_deref())?;
    let result = funds::search(&state.fund_cache, &params.query, limit)?;
    debug!(
        query = %params.query,
        limit,
        returned = result.returned_count,
        "Fund search"
    );

    Ok(success(FundListResponse {
        funds: result.funds,
        total_count: result.total_count,
        returned_count: result.returned_count,
        cache_time: state
            .zone
            .localize(result.cache_time)
            .format(CACHE_TIME_FORMAT)
            .to_string(),
    }))
}

/// `GET /api/fund_info?code=`
pub(super) async fn fund_info(
    State(state): State<AppState>,
    Query(params): Query<CodeParams>,
) -> Result<Json<Success<FundInfoResponse>>, ApiError> {
    let code = require_code(params.code.as_deref())?;
    let snapshot = state.fund_cache.get().ok_or(funds::NotReady)?;
    let record = snapshot
        .find_by_code(code)
        .ok_or_else(|| ApiError::not_found(format!("fund code {code} not found")))?;

    Ok(success(FundInfoResponse {
        code: record.code.clone(),
        name: record.name.clone(),
        category: record.category.clone(),
    }))
}

/// `GET /api/fund_data?code=&start_date=&end_date=`
pub(super) async fn fund_data(
    State(state): State<AppState>,
    Query(params): Query<FundDataParams>,
) -> Result<Json<Success<FundDataResponse>>, ApiError> {
    let code = require_code(params.code.as_deref())?;
    let start_text = non_empty(params.start_date.as_deref())
        .unwrap_or(DEFAULT_START_DATE)
        .to_owned();
    let end_text = match non_empty(params.end_date.as_deref()) {
        Some(text) => text.to_owned(),
        None => state
            .zone
            .localize(Utc::now())
            .format("%Y%m%d")
            .to_string(),
    };
    let start = parse_date("start_date", &start_text)?;
    let end = parse_date("end_date", &end_text)?;

    let history = match time::timeout(state.fetch_timeout, state.source.fetch_history(code)).await
    {
        Ok(result) => result,
        Err(_elapsed) => Err(SourceError::Timeout(state.fetch_timeout)),
    };
    let history = history.map_err(|e| {
        warn!(code, error = ?e, "Failed to fetch fund history");
        ApiError::not_found(format!("cannot fetch data for fund {code}"))
    })?;

    let list = select_range(&history, start, end);
    if list.is_empty() {
        return Err(ApiError::not_found(format!(
            "no data for fund {code} between {start_text} and {end_text}"
        )));
    }

    Ok(success(FundDataResponse {
        count: list.len(),
        list,
        fund_code: code.to_owned(),
        start_date: start_text,
        end_date: end_text,
    }))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_limit(raw: Option<&str>) -> Result<usize, ApiError> {
    let Some(raw) = non_empty(raw) else {
        return Ok(DEFAULT_LIMIT);
    };
    // Out-of-range values clamp, including ones too large for an i64.
    match raw.parse::<i64>() {
        Ok(n) => Ok(n.clamp(1, funds::MAX_LIMIT as i64) as usize),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(funds::MAX_LIMIT),
            IntErrorKind::NegOverflow => Ok(1),
            _ => Err(ApiError::bad_request(format!(
                "limit must be an integer, got '{raw}'"
            ))),
        },
    }
}

fn require_code(raw: Option<&str>) -> Result<&str, ApiError> {
    let code = non_empty(raw).ok_or_else(|| ApiError::bad_request("fund code is required"))?;
    if code.len() > MAX_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::bad_request(format!("invalid fund code '{code}'")));
    }
    Ok(code)
}

fn parse_date(field: &str, text: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .map_err(|_| ApiError::bad_request(format!("{field} must be YYYYMMDD, got '{text}'")))
}

/// Points within `[start, end]`, in date order.
fn select_range(history: &[NavPoint], start: NaiveDate, end: NaiveDate) -> Vec<HistoryItem> {
    let mut points: Vec<&NavPoint> = history
        .iter()
        .filter(|p| p.date >= start && p.date <= end)
        .collect();
    points.sort_by_key(|p| p.date);
    points
        .into_iter()
        .map(|p| HistoryItem {
            date: p.date.format("%Y-%m-%d").to_string(),
            daily_growth: p.daily_growth,
            net_value: p.net_value,
        })
        .collect()
}
