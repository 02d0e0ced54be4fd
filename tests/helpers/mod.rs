//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use jj_serve::eastmoney::{FundSource, NavPoint, SourceError};
use jj_serve::funds::{FundRecord, RawFundRow};
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory [`FundSource`] with a swappable directory and a fixed history.
pub struct FakeSource {
    directory: Mutex<Option<Vec<RawFundRow>>>,
    history: Vec<NavPoint>,
    pub directory_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(directory: Option<Vec<RawFundRow>>, history: Vec<NavPoint>) -> Self {
        Self {
            directory: Mutex::new(directory),
            history,
            directory_calls: AtomicUsize::new(0),
        }
    }

    /// A source whose directory fetch always fails.
    pub fn unavailable() -> Self {
        Self::new(None, Vec::new())
    }

    pub fn set_directory(&self, directory: Option<Vec<RawFundRow>>) {
        *self.directory.lock().unwrap() = directory;
    }
}

#[async_trait]
impl FundSource for FakeSource {
    async fn fetch_directory(&self) -> Result<Vec<RawFundRow>, SourceError> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        self.directory
            .lock()
            .unwrap()
            .clone()
            .ok_or(SourceError::Empty)
    }

    async fn fetch_history(&self, code: &str) -> Result<Vec<NavPoint>, SourceError> {
        if code == "000001" {
            Ok(self.history.clone())
        } else {
            Err(SourceError::Empty)
        }
    }
}

pub fn row(code: &str, name: &str, category: &str) -> RawFundRow {
    RawFundRow {
        code: Some(json!(code)),
        name: Some(json!(name)),
        category: Some(json!(category)),
        ..Default::default()
    }
}

pub fn sample_directory() -> Vec<RawFundRow> {
    vec![
        row("100000001", "000001 Fund", "债券型"),
        row("000001", "华夏成长混合", "混合型-灵活"),
        row("000003", "中海可转债债券A", "债券型-混合二级"),
        row("000011", "华夏大盘精选混合A", "混合型-偏股"),
        row("510300", "沪深300ETF", "指数型-股票"),
        row("", "missing code", ""),
    ]
}

pub fn record(code: &str, name: &str) -> FundRecord {
    FundRecord {
        code: code.to_owned(),
        name: name.to_owned(),
        category: String::new(),
        net_value: 0.0,
        daily_growth: 0.0,
        cumulative_value: 0.0,
    }
}

pub fn nav(y: i32, m: u32, d: u32, value: f64, growth: f64) -> NavPoint {
    NavPoint {
        date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        net_value: Some(value),
        daily_growth: growth,
        cumulative_value: None,
    }
}
