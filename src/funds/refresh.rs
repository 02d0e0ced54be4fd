//! Fund directory refresher: one refresh at startup, then one per midnight.
//!
//! The scheduling loop recomputes the delay to the next midnight on every
//! iteration instead of using a fixed-period ticker, so a late or slow refresh
//! never shifts subsequent refreshes off midnight.

use super::{DirectorySnapshot, FundCache};
use crate::eastmoney::{FundSource, SourceError};
use crate::funds::RawFundRow;
use crate::utils::fmt_duration;
use chrono::{DateTime, Days, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, error, info, warn};

/// Timezone whose midnight triggers the daily refresh.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RefreshZone {
    /// The host's local timezone.
    #[default]
    Local,
    Named(Tz),
}

impl RefreshZone {
    /// The first midnight strictly after `now`, in this zone.
    pub fn next_midnight(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Local => next_midnight(&now.with_timezone(&Local)).with_timezone(&Utc),
            Self::Named(tz) => next_midnight(&now.with_timezone(tz)).with_timezone(&Utc),
        }
    }

    /// Wall-clock time of `t` in this zone.
    pub fn localize(&self, t: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => t.with_timezone(&Local).naive_local(),
            Self::Named(tz) => t.with_timezone(tz).naive_local(),
        }
    }
}

/// The next local midnight after `now`.
///
/// When a DST transition skips midnight, the first valid hour of that day is
/// used instead.
pub fn next_midnight<Z: TimeZone>(now: &DateTime<Z>) -> DateTime<Z> {
    let tz = now.timezone();
    let mut date = now.date_naive();
    while let Some(next) = date.checked_add_days(Days::new(1)) {
        date = next;
        for hour in 0..3 {
            let Some(candidate) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            if let Some(t) = tz.from_local_datetime(&candidate).earliest() {
                return t;
            }
        }
    }
    now.clone()
}

/// The midnight the loop should wait for next.
///
/// Anchored on the previous target as well as `now`: the timer can fire a
/// little before the wall clock reaches midnight, and that must not schedule
/// the same midnight twice.
fn next_target(
    zone: &RefreshZone,
    now: DateTime<Utc>,
    last_target: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let from = last_target.map_or(now, |last| last.max(now));
    zone.next_midnight(from)
}

/// Owns the write side of the [`FundCache`].
pub struct Refresher {
    source: Arc<dyn FundSource>,
    cache: FundCache,
    fetch_timeout: Duration,
    zone: RefreshZone,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn FundSource>,
        cache: FundCache,
        fetch_timeout: Duration,
        zone: RefreshZone,
    ) -> Self {
        Self {
            source,
            cache,
            fetch_timeout,
            zone,
        }
    }

    /// Fetch the directory, build a snapshot, and install it.
    ///
    /// Returns `true` if a new snapshot was installed. On any failure the cache
    /// is left untouched and the error is logged here; nothing propagates.
    pub async fn refresh(&self) -> bool {
        let start = Instant::now();

        let rows = match self.fetch_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = ?e, "Failed to fetch fund directory; keeping previous snapshot");
                return false;
            }
        };

        let (snapshot, skipped) = DirectorySnapshot::from_rows(rows, Utc::now());
        if skipped > 0 {
            debug!(skipped, "Dropped malformed fund rows");
        }
        if snapshot.is_empty() {
            error!(
                error = ?SourceError::Empty,
                skipped,
                "Fund directory had no valid rows; keeping previous snapshot"
            );
            return false;
        }

        let funds = snapshot.len();
        let captured_at = snapshot.captured_at();
        if !self.cache.put(snapshot) {
            return false;
        }

        info!(
            funds,
            skipped,
            cache_time = %self.zone.localize(captured_at),
            duration = fmt_duration(start.elapsed()),
            "Fund directory refreshed"
        );
        true
    }

    async fn fetch_rows(&self) -> Result<Vec<RawFundRow>, SourceError> {
        match time::timeout(self.fetch_timeout, self.source.fetch_directory()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(SourceError::Timeout(self.fetch_timeout)),
        }
    }

    /// Runs the midnight refresh loop until a shutdown signal arrives.
    ///
    /// The startup refresh is the caller's job; this loop only handles the
    /// scheduled ones. An in-flight refresh is abandoned on shutdown.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Fund directory refresher started");

        let mut last_target = None;
        loop {
            let now = Utc::now();
            let next = next_target(&self.zone, now, last_target);
            last_target = Some(next);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(
                next_refresh = %self.zone.localize(next),
                wait = fmt_duration(wait),
                "Scheduled next fund directory refresh"
            );

            tokio::select! {
                _ = time::sleep(wait) => {}
                _ = shutdown_rx.recv() => {
                    info!("Refresher received shutdown signal");
                    break;
                }
            }

            tokio::select! {
                ok = self.refresh() => {
                    if !ok {
                        warn!("Scheduled fund directory refresh failed; will retry at next midnight");
                    }
                }
                _ = shutdown_rx.recv() => {
                    warn!("Shutdown during fund directory refresh, abandoning it");
                    break;
                }
            }
        }

        info!("Refresher exiting gracefully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eastmoney::NavPoint;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Timelike};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake source returning queued responses in order, then repeating the last.
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<RawFundRow>, SourceError>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<RawFundRow>, SourceError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait]
    impl FundSource for ScriptedSource {
        async fn fetch_directory(&self) -> Result<Vec<RawFundRow>, SourceError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                match &responses[0] {
                    Ok(rows) => Ok(rows.clone()),
                    Err(_) => Err(SourceError::Empty),
                }
            }
        }

        async fn fetch_history(&self, _code: &str) -> Result<Vec<NavPoint>, SourceError> {
            Ok(Vec::new())
        }
    }

    struct HangingSource;

    #[async_trait]
    impl FundSource for HangingSource {
        async fn fetch_directory(&self) -> Result<Vec<RawFundRow>, SourceError> {
            std::future::pending().await
        }

        async fn fetch_history(&self, _code: &str) -> Result<Vec<NavPoint>, SourceError> {
            std::future::pending().await
        }
    }

    fn row(code: &str, name: &str) -> RawFundRow {
        RawFundRow {
            code: Some(json!(code)),
            name: Some(json!(name)),
            ..Default::default()
        }
    }

    /// Hangs on every directory fetch, counting attempts.
    #[derive(Default)]
    struct CountingHangingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FundSource for CountingHangingSource {
        async fn fetch_directory(&self) -> Result<Vec<RawFundRow>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn fetch_history(&self, _code: &str) -> Result<Vec<NavPoint>, SourceError> {
            std::future::pending().await
        }
    }

    fn refresher(source: Arc<dyn FundSource>, cache: &FundCache) -> Refresher {
        Refresher::new(source, cache.clone(), Duration::from_secs(5), RefreshZone::default())
    }

    #[tokio::test]
    async fn successful_refresh_installs_valid_rows() {
        let cache = FundCache::new();
        let source = ScriptedSource::new(vec![Ok(vec![
            row("000001", "华夏成长混合"),
            row("", "no code"),
            row("000003", "中海可转债债券A"),
        ])]);

        assert!(refresher(source, &cache).refresh().await);
        let snap = cache.get().unwrap();
        assert_eq!(snap.len(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let cache = FundCache::new();
        let source = ScriptedSource::new(vec![
            Ok(vec![row("000001", "A")]),
            Err(SourceError::Empty),
        ]);
        let refresher = refresher(source, &cache);

        assert!(refresher.refresh().await);
        let before = cache.get().unwrap();
        assert!(!refresher.refresh().await);
        let after = cache.get().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn failed_first_refresh_leaves_cache_empty() {
        let cache = FundCache::new();
        let source = ScriptedSource::new(vec![Err(SourceError::Empty)]);
        assert!(!refresher(source, &cache).refresh().await);
        assert!(!cache.is_ready());
    }

    #[tokio::test]
    async fn all_rows_invalid_is_a_failure() {
        let cache = FundCache::new();
        let source = ScriptedSource::new(vec![Ok(vec![row("", ""), RawFundRow::default()])]);
        assert!(!refresher(source, &cache).refresh().await);
        assert!(!cache.is_ready());
    }

    #[tokio::test]
    async fn repeated_refresh_is_idempotent_except_timestamp() {
        let cache = FundCache::new();
        let source = ScriptedSource::new(vec![Ok(vec![row("000001", "A"), row("000002", "B")])]);
        let refresher = refresher(source, &cache);

        assert!(refresher.refresh().await);
        let first = cache.get().unwrap();
        assert!(refresher.refresh().await);
        let second = cache.get().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.records(), second.records());
        assert!(second.captured_at() >= first.captured_at());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_source_times_out() {
        let cache = FundCache::new();
        let refresher = Refresher::new(
            Arc::new(HangingSource),
            cache.clone(),
            Duration::from_secs(30),
            RefreshZone::default(),
        );
        assert!(!refresher.refresh().await);
        assert!(!cache.is_ready());
    }

    #[tokio::test]
    async fn run_exits_on_shutdown() {
        let cache = FundCache::new();
        let refresher = refresher(Arc::new(HangingSource), &cache);
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { refresher.run(rx).await });
        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("refresher should stop promptly")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_ticks_keep_firing_after_timeouts() {
        let source = Arc::new(CountingHangingSource::default());
        let refresher = Refresher::new(
            source.clone(),
            FundCache::new(),
            Duration::from_secs(30),
            RefreshZone::Named(chrono_tz::Asia::Shanghai),
        );
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move { refresher.run(rx).await });

        time::sleep(Duration::from_secs(4 * 24 * 3600)).await;
        assert!(
            source.calls.load(Ordering::SeqCst) >= 2,
            "expected repeated scheduled fetches, got {}",
            source.calls.load(Ordering::SeqCst)
        );

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn early_wakeup_does_not_repeat_midnight() {
        let zone = RefreshZone::Named("Asia/Shanghai".parse().unwrap());
        let target = Utc.with_ymd_and_hms(2025, 3, 1, 16, 0, 0).unwrap(); // 00:00 CST
        let early = target - chrono::Duration::milliseconds(200);

        assert_eq!(next_target(&zone, early, None), target);
        assert_eq!(
            next_target(&zone, early, Some(target)),
            target + chrono::Duration::days(1)
        );
        // A late wakeup still moves on from the wall clock.
        let late = target + chrono::Duration::days(2);
        assert_eq!(
            next_target(&zone, late, Some(target)),
            target + chrono::Duration::days(3)
        );
    }

    #[test]
    fn next_midnight_is_next_day() {
        let tz: Tz = "Asia/Shanghai".parse().unwrap();
        let now = tz.with_ymd_and_hms(2025, 3, 1, 13, 45, 0).unwrap();
        let next = next_midnight(&now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
    }

    #[test]
    fn exactly_midnight_schedules_following_day() {
        let tz: Tz = "Asia/Shanghai".parse().unwrap();
        let now = tz.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            next_midnight(&now).date_naive(),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
        );
    }

    #[test]
    fn skipped_midnight_uses_first_valid_hour() {
        // Santiago springs forward at 24:00 on the first Saturday of September.
        let tz: Tz = "America/Santiago".parse().unwrap();
        let now = tz.with_ymd_and_hms(2024, 9, 7, 12, 0, 0).unwrap();
        let next = next_midnight(&now);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 9, 8).unwrap());
        assert_eq!(next.hour(), 1);
    }

    #[test]
    fn zone_next_midnight_in_utc() {
        let zone = RefreshZone::Named("Asia/Shanghai".parse().unwrap());
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap(); // 23:00 CST
        let next = zone.next_midnight(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 3, 1, 16, 0, 0).unwrap());
    }
}
