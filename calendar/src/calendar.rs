use crate::{
    clock::Clock,
    error::CalendarError,
    session::Session,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use instrument::{Market, Symbol};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A trading day for one market: its session windows (local time) and half-day flag.
#[derive(Debug, Clone)]
pub struct CalendarDay {
    pub market: Market,
    pub trade_date: NaiveDate,
    /// `(begin, end)` pairs in the market's local time zone, morning first.
    pub sessions: Vec<(NaiveTime, NaiveTime)>,
    pub is_half_day: bool,
}

/// A source capable of refreshing future calendar days, e.g. a quote provider's trading
/// calendar endpoint. Kept separate from [`Calendar`] so the calendar itself stays pure.
#[async_trait::async_trait]
pub trait CalendarRefreshSource: Send + Sync {
    async fn fetch_days(
        &self,
        market: Market,
        horizon_days: u32,
    ) -> Result<Vec<CalendarDay>, CalendarError>;
}

fn timezone_for(market: Market) -> Tz {
    match market {
        Market::Hk => chrono_tz::Asia::Hong_Kong,
        Market::Us => chrono_tz::America::New_York,
        Market::Cn => chrono_tz::Asia::Shanghai,
        Market::Sg => chrono_tz::Asia::Singapore,
    }
}

/// Default, timezone-correct session windows for a market's regular trading day, used when
/// the calendar cache has no entry yet (see `CalendarDay` fallback in [`Calendar::session_of`]).
fn default_sessions(market: Market) -> Vec<(NaiveTime, NaiveTime)> {
    match market {
        Market::Hk => vec![
            (NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(12, 0, 0).unwrap()),
            (NaiveTime::from_hms_opt(13, 0, 0).unwrap(), NaiveTime::from_hms_opt(16, 0, 0).unwrap()),
        ],
        Market::Us => vec![
            (NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(16, 0, 0).unwrap()),
        ],
        Market::Cn => vec![
            (NaiveTime::from_hms_opt(9, 30, 0).unwrap(), NaiveTime::from_hms_opt(11, 30, 0).unwrap()),
            (NaiveTime::from_hms_opt(13, 0, 0).unwrap(), NaiveTime::from_hms_opt(15, 0, 0).unwrap()),
        ],
        Market::Sg => vec![
            (NaiveTime::from_hms_opt(9, 0, 0).unwrap(), NaiveTime::from_hms_opt(12, 0, 0).unwrap()),
            (NaiveTime::from_hms_opt(13, 0, 0).unwrap(), NaiveTime::from_hms_opt(17, 0, 0).unwrap()),
        ],
    }
}

fn premarket_window(market: Market) -> Option<(NaiveTime, NaiveTime)> {
    match market {
        Market::Us => Some((
            NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        )),
        _ => None,
    }
}

fn postmarket_window(market: Market) -> Option<(NaiveTime, NaiveTime)> {
    match market {
        Market::Us => Some((
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        )),
        _ => None,
    }
}

/// Exchange clock and trading-session calendar.
///
/// Holds a per-`(market, date)` cache that is consulted by `session_of`/`is_open`; when the
/// cache is empty for a market, falls back to the weekday rule described in §4.1 and logs a
/// warning, per the failure semantics of the distilled specification.
pub struct Calendar {
    cache: RwLock<HashMap<(Market, NaiveDate), CalendarDay>>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new()
    }
}

impl Calendar {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn market_for(symbol: &Symbol) -> Option<Market> {
        symbol.market()
    }

    fn local_date(market: Market, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&timezone_for(market)).date_naive()
    }

    fn local_time(market: Market, now: DateTime<Utc>) -> NaiveTime {
        now.with_timezone(&timezone_for(market)).time()
    }

    /// Classify `now` (UTC) against `market`'s trading day.
    pub fn session_of(&self, market: Market, now: DateTime<Utc>) -> Session {
        let local_date = Self::local_date(market, now);
        let local_time = Self::local_time(market, now);

        let weekday = local_date.weekday();
        if matches!(weekday, Weekday::Sat | Weekday::Sun) {
            return Session::Closed;
        }

        let day = self.cache.read().get(&(market, local_date)).cloned();
        let sessions = match day {
            Some(day) => day.sessions,
            None => {
                tracing::warn!(?market, %local_date, "calendar cache empty, using weekday fallback");
                default_sessions(market)
            }
        };

        if sessions
            .iter()
            .any(|(begin, end)| local_time >= *begin && local_time < *end)
        {
            return Session::Regular;
        }

        if let Some((begin, end)) = premarket_window(market) {
            if local_time >= begin && local_time < end {
                return Session::Premarket;
            }
        }

        if let Some((begin, end)) = postmarket_window(market) {
            if local_time >= begin && local_time < end {
                return Session::Postmarket;
            }
        }

        Session::Closed
    }

    pub fn is_open(&self, symbol: &Symbol, now: DateTime<Utc>) -> bool {
        match symbol.market() {
            Some(market) => self.session_of(market, now) == Session::Regular,
            None => false,
        }
    }

    /// Whether `market`'s cached day for `now`'s local date is a half trading day (HK: only
    /// the morning session is kept).
    pub fn is_half_day(&self, market: Market, now: DateTime<Utc>) -> bool {
        let local_date = Self::local_date(market, now);
        self.cache
            .read()
            .get(&(market, local_date))
            .map(|day| day.is_half_day)
            .unwrap_or(false)
    }

    /// Next instant (UTC) at which `market` enters its regular session, scanning forward day
    /// by day up to 14 calendar days.
    pub fn next_open(&self, market: Market, now: DateTime<Utc>) -> DateTime<Utc> {
        let tz = timezone_for(market);
        let mut candidate_date = now.with_timezone(&tz).date_naive();

        for _ in 0..14 {
            let sessions = self
                .cache
                .read()
                .get(&(market, candidate_date))
                .map(|day| day.sessions.clone())
                .unwrap_or_else(|| default_sessions(market));

            if !matches!(candidate_date.weekday(), Weekday::Sat | Weekday::Sun) {
                if let Some((begin, _)) = sessions.first() {
                    if let Some(local_open) = tz.from_local_datetime(&candidate_date.and_time(*begin)).single() {
                        let open_utc = local_open.with_timezone(&Utc);
                        if open_utc > now {
                            return open_utc;
                        }
                    }
                }
            }
            candidate_date += Duration::days(1);
        }

        // Degenerate fallback: cap the wait at 24h so callers never block forever.
        now + Duration::hours(24)
    }

    /// Ensure the cache holds entries for `markets` out to `horizon_days`; fetch and persist
    /// missing days via `source`.
    pub async fn ensure_calendar(
        &self,
        markets: &[Market],
        horizon_days: u32,
        source: &dyn CalendarRefreshSource,
    ) -> Result<(), CalendarError> {
        for &market in markets {
            let has_any = self.cache.read().keys().any(|(m, _)| *m == market);
            if has_any {
                continue;
            }
            let days = source.fetch_days(market, horizon_days).await?;
            let mut cache = self.cache.write();
            for day in days {
                cache.insert((day.market, day.trade_date), day);
            }
        }
        Ok(())
    }

    /// Directly seed the cache, e.g. from a persisted `trading_calendar` table on startup.
    pub fn seed(&self, days: Vec<CalendarDay>) {
        let mut cache = self.cache.write();
        for day in days {
            cache.insert((day.market, day.trade_date), day);
        }
    }
}

/// Convenience wrapper pairing a [`Calendar`] with a [`Clock`] for call sites that always
/// want "now" resolved the same way (production vs fixed-time tests).
pub struct ExchangeClock<C: Clock> {
    pub calendar: Calendar,
    pub clock: C,
}

impl<C: Clock> ExchangeClock<C> {
    pub fn new(calendar: Calendar, clock: C) -> Self {
        Self { calendar, clock }
    }

    pub fn session_of(&self, market: Market) -> Session {
        self.calendar.session_of(market, self.clock.now())
    }

    pub fn is_open(&self, symbol: &Symbol) -> bool {
        self.calendar.is_open(symbol, self.clock.now())
    }

    pub fn next_open(&self, market: Market) -> DateTime<Utc> {
        self.calendar.next_open(market, self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_hk_regular_session_fallback() {
        let calendar = Calendar::new();
        // 2024-01-02 is a Tuesday; 02:31 UTC = 10:31 HKT.
        let now = utc(2024, 1, 2, 2, 31);
        assert_eq!(calendar.session_of(Market::Hk, now), Session::Regular);
    }

    #[test]
    fn test_hk_lunch_break_is_closed() {
        let calendar = Calendar::new();
        // 04:30 UTC = 12:30 HKT, inside the lunch break.
        let now = utc(2024, 1, 2, 4, 30);
        assert_eq!(calendar.session_of(Market::Hk, now), Session::Closed);
    }

    #[test]
    fn test_weekend_is_closed() {
        let calendar = Calendar::new();
        let saturday = utc(2024, 1, 6, 4, 0);
        assert_eq!(calendar.session_of(Market::Us, saturday), Session::Closed);
    }

    #[test]
    fn test_us_premarket_and_postmarket() {
        let calendar = Calendar::new();
        // 09:00 UTC = 04:00 ET in January (EST, UTC-5).
        let premarket = utc(2024, 1, 2, 9, 0);
        assert_eq!(calendar.session_of(Market::Us, premarket), Session::Premarket);

        // 21:30 UTC = 16:30 ET.
        let postmarket = utc(2024, 1, 2, 21, 30);
        assert_eq!(calendar.session_of(Market::Us, postmarket), Session::Postmarket);
    }

    #[test]
    fn test_is_open_uses_symbol_market() {
        let calendar = Calendar::new();
        let now = utc(2024, 1, 2, 2, 31);
        assert!(calendar.is_open(&Symbol::new("0700.HK"), now));
        assert!(!calendar.is_open(&Symbol::new("AAPL.US"), now));
    }

    #[test]
    fn test_next_open_skips_weekend() {
        let calendar = Calendar::new();
        // Friday evening HKT, after close.
        let friday_evening = utc(2024, 1, 5, 10, 0);
        let next = calendar.next_open(Market::Hk, friday_evening);
        // Should land on Monday 2024-01-08 09:30 HKT = 01:30 UTC.
        assert_eq!(next, utc(2024, 1, 8, 1, 30));
    }

    #[test]
    fn test_exchange_clock_uses_fixed_clock() {
        let now = utc(2024, 1, 2, 2, 31);
        let exchange = ExchangeClock::new(Calendar::new(), FixedClock(now));
        assert_eq!(exchange.session_of(Market::Hk), Session::Regular);
    }
}
