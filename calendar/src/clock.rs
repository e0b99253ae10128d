use chrono::{DateTime, Utc};

/// Source of the current wall-clock instant, abstracted so tests can inject fixed times.
///
/// Mirrors the teacher's pattern of isolating non-deterministic inputs behind a trait so
/// the calendar's session logic stays a pure function of `(market, instant)`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the OS wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// [`Clock`] that always returns a fixed instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
