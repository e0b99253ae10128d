#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("calendar refresh source failed: {0}")]
    RefreshFailed(String),

    #[error("no timezone mapping for market {0}")]
    UnknownMarketTimezone(instrument::Market),
}
