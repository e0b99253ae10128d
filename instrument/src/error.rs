use crate::instrument::Symbol;

#[derive(Debug, thiserror::Error)]
pub enum InstrumentError {
    #[error("symbol {0} is not in the watchlist")]
    UnknownSymbol(Symbol),

    #[error("watchlist source produced zero symbols")]
    EmptyWatchlist,

    #[error("failed to load watchlist: {0}")]
    Source(String),
}
