use crate::{
    error::InstrumentError,
    exchange::Market,
    instrument::{Symbol, SymbolMeta, tick::TickTable},
};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Source of truth for which symbols are tradeable and their static metadata.
///
/// Implementations may load from a built-in list or a file, per the `--watchlist` CLI flag.
pub trait WatchlistSource: Send + Sync {
    fn load(&self) -> Result<Vec<SymbolMeta>, InstrumentError>;
}

/// A fixed, in-memory watchlist, for built-in mode and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticWatchlist(pub Vec<SymbolMeta>);

impl WatchlistSource for StaticWatchlist {
    fn load(&self) -> Result<Vec<SymbolMeta>, InstrumentError> {
        Ok(self.0.clone())
    }
}

/// Canonical set of tradeable symbols plus a per-symbol lot-size/tick-size cache.
///
/// Loaded once at startup from a [`WatchlistSource`]; lot sizes may later be refreshed by
/// the quote gateway and are cached here to avoid a round trip on every order validation.
pub struct WatchlistResolver {
    symbols: RwLock<HashMap<Symbol, SymbolMeta>>,
}

impl WatchlistResolver {
    pub fn load(source: &dyn WatchlistSource) -> Result<Self, InstrumentError> {
        let metas = source.load()?;
        if metas.is_empty() {
            return Err(InstrumentError::EmptyWatchlist);
        }
        let symbols = metas
            .into_iter()
            .map(|meta| (meta.symbol.clone(), meta))
            .collect();
        Ok(Self {
            symbols: RwLock::new(symbols),
        })
    }

    /// Whether `symbol` is a member of the watchlist.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.read().contains_key(symbol)
    }

    /// Look up cached metadata for `symbol`, including its board lot.
    pub fn meta(&self, symbol: &Symbol) -> Result<SymbolMeta, InstrumentError> {
        self.symbols
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| InstrumentError::UnknownSymbol(symbol.clone()))
    }

    /// Board-lot size for `symbol`.
    pub fn lot_size(&self, symbol: &Symbol) -> Result<u64, InstrumentError> {
        self.meta(symbol).map(|meta| meta.lot_size)
    }

    /// Tick table for `symbol`'s market.
    pub fn tick_table(&self, symbol: &Symbol) -> Result<TickTable, InstrumentError> {
        self.meta(symbol).map(|meta| TickTable::for_market(meta.market))
    }

    /// Overwrite the cached lot size for `symbol` (used after a broker-reported lot-size
    /// error forces a refresh).
    pub fn refresh_lot_size(&self, symbol: &Symbol, lot_size: u64) -> Result<(), InstrumentError> {
        let mut symbols = self.symbols.write();
        let meta = symbols
            .get_mut(symbol)
            .ok_or_else(|| InstrumentError::UnknownSymbol(symbol.clone()))?;
        tracing::info!(%symbol, old = meta.lot_size, new = lot_size, "refreshed cached lot size");
        meta.lot_size = lot_size;
        Ok(())
    }

    /// All symbols currently assigned to `market`.
    pub fn symbols_for_market(&self, market: Market) -> Vec<Symbol> {
        self.symbols
            .read()
            .values()
            .filter(|meta| meta.market == market)
            .map(|meta| meta.symbol.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<SymbolMeta> {
        self.symbols.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StaticWatchlist {
        StaticWatchlist(vec![SymbolMeta::new(
            Symbol::new("0700.HK"),
            Market::Hk,
            "HKD".into(),
            100,
            "Tencent".into(),
        )])
    }

    #[test]
    fn test_load_and_lookup() {
        let resolver = WatchlistResolver::load(&sample()).unwrap();
        let symbol = Symbol::new("0700.HK");
        assert!(resolver.contains(&symbol));
        assert_eq!(resolver.lot_size(&symbol).unwrap(), 100);
    }

    #[test]
    fn test_unknown_symbol_errors() {
        let resolver = WatchlistResolver::load(&sample()).unwrap();
        let err = resolver.meta(&Symbol::new("AAPL.US"));
        assert!(matches!(err, Err(InstrumentError::UnknownSymbol(_))));
    }

    #[test]
    fn test_refresh_lot_size() {
        let resolver = WatchlistResolver::load(&sample()).unwrap();
        let symbol = Symbol::new("0700.HK");
        resolver.refresh_lot_size(&symbol, 500).unwrap();
        assert_eq!(resolver.lot_size(&symbol).unwrap(), 500);
    }

    #[test]
    fn test_empty_watchlist_errors() {
        let empty = StaticWatchlist(vec![]);
        assert!(matches!(
            WatchlistResolver::load(&empty),
            Err(InstrumentError::EmptyWatchlist)
        ));
    }
}
