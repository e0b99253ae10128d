use instrument::watchlist::WatchlistSource;
use instrument::{InstrumentError, Market, Symbol, SymbolMeta};

/// A small built-in cross-market list, for local runs and `--watchlist-mode built-in`.
#[derive(Debug, Default, Clone)]
pub struct BuiltInWatchlist;

impl WatchlistSource for BuiltInWatchlist {
    fn load(&self) -> Result<Vec<SymbolMeta>, InstrumentError> {
        Ok(vec![
            SymbolMeta::new(Symbol::new("0700.HK"), Market::Hk, "HKD".into(), 100, "Tencent".into()),
            SymbolMeta::new(Symbol::new("0005.HK"), Market::Hk, "HKD".into(), 400, "HSBC".into()),
            SymbolMeta::new(Symbol::new("AAPL.US"), Market::Us, "USD".into(), 1, "Apple".into()),
            SymbolMeta::new(Symbol::new("MSFT.US"), Market::Us, "USD".into(), 1, "Microsoft".into()),
            SymbolMeta::new(Symbol::new("600519.SH"), Market::Cn, "CNY".into(), 100, "Kweichow Moutai".into()),
            SymbolMeta::new(Symbol::new("000001.SZ"), Market::Cn, "CNY".into(), 100, "Ping An Bank".into()),
            SymbolMeta::new(Symbol::new("D05.SG"), Market::Sg, "SGD".into(), 100, "DBS Group".into()),
        ])
    }
}

/// Loads `symbol,market,currency,lot_size,name` lines from a file, per `--watchlist-file`.
/// Market is parsed case-insensitively from its `Market::as_str()` form (`hk`, `us`, `cn`,
/// `sg`); a line failing to parse any field is skipped with a warning rather than aborting
/// the whole load, since one malformed row shouldn't keep every other symbol off the list.
pub struct FileWatchlist {
    path: String,
}

impl FileWatchlist {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl WatchlistSource for FileWatchlist {
    fn load(&self) -> Result<Vec<SymbolMeta>, InstrumentError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|error| InstrumentError::Source(format!("failed to read watchlist file {}: {error}", self.path)))?;

        let mut metas = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [symbol, market, currency, lot_size, name] = fields[..] else {
                tracing::warn!(line_no, line, "watchlist file: skipping malformed row");
                continue;
            };
            let Some(market) = parse_market(market) else {
                tracing::warn!(line_no, line, "watchlist file: skipping row with unknown market");
                continue;
            };
            let Ok(lot_size) = lot_size.parse::<u64>() else {
                tracing::warn!(line_no, line, "watchlist file: skipping row with invalid lot size");
                continue;
            };
            metas.push(SymbolMeta::new(Symbol::new(symbol), market, currency.into(), lot_size, name.into()));
        }
        Ok(metas)
    }
}

fn parse_market(raw: &str) -> Option<Market> {
    match raw.to_ascii_lowercase().as_str() {
        "hk" => Some(Market::Hk),
        "us" => Some(Market::Us),
        "cn" => Some(Market::Cn),
        "sg" => Some(Market::Sg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_in_watchlist_is_non_empty_and_spans_markets() {
        let metas = BuiltInWatchlist.load().unwrap();
        assert!(!metas.is_empty());
        assert!(metas.iter().any(|m| m.market == Market::Hk));
        assert!(metas.iter().any(|m| m.market == Market::Us));
        assert!(metas.iter().any(|m| m.market == Market::Cn));
        assert!(metas.iter().any(|m| m.market == Market::Sg));
    }

    #[test]
    fn test_file_watchlist_skips_malformed_rows() {
        let dir = std::env::temp_dir().join(format!("engine_watchlist_test_{}", std::process::id()));
        std::fs::write(&dir, "0700.HK,hk,HKD,100,Tencent\nbad row\nAAPL.US,us,USD,1,Apple\n").unwrap();

        let metas = FileWatchlist::new(dir.to_str().unwrap()).load().unwrap();
        assert_eq!(metas.len(), 2);

        std::fs::remove_file(&dir).ok();
    }
}
