use instrument::watchlist::{StaticWatchlist, WatchlistResolver};
use instrument::{Market, Symbol, SymbolMeta};
use queue::{SignalQueue, Side, TradingIntent};
use risk::checks::{PositionSizeLimit, RiskContext};
use risk::PreTradeValidator;
use router::{Broker, RouterConfig, SimulatedBroker, SmartOrderRouter};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use store::{InMemoryKeyValueStore, InMemoryPersistenceStore};

struct FixedRiskContext;

impl router::RiskContextProvider for FixedRiskContext {
    fn context(&self) -> RiskContext {
        RiskContext {
            equity: dec!(1_000_000),
            available_cash: HashMap::from([("HKD".to_string(), dec!(1_000_000))]),
            position_quantity: HashMap::new(),
            position_notional: HashMap::new(),
            long_exposure: dec!(0),
            short_exposure: dec!(0),
            daily_realised_pnl: dec!(0),
            portfolio_drawdown: dec!(0),
            daily_order_count: 0,
            daily_trades_per_symbol: HashMap::new(),
            remaining_margin_financing: dec!(0),
        }
    }
}

fn hk_regular_session() -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    chrono::Utc.with_ymd_and_hms(2024, 1, 10, 2, 0, 0).unwrap() // 10:00 Asia/Hong_Kong, a Wednesday
}

/// A BUY intent published to the queue is picked up by a single router consumer pass and
/// ends up filled, with the broker's own position book reflecting the new holding, end to
/// end across queue, router and broker.
#[tokio::test]
async fn test_router_consumer_drains_a_published_buy_intent() {
    let symbol = Symbol::new("0700.HK");
    let watchlist = Arc::new(
        WatchlistResolver::load(&StaticWatchlist(vec![SymbolMeta::new(
            symbol.clone(),
            Market::Hk,
            "HKD".into(),
            100,
            "Tencent".into(),
        )]))
        .unwrap(),
    );

    let quotes = Arc::new(quotes::SimulatedQuoteGateway::new());
    quotes.seed_static(SymbolMeta::new(symbol.clone(), Market::Hk, "HKD".into(), 100, "Tencent".into()));
    quotes.push_quote(quotes::QuoteSnapshot::new(
        symbol.clone(),
        dec!(351),
        dec!(350),
        dec!(350),
        dec!(352),
        dec!(349),
        1_000_000,
        dec!(350_000_000),
        dec!(350.8),
        dec!(351.2),
        500,
        500,
        quotes::TradeStatus::Normal,
        hk_regular_session(),
    ));

    let queue = Arc::new(SignalQueue::new(Arc::new(InMemoryKeyValueStore::new()), "acct1", 3));
    let calendar = Arc::new(calendar::Calendar::new());
    let persistence = Arc::new(InMemoryPersistenceStore::new());

    let broker: Arc<dyn Broker> =
        Arc::new(SimulatedBroker::new(HashMap::from([(
            "HKD".to_string(),
            router::balance::Balance { total: dec!(1_000_000), free: dec!(1_000_000), margin_financing: dec!(0) },
        )])));
    let broker_handle = broker.clone();

    let risk_validator = Arc::new(PreTradeValidator::new(vec![Box::new(PositionSizeLimit { max_shares: 10_000 })]));

    let router = Arc::new(SmartOrderRouter::new(
        queue.clone(),
        broker,
        quotes,
        watchlist,
        calendar,
        persistence.clone(),
        risk_validator,
        Arc::new(FixedRiskContext),
        RouterConfig::default(),
    ));

    let intent = TradingIntent::new(symbol.clone(), Side::Buy, 200, dec!(351), 80.0, "test_fixture", 5, dec!(0.01), "integration test buy");
    assert!(queue.publish(&intent).await);

    let did_work = router.run_once().await;
    assert!(did_work);
    assert_eq!(queue.stats().await.pending, 0);

    let positions = broker_handle.stock_positions().await.unwrap();
    let position = positions.iter().find(|p| p.symbol == symbol);
    assert!(position.is_some(), "broker should record a position after a filled buy");
    assert_eq!(position.unwrap().quantity, 200);
}
