mod cli;
mod config;
mod error;
mod notification;
mod rebalancer_task;
mod risk_context;
mod scheduler;
mod watchlist_source;

use calendar::Calendar;
use clap::Parser;
use cli::{Cli, StrategyMode, WatchlistMode};
use config::Config;
use error::EngineError;
use instrument::watchlist::WatchlistResolver;
use notification::{LoggingSink, NotificationSink, SlackWebhookSink};
use queue::SignalQueue;
use rebalancer_task::RebalancerTask;
use risk::checks::{
    AllocationCap, DailyLossCap, DailyOrderCountCap, DailyTradesPerSymbolCap, DrawdownCap, ExposureCap, NotionalLimit,
    PositionSizeLimit, RiskContext, SignalImpliedRisk,
};
use risk::PreTradeValidator;
use risk_context::{CachedRiskContext, RiskContextRefresher};
use router::{Broker, RouterConfig, SimulatedBroker, SmartOrderRouter};
use rust_decimal_macros::dec;
use scheduler::MarketSessionScheduler;
use std::collections::HashMap;
use std::sync::Arc;
use store::{InMemoryKeyValueStore, InMemoryPersistenceStore, PersistenceStore};
use strategy::{StrategyConfig, StrategyRunner, TrendFollowingStrategy};
use watchlist_source::{BuiltInWatchlist, FileWatchlist};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(cfg!(debug_assertions))
        .json()
        .init()
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();

    let config = match Config::load(Some(&cli.env_file)) {
        Ok(config) => config,
        Err(reason) => {
            tracing::error!(%reason, "fatal configuration error");
            std::process::exit(EngineError::Config(reason).exit_code());
        }
    };

    if let Err(error) = run(cli, config).await {
        tracing::error!(%error, "engine exited with a fatal error");
        std::process::exit(error.exit_code());
    }
}

async fn run(cli: Cli, config: Config) -> Result<(), EngineError> {
    tracing::info!(account_id = %cli.account_id, dry_run = cli.dry_run, "starting engine");

    let calendar = Arc::new(Calendar::new());

    let watchlist = Arc::new(match cli.watchlist_mode {
        WatchlistMode::BuiltIn => WatchlistResolver::load(&BuiltInWatchlist)?,
        WatchlistMode::File => {
            let path = cli
                .watchlist_file
                .clone()
                .ok_or_else(|| EngineError::Config("--watchlist-file is required when --watchlist-mode file".to_string()))?;
            WatchlistResolver::load(&FileWatchlist::new(path))?
        }
    });

    let quotes: Arc<dyn quotes::QuoteGateway> = Arc::new(quotes::SimulatedQuoteGateway::new());

    let kv_store = Arc::new(InMemoryKeyValueStore::new());
    let queue = Arc::new(SignalQueue::new(kv_store, cli.account_id.clone(), config.signal_max_retries));

    let persistence: Arc<dyn PersistenceStore> = Arc::new(InMemoryPersistenceStore::new());

    let initial_balances: HashMap<String, router::balance::Balance> = HashMap::new();
    let broker: Arc<dyn Broker> = Arc::new(SimulatedBroker::new(initial_balances));

    let risk_checks: Vec<Box<dyn risk::checks::RiskCheck>> = vec![
        Box::new(PositionSizeLimit { max_shares: 1_000_000 }),
        Box::new(NotionalLimit { max_notional: dec!(5_000_000) }),
        Box::new(AllocationCap { max_allocation_pct: dec!(0.25) }),
        Box::new(DailyOrderCountCap { max_orders_per_day: 200 }),
        Box::new(DailyTradesPerSymbolCap { max_trades_per_symbol: 20 }),
        Box::new(DailyLossCap { max_daily_loss_pct: dec!(0.05) }),
        Box::new(DrawdownCap { max_drawdown_pct: dec!(0.20) }),
        Box::new(ExposureCap { max_long_pct: dec!(0.95), max_short_pct: dec!(0.30) }),
        Box::new(SignalImpliedRisk { max_risk_pct: dec!(0.02) }),
    ];
    let risk_validator = Arc::new(PreTradeValidator::new(risk_checks));

    let risk_context_shared = Arc::new(parking_lot::RwLock::new(RiskContext {
        equity: dec!(0),
        available_cash: HashMap::new(),
        position_quantity: HashMap::new(),
        position_notional: HashMap::new(),
        long_exposure: dec!(0),
        short_exposure: dec!(0),
        daily_realised_pnl: dec!(0),
        portfolio_drawdown: dec!(0),
        daily_order_count: 0,
        daily_trades_per_symbol: HashMap::new(),
        remaining_margin_financing: dec!(0),
    }));
    let risk_context_provider = Arc::new(CachedRiskContext::new(risk_context_shared.clone()));
    let risk_refresher = Arc::new(RiskContextRefresher::new(broker.clone(), persistence.clone(), quotes.clone()));

    let router_config = RouterConfig {
        force_limit_orders: config.force_limit_orders,
        max_urgency_level: config.max_urgency_level,
        afterhours_max_urgency: config.afterhours_max_urgency,
        allow_market_orders_during_market_hours: config.allow_market_orders_during_market_hours,
        broker_lot_size_error_code: config.broker_lot_size_error_code.clone(),
        broker_stale_price_error_code: config.broker_stale_price_error_code.clone(),
        ..RouterConfig::default()
    };
    let router = Arc::new(SmartOrderRouter::new(
        queue.clone(),
        broker.clone(),
        quotes.clone(),
        watchlist.clone(),
        calendar.clone(),
        persistence.clone(),
        risk_validator,
        risk_context_provider,
        router_config,
    ));

    let mut strategy_runner = StrategyRunner::new(quotes.clone(), queue.clone(), watchlist.clone(), calendar.clone(), dec!(35_000));
    if cli.strategy_mode == StrategyMode::TrendFollowing {
        strategy_runner.register(Box::new(TrendFollowingStrategy::new()), &StrategyConfig::default());
    }

    let index_proxies: Vec<instrument::Symbol> = [instrument::Market::Hk, instrument::Market::Us, instrument::Market::Cn, instrument::Market::Sg]
        .into_iter()
        .flat_map(|market| watchlist.symbols_for_market(market).into_iter().take(1))
        .collect();
    let rebalancer = Arc::new(RebalancerTask::new(
        persistence.clone(),
        quotes.clone(),
        queue.clone(),
        calendar.clone(),
        watchlist.clone(),
        config.enable_afterhours_rebalance,
        config.afterhours_max_position_pct,
        index_proxies,
    ));

    let notifications: Arc<dyn NotificationSink> = if cli.no_notifications {
        Arc::new(LoggingSink)
    } else {
        match &config.slack_webhook_url {
            Some(url) => Arc::new(SlackWebhookSink::new(url.clone())),
            None => Arc::new(LoggingSink),
        }
    };

    let scheduler = Arc::new(MarketSessionScheduler::new(
        calendar,
        strategy_runner,
        router,
        queue,
        risk_refresher,
        risk_context_shared,
        rebalancer,
        notifications,
        config.rebalance_interval(),
        cli.dry_run,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("shutdown signal received, winding down");
    shutdown_tx.send(true).ok();
    scheduler_handle.await.ok();

    Ok(())
}
