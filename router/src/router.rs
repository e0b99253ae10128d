use crate::broker::{Broker, NewOrder, OrderDetail, OrderType};
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::pricing::dynamic_limit_price;
use crate::slicing::{calculate_optimal_slice_size, iceberg_slices, vwap_slices};
use crate::state::OrderState;
use crate::style::{select_style, ExecutionStyle, StyleContext};
use crate::validate::{validate_intent, CashFallbackInput, ValidatedOrder};
use calendar::Calendar;
use chrono::Utc;
use instrument::watchlist::WatchlistResolver;
use queue::{Side, SignalQueue, TradingIntent};
use quotes::QuoteGateway;
use risk::checks::RiskContext;
use risk::PreTradeValidator;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use store::{FillRow, OrderRow, Period, PersistenceStore};
use tokio::time::{sleep, Duration, Instant};

/// Supplies a fresh account snapshot for pre-trade risk checks on demand. The engine binary
/// wires this to whatever keeps equity, cash and position state up to date.
pub trait RiskContextProvider: Send + Sync {
    fn context(&self) -> RiskContext;
}

pub struct SmartOrderRouter {
    queue: Arc<SignalQueue>,
    broker: Arc<dyn Broker>,
    quotes: Arc<dyn QuoteGateway>,
    watchlist: Arc<WatchlistResolver>,
    calendar: Arc<Calendar>,
    persistence: Arc<dyn PersistenceStore>,
    risk_validator: Arc<PreTradeValidator>,
    risk_context: Arc<dyn RiskContextProvider>,
    config: RouterConfig,
}

impl SmartOrderRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<SignalQueue>,
        broker: Arc<dyn Broker>,
        quotes: Arc<dyn QuoteGateway>,
        watchlist: Arc<WatchlistResolver>,
        calendar: Arc<Calendar>,
        persistence: Arc<dyn PersistenceStore>,
        risk_validator: Arc<PreTradeValidator>,
        risk_context: Arc<dyn RiskContextProvider>,
        config: RouterConfig,
    ) -> Self {
        Self { queue, broker, quotes, watchlist, calendar, persistence, risk_validator, risk_context, config }
    }

    /// Pop one intent and drive it to completion or failure. Returns `false` if the queue was
    /// empty (the caller should sleep briefly before polling again).
    pub async fn run_once(&self) -> bool {
        let Some(intent) = self.queue.consume().await else {
            return false;
        };
        self.process_intent(intent).await;
        true
    }

    async fn process_intent(&self, intent: TradingIntent) {
        match self.try_execute(&intent).await {
            Ok(filled_total) => {
                tracing::info!(intent_id = %intent.id, symbol = %intent.symbol, filled_total, "intent executed");
                self.queue.mark_completed(&intent).await;
            }
            Err(error) => {
                tracing::warn!(intent_id = %intent.id, symbol = %intent.symbol, %error, "intent execution failed");
                self.queue.mark_failed(intent, error.to_string()).await;
            }
        }
    }

    async fn try_execute(&self, intent: &TradingIntent) -> Result<u64, RouterError> {
        let ctx = self.risk_context.context();
        self.risk_validator.validate(&ctx, intent).map_err(RouterError::RiskRejected)?;

        let cash_fallback_input = CashFallbackInput {
            available_cash: ctx.available_cash.values().copied().sum::<Decimal>().max(Decimal::ZERO),
            is_margin_account: ctx.is_margin_account(),
            remaining_financing: ctx.is_margin_account().then_some(ctx.remaining_margin_financing),
        };

        let validated = validate_intent(
            intent,
            &self.watchlist,
            self.quotes.as_ref(),
            self.broker.as_ref(),
            &self.calendar,
            Utc::now(),
            cash_fallback_input,
            self.config.afterhours_max_urgency,
        )
        .await?;

        let style = self.choose_style(intent, &validated).await?;
        self.execute_style(intent, &validated, style).await
    }

    async fn choose_style(&self, intent: &TradingIntent, validated: &ValidatedOrder) -> Result<ExecutionStyle, RouterError> {
        let candles = self
            .quotes
            .get_candlesticks(&validated.symbol, Period::D1, 20, quotes::Adjust::None)
            .await
            .unwrap_or_default();
        let recent_avg_volume = if candles.is_empty() {
            0
        } else {
            (candles.iter().map(|c| c.volume).sum::<i64>() / candles.len() as i64).max(0) as u64
        };

        let depth = self.quotes.get_depth(&validated.symbol).await.ok();
        let spread_bp = depth
            .map(|d| {
                if d.bid.is_zero() {
                    Decimal::ZERO
                } else {
                    ((d.ask - d.bid) / d.bid) * dec!(10000)
                }
            })
            .unwrap_or(dec!(10000));

        let ctx = StyleContext {
            urgency: validated.urgency,
            session: validated.session,
            force_limit_orders: self.config.force_limit_orders || validated.forbid_aggressive,
            quantity: validated.quantity,
            lot_size: validated.lot_size,
            recent_avg_volume,
            has_volume_profile: !candles.is_empty(),
            explicit_vwap: intent.strategy_name.eq_ignore_ascii_case("vwap"),
            spread_bp,
            spread_tight_threshold_bp: self.config.spread_tight_threshold_bp,
        };
        Ok(select_style(&ctx))
    }

    async fn execute_style(&self, intent: &TradingIntent, validated: &ValidatedOrder, style: ExecutionStyle) -> Result<u64, RouterError> {
        match style {
            ExecutionStyle::Aggressive => {
                if self.config.allow_market_orders_during_market_hours {
                    self.submit_and_poll(validated, OrderType::Market, None, self.config.market_order_poll_deadline).await
                } else {
                    let price = self.far_side_limit_price(intent, validated).await?;
                    self.submit_and_poll(validated, OrderType::Limit, Some(price), self.config.market_order_poll_deadline).await
                }
            }
            ExecutionStyle::Adaptive => {
                let depth = self.quotes.get_depth(&validated.symbol).await?;
                let spread_tight = if depth.bid.is_zero() {
                    false
                } else {
                    ((depth.ask - depth.bid) / depth.bid) * dec!(10000) <= self.config.spread_tight_threshold_bp
                };
                if spread_tight && !validated.forbid_aggressive {
                    self.submit_and_poll(validated, OrderType::Market, None, self.config.market_order_poll_deadline).await
                } else {
                    let price = self.passive_price(validated).await?;
                    self.submit_and_poll(validated, OrderType::Limit, Some(price), self.config.limit_order_poll_deadline).await
                }
            }
            ExecutionStyle::Passive => {
                let price = self.passive_price(validated).await?;
                self.submit_and_poll(validated, OrderType::Limit, Some(price), self.config.limit_order_poll_deadline).await
            }
            ExecutionStyle::Iceberg => {
                let slices = iceberg_slices(validated.quantity, validated.lot_size);
                self.submit_sliced(intent, validated, slices).await
            }
            ExecutionStyle::Twap { .. } => {
                let lots = validated.quantity / validated.lot_size.max(1);
                let target_slices = lots.clamp(1, 10) as usize;
                let slices = calculate_optimal_slice_size(validated.quantity, validated.lot_size, target_slices);
                self.submit_sliced(intent, validated, slices).await
            }
            ExecutionStyle::Vwap => {
                let candles = self
                    .quotes
                    .get_candlesticks(&validated.symbol, Period::D1, 20, quotes::Adjust::None)
                    .await
                    .unwrap_or_default();
                let volumes: Vec<Decimal> = candles.iter().map(|c| Decimal::from(c.volume.max(0))).collect();
                let slices = if volumes.is_empty() {
                    calculate_optimal_slice_size(validated.quantity, validated.lot_size, 5)
                } else {
                    let mut rng = rand::rng();
                    vwap_slices(validated.quantity, validated.lot_size, &volumes, 0.1, &mut rng)
                };
                self.submit_sliced(intent, validated, slices).await
            }
        }
    }

    async fn passive_price(&self, validated: &ValidatedOrder) -> Result<Decimal, RouterError> {
        let depth = self.quotes.get_depth(&validated.symbol).await?;
        let raw = match validated.side {
            Side::Buy => depth.bid,
            Side::Sell => depth.ask,
        };
        let table = instrument::instrument::tick::TickTable::for_market(validated.market);
        Ok(table.snap(raw))
    }

    /// A marketable LIMIT price for when market orders are disallowed: far side of the book,
    /// bounded by the intent's max slippage, so an AGGRESSIVE order still fills like a market
    /// order would without risking an unbounded price.
    async fn far_side_limit_price(&self, intent: &TradingIntent, validated: &ValidatedOrder) -> Result<Decimal, RouterError> {
        let depth = self.quotes.get_depth(&validated.symbol).await?;
        let repriced = dynamic_limit_price(
            validated.side,
            intent.reference_price,
            validated.last_price,
            intent.max_slippage,
            depth.bid,
            depth.ask,
            validated.market,
        );
        Ok(repriced.price)
    }

    /// Submit a single order and poll its fill state to completion or deadline.
    async fn submit_and_poll(
        &self,
        validated: &ValidatedOrder,
        order_type: OrderType,
        price: Option<Decimal>,
        deadline: Duration,
    ) -> Result<u64, RouterError> {
        let detail = self.submit_with_retry(validated, order_type, validated.quantity, price).await?;
        self.persist_new_order(&detail).await;
        let final_detail = self.poll_fill(&detail.broker_order_id, deadline).await?;
        self.persist_fill(&final_detail).await;
        Ok(final_detail.filled_quantity)
    }

    /// Submit each slice as a separately priced LIMIT order, aborting remaining slices once
    /// the weighted cumulative slippage exceeds `1.2 * max_slippage`.
    async fn submit_sliced(&self, intent: &TradingIntent, validated: &ValidatedOrder, slices: Vec<u64>) -> Result<u64, RouterError> {
        let mut total_filled = 0u64;
        let mut total_notional = Decimal::ZERO;
        let mut weighted_slippage_numerator = Decimal::ZERO;

        for slice_qty in slices {
            if slice_qty == 0 {
                continue;
            }
            let quote = self.quotes.get_realtime_quote(&[validated.symbol.clone()]).await?;
            let snapshot = quote.into_iter().next().ok_or_else(|| RouterError::UnknownSymbol(validated.symbol.clone()))?;
            let depth = self.quotes.get_depth(&validated.symbol).await?;
            let repriced = dynamic_limit_price(
                validated.side,
                intent.reference_price,
                snapshot.last,
                intent.max_slippage,
                depth.bid,
                depth.ask,
                validated.market,
            );

            let detail = self.submit_with_retry(validated, OrderType::Limit, slice_qty, Some(repriced.price)).await?;
            self.persist_new_order(&detail).await;
            let final_detail = self.poll_fill(&detail.broker_order_id, Duration::from_secs(60)).await?;
            self.persist_fill(&final_detail).await;

            let filled = final_detail.filled_quantity;
            total_filled += filled;
            if filled > 0 {
                let slippage = if intent.reference_price.is_zero() {
                    Decimal::ZERO
                } else {
                    ((repriced.price - intent.reference_price) / intent.reference_price).abs()
                };
                let notional = Decimal::from(filled) * repriced.price;
                weighted_slippage_numerator += slippage * notional;
                total_notional += notional;
            }

            if !total_notional.is_zero() {
                let weighted_slippage = weighted_slippage_numerator / total_notional;
                if weighted_slippage > intent.max_slippage * dec!(1.2) {
                    tracing::warn!(intent_id = %intent.id, %weighted_slippage, "aborting remaining slices: slippage budget exceeded");
                    break;
                }
            }

            sleep(self.config.slice_delay).await;
        }

        Ok(total_filled)
    }

    /// Submit once; on a lot-size or stale-price broker error, adapt and resubmit exactly once.
    async fn submit_with_retry(
        &self,
        validated: &ValidatedOrder,
        order_type: OrderType,
        quantity: u64,
        price: Option<Decimal>,
    ) -> Result<OrderDetail, RouterError> {
        let order = NewOrder {
            symbol: validated.symbol.clone(),
            order_type,
            side: validated.side,
            quantity,
            time_in_force: crate::broker::TimeInForce::Day,
            price,
        };

        match self.broker.submit_order(order.clone()).await {
            Ok(detail) => Ok(detail),
            Err(RouterError::Broker { code, message }) if code == self.config.broker_lot_size_error_code => {
                let refreshed_lot = match self.quotes.get_static_info(&[validated.symbol.clone()]).await {
                    Ok(metas) => metas.into_iter().next().map(|meta| meta.lot_size).unwrap_or(validated.lot_size),
                    Err(error) => {
                        tracing::warn!(%error, symbol = %validated.symbol, "lot-size retry: static info refetch failed");
                        validated.lot_size
                    }
                };
                if refreshed_lot != validated.lot_size {
                    if let Err(error) = self.watchlist.refresh_lot_size(&validated.symbol, refreshed_lot) {
                        tracing::warn!(%error, symbol = %validated.symbol, "lot-size retry: failed to update cached lot size");
                    }
                }
                let re_rounded = if refreshed_lot == 0 { 0 } else { (quantity / refreshed_lot) * refreshed_lot };
                if re_rounded == 0 || re_rounded == quantity {
                    return Err(RouterError::Broker { code, message });
                }
                let retry = NewOrder { quantity: re_rounded, ..order };
                self.broker.submit_order(retry).await
            }
            Err(RouterError::Broker { code, message }) if code == self.config.broker_stale_price_error_code => {
                let depth = self.quotes.get_depth(&validated.symbol).await?;
                let repriced = match validated.side {
                    Side::Buy => depth.ask,
                    Side::Sell => depth.bid,
                };
                let table = instrument::instrument::tick::TickTable::for_market(validated.market);
                let retry = NewOrder { price: Some(table.snap(repriced)), ..order };
                self.broker.submit_order(retry).await.map_err(|_| RouterError::Broker { code, message })
            }
            Err(error) => Err(error),
        }
    }

    async fn poll_fill(&self, broker_order_id: &str, deadline: Duration) -> Result<OrderDetail, RouterError> {
        let start = Instant::now();
        let mut poll_errors = 0u32;
        loop {
            match self.broker.order_detail(broker_order_id).await {
                Ok(detail) => {
                    poll_errors = 0;
                    match detail.state {
                        OrderState::Filled => return Ok(detail),
                        OrderState::Rejected | OrderState::Cancelled | OrderState::Expired => {
                            return Err(RouterError::Broker { code: "terminal".to_string(), message: format!("{:?}", detail.state) });
                        }
                        OrderState::PartiallyFilled | OrderState::New => {
                            if start.elapsed() >= deadline {
                                return Ok(detail);
                            }
                        }
                    }
                }
                Err(error) => {
                    poll_errors += 1;
                    if poll_errors > self.config.max_poll_errors {
                        return Err(RouterError::PollExhausted(poll_errors));
                    }
                    tracing::warn!(%error, broker_order_id, poll_errors, "poll error, retrying");
                }
            }
            if start.elapsed() >= deadline {
                return Err(RouterError::PollDeadline);
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn persist_new_order(&self, detail: &OrderDetail) {
        let row = OrderRow {
            broker_order_id: detail.broker_order_id.clone(),
            symbol: detail.symbol.clone(),
            status: format!("{:?}", detail.state),
            submitted_at: detail.submitted_at,
            updated_at: detail.submitted_at,
        };
        if let Err(error) = self.persistence.insert_order(row).await {
            tracing::error!(%error, broker_order_id = %detail.broker_order_id, "failed to persist new order");
        }
    }

    async fn persist_fill(&self, detail: &OrderDetail) {
        if let Err(error) = self.persistence.update_order_status(&detail.broker_order_id, &format!("{:?}", detail.state), Utc::now()).await {
            tracing::error!(%error, broker_order_id = %detail.broker_order_id, "failed to persist order status");
        }
        if detail.filled_quantity > 0 {
            if let Some(price) = detail.average_fill_price {
                let fill = FillRow {
                    broker_order_id: detail.broker_order_id.clone(),
                    symbol: detail.symbol.clone(),
                    quantity: detail.filled_quantity,
                    price,
                    filled_at: Utc::now(),
                };
                if let Err(error) = self.persistence.insert_fill(fill).await {
                    tracing::error!(%error, broker_order_id = %detail.broker_order_id, "failed to persist fill");
                }
            }
        }
    }

    /// Cancel an active order; a no-op (returns an error) against a terminal order.
    pub async fn cancel_order(&self, broker_order_id: &str) -> Result<(), RouterError> {
        self.broker.cancel_order(broker_order_id).await
    }

    /// Modify quantity and/or price on an active order; a no-op (returns an error) against a
    /// terminal order.
    pub async fn modify_order(&self, broker_order_id: &str, quantity: Option<u64>, price: Option<Decimal>) -> Result<OrderDetail, RouterError> {
        self.broker.replace_order(broker_order_id, quantity, price).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::SimulatedBroker;
    use instrument::{Market, Symbol, SymbolMeta};
    use instrument::watchlist::StaticWatchlist;
    use quotes::{Depth, QuoteSnapshot, SimulatedQuoteGateway, TradeStatus};
    use risk::checks::RiskContext;
    use std::collections::HashMap;
    use store::InMemoryPersistenceStore;

    struct EmptyRiskContext;
    impl RiskContextProvider for EmptyRiskContext {
        fn context(&self) -> RiskContext {
            RiskContext {
                equity: dec!(1_000_000),
                available_cash: HashMap::from([("HKD".to_string(), dec!(1_000_000))]),
                position_quantity: HashMap::new(),
                position_notional: HashMap::new(),
                long_exposure: Decimal::ZERO,
                short_exposure: Decimal::ZERO,
                daily_realised_pnl: Decimal::ZERO,
                portfolio_drawdown: Decimal::ZERO,
                daily_order_count: 0,
                daily_trades_per_symbol: HashMap::new(),
                remaining_margin_financing: Decimal::ZERO,
            }
        }
    }

    fn router_with_fixtures() -> (SmartOrderRouter, Arc<SimulatedQuoteGateway>) {
        let watchlist = Arc::new(
            WatchlistResolver::load(&StaticWatchlist(vec![SymbolMeta::new(
                Symbol::new("0700.HK"),
                Market::Hk,
                "HKD".into(),
                100,
                "Tencent".into(),
            )]))
            .unwrap(),
        );
        let quote_gateway = Arc::new(SimulatedQuoteGateway::new());
        quote_gateway.push_quote(QuoteSnapshot::new(
            Symbol::new("0700.HK"),
            dec!(350.40),
            dec!(349.00),
            dec!(349.50),
            dec!(351.00),
            dec!(349.00),
            1_000_000,
            dec!(350_000_000),
            dec!(350.20),
            dec!(350.60),
            1000,
            1000,
            TradeStatus::Normal,
            Utc::now(),
        ));
        quote_gateway.push_depth(Symbol::new("0700.HK"), Depth::new(dec!(350.20), dec!(350.60), 1000, 1000));

        let router = SmartOrderRouter::new(
            Arc::new(SignalQueue::new(Arc::new(store::InMemoryKeyValueStore::new()), "acct1", 3)),
            Arc::new(SimulatedBroker::new(HashMap::from([(
                "HKD".to_string(),
                crate::balance::Balance::new(dec!(10_000_000), dec!(10_000_000), Decimal::ZERO),
            )]))),
            quote_gateway.clone(),
            watchlist,
            Arc::new(Calendar::new()),
            Arc::new(InMemoryPersistenceStore::new()),
            Arc::new(PreTradeValidator::new(vec![])),
            Arc::new(EmptyRiskContext),
            RouterConfig::default(),
        );
        (router, quote_gateway)
    }

    #[tokio::test]
    async fn test_lot_rounding_and_passive_submission() {
        let (router, _quotes) = router_with_fixtures();
        let intent = TradingIntent::new(Symbol::new("0700.HK"), Side::Buy, 350, dec!(350.40), 80.0, "s", 3, dec!(0.02), "t");
        let filled = router.try_execute(&intent).await;
        assert!(filled.is_ok());
    }

    struct MarginRiskContext;
    impl RiskContextProvider for MarginRiskContext {
        fn context(&self) -> RiskContext {
            RiskContext {
                equity: dec!(1_000_000),
                available_cash: HashMap::from([("HKD".to_string(), dec!(1_000_000))]),
                position_quantity: HashMap::new(),
                position_notional: HashMap::new(),
                long_exposure: Decimal::ZERO,
                short_exposure: Decimal::ZERO,
                daily_realised_pnl: Decimal::ZERO,
                portfolio_drawdown: Decimal::ZERO,
                daily_order_count: 0,
                daily_trades_per_symbol: HashMap::new(),
                remaining_margin_financing: dec!(5_000_000),
            }
        }
    }

    /// A broker reporting zero free cash but ample margin financing should still clear, via
    /// the margin-financing branch of the cash-fallback estimator rather than the 50%-of-cash
    /// branch (which a zero cash balance would floor to zero).
    #[tokio::test]
    async fn test_margin_financing_feeds_cash_fallback_when_broker_reports_zero_buying_power() {
        let watchlist = Arc::new(
            WatchlistResolver::load(&StaticWatchlist(vec![SymbolMeta::new(
                Symbol::new("0700.HK"),
                Market::Hk,
                "HKD".into(),
                100,
                "Tencent".into(),
            )]))
            .unwrap(),
        );
        let quote_gateway = Arc::new(SimulatedQuoteGateway::new());
        quote_gateway.push_quote(QuoteSnapshot::new(
            Symbol::new("0700.HK"),
            dec!(350.40),
            dec!(349.00),
            dec!(349.50),
            dec!(351.00),
            dec!(349.00),
            1_000_000,
            dec!(350_000_000),
            dec!(350.20),
            dec!(350.60),
            1000,
            1000,
            TradeStatus::Normal,
            Utc::now(),
        ));
        quote_gateway.push_depth(Symbol::new("0700.HK"), Depth::new(dec!(350.20), dec!(350.60), 1000, 1000));

        let router = SmartOrderRouter::new(
            Arc::new(SignalQueue::new(Arc::new(store::InMemoryKeyValueStore::new()), "acct1", 3)),
            Arc::new(SimulatedBroker::new(HashMap::from([(
                "HKD".to_string(),
                crate::balance::Balance::new(Decimal::ZERO, Decimal::ZERO, dec!(5_000_000)),
            )]))),
            quote_gateway,
            watchlist,
            Arc::new(Calendar::new()),
            Arc::new(InMemoryPersistenceStore::new()),
            Arc::new(PreTradeValidator::new(vec![])),
            Arc::new(MarginRiskContext),
            RouterConfig::default(),
        );

        let intent = TradingIntent::new(Symbol::new("0700.HK"), Side::Buy, 350, dec!(350.40), 80.0, "s", 3, dec!(0.02), "t");
        let filled = router.try_execute(&intent).await;
        assert!(filled.is_ok(), "margin-backed cash fallback should still produce a fillable quantity: {filled:?}");
    }
}
