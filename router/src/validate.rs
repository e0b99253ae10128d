use crate::broker::{Broker, OrderType};
use crate::error::RouterError;
use calendar::{Calendar, Session};
use chrono::{DateTime, Utc};
use instrument::instrument::tick::TickTable;
use instrument::watchlist::WatchlistResolver;
use instrument::Market;
use queue::{Side, TradingIntent};
use quotes::QuoteGateway;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// An intent that has passed every pre-submission check, ready for execution-style selection.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub symbol: instrument::Symbol,
    pub side: Side,
    pub quantity: u64,
    pub last_price: Decimal,
    pub urgency: u8,
    pub session: Session,
    pub market: Market,
    pub lot_size: u64,
    pub forbid_aggressive: bool,
}

/// Inputs describing the account's buying-power posture, used only by the cash-fallback
/// estimator when the broker itself reports zero purchasable quantity.
#[derive(Debug, Clone, Copy)]
pub struct CashFallbackInput {
    pub available_cash: Decimal,
    pub is_margin_account: bool,
    pub remaining_financing: Option<Decimal>,
}

/// 50%/30% cash-fallback estimator: the broker reported zero purchasable quantity despite
/// local cash existing, most often because cross-currency debt makes reported buying power
/// negative while the settlement-currency cash balance is still positive.
pub fn cash_fallback_quantity(input: CashFallbackInput, lot_size: u64, price: Decimal) -> (u64, String) {
    if price.is_zero() || lot_size == 0 {
        return (0, "price or lot size is zero".to_string());
    }
    let lot_notional = Decimal::from(lot_size) * price;
    if input.is_margin_account {
        if let Some(financing) = input.remaining_financing {
            if financing > dec!(2) * lot_notional {
                let lots = ((financing * dec!(0.3)) / price / Decimal::from(lot_size)).trunc();
                let qty = (lots * Decimal::from(lot_size)).to_u64().unwrap_or(0);
                return (
                    qty,
                    "broker reported zero buying power; used 30% of remaining margin financing".to_string(),
                );
            }
        }
    }
    let lots = ((input.available_cash * dec!(0.5)) / price / Decimal::from(lot_size)).trunc();
    let qty = (lots * Decimal::from(lot_size)).to_u64().unwrap_or(0);
    (
        qty,
        "broker reported zero buying power; used 50% of available cash (cross-currency debt can mask positive cash as negative buying power)".to_string(),
    )
}

#[allow(clippy::too_many_arguments)]
pub async fn validate_intent(
    intent: &TradingIntent,
    watchlist: &WatchlistResolver,
    quotes: &dyn QuoteGateway,
    broker: &dyn Broker,
    calendar: &Calendar,
    now: DateTime<Utc>,
    cash_fallback_input: CashFallbackInput,
    afterhours_max_urgency: u8,
) -> Result<ValidatedOrder, RouterError> {
    // 1. Quantity > 0.
    if intent.quantity_shares == 0 {
        return Err(RouterError::ZeroQuantity);
    }

    // 2. Symbol is in the watchlist.
    if !watchlist.contains(&intent.symbol) {
        return Err(RouterError::UnknownSymbol(intent.symbol.clone()));
    }
    let meta = watchlist.meta(&intent.symbol)?;

    // 3. Round quantity down to a lot multiple; reject if zero.
    let quantity = meta.round_down_to_lot(intent.quantity_shares);
    if quantity == 0 {
        return Err(RouterError::ZeroLots);
    }

    // 4. Fetch current quote; reject if last price <= 0.
    let snapshots = quotes.get_realtime_quote(&[intent.symbol.clone()]).await?;
    let snapshot = snapshots.into_iter().next().ok_or_else(|| RouterError::UnknownSymbol(intent.symbol.clone()))?;
    if snapshot.last <= Decimal::ZERO {
        return Err(RouterError::NonPositivePrice(snapshot.last));
    }

    // 5. Snap reference price to the tick table, for the buying-power estimate below.
    let tick_table = TickTable::for_market(meta.market);
    let limit_price = tick_table.snap(intent.reference_price);

    let session = calendar.session_of(meta.market, now);
    let mut urgency = intent.urgency;
    let mut forbid_aggressive = false;

    // 7. After-hours safety (US only): force LIMIT, cap urgency, forbid AGGRESSIVE.
    if meta.market == Market::Us && session == Session::Postmarket {
        forbid_aggressive = true;
        urgency = urgency.min(afterhours_max_urgency);
    }

    // 6. For BUY only: estimate max purchasable quantity; cash-fallback if the broker reports zero.
    let mut quantity = quantity;
    if intent.side == Side::Buy {
        let estimated_max =
            broker.estimate_max_purchase_quantity(&intent.symbol, OrderType::Limit, intent.side, limit_price).await?;
        if estimated_max == 0 {
            let (fallback_qty, reason) = cash_fallback_quantity(cash_fallback_input, meta.lot_size, limit_price);
            tracing::warn!(symbol = %intent.symbol, fallback_qty, reason, "cash-fallback estimation activated");
            quantity = quantity.min(fallback_qty);
        } else {
            quantity = quantity.min(estimated_max);
        }
        quantity = meta.round_down_to_lot(quantity);
        if quantity == 0 {
            return Err(RouterError::ZeroLots);
        }
    }

    Ok(ValidatedOrder {
        symbol: intent.symbol.clone(),
        side: intent.side,
        quantity,
        last_price: snapshot.last,
        urgency,
        session,
        market: meta.market,
        lot_size: meta.lot_size,
        forbid_aggressive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_fallback_uses_half_of_available_cash() {
        let input = CashFallbackInput { available_cash: dec!(100_000), is_margin_account: false, remaining_financing: None };
        let (qty, reason) = cash_fallback_quantity(input, 100, dec!(350.40));
        assert_eq!(qty, 100); // floor((50000/350.40)/100)*100 = 100
        assert!(reason.contains("50%"));
    }

    #[test]
    fn test_cash_fallback_prefers_margin_financing_when_ample() {
        let input = CashFallbackInput { available_cash: dec!(1_000), is_margin_account: true, remaining_financing: Some(dec!(1_000_000)) };
        let (qty, reason) = cash_fallback_quantity(input, 100, dec!(350.40));
        assert!(qty > 0);
        assert!(reason.contains("margin"));
    }

    #[test]
    fn test_cash_fallback_falls_back_to_cash_when_financing_too_small() {
        let input = CashFallbackInput { available_cash: dec!(100_000), is_margin_account: true, remaining_financing: Some(dec!(1)) };
        let (qty, reason) = cash_fallback_quantity(input, 100, dec!(350.40));
        assert_eq!(qty, 100);
        assert!(reason.contains("50%"));
    }
}
