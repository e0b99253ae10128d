use instrument::instrument::tick::TickTable;
use instrument::Market;
use queue::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Result of repricing a limit order against the live book.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepricedLimit {
    pub price: Decimal,
    pub exceeds_slippage: bool,
}

/// Dynamic limit pricing used inside TWAP slices and adaptive retries. `reference_price` is
/// the intent's original limit; `max_slippage` bounds how far the final price may drift from
/// it in the adverse direction.
pub fn dynamic_limit_price(
    side: Side,
    reference_price: Decimal,
    current_market_price: Decimal,
    max_slippage: Decimal,
    bid: Decimal,
    ask: Decimal,
    market: Market,
) -> RepricedLimit {
    let exceeds_slippage = if reference_price.is_zero() {
        false
    } else {
        ((current_market_price - reference_price) / reference_price).abs() > max_slippage
    };

    let final_price = match side {
        Side::Buy => {
            let suggested = ask * dec!(1.001);
            suggested.min(reference_price * (Decimal::ONE + max_slippage))
        }
        Side::Sell => {
            let suggested = bid * dec!(0.999);
            suggested.max(reference_price * (Decimal::ONE - max_slippage))
        }
    };

    RepricedLimit { price: TickTable::for_market(market).snap(final_price), exceeds_slippage }
}
