use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Router-wide knobs, normally sourced from the engine binary's configuration file.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub force_limit_orders: bool,
    pub max_urgency_level: u8,
    pub afterhours_max_urgency: u8,
    pub allow_market_orders_during_market_hours: bool,
    pub broker_lot_size_error_code: String,
    pub broker_stale_price_error_code: String,
    pub spread_tight_threshold_bp: Decimal,
    pub slice_delay: Duration,
    pub market_order_poll_deadline: Duration,
    pub limit_order_poll_deadline: Duration,
    pub twap_slice_poll_deadline: Duration,
    pub poll_interval: Duration,
    pub max_poll_errors: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            force_limit_orders: false,
            max_urgency_level: 10,
            afterhours_max_urgency: 5,
            allow_market_orders_during_market_hours: true,
            broker_lot_size_error_code: "602001".to_string(),
            broker_stale_price_error_code: "602035".to_string(),
            spread_tight_threshold_bp: dec!(10),
            slice_delay: Duration::from_millis(500),
            market_order_poll_deadline: Duration::from_secs(10),
            limit_order_poll_deadline: Duration::from_secs(60),
            twap_slice_poll_deadline: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            max_poll_errors: 3,
        }
    }
}
