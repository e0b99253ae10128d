use calendar::Session;
use rust_decimal::Decimal;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionStyle {
    Aggressive,
    Passive,
    Iceberg,
    Twap { duration: Duration },
    Vwap,
    Adaptive,
}

/// Inputs to execution-style selection, gathered by the router before submission.
#[derive(Debug, Clone, Copy)]
pub struct StyleContext {
    pub urgency: u8,
    pub session: Session,
    pub force_limit_orders: bool,
    pub quantity: u64,
    pub lot_size: u64,
    pub recent_avg_volume: u64,
    pub has_volume_profile: bool,
    pub explicit_vwap: bool,
    pub spread_bp: Decimal,
    pub spread_tight_threshold_bp: Decimal,
}

const MID_URGENCY: std::ops::RangeInclusive<u8> = 4..=7;
const TWAP_MIN_LOTS: u64 = 20;

/// Select the execution style for an intent, per the precedence: explicit VWAP, size-driven
/// ICEBERG/TWAP, then urgency/session-driven AGGRESSIVE/ADAPTIVE/PASSIVE.
pub fn select_style(ctx: &StyleContext) -> ExecutionStyle {
    let forced_limit = ctx.force_limit_orders || ctx.session != Session::Regular;

    if ctx.explicit_vwap && ctx.has_volume_profile {
        return ExecutionStyle::Vwap;
    }

    if ctx.recent_avg_volume > 0 {
        let qty_pct = Decimal::from(ctx.quantity) / Decimal::from(ctx.recent_avg_volume);
        let lots = ctx.quantity / ctx.lot_size.max(1);

        if qty_pct > rust_decimal_macros::dec!(0.05) {
            return ExecutionStyle::Iceberg;
        }
        if qty_pct >= rust_decimal_macros::dec!(0.03) {
            if lots >= TWAP_MIN_LOTS {
                return ExecutionStyle::Twap { duration: Duration::from_secs(30 * 60) };
            }
            return ExecutionStyle::Passive;
        }
    }

    if !forced_limit && ctx.urgency >= 8 {
        return ExecutionStyle::Aggressive;
    }

    if MID_URGENCY.contains(&ctx.urgency) && ctx.spread_bp <= ctx.spread_tight_threshold_bp {
        return ExecutionStyle::Adaptive;
    }

    ExecutionStyle::Passive
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_ctx() -> StyleContext {
        StyleContext {
            urgency: 5,
            session: Session::Regular,
            force_limit_orders: false,
            quantity: 100,
            lot_size: 100,
            recent_avg_volume: 100_000,
            has_volume_profile: false,
            explicit_vwap: false,
            spread_bp: dec!(5),
            spread_tight_threshold_bp: dec!(10),
        }
    }

    #[test]
    fn test_aggressive_requires_high_urgency_and_regular_session() {
        let mut ctx = base_ctx();
        ctx.urgency = 9;
        assert_eq!(select_style(&ctx), ExecutionStyle::Aggressive);
    }

    #[test]
    fn test_aggressive_forbidden_outside_regular_session() {
        let mut ctx = base_ctx();
        ctx.urgency = 9;
        ctx.session = Session::Postmarket;
        assert_eq!(select_style(&ctx), ExecutionStyle::Passive);
    }

    #[test]
    fn test_force_limit_orders_forbids_aggressive() {
        let mut ctx = base_ctx();
        ctx.urgency = 9;
        ctx.force_limit_orders = true;
        assert_eq!(select_style(&ctx), ExecutionStyle::Passive);
    }

    #[test]
    fn test_large_quantity_selects_iceberg() {
        let mut ctx = base_ctx();
        ctx.quantity = 10_000;
        assert_eq!(select_style(&ctx), ExecutionStyle::Iceberg);
    }

    #[test]
    fn test_mid_size_with_enough_lots_selects_twap() {
        let mut ctx = base_ctx();
        ctx.quantity = 4_000;
        ctx.lot_size = 100;
        assert!(matches!(select_style(&ctx), ExecutionStyle::Twap { .. }));
    }

    #[test]
    fn test_mid_size_with_too_few_lots_degrades_to_passive() {
        let mut ctx = base_ctx();
        ctx.quantity = 3_500;
        ctx.lot_size = 1_000;
        ctx.recent_avg_volume = 100_000;
        assert_eq!(select_style(&ctx), ExecutionStyle::Passive);
    }

    #[test]
    fn test_explicit_vwap_with_volume_profile() {
        let mut ctx = base_ctx();
        ctx.explicit_vwap = true;
        ctx.has_volume_profile = true;
        assert_eq!(select_style(&ctx), ExecutionStyle::Vwap);
    }

    #[test]
    fn test_mid_urgency_tight_spread_selects_adaptive() {
        let ctx = base_ctx();
        assert_eq!(select_style(&ctx), ExecutionStyle::Adaptive);
    }

    #[test]
    fn test_mid_urgency_wide_spread_selects_passive() {
        let mut ctx = base_ctx();
        ctx.spread_bp = dec!(50);
        assert_eq!(select_style(&ctx), ExecutionStyle::Passive);
    }
}
