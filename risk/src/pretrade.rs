use crate::checks::{RiskCheck, RiskContext};
use queue::TradingIntent;

/// Runs every registered [`RiskCheck`] against an intent, short-circuiting on the first
/// failure (the router needs only the first rejection reason).
pub struct PreTradeValidator {
    checks: Vec<Box<dyn RiskCheck>>,
}

impl PreTradeValidator {
    pub fn new(checks: Vec<Box<dyn RiskCheck>>) -> Self {
        Self { checks }
    }

    pub fn validate(&self, ctx: &RiskContext, intent: &TradingIntent) -> Result<(), String> {
        for check in &self.checks {
            if let Err(reason) = check.check(ctx, intent) {
                tracing::info!(check = check.name(), intent_id = %intent.id, reason = %reason, "intent rejected by pre-trade check");
                return Err(reason);
            }
        }
        Ok(())
    }
}
