use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tuning parameters for a strategy, loaded from the engine's configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
}

impl StrategyConfig {
    /// Convenience helper to get a parameter by name, falling back to `default`.
    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.parameters.get(key).copied().unwrap_or(default)
    }
}
