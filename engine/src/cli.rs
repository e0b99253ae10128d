use clap::{Parser, ValueEnum};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum StrategyMode {
    /// Run the built-in trend-following strategy.
    TrendFollowing,
    /// Run no strategy runners; only the router consumer and rebalancer are active.
    None,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum WatchlistMode {
    /// A small built-in list covering HK, US, CN and SG, for local runs and tests.
    BuiltIn,
    /// Load `--watchlist-file` as newline-delimited `symbol,market,currency,lot_size,name`.
    File,
}

/// Thin CLI over the engine binary's configuration, per §6: account id, dry-run,
/// notifications on/off, strategy mode, built-in vs file-based watchlist.
#[derive(Debug, Parser)]
#[command(name = "engine", about = "Always-on multi-market quantitative trading engine")]
pub struct Cli {
    /// Account identifier; namespaces the signal queue and position keys.
    #[arg(long, env = "ENGINE_ACCOUNT_ID", default_value = "default")]
    pub account_id: String,

    /// Evaluate and log every decision without submitting orders to the broker.
    #[arg(long, env = "ENGINE_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Disable the notification sink (falls back to a no-op).
    #[arg(long, env = "ENGINE_NO_NOTIFICATIONS", default_value_t = false)]
    pub no_notifications: bool,

    #[arg(long, value_enum, default_value = "trend-following")]
    pub strategy_mode: StrategyMode,

    #[arg(long, value_enum, default_value = "built-in")]
    pub watchlist_mode: WatchlistMode,

    /// Path to a newline-delimited watchlist file, required when `--watchlist-mode file`.
    #[arg(long)]
    pub watchlist_file: Option<String>,

    /// Optional `.env`-style file consulted before required environment variables.
    #[arg(long, default_value = ".env")]
    pub env_file: String,
}
