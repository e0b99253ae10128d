use crate::notification::{Notification, NotificationSink};
use crate::rebalancer_task::RebalancerTask;
use crate::risk_context::RiskContextRefresher;
use calendar::Calendar;
use chrono::{DateTime, Utc};
use instrument::Market;
use queue::SignalQueue;
use router::SmartOrderRouter;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use strategy::StrategyRunner;
use tokio::sync::watch;
use tokio::time::sleep;

const MARKETS: [Market; 4] = [Market::Hk, Market::Us, Market::Cn, Market::Sg];
const STRATEGY_TICK_INTERVAL: Duration = Duration::from_secs(15);
const RISK_CONTEXT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_millis(500);
const ZOMBIE_SWEEP_TIMEOUT_SECS: i64 = 300;
const MAX_SLEEP_WHEN_ALL_CLOSED: Duration = Duration::from_secs(60);

/// Marks the start of the current trading day's order/trade counting window, reset whenever
/// every market transitions from closed to open (there is no single global "midnight" across
/// four timezones, so the reset is driven off the first market to reopen after being fully
/// closed). The counts themselves are derived from the broker's own order history at refresh
/// time (see `RiskContextRefresher::refresh`) rather than accumulated here, since the broker is
/// the only component that observes every submitted order regardless of which task submitted it.
pub struct DailyCounters {
    reset_at: parking_lot::RwLock<DateTime<Utc>>,
}

impl DailyCounters {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { reset_at: parking_lot::RwLock::new(now) }
    }

    pub fn reset(&self, now: DateTime<Utc>) {
        *self.reset_at.write() = now;
    }

    pub fn since(&self) -> DateTime<Utc> {
        *self.reset_at.read()
    }
}

/// Top-level scheduler: ticks strategy runners while any market is in its regular session,
/// keeps the router consumer draining the queue continuously, and refreshes the cached risk
/// context on its own cadence. When every market is closed it sleeps until the earliest
/// `next_open`, capped so a shutdown signal is never missed for more than a minute.
pub struct MarketSessionScheduler {
    calendar: Arc<Calendar>,
    strategy_runner: tokio::sync::Mutex<StrategyRunner>,
    router: Arc<SmartOrderRouter>,
    queue: Arc<SignalQueue>,
    risk_refresher: Arc<RiskContextRefresher>,
    risk_context_shared: Arc<parking_lot::RwLock<risk::checks::RiskContext>>,
    rebalancer: Arc<RebalancerTask>,
    notifications: Arc<dyn NotificationSink>,
    daily_counters: Arc<DailyCounters>,
    rebalance_interval: Duration,
    dry_run: bool,
}

impl MarketSessionScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        calendar: Arc<Calendar>,
        strategy_runner: StrategyRunner,
        router: Arc<SmartOrderRouter>,
        queue: Arc<SignalQueue>,
        risk_refresher: Arc<RiskContextRefresher>,
        risk_context_shared: Arc<parking_lot::RwLock<risk::checks::RiskContext>>,
        rebalancer: Arc<RebalancerTask>,
        notifications: Arc<dyn NotificationSink>,
        rebalance_interval: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            calendar,
            strategy_runner: tokio::sync::Mutex::new(strategy_runner),
            router,
            queue,
            risk_refresher,
            risk_context_shared,
            rebalancer,
            notifications,
            daily_counters: Arc::new(DailyCounters::new(Utc::now())),
            rebalance_interval,
            dry_run,
        }
    }

    /// Runs until `shutdown` is signalled. Spawns one task per named worker per §5's
    /// concurrency model and waits for all of them to wind down before returning.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut tasks = tokio::task::JoinSet::new();

        tasks.spawn(self.clone().run_scheduler_loop(shutdown.clone()));
        tasks.spawn(self.clone().run_router_consumer(shutdown.clone()));
        tasks.spawn(self.clone().run_risk_context_refresher(shutdown.clone()));
        tasks.spawn(self.clone().run_rebalancer(shutdown.clone()));
        tasks.spawn(self.clone().run_zombie_sweeper(shutdown.clone()));

        let _ = shutdown.changed().await;
        while tasks.join_next().await.is_some() {}
    }

    /// Named task: the scheduler loop. Ticks every strategy while a market is open, otherwise
    /// sleeps until the next market open, capped at 60 seconds so shutdown is responsive.
    async fn run_scheduler_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }

            let now = chrono::Utc::now();
            let any_open = MARKETS.iter().any(|&market| self.calendar.session_of(market, now) != calendar::Session::Closed);

            if any_open {
                self.maybe_reset_daily_counters(now);
                let mut runner = self.strategy_runner.lock().await;
                let published = runner.tick(now).await;
                drop(runner);
                if published > 0 {
                    tracing::debug!(published, "scheduler: strategy tick published intents");
                }
                tokio::select! {
                    _ = sleep(STRATEGY_TICK_INTERVAL) => {}
                    _ = shutdown.changed() => return,
                }
            } else {
                let next_open = MARKETS.iter().map(|&market| self.calendar.next_open(market, now)).min().unwrap_or(now + chrono::Duration::hours(1));
                let wait = (next_open - now).to_std().unwrap_or(Duration::ZERO).min(MAX_SLEEP_WHEN_ALL_CLOSED);
                tracing::info!(?wait, "scheduler: all markets closed, sleeping");
                tokio::select! {
                    _ = sleep(wait) => {}
                    _ = shutdown.changed() => return,
                }
            }
        }
    }

    fn maybe_reset_daily_counters(&self, now: chrono::DateTime<chrono::Utc>) {
        let just_opened = MARKETS.iter().any(|&market| {
            let session = self.calendar.session_of(market, now);
            let a_minute_ago = self.calendar.session_of(market, now - chrono::Duration::minutes(1));
            session != calendar::Session::Closed && a_minute_ago == calendar::Session::Closed
        });
        if just_opened {
            self.daily_counters.reset(now);
            tracing::info!("scheduler: daily counters reset on market open transition");
        }
    }

    /// Named task: the router consumer, draining the signal queue continuously. In dry-run
    /// mode the consumer still pops and logs, but `SmartOrderRouter` itself is responsible for
    /// suppressing broker submission (wired by the caller's broker selection, not here).
    async fn run_router_consumer(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            let did_work = self.router.run_once().await;
            if !did_work {
                tokio::select! {
                    _ = sleep(EMPTY_QUEUE_BACKOFF) => {}
                    _ = shutdown.changed() => return,
                }
            }
        }
    }

    /// Named task: keeps the cached risk context snapshot warm so pre-trade validation, which
    /// must stay synchronous, never blocks on the broker or the store.
    async fn run_risk_context_refresher(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            let counters_since = self.daily_counters.since();
            let daily_realised_pnl = self.risk_context_shared.read().daily_realised_pnl;
            match self.risk_refresher.refresh(counters_since, daily_realised_pnl).await {
                Ok(fresh) => *self.risk_context_shared.write() = fresh,
                Err(error) => {
                    tracing::warn!(%error, "risk context refresh failed, serving stale snapshot");
                    self.notifications
                        .notify(Notification::WorkerDegraded { worker: "risk_context_refresher", reason: error.to_string() })
                        .await;
                }
            }
            tokio::select! {
                _ = sleep(RISK_CONTEXT_REFRESH_INTERVAL) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    /// Named task: the regime rebalancer and pre-close rotation sweep, on a fixed timer.
    async fn run_rebalancer(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            if !self.dry_run {
                let (equity, available_cash) = {
                    let ctx = self.risk_context_shared.read();
                    (ctx.equity, ctx.available_cash.values().copied().sum::<Decimal>())
                };
                let published = self.rebalancer.tick(equity, available_cash, chrono::Utc::now()).await;
                if published > 0 {
                    tracing::info!(published, "rebalancer: published sell intents");
                }
            }
            tokio::select! {
                _ = sleep(self.rebalance_interval) => {}
                _ = shutdown.changed() => return,
            }
        }
    }

    /// Opportunistic zombie sweeper: `SignalQueue::consume` already recovers zombies on every
    /// pop, but a quiet queue with a stuck in-flight record would never trigger that path, so
    /// this task forces the recovery check on its own cadence regardless of queue activity.
    async fn run_zombie_sweeper(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.queue.recover_zombies(ZOMBIE_SWEEP_TIMEOUT_SECS).await {
                Ok(count) if count > 0 => tracing::warn!(count, "zombie sweeper: recovered stuck intents"),
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "zombie sweeper: recovery failed"),
            }
            tokio::select! {
                _ = sleep(Duration::from_secs(60)) => {}
                _ = shutdown.changed() => return,
            }
        }
    }
}
