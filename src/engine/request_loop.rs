//! The request loop state machine
//!
//! Pulls proxies from the rotor, gates them on local time, issues one
//! attempt per eligible proxy and applies the success/failure pacing. The
//! loop is strictly sequential: one attempt or sleep at a time.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use url::Url;

use super::clock::Clock;
use super::transport::{AttemptOutcome, ProxyRoute, VoteTransport};
use super::user_agent::UserAgentSource;
use crate::models::VoteWindow;
use crate::rotation::ProxyRotor;
use crate::schedule::TimeWindowGate;

/// Success and failure tallies for one run; never decremented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounters {
    pub success_count: u64,
    pub failure_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// `failure_count` reached the configured maximum
    MaxFailuresReached,
    /// Too many consecutive cycles in which every proxy was skipped
    IdleLimitReached,
    /// External shutdown signal
    Cancelled,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::MaxFailuresReached => "max_failures_reached",
            TerminationReason::IdleLimitReached => "idle_limit_reached",
            TerminationReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated(TerminationReason),
}

/// What a single step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A full cycle was skipped; the loop slept `backoff` (unless it stopped)
    Idle { cycles: u32, backoff: Duration },
    /// Proxy outside its vote window. No counter change, no sleep.
    Skipped { proxy: String, local_hour: Option<u32> },
    Succeeded { proxy: String, delay: Duration },
    Failed {
        proxy: String,
        outcome: AttemptOutcome,
        backoff: Duration,
    },
    /// Shutdown was requested before the step began
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub counters: RunCounters,
    pub observation: Observation,
    pub state: LoopState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub counters: RunCounters,
    pub reason: TerminationReason,
}

/// Request loop configuration
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target: Url,
    pub window: VoteWindow,
    /// Upper bound of the uniform 1..=max success delay, in seconds
    pub max_delay_secs: u64,
    pub failure_backoff: Duration,
    pub max_failures: u64,
    /// Route the HTTPS leg through HTTPS-capable proxies
    pub route_https: bool,
    /// Sleep inserted after a full cycle of skips
    pub idle_backoff: Duration,
    /// Stop after this many consecutive all-skip cycles (0 = never)
    pub max_idle_cycles: u32,
}

impl LoopConfig {
    /// Reference pacing: 30s failure backoff, stop after 10 failures
    pub fn new(target: Url) -> Self {
        Self {
            target,
            window: VoteWindow::default(),
            max_delay_secs: 60,
            failure_backoff: Duration::from_secs(30),
            max_failures: 10,
            route_https: true,
            idle_backoff: Duration::from_secs(60),
            max_idle_cycles: 0,
        }
    }

    pub fn target_is_https(&self) -> bool {
        self.target.scheme() == "https"
    }
}

/// Sequential proxy-rotating request loop
pub struct RequestLoop {
    rotor: ProxyRotor,
    config: LoopConfig,
    transport: Arc<dyn VoteTransport>,
    user_agents: Arc<dyn UserAgentSource>,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
    rng: StdRng,
    consecutive_skips: usize,
    idle_cycles: u32,
}

impl RequestLoop {
    pub fn new(
        rotor: ProxyRotor,
        config: LoopConfig,
        transport: Arc<dyn VoteTransport>,
        user_agents: Arc<dyn UserAgentSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // A receiver whose sender is gone never reports cancellation.
        let (_, shutdown) = watch::channel(false);
        Self {
            rotor,
            config,
            transport,
            user_agents,
            clock,
            shutdown,
            rng: StdRng::from_entropy(),
            consecutive_skips: 0,
            idle_cycles: 0,
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Drive the loop until it terminates
    #[instrument(skip_all, fields(target = %self.config.target))]
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> RunSummary {
        self.shutdown = shutdown;

        info!(
            proxies = self.rotor.len(),
            window = %self.config.window,
            max_failures = self.config.max_failures,
            "Starting request loop"
        );

        let mut counters = RunCounters::default();
        loop {
            let report = self.step(counters).await;
            counters = report.counters;

            if let LoopState::Terminated(reason) = report.state {
                info!(
                    reason = %reason,
                    successes = counters.success_count,
                    failures = counters.failure_count,
                    "Request loop terminated"
                );
                return RunSummary { counters, reason };
            }
        }
    }

    /// Run a single iteration
    ///
    /// Counters are updated before any sleep, so a cancellation that lands
    /// during the sleep still returns the attempt's accounting.
    pub async fn step(&mut self, mut counters: RunCounters) -> StepReport {
        if self.is_cancelled() {
            return StepReport {
                counters,
                observation: Observation::Cancelled,
                state: LoopState::Terminated(TerminationReason::Cancelled),
            };
        }

        if self.consecutive_skips >= self.rotor.len() {
            return self.idle(counters).await;
        }

        let now = self.clock.now();
        let proxy = self.rotor.next().clone();
        let proxy_id = proxy.id();

        let local_hour = proxy
            .timezone
            .map(|tz| TimeWindowGate::local_hour(tz, now));
        let eligible = proxy
            .timezone
            .is_some_and(|tz| TimeWindowGate::is_eligible(tz, &self.config.window, now));

        if !eligible {
            self.consecutive_skips += 1;
            info!(
                proxy = %proxy_id,
                local_hour = ?local_hour,
                "Skipped proxy outside vote window"
            );
            return StepReport {
                counters,
                observation: Observation::Skipped {
                    proxy: proxy_id,
                    local_hour,
                },
                state: LoopState::Running,
            };
        }

        self.consecutive_skips = 0;
        self.idle_cycles = 0;

        let route = ProxyRoute::for_proxy(
            &proxy,
            self.config.target_is_https(),
            self.config.route_https,
        );
        let user_agent = self.user_agents.random();
        let outcome = self
            .transport
            .send(&self.config.target, &route, &user_agent)
            .await;

        if outcome.is_success() {
            counters.success_count += 1;
            let delay = Duration::from_secs(self.rng.gen_range(1..=self.config.max_delay_secs.max(1)));

            info!(
                proxy = %proxy_id,
                https_routed = route.https.is_some(),
                successes = counters.success_count,
                failures = counters.failure_count,
                delay_secs = delay.as_secs(),
                "Request succeeded"
            );

            let state = self.pause(delay).await;
            return StepReport {
                counters,
                observation: Observation::Succeeded {
                    proxy: proxy_id,
                    delay,
                },
                state,
            };
        }

        counters.failure_count += 1;
        warn!(
            proxy = %proxy_id,
            outcome = %outcome,
            successes = counters.success_count,
            failures = counters.failure_count,
            "Request failed"
        );

        let backoff = self.config.failure_backoff;
        let slept = self.pause(backoff).await;

        // Reaching the limit outranks a shutdown that landed during the backoff.
        let state = if counters.failure_count >= self.config.max_failures {
            LoopState::Terminated(TerminationReason::MaxFailuresReached)
        } else {
            slept
        };

        StepReport {
            counters,
            observation: Observation::Failed {
                proxy: proxy_id,
                outcome,
                backoff,
            },
            state,
        }
    }

    /// Every proxy in the last full cycle was skipped
    async fn idle(&mut self, counters: RunCounters) -> StepReport {
        self.consecutive_skips = 0;
        self.idle_cycles += 1;
        let cycles = self.idle_cycles;

        if self.config.max_idle_cycles > 0 && cycles >= self.config.max_idle_cycles {
            warn!(cycles, "No proxy inside its vote window, giving up");
            return StepReport {
                counters,
                observation: Observation::Idle {
                    cycles,
                    backoff: Duration::ZERO,
                },
                state: LoopState::Terminated(TerminationReason::IdleLimitReached),
            };
        }

        let backoff = self.config.idle_backoff;
        info!(
            cycles,
            backoff_secs = backoff.as_secs(),
            "No proxy inside its vote window, idling"
        );
        let state = self.pause(backoff).await;
        StepReport {
            counters,
            observation: Observation::Idle { cycles, backoff },
            state,
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep unless shutdown is requested first
    async fn pause(&mut self, duration: Duration) -> LoopState {
        let clock = self.clock.clone();
        tokio::select! {
            biased;
            _ = clock.sleep(duration) => LoopState::Running,
            _ = wait_for_shutdown(&mut self.shutdown) => {
                info!("Shutdown requested during sleep");
                LoopState::Terminated(TerminationReason::Cancelled)
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Sender dropped without signalling: shutdown can no longer arrive.
            std::future::pending::<()>().await;
        }
    }
}
