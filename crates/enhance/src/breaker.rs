//! Circuit breaker bank — one live breaker per capability server.
//!
//! ```text
//!            N consecutive failures           cooldown elapsed
//!  Closed ─────────────────────────▶ Open ─────────────────────▶ HalfOpen
//!    ▲                                 ▲                            │
//!    │            trial succeeds       │  trial fails (cooldown ×k) │
//!    └─────────────────────────────────┼────────────────────────────┘
//!                                      └────────────────────────────┘
//! ```
//!
//! Each server's state sits behind its own `Mutex`; the bank's map is only
//! write-locked when a new server is registered. Callers obtain a
//! [`CallPermit`] before calling and settle it with the outcome. A permit
//! dropped without an outcome changes nothing, except that a half-open trial
//! slot is handed back.

use chrono::{DateTime, Utc};
use clarion_config::BreakerConfig;
use clarion_core::{CircuitState, CircuitStatus, EnhancementEvent, EventBus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker tuning shared by every server in a bank.
#[derive(Debug, Clone)]
pub struct BreakerPolicy {
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub max_cooldown: Duration,
    pub backoff_multiplier: f64,
}

impl From<&BreakerConfig> for BreakerPolicy {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_millis(config.cooldown_ms),
            max_cooldown: Duration::from_millis(config.max_cooldown_ms.max(config.cooldown_ms)),
            backoff_multiplier: config.backoff_multiplier.max(1.0),
        }
    }
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from(&BreakerConfig::default())
    }
}

/// Mutable breaker state for one server.
#[derive(Debug)]
struct BreakerCell {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
    opened_until: Option<Instant>,
    cooldown: Duration,
    trial_in_flight: bool,
    trips: u64,
    total_successes: u64,
    total_failures: u64,
}

/// A state change, reported so callers can log and publish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// The breaker for a single server.
#[derive(Debug)]
pub struct ServerBreaker {
    server_id: String,
    policy: BreakerPolicy,
    cell: Mutex<BreakerCell>,
    events: Option<Arc<EventBus>>,
}

impl ServerBreaker {
    fn new(server_id: String, policy: BreakerPolicy, events: Option<Arc<EventBus>>) -> Self {
        let cooldown = policy.cooldown;
        Self {
            server_id,
            policy,
            cell: Mutex::new(BreakerCell {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                opened_until: None,
                cooldown,
                trial_in_flight: false,
                trips: 0,
                total_successes: 0,
                total_failures: 0,
            }),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerCell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Ask to make a call. `None` means the circuit is open (or a half-open
    /// trial is already running) and the call must be skipped.
    pub fn admit(self: &Arc<Self>) -> Option<CallPermit> {
        let now = Instant::now();
        let (permit, transition) = {
            let mut cell = self.lock();
            match cell.state {
                CircuitState::Closed => (Some(false), None),
                CircuitState::Open => match cell.opened_until {
                    Some(until) if now < until => (None, None),
                    _ => {
                        cell.state = CircuitState::HalfOpen;
                        cell.trial_in_flight = true;
                        (
                            Some(true),
                            Some(Transition {
                                from: CircuitState::Open,
                                to: CircuitState::HalfOpen,
                            }),
                        )
                    }
                },
                CircuitState::HalfOpen if cell.trial_in_flight => (None, None),
                CircuitState::HalfOpen => {
                    cell.trial_in_flight = true;
                    (Some(true), None)
                }
            }
        };

        if let Some(t) = transition {
            self.announce(t);
        }

        permit.map(|trial| CallPermit {
            breaker: Arc::clone(self),
            trial,
            settled: false,
        })
    }

    /// Record a success. While half-open only the trial's outcome moves the
    /// state; a straggler admitted before the circuit tripped only counts.
    fn on_success(&self, trial: bool) -> Option<Transition> {
        let transition = {
            let mut cell = self.lock();
            cell.total_successes += 1;
            match cell.state {
                CircuitState::HalfOpen if trial => {
                    cell.consecutive_failures = 0;
                    cell.state = CircuitState::Closed;
                    cell.trial_in_flight = false;
                    cell.opened_until = None;
                    cell.cooldown = self.policy.cooldown;
                    Some(Transition {
                        from: CircuitState::HalfOpen,
                        to: CircuitState::Closed,
                    })
                }
                CircuitState::HalfOpen => None,
                // A late success from a call admitted before the circuit
                // tripped does not close it; the next trial decides.
                CircuitState::Closed | CircuitState::Open => {
                    cell.consecutive_failures = 0;
                    None
                }
            }
        };
        if let Some(t) = transition {
            self.announce(t);
        }
        transition
    }

    fn on_failure(&self, trial: bool) -> Option<Transition> {
        let now = Instant::now();
        let transition = {
            let mut cell = self.lock();
            cell.total_failures += 1;
            cell.consecutive_failures = cell.consecutive_failures.saturating_add(1);
            cell.last_failure_at = Some(Utc::now());
            match cell.state {
                CircuitState::HalfOpen if trial => {
                    let grown = cell.cooldown.mul_f64(self.policy.backoff_multiplier);
                    cell.cooldown = grown.min(self.policy.max_cooldown);
                    cell.state = CircuitState::Open;
                    cell.trial_in_flight = false;
                    cell.opened_until = Some(now + cell.cooldown);
                    cell.trips += 1;
                    Some(Transition {
                        from: CircuitState::HalfOpen,
                        to: CircuitState::Open,
                    })
                }
                CircuitState::Closed
                    if cell.consecutive_failures >= self.policy.failure_threshold =>
                {
                    cell.state = CircuitState::Open;
                    cell.opened_until = Some(now + cell.cooldown);
                    cell.trips += 1;
                    Some(Transition {
                        from: CircuitState::Closed,
                        to: CircuitState::Open,
                    })
                }
                _ => None,
            }
        };
        if let Some(t) = transition {
            self.announce(t);
        }
        transition
    }

    /// Count a failure for a call whose task was aborted along with its
    /// permit.
    pub(crate) fn record_lost(&self, trial: bool) -> Option<Transition> {
        self.on_failure(trial)
    }

    fn release_trial(&self) {
        let mut cell = self.lock();
        if cell.state == CircuitState::HalfOpen {
            cell.trial_in_flight = false;
        }
    }

    fn announce(&self, t: Transition) {
        if t.to == CircuitState::Open {
            warn!(server = %self.server_id, from = %t.from, "Circuit opened");
        } else {
            info!(server = %self.server_id, from = %t.from, to = %t.to, "Circuit transitioned");
        }
        if let Some(bus) = &self.events {
            bus.publish(EnhancementEvent::CircuitTransitioned {
                server_id: self.server_id.clone(),
                from: t.from,
                to: t.to,
                timestamp: Utc::now(),
            });
        }
    }

    /// Snapshot for health reporting.
    pub fn status(&self) -> CircuitStatus {
        let now = Instant::now();
        let cell = self.lock();
        let open_remaining_ms = match (cell.state, cell.opened_until) {
            (CircuitState::Open, Some(until)) => {
                Some(until.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };
        CircuitStatus {
            server_id: self.server_id.clone(),
            state: cell.state,
            failure_count: cell.consecutive_failures,
            last_failure_at: cell.last_failure_at,
            open_remaining_ms,
            trips: cell.trips,
            total_successes: cell.total_successes,
            total_failures: cell.total_failures,
        }
    }
}

/// Permission to make one call, settled exactly once.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<ServerBreaker>,
    trial: bool,
    settled: bool,
}

impl CallPermit {
    /// Whether this call is the half-open probe.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn server_id(&self) -> &str {
        self.breaker.server_id()
    }

    /// Record a successful call.
    pub fn succeed(mut self) -> Option<Transition> {
        self.settled = true;
        self.breaker.on_success(self.trial)
    }

    /// Record a failed or timed-out call.
    pub fn fail(mut self) -> Option<Transition> {
        self.settled = true;
        self.breaker.on_failure(self.trial)
    }

    /// Give the permit back without recording an outcome.
    pub fn release(self) {}
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}

/// Per-server breakers, shared across all requests for the process lifetime.
#[derive(Debug)]
pub struct CircuitBreakerBank {
    policy: BreakerPolicy,
    breakers: RwLock<HashMap<String, Arc<ServerBreaker>>>,
    events: Option<Arc<EventBus>>,
}

impl CircuitBreakerBank {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            breakers: RwLock::new(HashMap::new()),
            events: None,
        }
    }

    /// Publish state transitions on `bus`. Only affects breakers created
    /// after this call, so attach it before registering servers.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    /// Get the breaker for `server_id`, creating a closed one if needed.
    pub fn breaker(&self, server_id: &str) -> Arc<ServerBreaker> {
        if let Some(existing) = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_id)
        {
            return Arc::clone(existing);
        }
        let mut map = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(server_id.to_string()).or_insert_with(|| {
            Arc::new(ServerBreaker::new(
                server_id.to_string(),
                self.policy.clone(),
                self.events.clone(),
            ))
        }))
    }

    /// Make sure every id has a breaker. Existing history is kept.
    pub fn register<'a>(&self, server_ids: impl IntoIterator<Item = &'a str>) {
        for id in server_ids {
            self.breaker(id);
        }
    }

    /// Shortcut for `breaker(id).admit()`.
    pub fn admit(&self, server_id: &str) -> Option<CallPermit> {
        self.breaker(server_id).admit()
    }

    /// Status of one server, if it has ever been registered or called.
    pub fn status(&self, server_id: &str) -> Option<CircuitStatus> {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(server_id)
            .map(|b| b.status())
    }

    /// Status of every known server, sorted by id.
    pub fn report(&self) -> Vec<CircuitStatus> {
        let mut report: Vec<CircuitStatus> = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|b| b.status())
            .collect();
        report.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        report
    }
}

impl Default for CircuitBreakerBank {
    fn default() -> Self {
        Self::new(BreakerPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u32, cooldown_ms: u64) -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: threshold,
            cooldown: Duration::from_millis(cooldown_ms),
            max_cooldown: Duration::from_millis(cooldown_ms * 4),
            backoff_multiplier: 2.0,
        }
    }

    fn fail_n(bank: &CircuitBreakerBank, id: &str, n: usize) {
        for _ in 0..n {
            bank.admit(id).expect("admitted").fail();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_consecutive_failures() {
        let bank = CircuitBreakerBank::new(policy(5, 1000));
        fail_n(&bank, "seq", 4);
        assert_eq!(bank.status("seq").unwrap().state, CircuitState::Closed);

        let t = bank.admit("seq").unwrap().fail();
        assert_eq!(
            t,
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );
        assert!(bank.admit("seq").is_none());

        let status = bank.status("seq").unwrap();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.failure_count, 5);
        assert_eq!(status.trips, 1);
        assert_eq!(status.open_remaining_ms, Some(1000));
        assert!(status.last_failure_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_consecutive_count() {
        let bank = CircuitBreakerBank::new(policy(3, 1000));
        fail_n(&bank, "seq", 2);
        bank.admit("seq").unwrap().succeed();
        fail_n(&bank, "seq", 2);
        assert_eq!(bank.status("seq").unwrap().state, CircuitState::Closed);
        assert_eq!(bank.status("seq").unwrap().failure_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_success_closes() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        fail_n(&bank, "seq", 1);
        assert!(bank.admit("seq").is_none());

        tokio::time::advance(Duration::from_millis(1000)).await;
        let trial = bank.admit("seq").expect("trial admitted");
        assert!(trial.is_trial());
        assert_eq!(bank.status("seq").unwrap().state, CircuitState::HalfOpen);

        // Only one probe at a time.
        assert!(bank.admit("seq").is_none());

        trial.succeed();
        let status = bank.status("seq").unwrap();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.failure_count, 0);
        assert!(bank.admit("seq").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens_with_longer_cooldown() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        fail_n(&bank, "seq", 1);
        tokio::time::advance(Duration::from_millis(1000)).await;

        bank.admit("seq").unwrap().fail();
        let status = bank.status("seq").unwrap();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.open_remaining_ms, Some(2000));
        assert_eq!(status.trips, 2);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(bank.admit("seq").is_none());
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(bank.admit("seq").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_growth_is_capped() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        fail_n(&bank, "seq", 1);
        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(60)).await;
            bank.admit("seq").unwrap().fail();
        }
        assert_eq!(bank.status("seq").unwrap().open_remaining_ms, Some(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn straggler_outcome_does_not_settle_the_trial() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        let straggler = bank.admit("seq").unwrap();
        assert!(!straggler.is_trial());
        fail_n(&bank, "seq", 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        let trial = bank.admit("seq").unwrap();
        assert!(trial.is_trial());

        assert_eq!(straggler.fail(), None);
        let status = bank.status("seq").unwrap();
        assert_eq!(status.state, CircuitState::HalfOpen);
        assert_eq!(status.total_failures, 2);
        assert!(bank.admit("seq").is_none(), "trial still in flight");

        assert_eq!(
            trial.succeed(),
            Some(Transition {
                from: CircuitState::HalfOpen,
                to: CircuitState::Closed
            })
        );
        let status = bank.status("seq").unwrap();
        assert_eq!(status.state, CircuitState::Closed);
        assert_eq!(status.trips, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn straggler_success_does_not_close_half_open() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        let straggler = bank.admit("seq").unwrap();
        fail_n(&bank, "seq", 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        let trial = bank.admit("seq").unwrap();

        assert_eq!(straggler.succeed(), None);
        assert_eq!(bank.status("seq").unwrap().state, CircuitState::HalfOpen);

        trial.fail();
        let status = bank.status("seq").unwrap();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.open_remaining_ms, Some(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_permit_is_released() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        fail_n(&bank, "seq", 1);
        tokio::time::advance(Duration::from_millis(1000)).await;

        let trial = bank.admit("seq").unwrap();
        drop(trial);

        let status = bank.status("seq").unwrap();
        assert_eq!(status.state, CircuitState::HalfOpen);
        assert_eq!(status.total_failures, 1);
        assert!(bank.admit("seq").is_some(), "a new trial must be admitted");
    }

    #[tokio::test(start_paused = true)]
    async fn released_permit_records_nothing() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        bank.admit("seq").unwrap().release();
        let status = bank.status("seq").unwrap();
        assert_eq!(status.total_failures + status.total_successes, 0);
        assert_eq!(status.state, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn servers_are_independent() {
        let bank = CircuitBreakerBank::new(policy(1, 1000));
        fail_n(&bank, "seq", 1);
        assert!(bank.admit("seq").is_none());
        assert!(bank.admit("context7").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_are_published() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let bank = CircuitBreakerBank::new(policy(1, 1000)).with_events(bus);
        fail_n(&bank, "seq", 1);

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            EnhancementEvent::CircuitTransitioned { server_id, to, .. } => {
                assert_eq!(server_id, "seq");
                assert_eq!(*to, CircuitState::Open);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn report_is_sorted_and_register_keeps_history() {
        let bank = CircuitBreakerBank::new(policy(5, 1000));
        bank.register(["magic", "context7"]);
        bank.admit("context7").unwrap().fail();
        bank.register(["context7", "sequential"]);

        let report = bank.report();
        let ids: Vec<&str> = report.iter().map(|s| s.server_id.as_str()).collect();
        assert_eq!(ids, vec!["context7", "magic", "sequential"]);
        assert_eq!(report[0].total_failures, 1);
    }

    #[test]
    fn concurrent_failures_are_not_lost() {
        let bank = Arc::new(CircuitBreakerBank::new(policy(1000, 1000)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bank = Arc::clone(&bank);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if let Some(p) = bank.admit("seq") {
                            p.fail();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(bank.status("seq").unwrap().total_failures, 400);
    }
}
