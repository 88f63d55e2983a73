//! Waiting for a new principal to become visible to authorization checks.
//!
//! Directory replication is asynchronous: a role assignment issued right after
//! an identity is created can fail because the principal is not known yet. The
//! waiter pauses once before the first such call and then retries the call with
//! exponential backoff until it succeeds or the elapsed budget runs out.

use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cloud::Journal;
use crate::config::PropagationConfig;
use crate::error::{Result, StackwireError};

/// Something that can block the pipeline for a while.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested pauses without blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
    journal: Option<Journal>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also append `"wait:<ms>ms"` to a shared journal.
    pub fn with_journal(journal: Journal) -> Self {
        Self {
            sleeps: RefCell::new(Vec::new()),
            journal: Some(journal),
        }
    }

    /// Every pause requested so far.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        if let Some(journal) = &self.journal {
            journal
                .borrow_mut()
                .push(format!("wait:{}ms", duration.as_millis()));
        }
    }
}

impl<S: Sleeper + ?Sized> Sleeper for std::rc::Rc<S> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Timing of the initial pause and the retry backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationPolicy {
    pub initial_delay: Duration,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub max_elapsed: Duration,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self::from(&PropagationConfig::default())
    }
}

impl From<&PropagationConfig> for PropagationPolicy {
    fn from(config: &PropagationConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            base_delay: Duration::from_millis(config.base_delay_ms),
            factor: config.factor,
            max_delay: Duration::from_secs(config.max_delay_secs),
            max_elapsed: Duration::from_secs(config.max_elapsed_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter { delay: Duration },
    Stop { reason: StopReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The error is not a provisioning failure, or waiting cannot change it.
    NotRetryable,
    /// The next pause would exceed the elapsed budget.
    BudgetExhausted,
}

/// Failure causes that no amount of waiting will change.
const PERMANENT_CAUSES: &[&str] = &["roleassignmentexists", "already exists"];

fn is_permanent(cause: &str) -> bool {
    let cause = cause.to_ascii_lowercase();
    PERMANENT_CAUSES.iter().any(|p| cause.contains(p))
}

/// Decide whether to retry after the `attempt_no`-th (1-based) failure.
///
/// The delay is `base * factor^(attempt_no-1)` capped at `max_delay`, with
/// equal jitter: half the delay is fixed, the other half random.
pub fn decide_retry(
    policy: &PropagationPolicy,
    attempt_no: u32,
    error: &StackwireError,
    elapsed: Duration,
    rand_u64: impl FnOnce() -> u64,
) -> RetryDecision {
    let retryable = match error {
        StackwireError::ProvisioningError { cause, .. } => !is_permanent(cause),
        _ => false,
    };
    if !retryable {
        return RetryDecision::Stop {
            reason: StopReason::NotRetryable,
        };
    }

    let exp = attempt_no.saturating_sub(1).min(i32::MAX as u32) as i32;
    let raw = (policy.base_delay.as_millis() as f64) * policy.factor.powi(exp);
    let raw_ms = raw.min(policy.max_delay.as_millis() as f64).max(0.0) as u64;

    let half = raw_ms / 2;
    let jitter_ms = if raw_ms == half {
        0
    } else {
        rand_u64() % (raw_ms - half + 1)
    };
    let delay = Duration::from_millis(half + jitter_ms);

    if elapsed + delay > policy.max_elapsed {
        return RetryDecision::Stop {
            reason: StopReason::BudgetExhausted,
        };
    }

    RetryDecision::RetryAfter { delay }
}

/// Pauses and retries propagation-dependent calls.
pub struct PropagationWaiter {
    policy: PropagationPolicy,
    sleeper: Box<dyn Sleeper>,
    rng: RefCell<fastrand::Rng>,
    settled: Cell<bool>,
}

impl PropagationWaiter {
    pub fn new(policy: PropagationPolicy, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            policy,
            sleeper,
            rng: RefCell::new(fastrand::Rng::new()),
            settled: Cell::new(false),
        }
    }

    /// Waiter that blocks the thread for real.
    pub fn blocking(policy: PropagationPolicy) -> Self {
        Self::new(policy, Box::new(ThreadSleeper))
    }

    /// Use a seeded RNG for jitter.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: RefCell::new(fastrand::Rng::with_seed(seed)),
            ..self
        }
    }

    pub fn policy(&self) -> &PropagationPolicy {
        &self.policy
    }

    /// Pause for `duration`.
    pub fn wait(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        debug!("Waiting {:?} for propagation", duration);
        self.sleeper.sleep(duration);
    }

    /// Pause for the initial delay, once per run.
    pub fn settle(&self) {
        if self.settled.replace(true) {
            return;
        }
        self.wait(self.policy.initial_delay);
    }

    /// Run `op` until it succeeds or the budget runs out.
    ///
    /// Returns the value and the number of attempts made. Only
    /// `ProvisioningError` is retried; other errors are returned as-is. Elapsed
    /// time counts time spent in `op` plus the pauses requested between attempts.
    ///
    /// # Errors
    ///
    /// Returns `PropagationTimeout` once the next pause would exceed
    /// `max_elapsed`.
    pub fn retry<T>(&self, step: &str, mut op: impl FnMut() -> Result<T>) -> Result<(T, u32)> {
        let mut attempts = 0u32;
        let mut elapsed = Duration::ZERO;

        loop {
            attempts += 1;
            let started = Instant::now();
            let outcome = op();
            elapsed += started.elapsed();

            let err = match outcome {
                Ok(value) => return Ok((value, attempts)),
                Err(err) => err,
            };

            let decision = decide_retry(&self.policy, attempts, &err, elapsed, || {
                self.rng.borrow_mut().u64(..)
            });

            match decision {
                RetryDecision::RetryAfter { delay } => {
                    warn!(
                        "Step '{}' attempt {} failed ({}); retrying in {:?}",
                        step, attempts, err, delay
                    );
                    self.sleeper.sleep(delay);
                    elapsed += delay;
                }
                RetryDecision::Stop {
                    reason: StopReason::NotRetryable,
                } => return Err(err),
                RetryDecision::Stop {
                    reason: StopReason::BudgetExhausted,
                } => {
                    return Err(StackwireError::PropagationTimeout {
                        step: step.to_string(),
                        attempts,
                        elapsed,
                        cause: propagation_cause(err),
                    })
                }
            }
        }
    }
}

fn propagation_cause(err: StackwireError) -> String {
    match err {
        StackwireError::ProvisioningError { cause, .. } => cause,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ResourceKind;
    use std::rc::Rc;

    fn provisioning(cause: &str) -> StackwireError {
        StackwireError::ProvisioningError {
            kind: ResourceKind::RoleAssignment,
            name: "AcrPull".to_string(),
            cause: cause.to_string(),
        }
    }

    fn policy() -> PropagationPolicy {
        PropagationPolicy {
            initial_delay: Duration::from_secs(30),
            base_delay: Duration::from_millis(1000),
            factor: 2.0,
            max_delay: Duration::from_secs(8),
            max_elapsed: Duration::from_secs(60),
        }
    }

    fn waiter(sleeper: Rc<RecordingSleeper>) -> PropagationWaiter {
        PropagationWaiter::new(policy(), Box::new(sleeper)).with_seed(42)
    }

    #[test]
    fn decide_retry_grows_and_caps() {
        let p = policy();
        let err = provisioning("principal not found");
        let max_rand = || u64::MAX;
        let zero_rand = || 0;

        assert_eq!(
            decide_retry(&p, 1, &err, Duration::ZERO, zero_rand),
            RetryDecision::RetryAfter {
                delay: Duration::from_millis(500)
            }
        );
        let RetryDecision::RetryAfter { delay } =
            decide_retry(&p, 3, &err, Duration::ZERO, max_rand)
        else {
            panic!("expected retry");
        };
        assert!(delay >= Duration::from_millis(2000) && delay <= Duration::from_millis(4000));

        let RetryDecision::RetryAfter { delay } =
            decide_retry(&p, 10, &err, Duration::ZERO, zero_rand)
        else {
            panic!("expected retry");
        };
        assert_eq!(delay, Duration::from_millis(4000));
    }

    #[test]
    fn decide_retry_stops_on_non_provisioning_error() {
        let err = StackwireError::ConfigurationError {
            message: "missing scope".to_string(),
        };
        assert_eq!(
            decide_retry(&policy(), 1, &err, Duration::ZERO, || 0),
            RetryDecision::Stop {
                reason: StopReason::NotRetryable
            }
        );
    }

    #[test]
    fn decide_retry_stops_on_existing_assignment() {
        for cause in [
            "ERROR: (RoleAssignmentExists) The role assignment already exists.",
            "Resource with the same id already exists",
        ] {
            assert_eq!(
                decide_retry(&policy(), 1, &provisioning(cause), Duration::ZERO, || 0),
                RetryDecision::Stop {
                    reason: StopReason::NotRetryable
                },
                "{cause}"
            );
        }
        assert!(matches!(
            decide_retry(&policy(), 1, &provisioning("PrincipalNotFound"), Duration::ZERO, || 0),
            RetryDecision::RetryAfter { .. }
        ));
    }

    #[test]
    fn decide_retry_stops_when_budget_is_spent() {
        let err = provisioning("nope");
        assert_eq!(
            decide_retry(&policy(), 1, &err, Duration::from_secs(60), || 0),
            RetryDecision::Stop {
                reason: StopReason::BudgetExhausted
            }
        );
    }

    #[test]
    fn wait_sleeps_requested_duration() {
        let sleeper = Rc::new(RecordingSleeper::new());
        let waiter = waiter(sleeper.clone());
        waiter.wait(Duration::from_secs(5));
        waiter.wait(Duration::ZERO);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn settle_waits_only_once() {
        let sleeper = Rc::new(RecordingSleeper::new());
        let waiter = waiter(sleeper.clone());
        waiter.settle();
        waiter.settle();
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn retry_returns_first_success() {
        let sleeper = Rc::new(RecordingSleeper::new());
        let waiter = waiter(sleeper.clone());
        let (value, attempts) = waiter.retry("role", || Ok::<_, StackwireError>(7)).unwrap();
        assert_eq!((value, attempts), (7, 1));
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn retry_recovers_after_transient_failures() {
        let sleeper = Rc::new(RecordingSleeper::new());
        let waiter = waiter(sleeper.clone());
        let mut failures = 2;
        let (value, attempts) = waiter
            .retry("role", || {
                if failures > 0 {
                    failures -= 1;
                    Err(provisioning("principal does not exist"))
                } else {
                    Ok("assigned")
                }
            })
            .unwrap();
        assert_eq!(value, "assigned");
        assert_eq!(attempts, 3);
        assert_eq!(sleeper.sleeps().len(), 2);
    }

    #[test]
    fn retry_times_out_with_last_cause() {
        let sleeper = Rc::new(RecordingSleeper::new());
        let waiter = waiter(sleeper.clone());
        let err = waiter
            .retry::<()>("vault_role", || Err(provisioning("principal does not exist")))
            .unwrap_err();

        match err {
            StackwireError::PropagationTimeout {
                step,
                attempts,
                elapsed,
                cause,
            } => {
                assert_eq!(step, "vault_role");
                assert!(attempts > 1);
                assert_eq!(attempts as usize, sleeper.sleeps().len() + 1);
                assert!(elapsed <= Duration::from_secs(60));
                assert_eq!(cause, "principal does not exist");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sleeper.total() <= Duration::from_secs(60));
    }

    #[test]
    fn retry_does_not_retry_configuration_errors() {
        let sleeper = Rc::new(RecordingSleeper::new());
        let waiter = waiter(sleeper.clone());
        let mut calls = 0;
        let err = waiter
            .retry::<()>("role", || {
                calls += 1;
                Err(StackwireError::ConfigurationError {
                    message: "bad".to_string(),
                })
            })
            .unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(calls, 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[test]
    fn recording_sleeper_writes_journal() {
        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        let sleeper = RecordingSleeper::with_journal(journal.clone());
        sleeper.sleep(Duration::from_millis(1500));
        assert_eq!(*journal.borrow(), vec!["wait:1500ms"]);
    }

    #[test]
    fn policy_from_config() {
        let policy = PropagationPolicy::from(&PropagationConfig::default());
        assert_eq!(policy.initial_delay, Duration::from_secs(30));
        assert_eq!(policy.base_delay, Duration::from_millis(2000));
        assert_eq!(policy.max_elapsed, Duration::from_secs(300));
    }
}
