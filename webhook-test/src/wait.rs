//! Polls remote state until a predicate over the fetched object holds.

use crate::{Error, Object, ResourceRef, Resources};
use k8s_openapi::api::apps::v1::DaemonSet;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Describes what to wait for and for how long.
pub struct WaitSpec<K, P> {
    target: ResourceRef<K>,
    predicate: P,
    timeout: Duration,
    poll_interval: Duration,
}

/// The terminal state of a wait.
#[derive(Debug)]
pub enum Outcome<K> {
    /// The predicate held for this object.
    Success(K),

    /// The deadline passed without the predicate holding.
    Timeout { elapsed: Duration, polls: usize },

    /// The deadline passed while the most recent poll failed transiently.
    Transient(Error),

    /// A poll failed in a way that retrying cannot fix.
    Fatal(Error),

    /// The wait was cancelled by the caller.
    Cancelled,
}

/// Polls a [`Resources`] client until a [`WaitSpec`] is satisfied.
pub struct ConditionWaiter<'c, C> {
    client: &'c C,
    cancel: CancellationToken,
}

// === impl WaitSpec ===

impl<K, P> WaitSpec<K, P>
where
    K: Object,
    P: Fn(&K) -> bool,
{
    pub fn new(target: ResourceRef<K>, predicate: P) -> Self {
        Self {
            target,
            predicate,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.poll_interval.is_zero() || self.poll_interval >= self.timeout {
            return Err(Error::InvalidWait {
                interval: self.poll_interval,
                timeout: self.timeout,
            });
        }
        Ok(())
    }
}

// === impl Outcome ===

impl<K> Outcome<K> {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(self) -> Option<K> {
        match self {
            Self::Success(obj) => Some(obj),
            _ => None,
        }
    }
}

// === impl ConditionWaiter ===

impl<'c, C: Resources> ConditionWaiter<'c, C> {
    pub fn new(client: &'c C) -> Self {
        Self {
            client,
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts polling, including an in-flight request, once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn wait_for<K, P>(&self, spec: WaitSpec<K, P>) -> Outcome<K>
    where
        K: Object,
        P: Fn(&K) -> bool,
    {
        if let Err(error) = spec.validate() {
            return Outcome::Fatal(error);
        }

        let WaitSpec {
            target,
            predicate,
            timeout,
            poll_interval,
        } = spec;
        let start = Instant::now();
        let deadline = start + timeout;
        let mut polls = 0;
        let mut last_transient;

        tracing::debug!(%target, ?timeout, ?poll_interval, "Waiting");
        loop {
            polls += 1;
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                res = self.client.get(&target) => Some(res),
                _ = time::sleep_until(deadline) => None,
            };

            match fetched {
                Some(Ok(obj)) => {
                    if predicate(&obj) {
                        tracing::debug!(%target, polls, elapsed = ?start.elapsed(), "Condition met");
                        return Outcome::Success(obj);
                    }
                    tracing::trace!(%target, polls, ?obj, "Condition not met");
                    last_transient = None;
                }
                Some(Err(error)) if error.is_not_found() => {
                    tracing::trace!(%target, polls, "Not found");
                    last_transient = None;
                }
                Some(Err(error)) if error.is_transient() => {
                    tracing::debug!(%target, polls, %error, "Transient failure");
                    last_transient = Some(error);
                }
                Some(Err(error)) => {
                    tracing::debug!(%target, polls, %error, "Fatal failure");
                    return Outcome::Fatal(error);
                }
                None => {
                    // The deadline passed mid-request; an earlier failure is
                    // no longer the most recent poll.
                    tracing::debug!(%target, polls, "Request outstanding at deadline");
                    last_transient = None;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let elapsed = now - start;
                tracing::debug!(%target, polls, ?elapsed, "Timed out");
                return match last_transient {
                    Some(error) => Outcome::Transient(error),
                    None => Outcome::Timeout { elapsed, polls },
                };
            }

            let delay = poll_interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
                _ = time::sleep(delay) => {}
            }
        }
    }
}

/// Returns true once every desired daemon pod is scheduled, ready, and
/// available.
///
/// A daemonset that wants no pods is trivially ready, as is one that has not
/// reported a status (all of its counts are zero).
pub fn daemonset_ready(ds: &DaemonSet) -> bool {
    let Some(status) = ds.status.as_ref() else {
        return true;
    };
    let desired = status.desired_number_scheduled;

    status.current_number_scheduled == desired
        && status.number_ready == desired
        && status.number_available.unwrap_or(0) == desired
}
