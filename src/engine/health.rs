//! The `wait_healthy` state machine (spec.md §4.5).
//!
//! Pulled out of [`super::bollard_client`] so the transition logic can be
//! unit tested without a running engine: the poll loop feeds each
//! [`Observation`] it derives from `inspect_container` into [`HealthGate`]
//! and acts on the [`Poll`] it returns.

use std::time::{Duration, Instant};

/// Grace period a healthcheck-less container must stay `running`
/// continuously before it is considered healthy.
pub const NO_HEALTHCHECK_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// What one `inspect_container` poll observed about the staging container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Status is `exited` or `dead`.
    Exited,
    /// The container no longer exists.
    Gone,
    /// No healthcheck is defined; `running` reflects whether status is
    /// currently `running`.
    NoHealthcheck { running: bool },
    /// A healthcheck is defined and bollard reports this health status.
    Health(HealthStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Starting,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Continue,
    Done(bool),
}

/// Holds the state the grace-period branch needs across polls. Everything
/// else in the state machine is stateless given the latest observation.
pub struct HealthGate {
    grace_start: Option<Instant>,
}

impl HealthGate {
    pub fn new() -> Self {
        Self { grace_start: None }
    }

    /// Feed one observation taken at `now`. Deadline handling is the
    /// caller's responsibility (checked before each poll, per spec.md §4.5).
    pub fn step(&mut self, observation: Observation, now: Instant) -> Poll {
        match observation {
            Observation::Exited => Poll::Done(false),
            Observation::Gone => Poll::Done(false),
            Observation::Health(HealthStatus::Healthy) => Poll::Done(true),
            Observation::Health(HealthStatus::Unhealthy) => Poll::Done(false),
            Observation::Health(HealthStatus::Starting) => Poll::Continue,
            Observation::NoHealthcheck { running } => {
                if !running {
                    self.grace_start = None;
                    return Poll::Continue;
                }
                let start = *self.grace_start.get_or_insert(now);
                if now.duration_since(start) >= NO_HEALTHCHECK_GRACE_PERIOD {
                    Poll::Done(true)
                } else {
                    Poll::Continue
                }
            }
        }
    }
}

impl Default for HealthGate {
    fn default() -> Self {
        Self::new()
    }
}
