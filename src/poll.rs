//! The poll loop.
//!
//! A [`Poller`] owns the fetcher, the per-session counters and the
//! dashboard. Each cycle goes `start` → fetch → `dispatch` → `complete`,
//! and `complete` arms the [`Scheduler`] for the next cycle. Latency runs
//! from `start` to `complete`, handlers included. There is only ever one
//! request in flight: a new one can only be started after the poll
//! timer armed by the previous `complete` fires.
//!
//! Timing after a successful poll keeps the heartbeat lit for at least
//! `margin` and pulls the cadence back towards `wait`:
//!
//! | request took            | heartbeat off after | next poll after  |
//! |-------------------------|---------------------|------------------|
//! | `<= margin`             | `margin - elapsed`  | `wait - elapsed` |
//! | `<= wait - margin`      | now                 | `wait - elapsed` |
//! | longer                  | now                 | `margin`         |
//!
//! A failed poll is retried after a flat `wait`.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::charts::ChartId;
use crate::error::{FetchError, FieldError};
use crate::handlers::{self, Dashboard, MetricState};
use crate::snapshot::{Metric, Snapshot};

/// Source of snapshots.
pub trait Fetch {
    /// Endpoint shown in logs and the error banner.
    fn url(&self) -> &str;

    /// Perform one request. Blocks until it completes or times out.
    fn fetch(&mut self) -> Result<Snapshot, FetchError>;
}

/// Blocking HTTP GET of the snapshot endpoint.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pyromon/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Fetch for HttpFetcher {
    fn url(&self) -> &str {
        &self.url
    }

    fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        let transport = |source| FetchError::Transport {
            url: self.url.clone(),
            source,
        };
        let response = self.client.get(&self.url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(transport)?;
        let value = serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: self.url.clone(),
            source,
        })?;
        Snapshot::from_value(value).ok_or_else(|| FetchError::NotAnObject {
            url: self.url.clone(),
        })
    }
}

/// Delays, relative to the end of a request, for the two timers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Plan {
    pub heartbeat_off: Duration,
    pub next_poll: Duration,
}

/// Timers after a successful request that took `elapsed`.
pub fn plan_after_success(elapsed: Duration, wait: Duration, margin: Duration) -> Plan {
    if elapsed <= margin {
        Plan {
            heartbeat_off: margin - elapsed,
            next_poll: wait.saturating_sub(elapsed),
        }
    } else if elapsed <= wait.saturating_sub(margin) {
        Plan {
            heartbeat_off: Duration::ZERO,
            next_poll: wait - elapsed,
        }
    } else {
        Plan {
            heartbeat_off: Duration::ZERO,
            next_poll: margin,
        }
    }
}

/// Timers after a failed request: no immediate retry.
pub fn plan_after_failure(wait: Duration) -> Plan {
    Plan {
        heartbeat_off: Duration::ZERO,
        next_poll: wait,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Timer {
    Poll,
    HeartbeatOff,
}

/// At most one pending deadline per [`Timer`].
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    poll_at: Option<Instant>,
    heartbeat_off_at: Option<Instant>,
}

impl Scheduler {
    fn slot(&mut self, timer: Timer) -> &mut Option<Instant> {
        match timer {
            Timer::Poll => &mut self.poll_at,
            Timer::HeartbeatOff => &mut self.heartbeat_off_at,
        }
    }

    /// Arm `timer`, replacing any deadline it already had.
    pub fn arm(&mut self, timer: Timer, at: Instant) {
        *self.slot(timer) = Some(at);
    }

    pub fn cancel(&mut self, timer: Timer) {
        *self.slot(timer) = None;
    }

    pub fn pending(&self, timer: Timer) -> Option<Instant> {
        match timer {
            Timer::Poll => self.poll_at,
            Timer::HeartbeatOff => self.heartbeat_off_at,
        }
    }

    /// Disarm `timer` and return true if its deadline has passed.
    pub fn take_due(&mut self, timer: Timer, now: Instant) -> bool {
        let slot = self.slot(timer);
        match *slot {
            Some(at) if at <= now => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.poll_at, self.heartbeat_off_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn cancel_all(&mut self) {
        self.poll_at = None;
        self.heartbeat_off_at = None;
    }
}

/// How the handlers took a request's outcome.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dispatch {
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PollState {
    /// Nothing requested yet
    Idle,
    /// A request is in flight
    Requesting,
    /// Waiting for the poll timer
    ScheduledWait,
}

/// Running totals and last-seen values for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct PollSession {
    pub calls: u64,
    pub errors: u64,
    /// Round-trip time of the last successful request
    pub latency: Option<Duration>,
    pub metrics: MetricState,
    /// Fields already reported as malformed at warn level
    reported_fields: HashSet<&'static str>,
}

impl PollSession {
    fn report_field_error(&mut self, err: &FieldError) {
        let FieldError::Shape { field, .. } = err;
        if self.reported_fields.insert(*field) {
            tracing::warn!(%err, "skipping malformed snapshot field");
        } else {
            tracing::debug!(%err, "skipping malformed snapshot field");
        }
    }
}

/// Drives the poll cycle for one endpoint.
pub struct Poller<F> {
    fetcher: F,
    session: PollSession,
    dashboard: Dashboard,
    scheduler: Scheduler,
    state: PollState,
    started: Option<Instant>,
    wait: Duration,
    margin: Duration,
}

impl<F: Fetch> Poller<F> {
    pub fn new(fetcher: F, dashboard: Dashboard, wait: Duration, margin: Duration) -> Self {
        Self {
            fetcher,
            session: PollSession::default(),
            dashboard,
            scheduler: Scheduler::default(),
            state: PollState::Idle,
            started: None,
            wait,
            margin,
        }
    }

    pub fn url(&self) -> &str {
        self.fetcher.url()
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn session(&self) -> &PollSession {
        &self.session
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run expired timers. Returns true if a new poll should start now.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        if self.scheduler.take_due(Timer::HeartbeatOff, now) {
            self.dashboard.display.set_heartbeat(false);
        }
        match self.state {
            PollState::Idle => true,
            PollState::Requesting => false,
            PollState::ScheduledWait => self.scheduler.take_due(Timer::Poll, now),
        }
    }

    /// Enter `Requesting`: light the heartbeat and note the start time.
    pub fn start(&mut self, now: Instant) {
        self.state = PollState::Requesting;
        self.started = Some(now);
        self.scheduler.cancel(Timer::Poll);
        self.dashboard.display.set_heartbeat(true);
    }

    /// Issue the request for the current cycle.
    pub fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        self.fetcher.fetch()
    }

    /// Run the handlers for the outcome of the request started by
    /// [`Poller::start`]. `wall` stamps chart points and rate samples.
    pub fn dispatch(&mut self, outcome: Result<Snapshot, FetchError>, wall: DateTime<Utc>) -> Dispatch {
        self.session.calls += 1;
        match outcome {
            Ok(snapshot) => {
                self.on_success(&snapshot, wall);
                Dispatch::Succeeded
            }
            Err(err) => {
                self.on_failure(&err);
                Dispatch::Failed
            }
        }
    }

    /// Close the cycle once the handlers are done.
    ///
    /// `now` is the monotonic time the dispatch finished, so the recorded
    /// latency covers both the request and the handlers. Arms the timers
    /// for the next cycle.
    pub fn complete(&mut self, dispatch: Dispatch, now: Instant, wall: DateTime<Utc>) -> Plan {
        let started = self.started.take().unwrap_or(now);
        let plan = match dispatch {
            Dispatch::Succeeded => {
                let elapsed = now.saturating_duration_since(started);
                self.record_latency(elapsed, wall);
                plan_after_success(elapsed, self.wait, self.margin)
            }
            Dispatch::Failed => plan_after_failure(self.wait),
        };

        if plan.heartbeat_off.is_zero() {
            self.scheduler.cancel(Timer::HeartbeatOff);
            self.dashboard.display.set_heartbeat(false);
        } else {
            self.scheduler
                .arm(Timer::HeartbeatOff, now + plan.heartbeat_off);
        }
        self.scheduler.arm(Timer::Poll, now + plan.next_poll);
        self.state = PollState::ScheduledWait;
        plan
    }

    /// [`Poller::dispatch`] and [`Poller::complete`] at the same instant.
    pub fn finish(
        &mut self,
        outcome: Result<Snapshot, FetchError>,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Plan {
        let dispatch = self.dispatch(outcome, wall);
        self.complete(dispatch, now, wall)
    }

    /// One full cycle on the real clocks.
    pub fn poll_now(&mut self) -> Plan {
        self.start(Instant::now());
        let outcome = self.fetch();
        let wall = Utc::now();
        let dispatch = self.dispatch(outcome, wall);
        self.complete(dispatch, Instant::now(), wall)
    }

    /// Drop pending timers on teardown.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.dashboard.display.set_heartbeat(false);
    }

    fn on_success(&mut self, snapshot: &Snapshot, wall: DateTime<Utc>) {
        let mut applied = 0usize;
        for (kind, value) in snapshot.fields() {
            match Metric::parse(kind, value) {
                Ok(metric) => {
                    handlers::apply(
                        &metric,
                        &mut self.dashboard,
                        &mut self.session.metrics,
                        wall,
                    );
                    applied += 1;
                }
                Err(err) => self.session.report_field_error(&err),
            }
        }

        self.dashboard.display.clear_error();
        self.update_counters();
        tracing::debug!(fields = snapshot.len(), applied, "snapshot applied");
    }

    fn record_latency(&mut self, elapsed: Duration, wall: DateTime<Utc>) {
        self.session.latency = Some(elapsed);
        let latency_ms = elapsed.as_millis();
        self.dashboard
            .display
            .set_text(ChartId::Latency.name(), format!("{} ms", latency_ms));
        self.dashboard.charts.append(
            ChartId::Latency,
            wall.timestamp_millis() as f64,
            latency_ms as f64,
        );
        tracing::debug!(latency_ms = latency_ms as u64, "poll succeeded");
    }

    fn on_failure(&mut self, err: &FetchError) {
        self.session.errors += 1;

        self.dashboard.display.show_error(err.to_string());
        self.dashboard.display.set_text("last_updated", "OFFLINE");
        self.update_counters();

        tracing::warn!(
            url = self.fetcher.url(),
            errors = self.session.errors,
            %err,
            "poll failed"
        );
    }

    fn update_counters(&mut self) {
        let display = &mut self.dashboard.display;
        display.set_text("calls", self.session.calls.to_string());
        display.set_text("errors", self.session.errors.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(2000);
    const MARGIN: Duration = Duration::from_millis(250);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fast_request_keeps_heartbeat_for_margin() {
        assert_eq!(
            plan_after_success(ms(100), WAIT, MARGIN),
            Plan {
                heartbeat_off: ms(150),
                next_poll: ms(1900),
            }
        );
    }

    #[test]
    fn test_normal_request_subtracts_latency() {
        assert_eq!(
            plan_after_success(ms(1000), WAIT, MARGIN),
            Plan {
                heartbeat_off: ms(0),
                next_poll: ms(1000),
            }
        );
    }

    #[test]
    fn test_overrunning_request_cools_down_for_margin() {
        assert_eq!(
            plan_after_success(ms(2200), WAIT, MARGIN),
            Plan {
                heartbeat_off: ms(0),
                next_poll: ms(250),
            }
        );
        // Just past `wait - margin` already uses the cooldown
        assert_eq!(plan_after_success(ms(1751), WAIT, MARGIN).next_poll, ms(250));
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(
            plan_after_success(ms(250), WAIT, MARGIN),
            Plan {
                heartbeat_off: ms(0),
                next_poll: ms(1750),
            }
        );
        assert_eq!(plan_after_success(ms(1750), WAIT, MARGIN).next_poll, ms(250));
    }

    #[test]
    fn test_failure_waits_full_period() {
        assert_eq!(
            plan_after_failure(WAIT),
            Plan {
                heartbeat_off: ms(0),
                next_poll: WAIT,
            }
        );
    }

    #[test]
    fn test_scheduler_single_slot_per_timer() {
        let t0 = Instant::now();
        let mut scheduler = Scheduler::default();
        scheduler.arm(Timer::Poll, t0 + ms(500));
        scheduler.arm(Timer::Poll, t0 + ms(100));
        assert_eq!(scheduler.pending(Timer::Poll), Some(t0 + ms(100)));

        scheduler.arm(Timer::HeartbeatOff, t0 + ms(50));
        assert_eq!(scheduler.next_deadline(), Some(t0 + ms(50)));

        assert!(!scheduler.take_due(Timer::Poll, t0 + ms(99)));
        assert!(scheduler.take_due(Timer::Poll, t0 + ms(100)));
        assert_eq!(scheduler.pending(Timer::Poll), None);

        scheduler.cancel_all();
        assert_eq!(scheduler.next_deadline(), None);
    }
}
