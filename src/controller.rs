//! Process controller: owns the location state, the timer pair and the
//! lifecycle entry points a host calls into.
//!
//! Renders and resolutions both run on the blocking pool so a slow provider
//! never holds up the per-second render. Overlapping resolutions are fine;
//! the last one to finish wins.

use crate::clock::{ClockPresenter, StateResponse};
use crate::location::{LocationResolver, LocationState};
use chrono::Utc;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Uninitialized,
    Scheduled,
}

/// Run-once guard for the timer pair.
#[derive(Debug, Default)]
pub struct Scheduler {
    state: SchedulerState,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Returns `true` only on the Uninitialized → Scheduled transition.
    pub fn schedule(&mut self) -> bool {
        match self.state {
            SchedulerState::Uninitialized => {
                self.state = SchedulerState::Scheduled;
                true
            }
            SchedulerState::Scheduled => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub render: Duration,
    pub resolve: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            render: Duration::from_secs(1),
            resolve: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Messages a separate UI surface may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueryRequest {
    #[serde(rename = "get-state")]
    GetState,
}

pub struct Controller {
    state: RwLock<LocationState>,
    resolver: Arc<LocationResolver>,
    presenter: Arc<ClockPresenter>,
    intervals: Intervals,
    scheduler: Mutex<Scheduler>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    pub fn new(
        initial: LocationState,
        resolver: LocationResolver,
        presenter: ClockPresenter,
        intervals: Intervals,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(initial),
            resolver: Arc::new(resolver),
            presenter: Arc::new(presenter),
            intervals,
            scheduler: Mutex::new(Scheduler::new()),
            timers: Mutex::new(Vec::new()),
        })
    }

    /// First run: nothing was persisted yet.
    pub async fn on_install(self: &Arc<Self>) {
        info!("install: starting clock");
        self.initialize().await;
    }

    /// Regular start with persisted state.
    pub async fn on_start(self: &Arc<Self>) {
        info!("startup: starting clock");
        self.initialize().await;
    }

    /// A message from a UI surface. The first lifecycle event may be a
    /// message, so an uninitialized controller starts its timers first.
    pub async fn on_query(self: &Arc<Self>, request: QueryRequest) -> StateResponse {
        if self.scheduler_state() == SchedulerState::Uninitialized {
            info!("first message before startup: starting clock");
            self.initialize().await;
        }
        match request {
            QueryRequest::GetState => {
                let state = self.state.read().await;
                self.presenter.snapshot(&state, Utc::now())
            }
        }
    }

    /// Render from whatever is in memory, install the timers if this is
    /// the first lifecycle event, then kick off a resolution in the
    /// background.
    async fn initialize(self: &Arc<Self>) {
        let first = self.scheduler().schedule();
        if first {
            self.render_now().await;
            self.install_timers();
        } else {
            debug!("timers already scheduled");
        }
        self.spawn_sync();
    }

    fn install_timers(self: &Arc<Self>) {
        let render = {
            let this = self.clone();
            let period = self.intervals.render;
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    this.render_now().await;
                }
            })
        };
        let resolve = {
            let this = self.clone();
            let period = self.intervals.resolve;
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    this.sync_location().await;
                }
            })
        };
        info!(
            "timers installed: render every {:?}, resolve every {:?}",
            self.intervals.render, self.intervals.resolve
        );
        self.timers().extend([render, resolve]);
    }

    pub fn spawn_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.sync_location().await })
    }

    pub async fn render_now(&self) {
        let snapshot = self.state.read().await.clone();
        let presenter = self.presenter.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || presenter.render(&snapshot)).await {
            error!("render task failed: {}", e);
        }
    }

    pub async fn sync_location(&self) {
        let current = self.state.read().await.clone();
        let resolver = self.resolver.clone();
        match tokio::task::spawn_blocking(move || resolver.resolve(&current)).await {
            Ok(next) => *self.state.write().await = next,
            Err(e) => error!("location task failed: {}", e),
        }
    }

    pub async fn state(&self) -> LocationState {
        self.state.read().await.clone()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler().state()
    }

    pub fn timer_count(&self) -> usize {
        self.timers().len()
    }

    /// Stop both timers. In-flight work is left to finish.
    pub fn shutdown(&self) {
        for timer in self.timers().drain(..) {
            timer.abort();
        }
    }

    fn scheduler(&self) -> MutexGuard<'_, Scheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_transitions_once() {
        let mut scheduler = Scheduler::new();
        assert_eq!(scheduler.state(), SchedulerState::Uninitialized);
        assert!(scheduler.schedule());
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
        assert!(!scheduler.schedule());
        assert!(!scheduler.schedule());
        assert_eq!(scheduler.state(), SchedulerState::Scheduled);
    }

    #[test]
    fn test_query_request_wire_format() {
        let req: QueryRequest = serde_json::from_str(r#"{"type":"get-state"}"#).unwrap();
        assert_eq!(req, QueryRequest::GetState);
        assert!(serde_json::from_str::<QueryRequest>(r#"{"type":"reset"}"#).is_err());
        assert_eq!(serde_json::to_string(&QueryRequest::GetState).unwrap(), r#"{"type":"get-state"}"#);
    }

    #[test]
    fn test_default_intervals() {
        let intervals = Intervals::default();
        assert_eq!(intervals.render, Duration::from_secs(1));
        assert_eq!(intervals.resolve, Duration::from_secs(21600));
    }
}
