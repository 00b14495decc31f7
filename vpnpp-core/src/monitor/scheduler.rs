//! Timer-driven check scheduling
//!
//! The scheduler owns one repeating timer task. Each fire tries to start a
//! check cycle; if a cycle is still running the fire is dropped, so cycles
//! never overlap and never queue up.
//!
//! State machine: Stopped -> (start) -> Idle -> (fire) -> Running -> Idle ...
//! -> (destroy) -> Stopped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::monitor::checker::Checker;
use crate::monitor::status::StatusHub;

const MINUTE: Duration = Duration::from_secs(60);

/// Lifecycle state of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Stopped,
    Idle,
    Running,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Stopped => write!(f, "stopped"),
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Running => write!(f, "running"),
        }
    }
}

/// Counters describing what the scheduler has done so far
///
/// Triggers that arrive while the scheduler is stopped are ignored and not
/// counted. Counters survive a destroy/start cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub timer_fires: u64,
    pub manual_triggers: u64,
    pub cycles_started: u64,
    /// Fires or triggers dropped because a cycle was running
    pub fires_dropped: u64,
}

#[derive(Default)]
struct Counters {
    timer_fires: AtomicU64,
    manual_triggers: AtomicU64,
    cycles_started: AtomicU64,
    fires_dropped: AtomicU64,
}

#[derive(Default)]
struct Tasks {
    timer: Option<JoinHandle<()>>,
    config_watch: Option<JoinHandle<()>>,
}

struct Inner {
    checker: Arc<Checker>,
    stopped: AtomicBool,
    running: AtomicBool,
    tasks: Mutex<Tasks>,
    counters: Counters,
}

/// Drives check cycles on a configurable interval
///
/// Cloning is cheap; all clones control the same timer. Must be used from
/// within a tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// Releases the re-entrancy guard even if the cycle task is aborted
struct CycleGuard(Arc<Inner>);

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Timer,
    Manual,
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a cycle unless stopped or one is already running
    fn fire(self: &Arc<Self>, trigger: Trigger) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            debug!(?trigger, "Scheduler stopped, ignoring trigger");
            return false;
        }

        match trigger {
            Trigger::Timer => self.counters.timer_fires.fetch_add(1, Ordering::Relaxed),
            Trigger::Manual => self.counters.manual_triggers.fetch_add(1, Ordering::Relaxed),
        };

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.fires_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(?trigger, "Check cycle still running, dropping trigger");
            return false;
        }
        let guard = CycleGuard(Arc::clone(self));

        // destroy() raises `stopped` before taking this lock, so once it
        // returns every later spawn attempt sees the flag
        let _tasks = self.tasks();
        if self.stopped.load(Ordering::Acquire) {
            debug!(?trigger, "Scheduler destroyed while starting a cycle");
            return false;
        }

        self.counters.cycles_started.fetch_add(1, Ordering::Relaxed);
        let checker = Arc::clone(&self.checker);
        tokio::spawn(async move {
            let _guard = guard;
            // The cycle runs in its own task so a panic inside it is caught
            // here instead of tearing down the scheduler.
            let cycle = tokio::spawn(async move { checker.run_cycle().await });
            match cycle.await {
                Ok(Ok(result)) => debug!(status = %result.reachability, "Check cycle finished"),
                Ok(Err(e)) => error!(error = %e, ?trigger, "Check cycle failed"),
                Err(e) if e.is_panic() => error!(error = %e, ?trigger, "Check cycle panicked"),
                Err(e) => warn!(error = %e, "Check cycle cancelled"),
            }
        });
        true
    }

    fn build_timer(self: &Arc<Self>) {
        let mut tasks = self.tasks();
        if let Some(previous) = tasks.timer.take() {
            previous.abort();
        }

        if self.stopped.load(Ordering::Acquire) {
            debug!("Scheduler stopped, not arming timer");
            return;
        }

        let minutes = self.checker.config().snapshot().check_minutes();
        if minutes == 0 {
            info!("Check interval is 0, periodic checking disabled");
            return;
        }

        let period = MINUTE * minutes;
        info!(minutes, "Check timer armed");
        let inner = Arc::clone(self);
        tasks.timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                inner.fire(Trigger::Timer);
            }
        }));
    }
}

impl Scheduler {
    pub fn new(checker: Arc<Checker>) -> Self {
        Self {
            inner: Arc::new(Inner {
                checker,
                stopped: AtomicBool::new(true),
                running: AtomicBool::new(false),
                tasks: Mutex::new(Tasks::default()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn checker(&self) -> &Arc<Checker> {
        &self.inner.checker
    }

    /// Status hub the cycles report to
    pub fn hub(&self) -> &Arc<StatusHub> {
        self.inner.checker.hub()
    }

    pub fn state(&self) -> SchedulerState {
        if self.inner.stopped.load(Ordering::Acquire) {
            SchedulerState::Stopped
        } else if self.inner.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        let counters = &self.inner.counters;
        SchedulerStats {
            timer_fires: counters.timer_fires.load(Ordering::Relaxed),
            manual_triggers: counters.manual_triggers.load(Ordering::Relaxed),
            cycles_started: counters.cycles_started.load(Ordering::Relaxed),
            fires_dropped: counters.fires_dropped.load(Ordering::Relaxed),
        }
    }

    /// Start scheduling
    ///
    /// Runs one cycle immediately, arms the timer from the current interval
    /// and rebuilds it whenever `check.minutes` changes. Calling `start` on a
    /// running scheduler does nothing.
    pub fn start(&self) {
        if !self.inner.stopped.swap(false, Ordering::AcqRel) {
            debug!("Scheduler already started");
            return;
        }
        info!("Scheduler started");

        // Subscribe before arming so a change racing start() still rebuilds
        let mut changes = self.inner.checker.config().subscribe();
        let mut minutes = changes.borrow_and_update().check_minutes();

        self.inner.fire(Trigger::Manual);
        self.build_timer();

        let inner = Arc::clone(&self.inner);
        let watcher = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let latest = changes.borrow_and_update().check_minutes();
                if latest != minutes {
                    info!(from = minutes, to = latest, "Check interval changed, rebuilding timer");
                    minutes = latest;
                    inner.build_timer();
                }
            }
        });

        let mut tasks = self.inner.tasks();
        if let Some(previous) = tasks.config_watch.replace(watcher) {
            previous.abort();
        }
        // destroy() may have run while the watcher was being spawned
        if self.inner.stopped.load(Ordering::Acquire) {
            if let Some(watcher) = tasks.config_watch.take() {
                watcher.abort();
            }
        }
    }

    /// (Re)create the repeating timer from the current interval
    ///
    /// An interval of 0 leaves the timer disarmed; manual triggers still work.
    /// In-flight cycles are not affected.
    pub fn build_timer(&self) {
        self.inner.build_timer();
    }

    /// Run a cycle now, outside the timer
    ///
    /// Returns false if the scheduler is stopped or a cycle is running.
    pub fn trigger_now(&self) -> bool {
        self.inner.fire(Trigger::Manual)
    }

    /// Cancel the timer and stop scheduling
    ///
    /// Does not wait for an in-flight cycle; no new cycle starts once this
    /// returns. Calling it again has no further effect.
    pub fn destroy(&self) {
        let was_stopped = self.inner.stopped.swap(true, Ordering::AcqRel);
        // Waits out any fire() that passed its stopped check before the swap
        let mut tasks = self.inner.tasks();
        if let Some(timer) = tasks.timer.take() {
            timer.abort();
        }
        if let Some(watcher) = tasks.config_watch.take() {
            watcher.abort();
        }
        if !was_stopped {
            info!("Scheduler destroyed");
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
