// Auto-save scheduler: debounced, interval-driven, retrying persistence
// trigger over the dashboard's dirty transitions.
//
// The state machine is pure — every transition has an `_at(now)` form
// taking an explicit instant, so tests drive time directly and the tokio
// runtime driver (see `runtime.rs`) sleeps on `next_deadline()`.
//
//   idle → dirty → (debouncing) → armed → saving → idle      (success)
//                                        ↘ dirty + retry_due  (failure)
//
// Invariant: at most one save is in flight; a deadline that fires while a
// save is running is dropped, not queued.

pub mod runtime;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// Default quiet period after the last mutation before the save cycle arms.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);
/// Default delay between arming and the actual save attempt.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
/// Default retry budget for scheduled saves.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay for the linear-in-attempt retry backoff.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(2);

/// Tunables for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSavePolicy {
    pub enabled: bool,
    pub debounce: Duration,
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
}

impl Default for AutoSavePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: DEFAULT_DEBOUNCE,
            interval: DEFAULT_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base: DEFAULT_RETRY_BASE,
        }
    }
}

/// How a save attempt was initiated. Scheduled saves retry on failure and
/// re-arm on success; manual and forced saves do neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveKind {
    Scheduled,
    Manual,
    Forced,
}

/// View-facing save state, derived from the scheduler rather than
/// re-implemented ad hoc by each view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Idle,
    Dirty,
    Saving,
    Saved,
    Error,
}

/// Scheduler state for a single dashboard document.
pub struct SaveScheduler {
    policy: AutoSavePolicy,
    dirty: bool,
    paused: bool,
    save_in_flight: bool,
    last_saved: Option<DateTime<Utc>>,
    save_error: Option<String>,
    retry_count: u32,
    debounce_due: Option<Instant>,
    interval_due: Option<Instant>,
    retry_due: Option<Instant>,
}

impl SaveScheduler {
    pub fn new(policy: AutoSavePolicy) -> Self {
        Self {
            policy,
            dirty: false,
            paused: false,
            save_in_flight: false,
            last_saved: None,
            save_error: None,
            retry_count: 0,
            debounce_due: None,
            interval_due: None,
            retry_due: None,
        }
    }

    // ── Dirty transitions ───────────────────────────────────────────

    /// Record a document mutation.
    pub fn mark_dirty(&mut self) {
        self.mark_dirty_at(Instant::now());
    }

    /// Record a document mutation at a specific instant.
    ///
    /// A fresh dirty cycle (document was clean) resets the retry counter,
    /// so an edit made after exhausted retries gets the full retry budget
    /// again. Any previous save error is cleared and the debounce window
    /// (re)starts.
    pub fn mark_dirty_at(&mut self, now: Instant) {
        if !self.dirty {
            self.retry_count = 0;
        }
        self.dirty = true;
        self.save_error = None;

        if self.policy.enabled && !self.paused {
            self.debounce_due = Some(now + self.policy.debounce);
            self.interval_due = None;
            self.retry_due = None;
        }
    }

    // ── Timer-driven transitions ────────────────────────────────────

    /// Advance the timer chain. Returns `true` when a scheduled save
    /// attempt begins; the caller must snapshot the live document *now*
    /// and later report the outcome via `complete_at`.
    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Like `poll` but at a specific instant.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        if self.paused || !self.policy.enabled {
            return false;
        }

        // Debounce elapsed quietly: arm the auto-save interval from the
        // moment the window closed, not from `now`.
        if let Some(due) = self.debounce_due {
            if now >= due {
                self.debounce_due = None;
                self.interval_due = Some(due + self.policy.interval);
            }
        }

        let mut fired = false;
        if let Some(due) = self.interval_due {
            if now >= due {
                self.interval_due = None;
                fired = true;
            }
        }
        if let Some(due) = self.retry_due {
            if now >= due {
                self.retry_due = None;
                fired = true;
            }
        }

        if !fired {
            return false;
        }
        if !self.dirty {
            return false;
        }
        if self.save_in_flight {
            // Single-flight guard: drop, don't queue. The next dirty
            // mutation reschedules.
            debug!("scheduled save fired while another save is in flight, dropping");
            return false;
        }

        self.save_in_flight = true;
        true
    }

    /// Earliest pending deadline, or `None` when nothing is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.paused || !self.policy.enabled {
            return None;
        }
        [self.debounce_due, self.interval_due, self.retry_due].into_iter().flatten().min()
    }

    // ── Manual / forced saves ───────────────────────────────────────

    /// Begin a manual save, bypassing debounce and interval scheduling.
    /// Refused while another save is in flight (single-flight guard) or
    /// when the document is clean.
    pub fn begin_manual(&mut self) -> bool {
        if self.save_in_flight || !self.dirty {
            return false;
        }
        self.save_in_flight = true;
        true
    }

    /// Begin a forced save regardless of dirty state. Refused only while
    /// another save is in flight.
    pub fn begin_force(&mut self) -> bool {
        if self.save_in_flight {
            return false;
        }
        self.save_in_flight = true;
        true
    }

    // ── Completion ──────────────────────────────────────────────────

    /// Report the outcome of the in-flight save.
    ///
    /// Applied unconditionally, even if the scheduler was paused or
    /// disabled while the save was running: pausing cancels pending
    /// timers, never an in-flight attempt.
    pub fn complete(&mut self, outcome: Result<(), String>, kind: SaveKind) {
        self.complete_at(Instant::now(), outcome, kind);
    }

    /// Like `complete` but at a specific instant.
    pub fn complete_at(&mut self, now: Instant, outcome: Result<(), String>, kind: SaveKind) {
        self.save_in_flight = false;

        match outcome {
            Ok(()) => {
                self.dirty = false;
                self.last_saved = Some(Utc::now());
                self.save_error = None;
                self.retry_count = 0;
                // Only the scheduled cycle chains itself; manual and
                // forced saves affect dirty/last_saved state alone.
                if kind == SaveKind::Scheduled && self.policy.enabled && !self.paused {
                    self.interval_due = Some(now + self.policy.interval);
                }
            }
            Err(error) => {
                self.save_error = Some(error);
                if kind == SaveKind::Scheduled && self.retry_count < self.policy.max_retries {
                    self.retry_count += 1;
                    // Linear-in-attempt backoff: base × attempt number.
                    self.retry_due = Some(now + self.policy.retry_base * self.retry_count);
                }
            }
        }
    }

    // ── Pause / resume / enable ─────────────────────────────────────

    /// Freeze timer scheduling. Pending deadlines are cancelled
    /// immediately; dirty state is kept.
    pub fn pause(&mut self) {
        self.paused = true;
        self.cancel_deadlines();
    }

    /// Unfreeze timer scheduling. A dirty document re-arms the
    /// debounce→interval chain.
    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    pub fn resume_at(&mut self, now: Instant) {
        self.paused = false;
        if self.dirty && self.policy.enabled {
            self.debounce_due = Some(now + self.policy.debounce);
        }
    }

    /// Enable or disable scheduled saves entirely.
    pub fn set_enabled_at(&mut self, now: Instant, enabled: bool) {
        self.policy.enabled = enabled;
        if !enabled {
            self.cancel_deadlines();
        } else if self.dirty && !self.paused {
            self.debounce_due = Some(now + self.policy.debounce);
        }
    }

    fn cancel_deadlines(&mut self) {
        self.debounce_due = None;
        self.interval_due = None;
        self.retry_due = None;
    }

    // ── State accessors ─────────────────────────────────────────────

    pub fn status(&self) -> SaveStatus {
        if self.save_in_flight {
            SaveStatus::Saving
        } else if self.save_error.is_some() {
            SaveStatus::Error
        } else if self.dirty {
            SaveStatus::Dirty
        } else if self.last_saved.is_some() {
            SaveStatus::Saved
        } else {
            SaveStatus::Idle
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_saving(&self) -> bool {
        self.save_in_flight
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn policy(&self) -> &AutoSavePolicy {
        &self.policy
    }
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(AutoSavePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> AutoSavePolicy {
        AutoSavePolicy {
            enabled: true,
            debounce: Duration::from_millis(100),
            interval: Duration::from_millis(500),
            max_retries: 3,
            retry_base: Duration::from_millis(200),
        }
    }

    /// Drive the scheduler until a save begins or `limit` elapses past
    /// `start`, stepping through deadlines as the runtime driver would.
    fn run_until_save(scheduler: &mut SaveScheduler, start: Instant, limit: Duration) -> Option<Instant> {
        let end = start + limit;
        while let Some(deadline) = scheduler.next_deadline() {
            if deadline > end {
                return None;
            }
            if scheduler.poll_at(deadline) {
                return Some(deadline);
            }
        }
        None
    }

    // ── Status machine ─────────────────────────────────────────────

    #[test]
    fn fresh_scheduler_is_idle_and_clean() {
        let scheduler = SaveScheduler::default();
        assert_eq!(scheduler.status(), SaveStatus::Idle);
        assert!(!scheduler.is_dirty());
        assert!(scheduler.next_deadline().is_none());
    }

    #[test]
    fn status_transitions_through_the_cycle() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        assert_eq!(scheduler.status(), SaveStatus::Dirty);

        let fired = run_until_save(&mut scheduler, t0, Duration::from_secs(2))
            .expect("save should fire");
        assert_eq!(scheduler.status(), SaveStatus::Saving);

        scheduler.complete_at(fired, Ok(()), SaveKind::Scheduled);
        assert_eq!(scheduler.status(), SaveStatus::Saved);
        assert!(scheduler.last_saved().is_some());
    }

    // ── Debounce + interval chain ──────────────────────────────────

    #[test]
    fn save_fires_debounce_plus_interval_after_last_mutation() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        // Quiet until the debounce closes at t0+100ms; interval arms from
        // there, so the save fires at t0+600ms.
        assert!(!scheduler.poll_at(t0 + Duration::from_millis(100)));
        assert_eq!(scheduler.next_deadline(), Some(t0 + Duration::from_millis(600)));
        assert!(scheduler.poll_at(t0 + Duration::from_millis(600)));
    }

    #[test]
    fn mutation_inside_debounce_window_restarts_it() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        scheduler.mark_dirty_at(t0 + Duration::from_millis(80));

        // Original debounce deadline no longer fires.
        assert!(!scheduler.poll_at(t0 + Duration::from_millis(100)));
        assert_eq!(scheduler.next_deadline(), Some(t0 + Duration::from_millis(180)));
    }

    #[test]
    fn two_mutations_in_one_window_yield_one_save() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        scheduler.mark_dirty_at(t0 + Duration::from_millis(50));

        let mut attempts = 0;
        let mut now = t0;
        while let Some(fired) = run_until_save(&mut scheduler, now, Duration::from_secs(5)) {
            attempts += 1;
            scheduler.complete_at(fired, Ok(()), SaveKind::Scheduled);
            now = fired;
        }
        assert_eq!(attempts, 1, "coalesced mutations should produce a single save");
    }

    #[test]
    fn clean_document_save_fires_as_noop() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        let fired = run_until_save(&mut scheduler, t0, Duration::from_secs(2))
            .expect("first save should fire");
        scheduler.complete_at(fired, Ok(()), SaveKind::Scheduled);

        // Success re-arms the interval, but the document is clean, so the
        // next firing is a no-op.
        assert!(scheduler.next_deadline().is_some());
        assert!(run_until_save(&mut scheduler, fired, Duration::from_secs(5)).is_none());
    }

    // ── Single-flight guard ────────────────────────────────────────

    #[test]
    fn deadline_firing_mid_save_is_dropped() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        let fired = run_until_save(&mut scheduler, t0, Duration::from_secs(2))
            .expect("save should fire");

        // A new mutation while saving arms a fresh debounce; when it
        // elapses with the save still in flight, it is dropped.
        scheduler.mark_dirty_at(fired);
        let dropped_at = scheduler.next_deadline().expect("debounce should be armed");
        assert!(!scheduler.poll_at(dropped_at + scheduler.policy().interval));
        assert!(scheduler.is_saving());

        scheduler.complete_at(fired + Duration::from_millis(50), Ok(()), SaveKind::Scheduled);
        assert!(!scheduler.is_saving());
    }

    #[test]
    fn manual_save_refused_while_in_flight() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        let _fired = run_until_save(&mut scheduler, t0, Duration::from_secs(2))
            .expect("save should fire");

        assert!(!scheduler.begin_manual(), "manual save must be dropped mid-flight");
        assert!(!scheduler.begin_force(), "forced save must be dropped mid-flight");
    }

    #[test]
    fn manual_save_on_clean_document_is_refused_but_force_proceeds() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        assert!(!scheduler.begin_manual());
        assert!(scheduler.begin_force());
        scheduler.complete(Ok(()), SaveKind::Forced);
        assert_eq!(scheduler.status(), SaveStatus::Saved);
        assert!(!scheduler.is_dirty());
    }

    // ── Retry behavior ─────────────────────────────────────────────

    #[test]
    fn failing_saver_attempted_exactly_one_plus_max_retries_times() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        let mut attempts = 0;
        let mut now = t0;
        while let Some(fired) = run_until_save(&mut scheduler, now, Duration::from_secs(30)) {
            attempts += 1;
            scheduler.complete_at(fired, Err("backend down".into()), SaveKind::Scheduled);
            now = fired;
        }

        assert_eq!(attempts, 1 + 3);
        assert_eq!(scheduler.save_error(), Some("backend down"));
        assert_eq!(scheduler.status(), SaveStatus::Error);
        assert!(scheduler.is_dirty(), "document stays dirty after exhausted retries");
    }

    #[test]
    fn retry_delay_scales_with_attempt_number() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        let first = run_until_save(&mut scheduler, t0, Duration::from_secs(2))
            .expect("first attempt");
        scheduler.complete_at(first, Err("x".into()), SaveKind::Scheduled);
        assert_eq!(scheduler.next_deadline(), Some(first + Duration::from_millis(200)));

        let second = scheduler.next_deadline().unwrap();
        assert!(scheduler.poll_at(second));
        scheduler.complete_at(second, Err("x".into()), SaveKind::Scheduled);
        assert_eq!(scheduler.next_deadline(), Some(second + Duration::from_millis(400)));
    }

    #[test]
    fn manual_failure_is_not_retried() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        scheduler.pause();
        scheduler.mark_dirty_at(Instant::now());

        assert!(scheduler.begin_manual());
        scheduler.complete(Err("nope".into()), SaveKind::Manual);
        assert_eq!(scheduler.save_error(), Some("nope"));
        assert!(scheduler.next_deadline().is_none(), "manual failures must not schedule retries");
    }

    #[test]
    fn fresh_dirty_cycle_resets_retry_counter() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        // Exhaust the retry budget.
        scheduler.mark_dirty_at(t0);
        let mut now = t0;
        while let Some(fired) = run_until_save(&mut scheduler, now, Duration::from_secs(30)) {
            scheduler.complete_at(fired, Err("down".into()), SaveKind::Scheduled);
            now = fired;
        }
        assert_eq!(scheduler.retry_count(), 3);

        // Drain the dirty state through a forced success, then dirty again.
        assert!(scheduler.begin_force());
        scheduler.complete_at(now, Ok(()), SaveKind::Forced);
        scheduler.mark_dirty_at(now);
        assert_eq!(scheduler.retry_count(), 0, "a fresh cycle gets the full retry budget");
    }

    #[test]
    fn new_mutation_clears_surfaced_error() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        scheduler.mark_dirty_at(Instant::now());
        assert!(scheduler.begin_manual());
        scheduler.complete(Err("boom".into()), SaveKind::Manual);
        assert_eq!(scheduler.status(), SaveStatus::Error);

        scheduler.mark_dirty_at(Instant::now());
        assert_eq!(scheduler.status(), SaveStatus::Dirty);
        assert!(scheduler.save_error().is_none());
    }

    // ── Pause / resume ─────────────────────────────────────────────

    #[test]
    fn pause_cancels_pending_deadlines_and_keeps_dirty() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        scheduler.mark_dirty_at(Instant::now());
        assert!(scheduler.next_deadline().is_some());

        scheduler.pause();
        assert!(scheduler.next_deadline().is_none());
        assert!(scheduler.is_dirty());
    }

    #[test]
    fn resume_with_dirty_document_rearms_the_chain() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();
        scheduler.mark_dirty_at(t0);
        scheduler.pause();

        let t1 = t0 + Duration::from_secs(10);
        scheduler.resume_at(t1);
        assert_eq!(scheduler.next_deadline(), Some(t1 + Duration::from_millis(100)));
        assert!(run_until_save(&mut scheduler, t1, Duration::from_secs(2)).is_some());
    }

    #[test]
    fn completion_applies_even_when_paused_mid_save() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();

        scheduler.mark_dirty_at(t0);
        let fired = run_until_save(&mut scheduler, t0, Duration::from_secs(2))
            .expect("save should fire");

        // Pause while the save is in flight; the result still commits.
        scheduler.pause();
        scheduler.complete_at(fired, Ok(()), SaveKind::Scheduled);
        assert!(!scheduler.is_dirty());
        assert!(scheduler.last_saved().is_some());
        // But no new cycle is chained while paused.
        assert!(scheduler.next_deadline().is_none());
    }

    #[test]
    fn disabling_cancels_scheduling_but_tracks_dirty() {
        let mut scheduler = SaveScheduler::new(fast_policy());
        let t0 = Instant::now();
        scheduler.set_enabled_at(t0, false);

        scheduler.mark_dirty_at(t0);
        assert!(scheduler.is_dirty());
        assert!(scheduler.next_deadline().is_none());

        // Re-enabling with a dirty document arms the chain.
        scheduler.set_enabled_at(t0, true);
        assert!(scheduler.next_deadline().is_some());
    }
}
