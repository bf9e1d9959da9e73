//! Keyboard input debouncing.
//!
//! # Responsibility
//! - Buffer rapid keyboard edits and emit one committed value after a quiet
//!   period without further input.
//! - Let teardown paths flush or discard the buffer deterministically.
//!
//! # Invariants
//! - At most one timer deadline exists; `submit` restarts it.
//! - `force_flush`, `cancel` and `reload` clear the deadline before returning,
//!   so a preempted timer can never fire later.
//! - Commit sequence numbers increase strictly in emission order.
//! - The baseline is the last committed (or reloaded) value.

use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Which repeats the timer path suppresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupePolicy {
    /// Skip any timer commit equal to the baseline, across windows.
    #[default]
    Always,
    /// Only coalesce inside one quiet period; a later window emits again even
    /// for an unchanged value.
    WithinWindow,
}

/// One committed keyboard value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub seq: u64,
    pub text: String,
}

/// Result of `force_flush`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Current text, whether or not it changed.
    pub text: String,
    /// Present when the text differed from the baseline.
    pub commit: Option<Commit>,
}

/// Quiet-period scheduler for keyboard input.
#[derive(Debug)]
pub struct DebounceScheduler {
    quiet_period: Duration,
    policy: DedupePolicy,
    baseline: String,
    pending: Option<String>,
    deadline: Option<Instant>,
    last_seq: u64,
}

impl DebounceScheduler {
    pub fn new(quiet_period: Duration, policy: DedupePolicy, initial_text: impl Into<String>) -> Self {
        Self {
            quiet_period,
            policy,
            baseline: initial_text.into(),
            pending: None,
            deadline: None,
            last_seq: 0,
        }
    }

    /// Records `text` and restarts the quiet period from `now`.
    pub fn submit(&mut self, text: impl Into<String>, now: Instant) {
        self.pending = Some(text.into());
        self.deadline = Some(now + self.quiet_period);
    }

    /// Fires the timer if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<Commit> {
        match self.deadline {
            Some(deadline) if deadline <= now => {}
            _ => return None,
        }
        self.deadline = None;
        let value = self.pending.take()?;

        if self.policy == DedupePolicy::Always && value == self.baseline {
            debug!(
                "event=debounce_commit module=sync status=skip reason=unchanged len={}",
                value.len()
            );
            return None;
        }
        Some(self.commit(value))
    }

    /// Cancels the timer and commits the buffer if it differs from the
    /// baseline. Always returns the current text.
    pub fn force_flush(&mut self) -> FlushOutcome {
        self.deadline = None;
        let text = self.pending.take().unwrap_or_else(|| self.baseline.clone());
        let commit = if text != self.baseline {
            Some(self.commit(text.clone()))
        } else {
            None
        };
        FlushOutcome { text, commit }
    }

    /// Cancels the timer and discards the buffer without committing.
    pub fn cancel(&mut self) {
        if self.deadline.take().is_some() || self.pending.is_some() {
            debug!("event=debounce_cancel module=sync status=ok");
        }
        self.pending = None;
    }

    /// Undoes `commit` after downstream persistence failed: the baseline goes
    /// back to `previous_baseline` and the value is buffered again unless
    /// newer input already replaced it. No timer is armed.
    pub fn reject(&mut self, commit: Commit, previous_baseline: String) {
        self.baseline = previous_baseline;
        if self.pending.is_none() {
            self.pending = Some(commit.text);
        }
        debug!(
            "event=debounce_commit module=sync status=rejected seq={}",
            commit.seq
        );
    }

    /// Replaces the baseline with `text` and drops any buffered edit.
    pub fn reload(&mut self, text: impl Into<String>) {
        self.deadline = None;
        self.pending = None;
        self.baseline = text.into();
    }

    /// Buffered text, or the baseline when nothing is buffered.
    pub fn text(&self) -> &str {
        self.pending.as_deref().unwrap_or(&self.baseline)
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn has_pending_timer(&self) -> bool {
        self.deadline.is_some()
    }

    fn commit(&mut self, text: String) -> Commit {
        self.last_seq += 1;
        self.baseline = text.clone();
        debug!(
            "event=debounce_commit module=sync status=ok seq={} len={}",
            self.last_seq,
            text.len()
        );
        Commit {
            seq: self.last_seq,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DebounceScheduler, DedupePolicy};
    use std::time::{Duration, Instant};

    const QUIET: Duration = Duration::from_millis(1_000);

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn submits_within_quiet_period_coalesce_into_last_value() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::Always, "");
        scheduler.submit("a", start);
        scheduler.submit("b", start + ms(300));
        scheduler.submit("c", start + ms(600));

        assert!(scheduler.poll(start + ms(1_500)).is_none());
        let commit = scheduler.poll(start + ms(1_600)).unwrap();
        assert_eq!(commit.text, "c");
        assert_eq!(commit.seq, 1);
        assert!(scheduler.poll(start + ms(5_000)).is_none());
    }

    #[test]
    fn always_policy_dedupes_repeat_across_windows() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::Always, "");
        scheduler.submit("a", start);
        assert!(scheduler.poll(start + ms(1_000)).is_some());

        scheduler.submit("a", start + ms(2_000));
        assert!(scheduler.poll(start + ms(3_000)).is_none());
    }

    #[test]
    fn within_window_policy_emits_repeat_in_later_window() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::WithinWindow, "");
        scheduler.submit("a", start);
        let first = scheduler.poll(start + ms(1_000)).unwrap();

        scheduler.submit("a", start + ms(2_000));
        let second = scheduler.poll(start + ms(3_000)).unwrap();
        assert_eq!(first.text, second.text);
        assert!(second.seq > first.seq);
    }

    #[test]
    fn force_flush_preempts_pending_timer() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::Always, "");
        scheduler.submit("x", start);

        let outcome = scheduler.force_flush();
        assert_eq!(outcome.text, "x");
        assert_eq!(outcome.commit.map(|c| c.text).as_deref(), Some("x"));
        assert!(!scheduler.has_pending_timer());
        assert!(scheduler.poll(start + ms(10_000)).is_none());
    }

    #[test]
    fn force_flush_without_change_returns_text_and_no_commit() {
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::Always, "seed");
        let outcome = scheduler.force_flush();
        assert_eq!(outcome.text, "seed");
        assert!(outcome.commit.is_none());

        scheduler.submit("seed", Instant::now());
        assert!(scheduler.force_flush().commit.is_none());
    }

    #[test]
    fn cancel_discards_buffer_without_commit() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::Always, "kept");
        scheduler.submit("dropped", start);
        scheduler.cancel();

        assert!(scheduler.poll(start + ms(2_000)).is_none());
        assert_eq!(scheduler.text(), "kept");
        assert!(scheduler.force_flush().commit.is_none());
    }

    #[test]
    fn rejected_commit_stays_buffered_until_next_flush() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::Always, "old");
        scheduler.submit("new", start);
        let commit = scheduler.poll(start + ms(1_000)).unwrap();

        scheduler.reject(commit, "old".to_string());
        assert_eq!(scheduler.baseline(), "old");
        assert!(!scheduler.has_pending_timer());
        assert!(scheduler.poll(start + ms(9_000)).is_none());

        let retried = scheduler.force_flush().commit.unwrap();
        assert_eq!(retried.text, "new");
        assert_eq!(retried.seq, 2);
    }

    #[test]
    fn reload_resets_baseline() {
        let start = Instant::now();
        let mut scheduler = DebounceScheduler::new(QUIET, DedupePolicy::Always, "");
        scheduler.submit("typed", start);
        scheduler.reload("from ink");

        assert!(!scheduler.has_pending_timer());
        assert_eq!(scheduler.baseline(), "from ink");
        assert!(scheduler.force_flush().commit.is_none());
    }
}
