//! Timer entity and its lifecycle state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub type TimerId = Uuid;

/// Lifecycle of a single countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::NotStarted => "NotStarted",
            TimerStatus::Running => "Running",
            TimerStatus::Paused => "Paused",
            TimerStatus::Completed => "Completed",
        }
    }
}

/// One countdown task.
///
/// `elapsed` never exceeds `duration`, and equals it exactly when the timer
/// is `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    pub duration: u64,
    pub elapsed: u64,
    pub category: String,
    pub status: TimerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of advancing a running timer by one second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Advanced,
    Finished,
    /// The timer was not running; nothing changed
    Ignored,
}

/// Fields accepted by a partial update. Status moves only through the
/// lifecycle operations, never through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPatch {
    pub name: Option<String>,
    pub duration: Option<u64>,
    pub elapsed: Option<u64>,
    pub category: Option<String>,
}

/// Check the user-supplied fields of a new timer
pub fn validate_new(name: &str, duration: u64, category: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if duration == 0 {
        return Err(ValidationError::NonPositiveDuration);
    }
    if category.trim().is_empty() {
        return Err(ValidationError::MissingCategory);
    }
    Ok(())
}

impl Timer {
    /// Create a fresh, not yet started timer
    pub fn new(name: impl Into<String>, duration: u64, category: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            duration,
            elapsed: 0,
            category: category.into(),
            status: TimerStatus::NotStarted,
            completed_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == TimerStatus::Completed
    }

    /// Seconds left on the countdown
    pub fn remaining(&self) -> u64 {
        self.duration.saturating_sub(self.elapsed)
    }

    /// 0.0 .. 1.0 progress through the countdown
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        self.elapsed as f64 / self.duration as f64
    }

    /// NotStarted/Paused -> Running. Returns whether the state changed.
    pub fn start(&mut self) -> bool {
        match self.status {
            TimerStatus::NotStarted | TimerStatus::Paused => {
                self.status = TimerStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// Running -> Paused. Returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Paused;
            true
        } else {
            false
        }
    }

    /// Any -> NotStarted with nothing elapsed
    pub fn reset(&mut self) -> bool {
        let changed = self.status != TimerStatus::NotStarted || self.elapsed != 0;
        self.status = TimerStatus::NotStarted;
        self.elapsed = 0;
        self.completed_at = None;
        changed
    }

    /// Advance one second. The final second completes the timer in the same step.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Tick {
        if self.status != TimerStatus::Running {
            return Tick::Ignored;
        }
        if self.elapsed + 1 >= self.duration {
            self.complete(now);
            Tick::Finished
        } else {
            self.elapsed += 1;
            Tick::Advanced
        }
    }

    /// Mark completed. Returns false if it already was.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == TimerStatus::Completed {
            return false;
        }
        self.status = TimerStatus::Completed;
        self.elapsed = self.duration;
        self.completed_at = Some(now);
        true
    }

    /// Merge a partial update, keeping `elapsed` consistent with `status`
    pub fn apply(&mut self, patch: TimerPatch) -> Result<(), ValidationError> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(ValidationError::EmptyName);
            }
        }
        if patch.duration == Some(0) {
            return Err(ValidationError::NonPositiveDuration);
        }
        if let Some(category) = &patch.category {
            if category.trim().is_empty() {
                return Err(ValidationError::MissingCategory);
            }
        }

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(elapsed) = patch.elapsed {
            self.elapsed = elapsed;
        }

        if self.is_completed() {
            self.elapsed = self.duration;
        } else {
            // Only a completion may bring elapsed up to duration
            self.elapsed = self.elapsed.min(self.duration.saturating_sub(1));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn running(duration: u64) -> Timer {
        let mut timer = Timer::new("Read", duration, "Study");
        timer.start();
        timer
    }

    #[rstest]
    #[case("", 5, "Study", ValidationError::EmptyName)]
    #[case("   ", 5, "Study", ValidationError::EmptyName)]
    #[case("Read", 0, "Study", ValidationError::NonPositiveDuration)]
    #[case("Read", 5, "", ValidationError::MissingCategory)]
    fn rejects_invalid_input(
        #[case] name: &str,
        #[case] duration: u64,
        #[case] category: &str,
        #[case] expected: ValidationError,
    ) {
        assert_eq!(validate_new(name, duration, category), Err(expected));
    }

    #[test]
    fn new_timer_is_not_started() {
        let timer = Timer::new(" Read ", 5, "Study");
        assert_eq!(timer.name, "Read");
        assert_eq!(timer.status, TimerStatus::NotStarted);
        assert_eq!(timer.elapsed, 0);
        assert_eq!(timer.remaining(), 5);
        assert!(timer.completed_at.is_none());
    }

    #[test]
    fn start_is_ignored_while_running_or_completed() {
        let mut timer = running(5);
        let before = timer.clone();
        assert!(!timer.start());
        assert_eq!(timer, before);

        timer.complete(Utc::now());
        assert!(!timer.start());
        assert!(timer.is_completed());
    }

    #[test]
    fn pause_only_from_running() {
        let mut timer = Timer::new("Read", 5, "Study");
        assert!(!timer.pause());
        assert_eq!(timer.status, TimerStatus::NotStarted);

        timer.start();
        assert!(timer.pause());
        assert_eq!(timer.status, TimerStatus::Paused);
        assert!(timer.start());
    }

    #[test]
    fn final_tick_completes_in_the_same_step() {
        let mut timer = running(2);
        assert_eq!(timer.tick(Utc::now()), Tick::Advanced);
        assert_eq!(timer.elapsed, 1);
        assert!(timer.is_running());

        assert_eq!(timer.tick(Utc::now()), Tick::Finished);
        assert_eq!(timer.elapsed, 2);
        assert!(timer.is_completed());
        assert!(timer.completed_at.is_some());

        assert_eq!(timer.tick(Utc::now()), Tick::Ignored);
        assert_eq!(timer.elapsed, 2);
    }

    #[test]
    fn ticks_are_ignored_unless_running() {
        let mut timer = Timer::new("Read", 5, "Study");
        assert_eq!(timer.tick(Utc::now()), Tick::Ignored);
        assert_eq!(timer.elapsed, 0);
    }

    #[test]
    fn reset_clears_completion() {
        let mut timer = running(1);
        timer.tick(Utc::now());
        assert!(timer.reset());
        assert_eq!(timer.status, TimerStatus::NotStarted);
        assert_eq!(timer.elapsed, 0);
        assert!(timer.completed_at.is_none());
    }

    #[test]
    fn patch_keeps_elapsed_below_duration_unless_completed() {
        let mut timer = running(10);
        for _ in 0..6 {
            timer.tick(Utc::now());
        }
        timer
            .apply(TimerPatch { duration: Some(4), ..Default::default() })
            .unwrap();
        assert_eq!(timer.duration, 4);
        assert_eq!(timer.elapsed, 3);
        assert!(timer.is_running());

        timer.complete(Utc::now());
        timer
            .apply(TimerPatch { duration: Some(8), ..Default::default() })
            .unwrap();
        assert_eq!(timer.elapsed, 8);
    }

    #[test]
    fn invalid_patch_changes_nothing() {
        let mut timer = Timer::new("Read", 5, "Study");
        let before = timer.clone();
        let result = timer.apply(TimerPatch {
            name: Some("Write".to_string()),
            duration: Some(0),
            ..Default::default()
        });
        assert_eq!(result, Err(ValidationError::NonPositiveDuration));
        assert_eq!(timer, before);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let mut timer = running(1);
        timer.tick(Utc::now());
        let json = serde_json::to_value(&timer).unwrap();
        assert_eq!(json["status"], "Completed");
        assert!(json.get("completedAt").is_some());

        let fresh = serde_json::to_value(Timer::new("Read", 5, "Study")).unwrap();
        assert!(fresh.get("completedAt").is_none());
        assert_eq!(fresh["status"], "NotStarted");
    }
}
