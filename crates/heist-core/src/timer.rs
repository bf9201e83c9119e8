//! Simulation clock and deadline timers.
//!
//! A [`Timer`] is only a deadline: it holds no callback and never fires on its
//! own. Entities arm it inside `step`, check it on later ticks, and clear it
//! once the expiry has been consumed. Anything that must "wait N seconds" is
//! expressed this way instead of sleeping inside a tick.

use serde::{Deserialize, Serialize};

use crate::ids::Tick;

/// Fixed-rate tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    tick: Tick,
    tick_rate: u32,
}

impl Clock {
    /// Create a clock at tick 0 running at `tick_rate` ticks per second.
    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick: 0,
            tick_rate: tick_rate.max(1),
        }
    }

    pub fn now(&self) -> Tick {
        self.tick
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    /// Seconds per tick.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Advance by one tick and return the new tick.
    pub fn advance(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }

    /// Convert a duration in seconds to whole ticks, rounding to nearest.
    pub fn secs_to_ticks(&self, secs: f32) -> Tick {
        (secs.max(0.0) as f64 * self.tick_rate as f64).round() as Tick
    }
}

/// Observable state of a [`Timer`] at a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    NotRunning,
    /// Armed; carries the ticks left before expiry.
    Running(Tick),
    Expired,
}

/// A countdown expressed as an absolute deadline tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    deadline: Option<Tick>,
}

impl Timer {
    /// A timer that is not running.
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer to expire `duration` ticks after `now`. Re-arming replaces
    /// any previous deadline.
    pub fn arm(&mut self, now: Tick, duration: Tick) {
        self.deadline = Some(now.saturating_add(duration));
    }

    /// Arm with a duration in seconds converted through `clock`.
    pub fn arm_secs(&mut self, clock: &Clock, secs: f32) {
        self.arm(clock.now(), clock.secs_to_ticks(secs));
    }

    /// Return to "not running". Used both to consume an expiry and to cancel.
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Tick> {
        self.deadline
    }

    pub fn state(&self, now: Tick) -> TimerState {
        match self.deadline {
            None => TimerState::NotRunning,
            Some(deadline) if now >= deadline => TimerState::Expired,
            Some(deadline) => TimerState::Running(deadline - now),
        }
    }

    /// True from the deadline tick onward until cleared.
    pub fn is_expired(&self, now: Tick) -> bool {
        matches!(self.state(now), TimerState::Expired)
    }

    pub fn is_running(&self, now: Tick) -> bool {
        matches!(self.state(now), TimerState::Running(_))
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// If expired, clear and return true. The usual way to consume an expiry.
    pub fn take_expired(&mut self, now: Tick) -> bool {
        if self.is_expired(now) {
            self.clear();
            true
        } else {
            false
        }
    }
}
