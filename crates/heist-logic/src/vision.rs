//! Guard vision: view cones and sighting accumulation.
//!
//! A target must stay inside the cone with a clear line of sight for a number
//! of consecutive ticks before it counts as spotted. Spotting fires once per
//! continuous sighting: the target is then latched until it drops out of view,
//! at which point the clock starts over.
//!
//! ```
//! use heist_logic::vision::{SightTracker, Sighting};
//!
//! let mut tracker = SightTracker::new(3);
//! assert_eq!(tracker.observe(7u32, true), Sighting::Watching(1));
//! assert_eq!(tracker.observe(7, true), Sighting::Watching(2));
//! assert_eq!(tracker.observe(7, true), Sighting::Spotted);
//! assert_eq!(tracker.observe(7, true), Sighting::Latched);
//! assert_eq!(tracker.observe(7, false), Sighting::Hidden);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::geometry::Vec3;

/// A vision cone anchored at an eye position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCone {
    /// Half of the full opening angle, in degrees.
    pub half_angle_deg: f32,
    /// Maximum sight distance.
    pub range: f32,
}

impl ViewCone {
    pub fn new(half_angle_deg: f32, range: f32) -> Self {
        Self {
            half_angle_deg,
            range,
        }
    }

    /// Whether `target` lies within range and angle of an eye looking along `forward`.
    pub fn contains(&self, eye: Vec3, forward: Vec3, target: Vec3) -> bool {
        let to_target = target - eye;
        let dist = to_target.length();
        if dist > self.range {
            return false;
        }
        if dist == 0.0 {
            return true;
        }
        let facing = forward.normalize();
        if facing == Vec3::ZERO {
            return false;
        }
        let cos = facing.dot(&(to_target * (1.0 / dist)));
        cos >= self.half_angle_deg.to_radians().cos()
    }
}

/// Outcome of observing one target for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// Not visible this tick; any accumulated time was discarded.
    Hidden,
    /// Visible, accumulating. Carries the consecutive visible tick count.
    Watching(u32),
    /// Crossed the threshold on this tick.
    Spotted,
    /// Still visible after having been spotted during this sighting.
    Latched,
}

/// Per-target accumulator of consecutive visible ticks.
#[derive(Debug, Clone, Default)]
pub struct SightTracker<K: Ord + Copy> {
    threshold_ticks: u32,
    watching: BTreeMap<K, u32>,
    latched: BTreeSet<K>,
}

impl<K: Ord + Copy> SightTracker<K> {
    pub fn new(threshold_ticks: u32) -> Self {
        Self {
            threshold_ticks,
            watching: BTreeMap::new(),
            latched: BTreeSet::new(),
        }
    }

    pub fn threshold_ticks(&self) -> u32 {
        self.threshold_ticks
    }

    /// Record one tick of visibility (or its absence) for `key`.
    pub fn observe(&mut self, key: K, visible: bool) -> Sighting {
        if !visible {
            self.watching.remove(&key);
            self.latched.remove(&key);
            return Sighting::Hidden;
        }
        if self.latched.contains(&key) {
            return Sighting::Latched;
        }
        let ticks = self.watching.entry(key).or_insert(0);
        *ticks += 1;
        if *ticks >= self.threshold_ticks {
            self.watching.remove(&key);
            self.latched.insert(key);
            Sighting::Spotted
        } else {
            Sighting::Watching(*ticks)
        }
    }

    /// Consecutive visible ticks accumulated for `key` so far.
    pub fn visible_ticks(&self, key: K) -> u32 {
        self.watching.get(&key).copied().unwrap_or(0)
    }

    pub fn is_latched(&self, key: K) -> bool {
        self.latched.contains(&key)
    }

    /// Forget targets that no longer exist.
    pub fn retain<F: Fn(&K) -> bool>(&mut self, keep: F) {
        self.watching.retain(|k, _| keep(k));
        self.latched.retain(|k| keep(k));
    }

    pub fn clear(&mut self) {
        self.watching.clear();
        self.latched.clear();
    }
}
