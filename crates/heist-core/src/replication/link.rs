use std::collections::VecDeque;

use super::store::PropertyUpdate;
use crate::ids::Tick;

/// Carries authority updates to one observer, optionally late.
///
/// Updates come out in the order they went in; a delay only shifts when the
/// observer sees them.
#[derive(Debug, Default)]
pub struct ReplicationLink {
    delay: Tick,
    in_flight: VecDeque<(Tick, PropertyUpdate)>,
}

impl ReplicationLink {
    pub fn new(delay: Tick) -> Self {
        Self {
            delay,
            in_flight: VecDeque::new(),
        }
    }

    pub fn delay(&self) -> Tick {
        self.delay
    }

    /// Changing the delay never lets a queued update overtake an older one.
    pub fn set_delay(&mut self, delay: Tick) {
        self.delay = delay;
    }

    pub fn push(&mut self, now: Tick, updates: &[PropertyUpdate]) {
        let due = now + self.delay;
        // Keep due ticks non-decreasing after a delay change.
        let due = self.in_flight.back().map_or(due, |(last, _)| due.max(*last));
        self.in_flight
            .extend(updates.iter().cloned().map(|u| (due, u)));
    }

    /// Everything due at or before `now`, oldest first.
    pub fn deliver(&mut self, now: Tick) -> Vec<PropertyUpdate> {
        let mut out = Vec::new();
        while let Some((due, _)) = self.in_flight.front() {
            if *due > now {
                break;
            }
            if let Some((_, update)) = self.in_flight.pop_front() {
                out.push(update);
            }
        }
        out
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
    }
}
