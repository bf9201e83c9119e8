//! Progress meters for timed interactions (hacking a terminal, lifting loot).

/// A 0..=1 meter filled at a fixed rate while an interaction holds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressMeter {
    value: f32,
}

impl ProgressMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_complete(&self) -> bool {
        self.value >= 1.0
    }

    /// Fill by `rate_per_sec * dt`. Returns true on the call that completes it.
    pub fn advance(&mut self, rate_per_sec: f32, dt: f32) -> bool {
        if self.is_complete() {
            return false;
        }
        self.value = (self.value + rate_per_sec.max(0.0) * dt).min(1.0);
        self.is_complete()
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completes_once() {
        let mut meter = ProgressMeter::new();
        assert!(!meter.advance(0.5, 1.0));
        assert!(meter.advance(0.5, 1.0));
        assert!(!meter.advance(0.5, 1.0));
        assert_eq!(meter.value(), 1.0);
    }

    #[test]
    fn test_negative_rate_is_ignored() {
        let mut meter = ProgressMeter::new();
        meter.advance(-3.0, 1.0);
        assert_eq!(meter.value(), 0.0);
    }
}
