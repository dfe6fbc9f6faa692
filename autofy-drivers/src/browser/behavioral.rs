use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Default)]
/// Produces human-like delays to reduce automation signals.
pub struct BehavioralEngine {}

impl BehavioralEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Pick a duration between `min` and `max` milliseconds.
    pub fn jitter(&self, min: u64, max: u64) -> Duration {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Duration::from_millis(OsRng.gen_range(lo..=hi))
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        sleep(self.jitter(min, max)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_in_range() {
        let engine = BehavioralEngine::new();
        for _ in 0..50 {
            let d = engine.jitter(100, 300).as_millis();
            assert!((100..=300).contains(&d));
        }
    }

    #[test]
    fn swapped_bounds_are_tolerated() {
        let engine = BehavioralEngine::new();
        let d = engine.jitter(500, 200).as_millis();
        assert!((200..=500).contains(&d));
        assert_eq!(engine.jitter(7, 7), Duration::from_millis(7));
    }
}
