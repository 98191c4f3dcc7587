use std::time::Duration;
use crate::config::ReconnectConfig;

/// Reconnect delay: wait the current value, then grow it geometrically up to a cap
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        let initial = Duration::from_millis(config.initial_ms);
        let max = Duration::from_millis(config.max_ms.max(config.initial_ms));
        Self {
            initial,
            max,
            multiplier: config.multiplier.max(1.0),
            current: initial,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay to wait before the next attempt and advances the schedule
    pub fn on_failure(&mut self) -> Duration {
        let wait = self.current;
        self.current = self.current.mul_f64(self.multiplier).min(self.max);
        wait
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_is_capped() {
        let mut backoff = Backoff::new(&ReconnectConfig::default());
        let waits: Vec<u128> = (0..8).map(|_| backoff.on_failure().as_millis()).collect();
        assert_eq!(waits, vec![1000, 1500, 2250, 3375, 5062, 7593, 10000, 10000]);
        assert_eq!(backoff.current(), Duration::from_secs(10));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(1));
    }

    #[test]
    fn test_nonsense_config_is_clamped() {
        let mut backoff = Backoff::new(&ReconnectConfig {
            initial_ms: 500,
            max_ms: 100,
            multiplier: 0.5,
        });
        assert_eq!(backoff.on_failure(), Duration::from_millis(500));
        assert_eq!(backoff.current(), Duration::from_millis(500));
    }
}
