//! Per-host politeness bookkeeping: tracks the next time each host may be
//! fetched again. Owned and locked by the frontier itself (see
//! `frontier.rs`) rather than a standalone collaborator, since every
//! politeness check happens while the frontier's lock is already held.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct PolitenessClock {
    next_allowed_at: HashMap<String, Instant>,
}

impl PolitenessClock {
    pub fn new() -> Self {
        PolitenessClock { next_allowed_at: HashMap::new() }
    }

    /// If `host` may be fetched now, reserves the next slot (`now + delay`)
    /// and returns `None`. Otherwise returns how long the caller must wait
    /// before trying again.
    pub fn check(&mut self, host: &str, delay: Duration) -> Option<Duration> {
        let now = Instant::now();
        match self.next_allowed_at.get(host) {
            Some(&allowed_at) if allowed_at > now => Some(allowed_at - now),
            _ => {
                self.next_allowed_at.insert(host.to_string(), now + delay);
                None
            }
        }
    }
}

impl Default for PolitenessClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_immediate() {
        let mut clock = PolitenessClock::new();
        assert!(clock.check("ics.uci.edu", Duration::from_secs(1)).is_none());
    }

    #[test]
    fn second_immediate_request_must_wait() {
        let mut clock = PolitenessClock::new();
        clock.check("ics.uci.edu", Duration::from_millis(500));
        assert!(clock.check("ics.uci.edu", Duration::from_millis(500)).is_some());
    }

    #[test]
    fn different_hosts_are_independent() {
        let mut clock = PolitenessClock::new();
        clock.check("a.uci.edu", Duration::from_secs(10));
        assert!(clock.check("b.uci.edu", Duration::from_secs(10)).is_none());
    }
}
