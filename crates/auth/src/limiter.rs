use dashmap::DashMap;
use std::time::Duration;
use std::time::Instant;

/// Sliding-window request counter keyed by caller-chosen identifier.
///
/// An injected value, not a module-level singleton; counters live in a
/// concurrent map so unrelated identifiers never serialize on each other.
/// In-process only; drift across instances is accepted.
#[derive(Debug, Default)]
pub struct RateLimiter {
    hits: DashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the attempt, prunes entries older than the window, and
    /// allows iff the windowed count stays within `max`.
    pub fn allow(&self, identifier: &str, max: usize, window: Duration) -> bool {
        let now = Instant::now();
        let ref mut hits = self.hits.entry(identifier.to_string()).or_default();
        hits.retain(|past| now.duration_since(*past) < window);
        hits.push(now);
        hits.len() <= max
    }

    /// Login policy: per-IP and, when supplied, per-identifier windows.
    /// Both gates must pass.
    pub fn allow_login(&self, ip: &str, identifier: Option<&str>) -> bool {
        let ip_key = format!("login_ip_{}", ip);
        if !self.allow(
            &ip_key,
            warden_core::LOGIN_MAX_PER_IP,
            warden_core::LOGIN_WINDOW,
        ) {
            return false;
        }
        match identifier {
            Some(id) if !id.is_empty() => self.allow(
                &format!("login_id_{}", id),
                warden_core::LOGIN_MAX_PER_IDENTIFIER,
                warden_core::LOGIN_WINDOW,
            ),
            _ => true,
        }
    }

    pub fn reset(&self, identifier: &str) {
        self.hits.remove(identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_attempt_from_same_ip_is_rejected() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.allow_login("10.0.0.1", None));
        }
        assert!(!limiter.allow_login("10.0.0.1", None));
    }

    #[test]
    fn fourth_attempt_for_same_identifier_is_rejected() {
        let limiter = RateLimiter::new();
        for i in 0..3 {
            assert!(limiter.allow_login(&format!("10.0.0.{}", i), Some("a@b.co")));
        }
        assert!(!limiter.allow_login("10.0.0.99", Some("a@b.co")));
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = RateLimiter::new();
        for _ in 0..6 {
            limiter.allow("one", 5, Duration::from_secs(60));
        }
        assert!(limiter.allow("two", 5, Duration::from_secs(60)));
    }

    #[test]
    fn window_prunes_old_attempts() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.allow("key", 5, Duration::from_millis(10));
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(limiter.allow("key", 5, Duration::from_millis(10)));
    }

    #[test]
    fn reset_clears_the_counter() {
        let limiter = RateLimiter::new();
        for _ in 0..6 {
            limiter.allow("key", 5, Duration::from_secs(60));
        }
        assert!(!limiter.allow("key", 5, Duration::from_secs(60)));
        limiter.reset("key");
        assert!(limiter.allow("key", 5, Duration::from_secs(60)));
    }
}
