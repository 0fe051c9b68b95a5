// Periodically drops idle client entries from the in-memory rate limiters

use crate::middleware::RateLimiter;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Spawns the cleanup loop; one pass per `every`
pub fn start_rate_limit_cleanup(limiters: Vec<Arc<RateLimiter>>, every: Duration) {
    log::info!("🧹 Starting rate limit cleanup (every {}s, {} limiters)", every.as_secs(), limiters.len());

    tokio::spawn(async move {
        let mut interval = interval(every);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;

            for limiter in &limiters {
                cleanup_pass(limiter);
            }
        }
    });
}

/// Prunes one limiter and returns (removed, still tracked)
fn cleanup_pass(limiter: &RateLimiter) -> (usize, usize) {
    let removed = limiter.prune();
    let tracked = limiter.tracked_keys();
    log::debug!(
        "🧹 [{}] Pruned {} idle clients ({} still tracked)",
        limiter.name(),
        removed,
        tracked
    );
    (removed, tracked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_prunes_idle_clients() {
        let limiter = Arc::new(RateLimiter::new("test", 10, Duration::from_millis(5)));
        limiter.check("1.2.3.4");
        assert_eq!(limiter.tracked_keys(), 1);

        start_rate_limit_cleanup(vec![Arc::clone(&limiter)], Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_pass_reports_tracked_clients() {
        let limiter = RateLimiter::new("test", 10, Duration::from_secs(60));
        limiter.check("1.2.3.4");
        limiter.check("5.6.7.8");

        // nothing expired yet, both clients stay tracked
        assert_eq!(cleanup_pass(&limiter), (0, 2));
    }
}
