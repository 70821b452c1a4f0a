use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for {0}")]
    Exceeded(String),
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self { max_requests, window }
    }
}

/// Timestamps of accepted calls still inside the trailing window.
struct SlidingWindow {
    accepted: VecDeque<Instant>,
    config: RateLimitConfig,
}

impl SlidingWindow {
    fn new(config: RateLimitConfig) -> Self {
        Self {
            accepted: VecDeque::with_capacity(config.max_requests),
            config,
        }
    }

    /// Drop expired entries and report whether another call fits.
    fn has_room(&mut self, now: Instant) -> bool {
        while let Some(&oldest) = self.accepted.front() {
            if now.duration_since(oldest) < self.config.window {
                break;
            }
            self.accepted.pop_front();
        }
        self.accepted.len() < self.config.max_requests
    }

    fn record(&mut self, now: Instant) {
        self.accepted.push_back(now);
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        if self.has_room(now) {
            self.record(now);
            true
        } else {
            false
        }
    }
}

/// Sliding-window limits per tool name plus one shared global window.
pub struct RateLimiter {
    per_tool: Mutex<HashMap<String, SlidingWindow>>,
    global: Mutex<SlidingWindow>,
    tool_config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(tool_config: RateLimitConfig, global_config: RateLimitConfig) -> Self {
        Self {
            per_tool: Mutex::new(HashMap::new()),
            global: Mutex::new(SlidingWindow::new(global_config)),
            tool_config,
        }
    }

    pub fn check_tool(&self, tool_name: &str) -> Result<(), RateLimitError> {
        let mut tools = self.per_tool.lock();
        let window = tools
            .entry(tool_name.to_string())
            .or_insert_with(|| SlidingWindow::new(self.tool_config.clone()));

        if window.try_acquire() {
            Ok(())
        } else {
            Err(RateLimitError::Exceeded(format!("tool:{}", tool_name)))
        }
    }

    pub fn check_global(&self) -> Result<(), RateLimitError> {
        let mut global = self.global.lock();

        if global.try_acquire() {
            Ok(())
        } else {
            Err(RateLimitError::Exceeded("global".to_string()))
        }
    }

    /// Accept a call only if both windows have room; a rejection consumes
    /// no slot in either window.
    pub fn check_all(&self, tool_name: &str) -> Result<(), RateLimitError> {
        // Lock order: global, then per-tool.
        let mut global = self.global.lock();
        let mut tools = self.per_tool.lock();
        let window = tools
            .entry(tool_name.to_string())
            .or_insert_with(|| SlidingWindow::new(self.tool_config.clone()));

        let now = Instant::now();
        if !global.has_room(now) {
            return Err(RateLimitError::Exceeded("global".to_string()));
        }
        if !window.has_room(now) {
            return Err(RateLimitError::Exceeded(format!("tool:{}", tool_name)));
        }
        global.record(now);
        window.record(now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::thread;

    fn limiter(per_tool: usize, global: usize, window: Duration) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig::new(per_tool, window),
            RateLimitConfig::new(global, window),
        )
    }

    #[test]
    fn test_tool_rate_limit() {
        let limiter = limiter(2, 1000, Duration::from_secs(1));

        assert!(limiter.check_tool("file.read").is_ok());
        assert!(limiter.check_tool("file.read").is_ok());
        assert!(limiter.check_tool("file.read").is_err());
    }

    #[test]
    fn test_global_rate_limit() {
        let limiter = limiter(100, 5, Duration::from_secs(1));

        for _ in 0..5 {
            assert!(limiter.check_global().is_ok());
        }
        assert!(limiter.check_global().is_err());
    }

    #[test]
    fn test_window_reset() {
        let limiter = limiter(2, 1000, Duration::from_millis(100));

        assert!(limiter.check_tool("echo").is_ok());
        assert!(limiter.check_tool("echo").is_ok());
        assert!(limiter.check_tool("echo").is_err());

        thread::sleep(Duration::from_millis(150));

        assert!(limiter.check_tool("echo").is_ok());
    }

    #[test]
    fn test_per_tool_isolation() {
        let limiter = limiter(2, 1000, Duration::from_secs(1));

        assert!(limiter.check_tool("file.read").is_ok());
        assert!(limiter.check_tool("file.read").is_ok());
        assert!(limiter.check_tool("file.read").is_err());

        // Different tool should have its own limit
        assert!(limiter.check_tool("file.write").is_ok());
        assert!(limiter.check_tool("file.write").is_ok());
        assert!(limiter.check_tool("file.write").is_err());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let limiter = Arc::new(limiter(10, 1000, Duration::from_secs(1)));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.check_tool("echo").is_ok())
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(allowed, 10);
        assert!(limiter.check_tool("echo").is_err());
    }

    #[test]
    fn test_check_all() {
        let limiter = limiter(5, 2, Duration::from_secs(1));

        assert!(limiter.check_all("a").is_ok());
        assert!(limiter.check_all("b").is_ok());

        // Global limit hit
        let err = limiter.check_all("c").unwrap_err();
        assert_eq!(err.to_string(), "Rate limit exceeded for global");
    }

    #[test]
    fn test_tool_rejection_keeps_global_budget() {
        let limiter = limiter(1, 3, Duration::from_secs(60));

        assert!(limiter.check_all("busy").is_ok());
        for _ in 0..5 {
            let err = limiter.check_all("busy").unwrap_err();
            assert_eq!(err.to_string(), "Rate limit exceeded for tool:busy");
        }

        // Only the one accepted call counted against the global window.
        assert!(limiter.check_all("other").is_ok());
        assert!(limiter.check_all("third").is_ok());
        assert!(limiter.check_all("fourth").is_err());
    }
}
