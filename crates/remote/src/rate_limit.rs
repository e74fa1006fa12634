//! Client-side request throttling.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Gate acquired before every outbound API request. Implementations may
/// block; they never fail. Swappable so multi-process deployments can back
/// it with shared state.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn acquire(&self);
}

struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Process-local sliding window: at most `max_per_window` acquisitions per
/// 60 seconds, with callers past the budget parked until the window rolls
/// over.
pub struct SlidingWindowLimiter {
    max_per_window: u32,
    state: Mutex<WindowState>,
}

impl SlidingWindowLimiter {
    pub fn new(max_per_window: u32) -> Self {
        Self {
            max_per_window: max_per_window.max(1),
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let elapsed = state.window_start.elapsed();
                if elapsed >= WINDOW {
                    state.window_start = Instant::now();
                    state.count = 1;
                    return;
                }
                if state.count < self.max_per_window {
                    state.count += 1;
                    return;
                }
                WINDOW - elapsed
            };
            debug!("[Remote] Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }
}
