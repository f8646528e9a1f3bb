//! # Wire Logging Utilities
//!
//! Logging helpers for the serial command line: truncated dumps of each
//! command and response line, and a throttle for warnings that can repeat
//! on a noisy line.
//!
//! ## Usage
//!
//! ```rust
//! use rn2483::util::logging::{LogThrottle, log_line_out};
//!
//! let mut throttle = LogThrottle::new(1000, 5); // 5 messages per second
//! if throttle.allow() {
//!     log::warn!("discarded stale bytes");
//! }
//!
//! log_line_out("sys get ver");
//! ```

use std::time::Instant;

/// Longest line printed in full; longer lines are cut.
const MAX_LOG_CHARS: usize = 96;

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    /// Current message count in window
    count: u32,
    /// Start time of current window
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets counter after window expires)
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            self.t0 = now;
            self.count = 0;
        }

        self.count += 1;
        self.count <= self.cap
    }

    /// Reset the throttle (start new window immediately)
    pub fn reset(&mut self) {
        self.t0 = Instant::now();
        self.count = 0;
    }
}

fn clip(line: &str) -> String {
    if line.chars().count() > MAX_LOG_CHARS {
        let head: String = line.chars().take(MAX_LOG_CHARS).collect();
        format!("{head}... ({} chars total)", line.chars().count())
    } else {
        line.to_string()
    }
}

/// Log a command line written to the module.
pub fn log_line_out(line: &str) {
    log::debug!(target: "rn2483::wire", "-> {}", clip(line));
}

/// Log a response line read from the module.
pub fn log_line_in(line: &str) {
    log::debug!(target: "rn2483::wire", "<- {}", clip(line));
}
