//! Minimal structured test logging.
//!
//! Prints phase markers and timing per test so failures in CI logs can
//! be localized quickly. Controlled by `TEST_LOG_LEVEL` (set to `debug`
//! for phase output; silent otherwise).
#![allow(dead_code)]

use std::time::Instant;

pub struct TestLogger {
    name: &'static str,
    started: Instant,
    verbose: bool,
}

impl TestLogger {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let verbose = std::env::var("TEST_LOG_LEVEL")
            .map(|v| matches!(v.to_lowercase().as_str(), "debug" | "trace"))
            .unwrap_or(false);
        if verbose {
            eprintln!("[{name}] start");
        }
        Self {
            name,
            started: Instant::now(),
            verbose,
        }
    }

    pub fn phase(&self, phase: &str) {
        if self.verbose {
            eprintln!("[{}] phase: {phase}", self.name);
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbose {
            eprintln!("[{}] {message}", self.name);
        }
    }

    pub fn finish_ok(&self) {
        if self.verbose {
            eprintln!(
                "[{}] ok ({} ms)",
                self.name,
                self.started.elapsed().as_millis()
            );
        }
    }
}
