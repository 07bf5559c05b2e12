// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interval ticks that stop on Ctrl+C.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use cape_engine::DEFAULT_WAIT_POLL as DEFAULT_POLL_INTERVAL;

/// `CAPE_WAIT_POLL_MS`, or one second.
pub fn poll_interval() -> Duration {
    crate::env::wait_poll_ms().unwrap_or(DEFAULT_POLL_INTERVAL)
}

#[derive(Debug, PartialEq, Eq)]
pub enum Tick {
    Ready,
    Interrupted,
}

pub struct Poller {
    interval: Duration,
    ctrl_c: Pin<Box<dyn Future<Output = std::io::Result<()>>>>,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self::with_interrupt(interval, tokio::signal::ctrl_c())
    }

    /// Poller interrupted by `interrupt` instead of Ctrl+C.
    pub fn with_interrupt(
        interval: Duration,
        interrupt: impl Future<Output = std::io::Result<()>> + 'static,
    ) -> Self {
        Self {
            interval,
            ctrl_c: Box::pin(interrupt),
        }
    }

    /// Sleep one interval. The interrupt future is kept across ticks so a
    /// signal arriving between ticks is not lost.
    pub async fn tick(&mut self) -> Tick {
        tokio::select! {
            _ = &mut self.ctrl_c => Tick::Interrupted,
            _ = tokio::time::sleep(self.interval) => Tick::Ready,
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
