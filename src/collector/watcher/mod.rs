// SPDX-License-Identifier: Apache-2.0

//! Wakeup sources for watch tasks.
//!
//! A task blocks in [`FileWatcher::wait`] between reads. The native backend
//! wakes it on OS notifications. The poll backend stats the file on an
//! interval and works on file systems without notifications.

mod native;
mod poll;
mod traits;

pub use native::NativeWatcher;
pub use poll::PollWatcher;
pub use traits::{FileWatcher, Wakeup, WatcherError};

use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Native notifications, falling back to polling if they cannot start
    #[default]
    Auto,
    /// Native notifications only
    Native,
    /// Polling only
    Poll,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub mode: WatchMode,
    /// Stat interval of the poll backend
    pub poll_interval: Duration,
    /// Event coalescing interval of the native backend
    pub debounce_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Auto,
            poll_interval: Duration::from_millis(250),
            debounce_interval: Duration::from_millis(100),
        }
    }
}

pub fn create_watcher(config: &WatcherConfig) -> Result<Box<dyn FileWatcher>, WatcherError> {
    match config.mode {
        WatchMode::Native => Ok(Box::new(NativeWatcher::new(config.debounce_interval)?)),
        WatchMode::Poll => Ok(Box::new(PollWatcher::new(config.poll_interval))),
        WatchMode::Auto => match NativeWatcher::new(config.debounce_interval) {
            Ok(watcher) => Ok(Box::new(watcher)),
            Err(e) => {
                warn!(error = %e, "Native file watching unavailable, polling instead");
                Ok(Box::new(PollWatcher::new(config.poll_interval)))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_mode() {
        let config = WatcherConfig {
            mode: WatchMode::Poll,
            ..Default::default()
        };
        assert_eq!(create_watcher(&config).unwrap().backend_name(), "poll");
    }
}
