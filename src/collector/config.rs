// SPDX-License-Identifier: Apache-2.0

//! Configuration for the collector.

use std::time::Duration;

use crate::collector::watcher::{WatchMode, WatcherConfig};

/// What a watch task does with a line that does not match its pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoMatchPolicy {
    /// Write an empty record so unparsed lines stay visible
    #[default]
    EmitEmpty,
    /// Skip the line
    Drop,
    /// Record a failure for the entry and stop its task
    FailTask,
}

impl std::str::FromStr for NoMatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "emit_empty" | "emit-empty" | "empty" => Ok(NoMatchPolicy::EmitEmpty),
            "drop" => Ok(NoMatchPolicy::Drop),
            "fail" | "fail_task" | "fail-task" => Ok(NoMatchPolicy::FailTask),
            _ => Err(format!(
                "Invalid no-match policy '{}'. Valid options: emit_empty, drop, fail",
                s
            )),
        }
    }
}

/// What a watch task does when an entry's transform returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransformFailurePolicy {
    /// Log the error and write the fields exactly as captured
    #[default]
    UseMatched,
    /// Log the error and skip the line
    Drop,
}

/// Where a new watch task starts reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartAt {
    Beginning,
    /// Only lines appended after the task opened the file are collected
    #[default]
    End,
}

/// Configuration for the collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub no_match: NoMatchPolicy,
    pub transform_failure: TransformFailurePolicy,
    pub start_at: StartAt,
    /// Watch mode: auto, native, or poll
    pub watch_mode: WatchMode,
    /// Longest a watch task sleeps between reads when no change is reported.
    /// Also bounds how long an idle task takes to notice cancellation.
    pub poll_interval: Duration,
    /// Debounce interval for native watchers
    pub debounce_interval: Duration,
    /// How often `Collector::wait` checks whether the collector stopped
    pub wait_poll_interval: Duration,
    /// Maximum line size in bytes, longer lines are truncated
    pub max_line_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            no_match: NoMatchPolicy::EmitEmpty,
            transform_failure: TransformFailurePolicy::UseMatched,
            start_at: StartAt::End,
            watch_mode: WatchMode::Auto,
            poll_interval: Duration::from_millis(250),
            debounce_interval: Duration::from_millis(100),
            wait_poll_interval: Duration::from_secs(1),
            max_line_size: 65536,
        }
    }
}

impl CollectorConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll interval must be greater than zero".to_string());
        }

        if self.wait_poll_interval.is_zero() {
            return Err("wait poll interval must be greater than zero".to_string());
        }

        if self.max_line_size == 0 {
            return Err("max line size must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            mode: self.watch_mode,
            poll_interval: self.poll_interval,
            debounce_interval: self.debounce_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_policy_from_str() {
        assert_eq!(
            "emit_empty".parse::<NoMatchPolicy>().unwrap(),
            NoMatchPolicy::EmitEmpty
        );
        assert_eq!("DROP".parse::<NoMatchPolicy>().unwrap(), NoMatchPolicy::Drop);
        assert_eq!("fail".parse::<NoMatchPolicy>().unwrap(), NoMatchPolicy::FailTask);
        assert!("crash".parse::<NoMatchPolicy>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.no_match, NoMatchPolicy::EmitEmpty);
        assert_eq!(config.transform_failure, TransformFailurePolicy::UseMatched);
        assert_eq!(config.start_at, StartAt::End);
        assert_eq!(config.wait_poll_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let config = CollectorConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CollectorConfig {
            max_line_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watcher_config_mirrors_collector_config() {
        let config = CollectorConfig {
            watch_mode: WatchMode::Poll,
            poll_interval: Duration::from_millis(40),
            ..Default::default()
        };

        let watcher = config.watcher_config();
        assert_eq!(watcher.mode, WatchMode::Poll);
        assert_eq!(watcher.poll_interval, Duration::from_millis(40));
    }
}
