// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use tower::BoxError;

use crate::collector::watcher::WatchMode;
use crate::collector::{
    CollectorConfig, ConsoleSink, FileSink, NoMatchPolicy, Sink, StartAt, TransformFailurePolicy,
};
use crate::init::config::{FileConfig, FileSpec};
use crate::init::parse;

/// Where collected records are written
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputArg {
    /// Print records to stdout
    #[default]
    Console,
    /// Write records to --output-path
    File,
}

/// Handling of lines that do not match their file's pattern
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum NoMatchArg {
    /// Write an empty record
    #[default]
    #[value(name = "emit_empty")]
    EmitEmpty,
    /// Skip the line
    Drop,
    /// Stop following the file
    Fail,
}

impl From<NoMatchArg> for NoMatchPolicy {
    fn from(n: NoMatchArg) -> Self {
        match n {
            NoMatchArg::EmitEmpty => NoMatchPolicy::EmitEmpty,
            NoMatchArg::Drop => NoMatchPolicy::Drop,
            NoMatchArg::Fail => NoMatchPolicy::FailTask,
        }
    }
}

/// Where to start reading files
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum StartAtArg {
    /// Start at the beginning of the file
    Beginning,
    /// Start at the end of the file (tail mode)
    #[default]
    End,
}

impl From<StartAtArg> for StartAt {
    fn from(s: StartAtArg) -> Self {
        match s {
            StartAtArg::Beginning => StartAt::Beginning,
            StartAtArg::End => StartAt::End,
        }
    }
}

/// Watch mode for file system monitoring
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum WatchModeArg {
    /// Automatically select the best watching strategy (native first, poll fallback)
    #[default]
    Auto,
    /// Force native file system watching (inotify/kqueue/FSEvents)
    Native,
    /// Force polling mode (use for NFS or when native watching is unreliable)
    Poll,
}

impl From<WatchModeArg> for WatchMode {
    fn from(w: WatchModeArg) -> Self {
        match w {
            WatchModeArg::Auto => WatchMode::Auto,
            WatchModeArg::Native => WatchMode::Native,
            WatchModeArg::Poll => WatchMode::Poll,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct StartArgs {
    /// Identifier attached to every record (defaults to the host name)
    #[arg(long, env = "LOGTAP_IDENTIFIER")]
    pub identifier: Option<String>,

    /// File to follow as PATH=REGEX, may be repeated
    #[arg(long = "file", value_parser = parse::parse_file_spec, action = clap::ArgAction::Append)]
    pub files: Vec<FileSpec>,

    /// TOML file with additional [[files]] entries
    #[arg(long, env = "LOGTAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output: console or file
    #[arg(value_enum, long, env = "LOGTAP_OUTPUT", default_value = "console")]
    pub output: OutputArg,

    /// Output file when --output=file
    #[arg(long, env = "LOGTAP_OUTPUT_PATH")]
    pub output_path: Option<PathBuf>,

    /// Handling of lines that do not match: emit_empty, drop, fail
    #[arg(value_enum, long, env = "LOGTAP_NO_MATCH", default_value = "emit_empty")]
    pub no_match: NoMatchArg,

    /// Where to start reading: beginning or end of file
    #[arg(value_enum, long, env = "LOGTAP_START_AT", default_value = "end")]
    pub start_at: StartAtArg,

    /// Watch mode: auto (default), native (inotify/kqueue/FSEvents), poll (for NFS)
    #[arg(value_enum, long, env = "LOGTAP_WATCH_MODE", default_value = "auto")]
    pub watch_mode: WatchModeArg,

    /// Poll interval in milliseconds, also bounds how long an idle file takes to stop
    #[arg(long, env = "LOGTAP_POLL_INTERVAL_MS", default_value = "250")]
    pub poll_interval_ms: u64,

    /// Debounce interval in milliseconds for the native file watcher
    #[arg(long, env = "LOGTAP_DEBOUNCE_INTERVAL_MS", default_value = "100")]
    pub debounce_interval_ms: u64,

    /// Maximum line size in bytes (longer lines are truncated)
    #[arg(long, env = "LOGTAP_MAX_LINE_SIZE", default_value = "65536")]
    pub max_line_size: usize,

    /// Maximum time in milliseconds to wait for watch tasks to exit on shutdown
    #[arg(long, env = "LOGTAP_STOP_TIMEOUT_MS", default_value = "5000")]
    pub stop_timeout_ms: u64,
}

impl StartArgs {
    /// Build the collector config from command line args
    pub fn build_config(&self) -> CollectorConfig {
        CollectorConfig {
            no_match: self.no_match.into(),
            transform_failure: TransformFailurePolicy::default(),
            start_at: self.start_at.into(),
            watch_mode: self.watch_mode.into(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            debounce_interval: Duration::from_millis(self.debounce_interval_ms),
            max_line_size: self.max_line_size,
            ..Default::default()
        }
    }

    pub fn build_sink(&self) -> Result<Arc<dyn Sink>, BoxError> {
        match self.output {
            OutputArg::Console => Ok(Arc::new(ConsoleSink)),
            OutputArg::File => {
                let path = self
                    .output_path
                    .as_ref()
                    .ok_or("--output-path must be set when --output=file")?;
                let sink = FileSink::create(path).map_err(|e| -> BoxError {
                    format!("failed to open output {}: {}", path.display(), e).into()
                })?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Files from the config file (if any) followed by files given with `--file`,
    /// and the identifier with `--identifier` taking precedence.
    pub fn resolve_files(&self) -> Result<(Option<String>, Vec<FileSpec>), BoxError> {
        let file_config = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let identifier = self.identifier.clone().or(file_config.identifier);
        let mut files = file_config.files;
        files.extend(self.files.iter().cloned());

        if files.is_empty() {
            return Err("no files to follow, use --file PATH=REGEX or --config".into());
        }

        Ok((identifier, files))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        start: StartArgs,
    }

    fn parse(args: &[&str]) -> StartArgs {
        let mut argv = vec!["logtap"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().start
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--file", "/tmp/a.log=(?<all>.*)"]);
        assert_eq!(args.output, OutputArg::Console);
        assert_eq!(args.no_match, NoMatchArg::EmitEmpty);

        let config = args.build_config();
        assert_eq!(config.no_match, NoMatchPolicy::EmitEmpty);
        assert_eq!(config.start_at, StartAt::End);
        assert_eq!(config.watch_mode, WatchMode::Auto);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_policy_args() {
        let args = parse(&[
            "--no-match",
            "fail",
            "--start-at",
            "beginning",
            "--watch-mode",
            "poll",
        ]);
        let config = args.build_config();
        assert_eq!(config.no_match, NoMatchPolicy::FailTask);
        assert_eq!(config.start_at, StartAt::Beginning);
        assert_eq!(config.watch_mode, WatchMode::Poll);
    }

    #[test]
    fn test_repeated_files() {
        let args = parse(&[
            "--file",
            "/tmp/a.log=(?<a>.*)",
            "--file",
            "/tmp/b.log=(?<b>.*)",
        ]);
        let (identifier, files) = args.resolve_files().unwrap();
        assert!(identifier.is_none());
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].path, PathBuf::from("/tmp/b.log"));
    }

    #[test]
    fn test_resolve_files_requires_files() {
        let args = parse(&[]);
        assert!(args.resolve_files().is_err());
    }

    #[test]
    fn test_resolve_files_merges_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("logtap.toml");
        std::fs::write(
            &config,
            "identifier = \"from-file\"\n[[files]]\npath = \"/tmp/c.log\"\npattern = \".*\"\n",
        )
        .unwrap();

        let args = parse(&[
            "--config",
            config.to_str().unwrap(),
            "--file",
            "/tmp/a.log=.*",
        ]);
        let (identifier, files) = args.resolve_files().unwrap();
        assert_eq!(identifier.as_deref(), Some("from-file"));
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/tmp/c.log"), PathBuf::from("/tmp/a.log")]);

        let args = parse(&[
            "--config",
            config.to_str().unwrap(),
            "--identifier",
            "from-args",
        ]);
        let (identifier, _) = args.resolve_files().unwrap();
        assert_eq!(identifier.as_deref(), Some("from-args"));
    }

    #[test]
    fn test_file_output_requires_path() {
        let args = parse(&["--output", "file"]);
        assert!(args.build_sink().is_err());

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out.log");
        let args = parse(&["--output", "file", "--output-path", out.to_str().unwrap()]);
        assert!(args.build_sink().is_ok());
        assert!(out.exists());
    }
}
