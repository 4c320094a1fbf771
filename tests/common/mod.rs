// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use logtap::collector::{CollectorConfig, Record, Sink, SinkError, WatchMode};
use tokio::time::{Instant, sleep};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub identifier: String,
    pub path: PathBuf,
    pub record: Record,
}

/// Keeps every record it is handed, in write order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    written: Mutex<Vec<Written>>,
}

impl RecordingSink {
    pub fn written(&self) -> Vec<Written> {
        self.written.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.written.lock().unwrap().len()
    }

    pub fn for_path(&self, path: &Path) -> Vec<Record> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.path == path)
            .map(|w| w.record.clone())
            .collect()
    }
}

impl Sink for RecordingSink {
    fn write(&self, identifier: &str, path: &Path, record: &Record) -> Result<(), SinkError> {
        self.written.lock().unwrap().push(Written {
            identifier: identifier.to_string(),
            path: path.to_path_buf(),
            record: record.clone(),
        });
        Ok(())
    }
}

pub fn test_config() -> CollectorConfig {
    CollectorConfig {
        watch_mode: WatchMode::Poll,
        poll_interval: Duration::from_millis(20),
        wait_poll_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn append(path: &Path, data: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// Poll until `check` holds, panicking after [`TEST_TIMEOUT`].
pub async fn wait_until<F>(what: &str, mut check: F)
where
    F: AsyncFnMut() -> bool,
{
    let deadline = Instant::now() + TEST_TIMEOUT;
    while !check().await {
        if Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_records(sink: &RecordingSink, count: usize) {
    wait_until("records", async || sink.len() >= count).await;
}
