// SPDX-License-Identifier: Apache-2.0

//! Reads complete lines appended to a single open file.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::collector::config::StartAt;

/// Follows one file, yielding each complete line once.
///
/// A line is complete once its terminating `\n` has been written. Partial
/// trailing content is held back until the writer finishes the line.
pub struct LineFollower {
    path: PathBuf,
    reader: BufReader<File>,
    /// Byte offset of the first unread byte
    offset: u64,
    /// Bytes of a line whose newline has not been written yet
    partial: Vec<u8>,
    max_line_size: usize,
}

impl LineFollower {
    /// Open `path` and position the reader according to `start_at`.
    pub fn open(path: impl AsRef<Path>, start_at: StartAt, max_line_size: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;

        let offset = match start_at {
            StartAt::Beginning => 0,
            StartAt::End => file.seek(SeekFrom::End(0))?,
        };

        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset,
            partial: Vec::new(),
            max_line_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the first byte that has not been read yet
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Return the next complete line, or `None` if none is available yet.
    ///
    /// The trailing `\n` (and `\r`) is stripped, invalid UTF-8 is replaced,
    /// and lines longer than the configured maximum are truncated. Bytes past
    /// the maximum are discarded as they are read, so an unterminated line
    /// never holds more than `max_line_size + 1` bytes.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        // One spare byte so a `\r` right at the limit can still be stripped
        let limit = self.max_line_size.saturating_add(1);

        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                return Ok(None);
            }

            let (used, content, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, &available[..pos], true),
                None => (available.len(), available, false),
            };
            let room = limit.saturating_sub(self.partial.len());
            self.partial.extend_from_slice(&content[..content.len().min(room)]);

            self.reader.consume(used);
            self.offset += used as u64;

            if complete {
                let raw = std::mem::take(&mut self.partial);
                return Ok(Some(self.decode(raw)));
            }
        }
    }

    fn decode(&self, mut raw: Vec<u8>) -> String {
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }

        let mut line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };

        if line.len() > self.max_line_size {
            let mut end = self.max_line_size;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
        }

        line
    }
}
