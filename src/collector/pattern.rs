// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::collector::error::{Error, Result};

/// Structured fields extracted from a single log line.
pub type Record = BTreeMap<String, String>;

/// A compiled line pattern with named capture groups.
///
/// Matching is anchored at the start of the line, so `INFO: (?<msg>.*)` only
/// matches lines that begin with `INFO: `. The end of the line is not
/// anchored unless the pattern ends with `$`.
#[derive(Clone)]
pub struct LinePattern {
    source: String,
    regex: Regex,
    /// Names of the capture groups (excluding the full match)
    group_names: Vec<String>,
}

impl LinePattern {
    /// Compile a pattern string.
    ///
    /// Patterns without named groups are accepted; they produce an empty
    /// record for every matching line.
    pub fn new(pattern: &str) -> Result<Self> {
        let invalid = |source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        };

        // Validate the pattern on its own first, wrapping it in a group could
        // otherwise balance stray parentheses.
        Regex::new(pattern).map_err(invalid)?;
        let regex = Regex::new(&format!(r"\A(?:{})", pattern)).map_err(invalid)?;

        let group_names = regex
            .capture_names()
            .skip(1)
            .filter_map(|name| name.map(|s| s.to_string()))
            .collect();

        Ok(Self {
            source: pattern.to_string(),
            regex,
            group_names,
        })
    }

    /// The pattern as it was registered
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Get the names of the capture groups in this pattern
    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    /// Match a line, returning the named captures or `None` when the line
    /// does not match. Optional groups that did not participate are omitted.
    pub fn captures(&self, line: &str) -> Option<Record> {
        let captures = self.regex.captures(line)?;

        let mut record = Record::new();
        for name in &self.group_names {
            if let Some(m) = captures.name(name) {
                record.insert(name.clone(), m.as_str().to_string());
            }
        }

        Some(record)
    }
}

impl fmt::Debug for LinePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LinePattern").field(&self.source).finish()
    }
}
