// SPDX-License-Identifier: Apache-2.0

//! Optional TOML file listing the files to follow.
//!
//! ```toml
//! identifier = "web-1"
//!
//! [[files]]
//! path = "/var/log/app.log"
//! pattern = '^(?<level>\w+): (?<msg>.*)$'
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Toml};
use serde::Deserialize;
use tower::BoxError;

/// A file to follow and the pattern applied to its lines
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSpec {
    pub path: PathBuf,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub identifier: Option<String>,
    pub files: Vec<FileSpec>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, BoxError> {
        // Figment treats a missing file as empty
        if !path.is_file() {
            return Err(format!("config file not found: {}", path.display()).into());
        }

        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| format!("failed to load config {}: {}", path.display(), e).into())
    }
}
