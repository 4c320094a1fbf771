// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use tower::BoxError;

use crate::init::config::FileSpec;

/// Parse a `PATH=REGEX` file specification.
///
/// Splits on the first `=`, so the pattern itself may contain `=`.
pub(crate) fn parse_file_spec(s: &str) -> Result<FileSpec, BoxError> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid PATH=REGEX: no `=` found in `{s}`"))?;

    let (path, pattern) = (&s[..pos], &s[pos + 1..]);
    if path.is_empty() {
        return Err(format!("invalid PATH=REGEX: empty path in `{s}`").into());
    }

    Ok(FileSpec {
        path: PathBuf::from(path),
        pattern: pattern.to_string(),
    })
}
