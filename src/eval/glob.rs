//! Filesystem expansion for the `glob` rule.
use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};

use super::EvalError;

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

fn io_error(pattern: &str, detail: impl ToString) -> EvalError {
    EvalError::GlobIo {
        pattern: pattern.to_owned(),
        detail: detail.to_string(),
    }
}

/// Expand `pattern` under `root/current_dir`.
///
/// Only regular files match; symlinks count when their target is a file.
/// Results are relative to `current_dir`, use `/`
/// separators, and are sorted.
pub(crate) fn expand(
    root: &Utf8Path,
    current_dir: &str,
    pattern: &str,
) -> Result<Vec<String>, EvalError> {
    let base = if current_dir.is_empty() {
        root.to_path_buf()
    } else {
        root.join(current_dir)
    };
    let full = format!(
        "{}/{}",
        Pattern::escape(base.as_str()).trim_end_matches('/'),
        pattern
    );

    let entries = glob::glob_with(&full, OPTIONS).map_err(|err| EvalError::InvalidGlob {
        pattern: pattern.to_owned(),
        detail: err.msg.to_owned(),
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| io_error(pattern, err))?;
        let path = Utf8PathBuf::try_from(path)
            .map_err(|_| io_error(pattern, "glob matched a non-UTF-8 path"))?;
        let Ok(relative) = path.strip_prefix(&base) else {
            continue;
        };
        if path.is_file() {
            matches.push(relative.as_str().replace('\\', "/"));
        }
    }
    matches.sort();
    Ok(matches)
}
