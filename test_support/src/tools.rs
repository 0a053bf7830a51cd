//! Fake toolchain programs.
//!
//! A fake tool is a shell script that appends its arguments, one invocation
//! per line, to a log file beside it and exits with a fixed status.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A fake executable and the log it writes.
#[derive(Debug, Clone)]
pub struct FakeTool {
    /// Path of the script.
    pub path: PathBuf,
    /// Path of the invocation log.
    pub log: PathBuf,
}

impl FakeTool {
    /// Recorded invocations, one argument string per call.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|text| text.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Script path as a string, for environment overrides.
    pub fn program(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// Create `name` in `dir`, logging its arguments and exiting with
/// `exit_code`.
pub fn fake_tool(dir: &Path, name: &str, exit_code: i32) -> FakeTool {
    fake_tool_with(dir, name, exit_code, "")
}

/// Like [`fake_tool`], running `body` before exiting.
pub fn fake_tool_with(dir: &Path, name: &str, exit_code: i32, body: &str) -> FakeTool {
    let path = dir.join(name);
    let log = dir.join(format!("{name}.log"));
    let mut file = File::create(&path).expect("script");
    writeln!(
        file,
        "#!/bin/sh\necho \"$*\" >> '{}'\n{body}\nexit {exit_code}",
        log.display()
    )
    .expect("write script");
    drop(file);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path).expect("meta").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("perms");
    }
    FakeTool { path, log }
}
