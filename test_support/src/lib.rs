//! Test utilities for kiln.
//!
//! Helpers here write throwaway repositories of `BUILD` files and fake
//! toolchain programs that record how they were called.

pub mod tools;

pub use tools::{FakeTool, fake_tool, fake_tool_with};

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;

/// Write `files` (relative path, contents) into a fresh temporary directory.
///
/// Parent directories are created as needed.
pub fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (path, contents) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&full, contents).expect("write file");
    }
    dir
}

/// UTF-8 path of a temporary directory.
pub fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8 temp dir")
}
