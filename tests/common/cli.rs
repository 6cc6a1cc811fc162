//! Helpers for driving the `qt` binary against a throwaway workspace.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use assert_cmd::Command;
use tempfile::TempDir;

/// A temporary directory holding one `.qatrack` workspace.
pub struct QtWorkspace {
    _dir: TempDir,
    pub root: PathBuf,
}

impl QtWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.root.join(".qatrack")
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("failed to write fixture");
        path
    }

    pub fn read_file(&self, path: &Path) -> String {
        fs::read_to_string(path).expect("failed to read output file")
    }
}

/// Captured result of one `qt` invocation.
pub struct QtOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl QtOutput {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}):\n{}", self.stdout))
    }
}

/// Run `qt` in `workspace` as user `tester-bot` unless `--as` says otherwise.
pub fn run_qt<I, S>(workspace: &QtWorkspace, args: I, label: &str) -> QtOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::cargo_bin("qt")
        .expect("qt binary not built")
        .args(args)
        .current_dir(&workspace.root)
        .env("QATRACK_DIR", workspace.workspace_dir())
        .env("USER", "tester-bot")
        .env_remove("QATRACK_ACTOR")
        .env_remove("QATRACK_MAX_PAGE_SIZE")
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("[{label}] failed to spawn qt: {e}"));

    QtOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }
}

/// Like [`run_qt`] but fails the test on a non-zero exit.
pub fn run_qt_ok<I, S>(workspace: &QtWorkspace, args: I, label: &str) -> QtOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let out = run_qt(workspace, args, label);
    assert!(
        out.status.success(),
        "[{label}] qt failed\nstdout:\n{}\nstderr:\n{}",
        out.stdout,
        out.stderr
    );
    out
}

/// A workspace that has already run `qt init`.
pub fn initialized() -> QtWorkspace {
    let workspace = QtWorkspace::new();
    run_qt_ok(&workspace, ["init"], "init");
    workspace
}
