//! Integration tests for labgrader
//!
//! Every test builds a scratch course tree in a temporary directory. The
//! toolchains are plain `/bin/sh`: "compiling" a submission syntax-checks its
//! scripts and concatenates them into an executable, so no compiler is needed.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use labgrader::{Config, LabGrader, LabPaths};
use tempfile::TempDir;

mod config_loading;
mod grading;
mod reports;
mod submission_management;
mod unittest_grading;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

const WORKSPACE_CONFIG: &str = r#"
root = '@ROOT@'
work_dir = '@WORK@'
workers = 2
compile_timeout = 10

[toolchains.sh]
name = "POSIX shell"
extension = "sh"

[toolchains.sh.compile]
command = ["sh", "-c", "sh -n {sources} && cat {sources} > {output} && chmod +x {output}"]
output_name = "prog"

[toolchains.sh.run]
command = ["{binary}"]

[toolchains.shtest]
name = "shell tests"
extension = "sh"

[toolchains.shtest.run]
command = ["sh", "{source}"]

[courses.cs101]
grader = "stdout"
toolchain = "sh"

[[courses.cs101.labs]]
name = "lab1"
runtime_limit = 1
public_test_cases = ["2"]

[[courses.cs101.labs]]
name = "lab2"
runtime_limit = 1

[courses.cs102]
grader = "unittest"
toolchain = "shtest"

[[courses.cs102.labs]]
name = "lab1"
runtime_limit = 1
"#;

/// Echoes its input unmodified
pub(crate) const ECHO: &str = "#!/bin/sh\ncat\n";

/// A scratch course tree with its configuration
pub(crate) struct Workspace {
    dir: TempDir,
    config: Arc<Config>,
}

impl Workspace {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let toml = WORKSPACE_CONFIG
            .replace("@ROOT@", &dir.path().join("courses").to_string_lossy())
            .replace("@WORK@", &dir.path().join("work").to_string_lossy());
        let config = Config::parse_toml(&toml).expect("Failed to parse workspace config");
        Self {
            dir,
            config: Arc::new(config),
        }
    }

    pub(crate) fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn lab(&self, course: &str, lab: &str) -> LabPaths {
        LabPaths::new(&self.config.root, course, lab)
    }

    pub(crate) fn grader(&self, course: &str) -> LabGrader {
        LabGrader::for_course(self.config(), course).expect("Failed to create grader")
    }

    pub(crate) fn add_test_case(&self, course: &str, lab: &str, id: &str, input: &str, expected: &str) {
        let dir = self.lab(course, lab).test_cases_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{id}_in")), input).unwrap();
        fs::write(dir.join(format!("{id}_out")), expected).unwrap();
    }

    /// Write a submission and return its directory
    pub(crate) fn add_submission(
        &self,
        course: &str,
        lab: &str,
        batch: Option<&str>,
        id: &str,
        files: &[(&str, &str)],
    ) -> PathBuf {
        let dir = self
            .lab(course, lab)
            .batch_dir(batch)
            .expect("invalid batch key")
            .join(id);
        fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
        dir
    }

    /// Execution directories left behind under the work dir
    pub(crate) fn leftover_work_dirs(&self) -> usize {
        match fs::read_dir(&self.path().join("work")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}
