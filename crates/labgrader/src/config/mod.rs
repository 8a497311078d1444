use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::course::{Course, GraderKind, Lab, MAX_LAB_NAME_LEN, RUNTIME_LIMIT_RANGE};
pub use crate::config::toolchain::{
    CompileConfig, DEFAULT_SANDBOX_PATH, FileExtension, Placeholders, RunConfig, Toolchain,
};
use crate::types::ExecutionLimits;

pub mod course;
mod loader;
pub mod toolchain;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../labgrader.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("toolchain '{0}' not found in configuration")]
    ToolchainNotFound(String),

    #[error("course '{0}' not found in configuration")]
    CourseNotFound(String),

    #[error("lab '{lab}' not found in course '{course}'")]
    LabNotFound { course: String, lab: String },

    #[error("invalid lab '{lab}': {reason}")]
    InvalidLab { lab: String, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Restricted execution profile wrapped around every program run
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SandboxConfig {
    /// Apply the wrapper to program runs
    #[serde(default)]
    pub enabled: bool,

    /// Wrapper command prepended to the program's argv.
    /// Placeholder: {profile}
    #[serde(default)]
    pub wrapper: Vec<String>,

    /// Profile file handed to the wrapper
    #[serde(default)]
    pub profile: Option<PathBuf>,

    /// Extra wrapper arguments for labs that disable internet access
    #[serde(default)]
    pub network_off: Vec<String>,
}

/// Config for labgrader
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory holding one subdirectory per course
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Parent directory for per-submission execution directories
    /// (the OS temp directory if not specified).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Number of submissions graded in parallel
    /// (available parallelism if not specified).
    #[serde(default)]
    pub workers: Option<usize>,

    /// Wall clock limit for building one submission, in seconds
    #[serde(default = "default_compile_timeout")]
    pub compile_timeout: u64,

    /// Maximum bytes captured per output stream
    #[serde(default = "default_max_output")]
    pub max_output: usize,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Toolchain configurations keyed by toolchain ID
    #[serde(default)]
    pub toolchains: HashMap<String, Toolchain>,

    /// Course configurations keyed by course name
    #[serde(default)]
    pub courses: HashMap<String, Course>,
}

impl Config {
    /// Create a new config with the embedded example toolchains and courses
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no toolchains or courses
    pub fn empty() -> Self {
        Self {
            root: default_root(),
            work_dir: None,
            workers: None,
            compile_timeout: default_compile_timeout(),
            max_output: default_max_output(),
            sandbox: SandboxConfig::default(),
            toolchains: HashMap::new(),
            courses: HashMap::new(),
        }
    }

    /// Get a toolchain by ID
    pub fn get_toolchain(&self, id: &str) -> Result<&Toolchain, ConfigError> {
        self.toolchains
            .get(id)
            .ok_or_else(|| ConfigError::ToolchainNotFound(id.to_string()))
    }

    /// Get a course by name, ignoring case
    pub fn get_course(&self, name: &str) -> Result<(&str, &Course), ConfigError> {
        self.courses
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(key, course)| (key.as_str(), course))
            .ok_or_else(|| ConfigError::CourseNotFound(name.to_string()))
    }

    /// Get a lab of a course by name, ignoring case
    pub fn get_lab(&self, course: &str, lab: &str) -> Result<&Lab, ConfigError> {
        let (_, found) = self.get_course(course)?;
        found.get_lab(lab).ok_or_else(|| ConfigError::LabNotFound {
            course: course.to_string(),
            lab: lab.to_string(),
        })
    }

    /// Course names, sorted
    pub fn course_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.courses.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Directory for per-submission execution directories
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("labgrader"))
    }

    /// Number of grading workers, at least 1
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(usize::from)
                    .unwrap_or(1)
            })
            .max(1)
    }

    /// Sandbox profile to apply, if enabled
    pub fn sandbox_profile(&self) -> Option<&SandboxConfig> {
        self.sandbox.enabled.then_some(&self.sandbox)
    }

    /// Execution limits for a lab's runs
    pub fn limits_for(&self, lab: &Lab) -> ExecutionLimits {
        ExecutionLimits::for_lab(lab).with_max_output(self.max_output)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("courses")
}

fn default_compile_timeout() -> u64 {
    30
}

fn default_max_output() -> usize {
    ExecutionLimits::MIB
}
