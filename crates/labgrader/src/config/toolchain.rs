use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Default PATH for compiler and program runs
pub const DEFAULT_SANDBOX_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Configuration for building and running one kind of submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolchain {
    /// Human-readable name (e.g., "C (GCC)")
    pub name: String,

    /// Extension of the submission's source files
    pub extension: FileExtension,

    /// Build step (None for interpreted submissions)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Run step
    pub run: RunConfig,
}

/// Values substituted into toolchain commands
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    /// Source files, relative to the execution directory, sorted
    pub sources: &'a [String],

    /// Absolute path of the built artifact (or the entry source when interpreted)
    pub binary: &'a Path,

    /// Absolute path of the execution directory
    pub workdir: &'a Path,
}

impl Toolchain {
    /// Check if submissions must be built before running
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Check whether a staged file is a source file for this toolchain
    pub fn is_source(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext.to_string_lossy() == self.extension.as_str())
    }

    /// Expand placeholders in the given command
    ///
    /// An argument that is exactly `{sources}` expands to one argument per
    /// source file; elsewhere `{sources}` joins them with spaces. `{source}`
    /// is the first source, `{output}` and `{binary}` the artifact path,
    /// `{workdir}` the execution directory.
    pub fn expand_command(command: &[String], placeholders: &Placeholders<'_>) -> Vec<String> {
        let binary = placeholders.binary.to_string_lossy();
        let workdir = placeholders.workdir.to_string_lossy();
        let first = placeholders
            .sources
            .first()
            .map(String::as_str)
            .unwrap_or_default();
        let joined = placeholders.sources.join(" ");

        let mut expanded = Vec::with_capacity(command.len() + placeholders.sources.len());
        for arg in command {
            if arg == "{sources}" {
                expanded.extend(placeholders.sources.iter().cloned());
                continue;
            }
            expanded.push(
                arg.replace("{sources}", &joined)
                    .replace("{source}", first)
                    .replace("{output}", &binary)
                    .replace("{binary}", &binary)
                    .replace("{workdir}", &workdir),
            );
        }
        expanded
    }
}

/// File extension without dot (e.g., "c")
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the build step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {sources}, {source}, {output}, {workdir}
    pub command: Vec<String>,

    /// Artifact file name inside the execution directory (e.g., "a.out")
    #[serde(default = "default_output_name")]
    pub output_name: String,

    /// Environment variables to set during the build
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// PATH for the build
    #[serde(default = "default_sandbox_path")]
    pub path: String,
}

/// Configuration for the run step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    /// Placeholders: {binary}, {source}, {sources}, {workdir}
    pub command: Vec<String>,

    /// Environment variables to set
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// PATH for the program
    ///
    /// Defaults to "/usr/local/bin:/usr/bin:/bin" if not specified.
    #[serde(default = "default_sandbox_path")]
    pub path: String,
}

fn default_output_name() -> String {
    "a.out".to_owned()
}

fn default_sandbox_path() -> String {
    DEFAULT_SANDBOX_PATH.to_owned()
}
