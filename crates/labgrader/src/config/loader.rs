//! Configuration file loading for labgrader
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat, Map};

use crate::config::{Config, ConfigError};

/// Prefix of environment variables overriding file settings
/// (e.g. `LABGRADER_SANDBOX__ENABLED=true`).
const ENV_PREFIX: &str = "LABGRADER";

impl Config {
    /// Load configuration from a file, overlaid with `LABGRADER_*` environment variables
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load(path.as_ref(), None)
    }

    /// Load configuration from a file, overlaid with an explicit set of
    /// `LABGRADER_*` variables instead of the process environment
    pub fn from_file_with_env<K, V>(
        path: impl AsRef<Path>,
        vars: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::load(path.as_ref(), Some(vars))
    }

    fn load(path: &Path, vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        for (id, toolchain) in &self.toolchains {
            if toolchain.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' has empty name"
                )));
            }
            if toolchain.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' has empty extension"
                )));
            }
            if toolchain.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "toolchain '{id}' has empty run command"
                )));
            }
            if let Some(ref compile) = toolchain.compile {
                if compile.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "toolchain '{id}' has empty compile command"
                    )));
                }
                if compile.output_name.is_empty() || compile.output_name.contains('/') {
                    return Err(ConfigError::Invalid(format!(
                        "toolchain '{id}' has an invalid output name"
                    )));
                }
            }
        }

        let mut seen: Vec<String> = Vec::with_capacity(self.courses.len());
        for (name, course) in &self.courses {
            let lowered = name.to_lowercase();
            if seen.contains(&lowered) {
                return Err(ConfigError::Invalid(format!(
                    "course name '{name}' is not unique"
                )));
            }
            seen.push(lowered);

            if !self.toolchains.contains_key(&course.toolchain) {
                return Err(ConfigError::Invalid(format!(
                    "course '{name}' uses unknown toolchain '{}'",
                    course.toolchain
                )));
            }
            course.validate(name)?;
        }

        if self.sandbox.enabled && self.sandbox.wrapper.is_empty() {
            return Err(ConfigError::Invalid(
                "sandbox is enabled but has no wrapper command".to_string(),
            ));
        }

        Ok(())
    }
}
