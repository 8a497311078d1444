//! Command builder for sandboxed runs
//!
//! Prepends the configured restricted-execution wrapper to a program's argv.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{DEFAULT_SANDBOX_PATH, SandboxConfig};

/// Builder for a (possibly wrapped) process invocation
#[derive(Debug, Clone)]
pub struct SandboxCommand {
    /// Program and arguments
    command: Vec<String>,
    /// Wrapper argv with `{profile}` already expanded
    wrapper: Vec<String>,
    /// Wrapper arguments that cut network access
    network_off: Vec<String>,
    network_disabled: bool,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    /// PATH handed to the process
    path: String,
}

impl SandboxCommand {
    /// Create a command running `command` without a wrapper
    pub fn new(command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            wrapper: Vec::new(),
            network_off: Vec::new(),
            network_disabled: false,
            working_dir: None,
            env: BTreeMap::new(),
            path: DEFAULT_SANDBOX_PATH.to_string(),
        }
    }

    /// Wrap the command in a restricted-execution profile
    ///
    /// `None` leaves the command unwrapped.
    pub fn profile(mut self, sandbox: Option<&SandboxConfig>) -> Self {
        let Some(sandbox) = sandbox else {
            self.wrapper.clear();
            self.network_off.clear();
            return self;
        };

        let profile = sandbox
            .profile
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        self.wrapper = sandbox
            .wrapper
            .iter()
            .filter_map(|arg| match (&profile, arg.contains("{profile}")) {
                (_, false) => Some(arg.clone()),
                (Some(profile), true) => Some(arg.replace("{profile}", profile)),
                (None, true) => None,
            })
            .collect();
        self.network_off = sandbox.network_off.clone();
        self
    }

    /// Cut network access through the profile's network-off arguments
    pub fn network_disabled(mut self, disabled: bool) -> Self {
        self.network_disabled = disabled;
        self
    }

    /// Set the working directory of the process
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables
    pub fn envs<'a>(mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Set the PATH of the process
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Check whether the command runs inside a wrapper
    pub fn is_wrapped(&self) -> bool {
        !self.wrapper.is_empty()
    }

    /// Build the full argv: wrapper, network-off arguments, then the program
    pub fn build(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(
            self.wrapper.len() + self.network_off.len() + self.command.len(),
        );

        if self.is_wrapped() {
            args.extend(self.wrapper.iter().cloned());
            if self.network_disabled {
                args.extend(self.network_off.iter().cloned());
            }
        }

        args.extend(self.command.iter().cloned());
        args
    }

    pub fn working_dir_path(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn search_path(&self) -> &str {
        &self.path
    }
}
