use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Longest allowed lab name
pub const MAX_LAB_NAME_LEN: usize = 24;

/// Allowed lab runtime limits in seconds
pub const RUNTIME_LIMIT_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Which grading strategy a course's labs use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraderKind {
    /// Compile, feed each test case on stdin, diff stdout
    #[default]
    Stdout,

    /// Run the toolchain's test command once per submission
    Unittest,
}

impl std::fmt::Display for GraderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraderKind::Stdout => write!(f, "stdout"),
            GraderKind::Unittest => write!(f, "unittest"),
        }
    }
}

/// A course and its labs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Grader variant for every lab of this course
    #[serde(default)]
    pub grader: GraderKind,

    /// Toolchain id used to build and run submissions
    pub toolchain: String,

    #[serde(default)]
    pub labs: Vec<Lab>,
}

impl Course {
    /// Find a lab by name, ignoring case
    pub fn get_lab(&self, name: &str) -> Option<&Lab> {
        self.labs
            .iter()
            .find(|lab| lab.name.eq_ignore_ascii_case(name))
    }

    /// Names of the course's labs in declaration order
    pub fn lab_names(&self) -> Vec<&str> {
        self.labs.iter().map(|lab| lab.name.as_str()).collect()
    }

    pub(crate) fn validate(&self, course: &str) -> Result<(), ConfigError> {
        let mut seen: Vec<String> = Vec::with_capacity(self.labs.len());
        for lab in &self.labs {
            lab.validate()?;
            let lowered = lab.name.to_lowercase();
            if seen.contains(&lowered) {
                return Err(ConfigError::Invalid(format!(
                    "course '{course}' has more than one lab named '{}'",
                    lab.name
                )));
            }
            seen.push(lowered);
        }
        Ok(())
    }
}

/// A gradable assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lab {
    pub name: String,

    /// Run submissions without network access
    #[serde(default)]
    pub disable_internet: bool,

    /// Wall clock limit per test case in seconds
    #[serde(default = "default_runtime_limit")]
    pub runtime_limit: u8,

    /// Test case ids shown to students, in display order
    #[serde(default)]
    pub public_test_cases: Vec<String>,
}

impl Lab {
    /// Check name length and runtime limit bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.chars().count() > MAX_LAB_NAME_LEN {
            return Err(ConfigError::InvalidLab {
                lab: self.name.clone(),
                reason: format!("name must have between 1 and {MAX_LAB_NAME_LEN} characters"),
            });
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(ConfigError::InvalidLab {
                lab: self.name.clone(),
                reason: "name must not contain path separators".to_owned(),
            });
        }
        if !RUNTIME_LIMIT_RANGE.contains(&self.runtime_limit) {
            return Err(ConfigError::InvalidLab {
                lab: self.name.clone(),
                reason: format!(
                    "runtime_limit must be between {} and {} seconds",
                    RUNTIME_LIMIT_RANGE.start(),
                    RUNTIME_LIMIT_RANGE.end()
                ),
            });
        }
        Ok(())
    }
}

fn default_runtime_limit() -> u8 {
    2
}
