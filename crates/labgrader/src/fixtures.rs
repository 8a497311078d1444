//! Test case fixtures
//!
//! A lab's test cases are file pairs `{id}_in` / `{id}_out` in its
//! `test_cases` directory. The id is the file name up to the first `_`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::layout::{INPUT_SUFFIX, OUTPUT_SUFFIX};
use crate::types::TestCase;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("test case '{id}' has no expected output file {}", path.display())]
    MissingOutput { id: String, path: PathBuf },

    #[error("test case '{0}' does not exist")]
    UnknownTestCase(String),

    #[error("lab has no public test cases")]
    NoPublicTestCases,

    #[error("failed to read fixtures at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Order test case ids: numeric ids numerically first, then the rest lexicographically
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Load a lab's test cases
///
/// Without a subset every test case is returned in natural id order. With a
/// subset only those ids are returned, in the subset's order; an empty
/// subset is an error.
#[instrument(skip(subset), fields(subset = ?subset.map(<[String]>::len)))]
pub async fn load_test_cases(
    test_cases_dir: &Path,
    subset: Option<&[String]>,
) -> Result<Vec<TestCase>, FixtureError> {
    if subset.is_some_and(<[String]>::is_empty) {
        return Err(FixtureError::NoPublicTestCases);
    }

    // id -> input file name
    let mut inputs: BTreeMap<String, String> = BTreeMap::new();
    let mut entries = tokio::fs::read_dir(test_cases_dir)
        .await
        .map_err(io_error(test_cases_dir))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io_error(test_cases_dir))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(INPUT_SUFFIX) {
            continue;
        }
        let Some((id, _)) = name.split_once('_') else {
            continue;
        };
        if id.is_empty() {
            continue;
        }
        match inputs.get(id) {
            Some(existing) if existing.as_str() <= name.as_str() => {
                warn!(id, file = %name, kept = %existing, "duplicate test case input ignored");
            }
            _ => {
                inputs.insert(id.to_string(), name);
            }
        }
    }

    let mut ids: Vec<&String> = inputs.keys().collect();
    ids.sort_by(|a, b| natural_cmp(a, b));

    let mut test_cases = Vec::with_capacity(ids.len());
    for id in ids {
        let input_path = test_cases_dir.join(&inputs[id]);
        let output_path = test_cases_dir.join(format!("{id}{OUTPUT_SUFFIX}"));
        if !tokio::fs::try_exists(&output_path)
            .await
            .map_err(io_error(&output_path))?
        {
            return Err(FixtureError::MissingOutput {
                id: id.clone(),
                path: output_path,
            });
        }

        let input = tokio::fs::read(&input_path)
            .await
            .map_err(io_error(&input_path))?;
        let expected = tokio::fs::read(&output_path)
            .await
            .map_err(io_error(&output_path))?;
        test_cases.push(TestCase {
            id: id.clone(),
            input: String::from_utf8_lossy(&input).into_owned(),
            expected: String::from_utf8_lossy(&expected).into_owned(),
        });
    }

    let test_cases = match subset {
        None => test_cases,
        Some(ids) => select(test_cases, ids)?,
    };

    debug!(count = test_cases.len(), "test cases loaded");
    Ok(test_cases)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FixtureError + '_ {
    move |source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Pick `ids` out of `all`, in the order of `ids`
fn select(all: Vec<TestCase>, ids: &[String]) -> Result<Vec<TestCase>, FixtureError> {
    let mut by_id: BTreeMap<String, TestCase> =
        all.into_iter().map(|tc| (tc.id.clone(), tc)).collect();
    let mut selected = Vec::with_capacity(ids.len());
    for id in ids {
        match by_id.remove(id) {
            Some(tc) => selected.push(tc),
            None if selected.iter().any(|tc: &TestCase| &tc.id == id) => {
                debug!(id, "public test case listed twice");
            }
            None => return Err(FixtureError::UnknownTestCase(id.clone())),
        }
    }
    Ok(selected)
}
