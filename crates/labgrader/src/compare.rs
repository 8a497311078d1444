//! Output comparison
//!
//! Equality is exact: no whitespace normalization of any kind. Mismatches
//! carry a unified diff from the program's output to the expected output.

use std::fmt::Write as _;

use crate::types::{ExecutionLimits, ExecutionOutcome, RawExecution, TestCase, Verdict};

/// Lines of context around each changed region
const CONTEXT: usize = 3;

/// Largest LCS table computed before falling back to a whole-block replace
const MAX_LCS_CELLS: usize = 4_000_000;

const NO_NEWLINE: &str = "\\ No newline at end of file\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Passed,

    /// Unified diff from actual to expected
    Mismatch(String),
}

/// Compare a program's output against the expected output
pub fn compare(actual: &str, expected: &str) -> Comparison {
    if actual == expected {
        Comparison::Passed
    } else {
        Comparison::Mismatch(unified_diff(actual, expected))
    }
}

/// Classify one run of a test case
///
/// Timeouts and crashes are never diffed: their partial output is not
/// comparable.
pub fn judge(test_case: &TestCase, raw: &RawExecution, limits: &ExecutionLimits) -> ExecutionOutcome {
    let verdict = if raw.timed_out {
        Verdict::FailedTimeout {
            timeout_seconds: limits.timeout_seconds,
        }
    } else if !raw.is_success() {
        Verdict::FailedCrash {
            exit_code: raw.exit_code,
            signal: raw.signal,
            stderr: raw.stderr.clone(),
        }
    } else {
        match compare(&raw.stdout, &test_case.expected) {
            Comparison::Passed => Verdict::Passed,
            Comparison::Mismatch(diff) => Verdict::FailedMismatch {
                output: raw.stdout.clone(),
                diff,
            },
        }
    };

    ExecutionOutcome {
        test_case_id: test_case.id.clone(),
        expected: test_case.expected.clone(),
        verdict,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Keep,
    Remove,
    Add,
}

/// One line of the edit script with its position in both inputs
#[derive(Debug, Clone, Copy)]
struct Edit {
    tag: Tag,
    old: usize,
    new: usize,
}

/// Render a unified diff with `output` and `expected` headers
pub fn unified_diff(actual: &str, expected: &str) -> String {
    let old: Vec<&str> = actual.split_inclusive('\n').collect();
    let new: Vec<&str> = expected.split_inclusive('\n').collect();
    let edits = edit_script(&old, &new);

    let mut out = String::from("--- output\n+++ expected\n");
    for (start, end) in hunks(&edits) {
        let hunk = &edits[start..end];
        let old_len = hunk.iter().filter(|e| e.tag != Tag::Add).count();
        let new_len = hunk.iter().filter(|e| e.tag != Tag::Remove).count();
        let _ = writeln!(
            out,
            "@@ -{} +{} @@",
            range(hunk[0].old, old_len),
            range(hunk[0].new, new_len)
        );

        for edit in hunk {
            let (marker, line) = match edit.tag {
                Tag::Keep => (' ', old[edit.old]),
                Tag::Remove => ('-', old[edit.old]),
                Tag::Add => ('+', new[edit.new]),
            };
            out.push(marker);
            out.push_str(line);
            if !line.ends_with('\n') {
                out.push('\n');
                out.push_str(NO_NEWLINE);
            }
        }
    }
    out
}

/// Hunk range in unified format: 1-based start, count omitted when 1
fn range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{len}", start + 1),
    }
}

/// Group changed edits with their context into `[start, end)` ranges
fn hunks(edits: &[Edit]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (k, edit) in edits.iter().enumerate() {
        if edit.tag == Tag::Keep {
            continue;
        }
        let lo = k.saturating_sub(CONTEXT);
        let hi = (k + 1 + CONTEXT).min(edits.len());
        match ranges.last_mut() {
            Some(last) if lo <= last.1 => last.1 = hi,
            _ => ranges.push((lo, hi)),
        }
    }
    ranges
}

/// Line edit script turning `old` into `new`
///
/// Common prefix and suffix are matched directly; the middle uses a longest
/// common subsequence table, or a plain replace when the table would be too
/// large.
fn edit_script(old: &[&str], new: &[&str]) -> Vec<Edit> {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    let mut edits = Vec::with_capacity(old.len() + new.len());
    for i in 0..prefix {
        edits.push(Edit {
            tag: Tag::Keep,
            old: i,
            new: i,
        });
    }

    let (mut i, mut j) = (0, 0);
    if let Some(table) = lcs_table(old_mid, new_mid) {
        let width = new_mid.len() + 1;
        while i < old_mid.len() && j < new_mid.len() {
            if old_mid[i] == new_mid[j] {
                edits.push(Edit {
                    tag: Tag::Keep,
                    old: prefix + i,
                    new: prefix + j,
                });
                i += 1;
                j += 1;
            } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
                edits.push(Edit {
                    tag: Tag::Remove,
                    old: prefix + i,
                    new: prefix + j,
                });
                i += 1;
            } else {
                edits.push(Edit {
                    tag: Tag::Add,
                    old: prefix + i,
                    new: prefix + j,
                });
                j += 1;
            }
        }
    }
    for i in i..old_mid.len() {
        edits.push(Edit {
            tag: Tag::Remove,
            old: prefix + i,
            new: prefix + j,
        });
    }
    let old_end = prefix + old_mid.len();
    for j in j..new_mid.len() {
        edits.push(Edit {
            tag: Tag::Add,
            old: old_end,
            new: prefix + j,
        });
    }

    for k in 0..suffix {
        edits.push(Edit {
            tag: Tag::Keep,
            old: old_end + k,
            new: prefix + new_mid.len() + k,
        });
    }
    edits
}

/// Suffix LCS lengths: `table[i * (m + 1) + j]` is the LCS of `a[i..]` and `b[j..]`
fn lcs_table(a: &[&str], b: &[&str]) -> Option<Vec<u32>> {
    let (n, m) = (a.len(), b.len());
    if n.saturating_mul(m) > MAX_LCS_CELLS {
        return None;
    }
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }
    Some(table)
}
