use labgrader::fixtures::FixtureError;
use labgrader::types::{CRASH_OUTPUT, TIMEOUT_OUTPUT};
use labgrader::{GradeError, Grader, GradingMode, RunOptions};
use tokio_util::sync::CancellationToken;

use super::{ECHO, Workspace};

fn full() -> RunOptions {
    RunOptions::default()
}

#[tokio::test]
async fn test_echo_passes_matching_case() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .expect("grading failed");

    assert_eq!(run.results.len(), 1);
    let result = &run.results[0];
    assert_eq!(result.passed, vec!["1"]);
    assert!(result.failed.is_empty());
    assert_eq!(result.grade, 100.0);
    assert_eq!(ws.leftover_work_dirs(), 0);
}

#[tokio::test]
async fn test_newline_difference_is_a_mismatch() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "Hello\nWorld\n", "HelloWorld\n");
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();

    let result = &run.results[0];
    assert_eq!(result.grade, 0.0);
    assert_eq!(result.failed.len(), 1);
    let failed = &result.failed[0];
    assert_eq!(failed.output, "Hello\nWorld\n");
    assert_eq!(failed.expected, "HelloWorld\n");
    assert_eq!(
        failed.diagnostic,
        "--- output\n+++ expected\n@@ -1,2 +1 @@\n-Hello\n-World\n+HelloWorld\n"
    );
}

#[tokio::test]
async fn test_trailing_whitespace_is_not_normalized() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5 \n", "5\n");
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.results[0].grade, 0.0);
}

#[tokio::test]
async fn test_compile_failure_fails_every_case() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_test_case("cs101", "lab1", "2", "6\n", "6\n");
    let dir = ws.add_submission(
        "cs101",
        "lab1",
        None,
        "bob",
        &[("main.sh", "#!/bin/sh\ntouch ran\nif then\n")],
    );

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();

    let result = &run.results[0];
    assert_eq!(result.grade, 0.0);
    assert!(result.passed.is_empty());
    assert_eq!(result.failed.len(), 2);
    assert!(result.compile_error.is_some());
    assert!(result.failed.iter().all(|f| f.output == CRASH_OUTPUT));
    assert!(!dir.join("ran").exists());
}

#[tokio::test]
async fn test_submission_without_sources_fails_to_build() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission("cs101", "lab1", None, "carol", &[("notes.txt", "todo")]);

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();

    let result = &run.results[0];
    assert_eq!(result.compile_error.as_deref(), Some("no .sh source files found"));
    assert_eq!(result.total(), 1);
}

#[tokio::test]
async fn test_crash_records_sentinel_output() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission(
        "cs101",
        "lab1",
        None,
        "dave",
        &[("main.sh", "#!/bin/sh\necho partial\nexit 3\n")],
    );

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();

    let failed = &run.results[0].failed[0];
    assert_eq!(failed.output, CRASH_OUTPUT);
    assert!(failed.diagnostic.starts_with("program exited with code 3"));
}

#[tokio::test]
async fn test_timeout_kills_forked_processes() {
    let ws = Workspace::new();
    let marker = ws.path().join("still_running");
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    let script = format!(
        "#!/bin/sh\ncat >/dev/null\n(sleep 3; echo alive > '{}')\n",
        marker.display()
    );
    ws.add_submission("cs101", "lab1", None, "frank", &[("main.sh", script.as_str())]);

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.results[0].failed[0].output, TIMEOUT_OUTPUT);

    tokio::time::sleep(std::time::Duration::from_secs(4)).await;
    assert!(!marker.exists());
    assert_eq!(ws.leftover_work_dirs(), 0);
}

#[tokio::test]
async fn test_sleeping_program_times_out() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission(
        "cs101",
        "lab1",
        None,
        "erin",
        &[("main.sh", "#!/bin/sh\ncat\nexec sleep 5\n")],
    );

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();

    let result = &run.results[0];
    assert!(result.passed.is_empty());
    assert_eq!(result.failed[0].output, TIMEOUT_OUTPUT);
    assert_eq!(result.failed[0].diagnostic, "program timed out after 1 seconds");
}

#[tokio::test]
async fn test_cohort_pass_percentage() {
    let ws = Workspace::new();
    for id in 1..=5 {
        let value = format!("{id}\n");
        ws.add_test_case("cs101", "lab1", &id.to_string(), &value, &value);
    }
    ws.add_submission("cs101", "lab1", None, "s1", &[("main.sh", ECHO)]);
    ws.add_submission("cs101", "lab1", None, "s2", &[("main.sh", ECHO)]);
    ws.add_submission(
        "cs101",
        "lab1",
        None,
        "s3",
        &[(
            "main.sh",
            "#!/bin/sh\nread x\nif [ \"$x\" -le 2 ]; then echo \"$x\"; else echo wrong; fi\n",
        )],
    );
    ws.add_submission("cs101", "lab1", None, "s4", &[("main.sh", "#!/bin/sh\necho nope\n")]);

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();

    let grades: Vec<f64> = run.results.iter().map(|r| r.grade).collect();
    assert_eq!(grades, vec![100.0, 100.0, 40.0, 0.0]);
    assert_eq!(run.summary.pass_percentage, 50.0);

    let rates: Vec<f64> = run
        .summary
        .test_case_pass_rates
        .iter()
        .map(|r| r.pass_percentage)
        .collect();
    assert_eq!(rates, vec![75.0, 75.0, 50.0, 50.0, 50.0]);
}

#[tokio::test]
async fn test_student_mode_uses_public_cases_only() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_test_case("cs101", "lab1", "2", "6\n", "6\n");
    ws.add_test_case("cs101", "lab1", "3", "7\n", "7\n");
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);

    let options = RunOptions {
        mode: GradingMode::Student,
        ..RunOptions::default()
    };
    let run = ws
        .grader("cs101")
        .run_grader("lab1", &options, &CancellationToken::new())
        .await
        .unwrap();

    let result = &run.results[0];
    assert_eq!(result.passed, vec!["2"]);
    assert_eq!(result.total(), 1);
}

#[tokio::test]
async fn test_student_mode_without_public_cases_is_rejected() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab2", "1", "5\n", "5\n");
    ws.add_submission("cs101", "lab2", None, "alice", &[("main.sh", ECHO)]);

    let options = RunOptions {
        mode: GradingMode::Student,
        ..RunOptions::default()
    };
    let err = ws
        .grader("cs101")
        .run_grader("lab2", &options, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GradeError::Fixture(FixtureError::NoPublicTestCases)
    ));
}

#[tokio::test]
async fn test_missing_expected_output_aborts_the_run() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    let dir = ws.lab("cs101", "lab1").test_cases_dir();
    std::fs::write(dir.join("2_in"), "6\n").unwrap();
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);

    let err = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GradeError::Fixture(FixtureError::MissingOutput { .. })
    ));
    let reports = ws.lab("cs101", "lab1").reports(ws.lab("cs101", "lab1").submissions_dir());
    assert!(!reports.summary().exists());
}

#[tokio::test]
async fn test_worker_count_does_not_change_results() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "1\n", "1\n");
    ws.add_test_case("cs101", "lab1", "2", "2\n", "2\n");
    for i in 0..5 {
        let script = if i % 2 == 0 {
            ECHO
        } else {
            "#!/bin/sh\necho 1\n"
        };
        ws.add_submission("cs101", "lab1", None, &format!("s{i}"), &[("main.sh", script)]);
    }
    let grader = ws.grader("cs101");

    let sequential = grader
        .run_grader(
            "lab1",
            &RunOptions {
                workers: Some(1),
                ..RunOptions::default()
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let parallel = grader
        .run_grader(
            "lab1",
            &RunOptions {
                workers: Some(3),
                ..RunOptions::default()
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(sequential.summary, parallel.summary);
    assert_eq!(sequential.results, parallel.results);
}

#[tokio::test]
async fn test_cancelled_run_writes_no_reports() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, GradeError::Cancelled { graded: 0, total: 1 }));
    let lab = ws.lab("cs101", "lab1");
    assert!(!lab.reports(lab.submissions_dir()).summary().exists());
}

#[tokio::test]
async fn test_batches_are_graded_separately() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission("cs101", "lab1", Some("b1"), "alice", &[("main.sh", ECHO)]);
    ws.add_submission("cs101", "lab1", Some("b2"), "bob", &[("main.sh", ECHO)]);
    ws.add_submission("cs101", "lab1", Some("b2"), "carol", &[("main.sh", ECHO)]);

    let options = RunOptions {
        batch: Some("b2".to_owned()),
        ..RunOptions::default()
    };
    let run = ws
        .grader("cs101")
        .run_grader("lab1", &options, &CancellationToken::new())
        .await
        .unwrap();

    let ids: Vec<&str> = run.results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["bob", "carol"]);
    let lab = ws.lab("cs101", "lab1");
    let b2 = lab.batch_dir(Some("b2")).unwrap();
    assert!(lab.reports(&b2).summary().exists());
    let b1 = lab.batch_dir(Some("b1")).unwrap();
    assert!(!lab.reports(&b1).summary().exists());
}

#[tokio::test]
async fn test_empty_lab_grades_nothing() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");

    let run = ws
        .grader("cs101")
        .run_grader("lab1", &full(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(run.results.is_empty());
    assert_eq!(run.summary.pass_percentage, 0.0);
}
