use std::fs;

use labgrader::grader::UNITTEST_CASE_ID;
use labgrader::{GraderKind, Grader, RunOptions};
use tokio_util::sync::CancellationToken;

use super::Workspace;

#[tokio::test]
async fn test_unittest_grader_uses_exit_status() {
    let ws = Workspace::new();
    ws.add_submission(
        "cs102",
        "lab1",
        None,
        "alice",
        &[("test_all.sh", "echo '2 passed'\nexit 0\n")],
    );
    ws.add_submission(
        "cs102",
        "lab1",
        None,
        "bob",
        &[("test_all.sh", "echo '1 failed'\nexit 1\n")],
    );

    let grader = ws.grader("cs102");
    assert_eq!(grader.kind(), GraderKind::Unittest);

    let run = grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.results[0].id, "alice");
    assert_eq!(run.results[0].passed, vec![UNITTEST_CASE_ID]);
    assert_eq!(run.results[0].grade, 100.0);

    assert_eq!(run.results[1].grade, 0.0);
    assert_eq!(run.results[1].failed[0].tc_id, UNITTEST_CASE_ID);
    assert_eq!(run.results[1].failed[0].output, "1 failed\n");
    assert_eq!(run.summary.pass_percentage, 50.0);

    let lab = ws.lab("cs102", "lab1");
    let reports = lab.reports(lab.submissions_dir());
    let text = fs::read_to_string(reports.results("bob")).unwrap();
    assert!(text.contains("test case id: unittest\ndifference: 1 failed\n"));
}

#[tokio::test]
async fn test_unittest_grader_times_out() {
    let ws = Workspace::new();
    ws.add_submission(
        "cs102",
        "lab1",
        None,
        "carol",
        &[("test_all.sh", "exec sleep 5\n")],
    );

    let run = ws
        .grader("cs102")
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.results[0].failed[0].output, "TIMEOUT");
}
