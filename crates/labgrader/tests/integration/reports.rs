use std::fs;

use labgrader::{Grader, RunOptions};
use tokio_util::sync::CancellationToken;

use super::{ECHO, Workspace};

fn setup() -> Workspace {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_test_case("cs101", "lab1", "2", "Hello\nWorld\n", "HelloWorld\n");
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);
    ws.add_submission(
        "cs101",
        "lab1",
        None,
        "bob",
        &[("main.sh", "#!/bin/sh\nexit 1\n")],
    );
    ws
}

#[tokio::test]
async fn test_reports_are_written_to_layout() {
    let ws = setup();
    let grader = ws.grader("cs101");
    grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let lab = ws.lab("cs101", "lab1");
    let reports = lab.reports(lab.submissions_dir());

    let alice = fs::read_to_string(reports.results("alice")).unwrap();
    assert!(alice.starts_with("* Total Grade: 50.0\n* Failed Test Cases:\n----------\ntest case id: 2\n"));

    let summary = fs::read_to_string(reports.summary()).unwrap();
    assert_eq!(
        summary,
        "* lab1 Result Summary\n--------------------\n* Pass Percentage: 0.0\nalice:50.0\nbob:0.0\n"
    );

    let files = grader.results_to_download("lab1", None).unwrap();
    assert_eq!(
        files,
        vec![
            reports.results("alice"),
            reports.results("bob"),
            reports.summary(),
            reports.diff_dump(),
            reports.chart(),
        ]
    );
}

#[tokio::test]
async fn test_rerun_produces_identical_reports() {
    let ws = setup();
    let grader = ws.grader("cs101");
    let lab = ws.lab("cs101", "lab1");
    let reports = lab.reports(lab.submissions_dir());

    let read_all = || -> Vec<Vec<u8>> {
        [
            reports.results("alice"),
            reports.results("bob"),
            reports.summary(),
            reports.diff_dump(),
            reports.chart(),
        ]
        .iter()
        .map(|path| fs::read(path).unwrap())
        .collect()
    };

    grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    let first = read_all();
    grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    let second = read_all();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_diff_and_chart_documents() {
    let ws = setup();
    let grader = ws.grader("cs101");
    grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let diff = grader.context().read_diff_dump("lab1", None).unwrap();
    let ids: Vec<&str> = diff.iter().map(|entry| entry.id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob"]);
    assert_eq!(diff[0].failed[0].tc_id, "2");
    assert_eq!(diff[0].failed[0].output, "Hello\nWorld\n");
    assert_eq!(diff[1].failed[0].output, "ERROR");

    let chart = grader.context().read_chart("lab1", None).unwrap();
    assert_eq!(chart.passed_tc.len(), 2);
    assert_eq!(chart.passed_tc[0].tc_id, "1");
    assert_eq!(chart.passed_tc[0].pass_percentage, 50.0);
    assert_eq!(chart.passed_tc[1].pass_percentage, 0.0);
    assert_eq!(chart.students_list[0].id, "alice");
    assert_eq!(chart.students_list[0].grade, 50.0);

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(
            ws.lab("cs101", "lab1")
                .reports(ws.lab("cs101", "lab1").submissions_dir())
                .chart(),
        )
        .unwrap())
        .unwrap();
    assert!(raw["passed_tc"][0].get("pass-percentage").is_some());
}

#[tokio::test]
async fn test_old_reports_are_not_graded_as_sources() {
    let ws = setup();
    let grader = ws.grader("cs101");
    grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let files = grader
        .get_submission_files("lab1", None, "alice")
        .await
        .unwrap();
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["main.sh"]);
}

#[tokio::test]
async fn test_results_archive_contains_every_report() {
    use std::io::Read as _;

    let ws = setup();
    let grader = ws.grader("cs101");
    grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let archive_path = grader.context().compress_results("lab1", None).unwrap();
    let lab = ws.lab("cs101", "lab1");
    assert_eq!(archive_path, lab.reports(lab.submissions_dir()).archive());

    let mut archive = zip::ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "alice/lab1_results.txt",
            "bob/lab1_results.txt",
            "lab1_chart_result.json",
            "lab1_diff_result.json",
            "lab1_result_summary.txt",
        ]
    );

    let mut alice = String::new();
    archive
        .by_name("alice/lab1_results.txt")
        .unwrap()
        .read_to_string(&mut alice)
        .unwrap();
    assert!(alice.starts_with("* Total Grade: 50.0\n"));
}
