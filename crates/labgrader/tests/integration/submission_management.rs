use std::fs;

use labgrader::submissions::SubmissionError;
use labgrader::{GradeError, Grader, RunOptions, SubmissionFile};
use tokio_util::sync::CancellationToken;

use super::{ECHO, Workspace};

#[tokio::test]
async fn test_add_submissions_replaces_batch() {
    let ws = Workspace::new();
    let grader = ws.grader("cs101");
    ws.add_submission("cs101", "lab1", Some("b1"), "stale", &[("main.sh", ECHO)]);

    let upload = ws.path().join("upload");
    fs::create_dir_all(upload.join("alice")).unwrap();
    fs::create_dir_all(upload.join("bob/lib")).unwrap();
    fs::write(upload.join("alice/main.sh"), ECHO).unwrap();
    fs::write(upload.join("bob/main.sh"), ECHO).unwrap();
    fs::write(upload.join("bob/lib/util.sh"), "").unwrap();

    let units = grader
        .add_submissions("lab1", Some("b1"), &upload)
        .await
        .unwrap();

    let ids: Vec<&str> = units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob"]);
    let batch = ws.lab("cs101", "lab1").batch_dir(Some("b1")).unwrap();
    assert!(!batch.join("stale").exists());
    assert!(batch.join("bob/lib/util.sh").is_file());
}

#[tokio::test]
async fn test_add_submissions_rejects_bad_batch_key() {
    let ws = Workspace::new();
    let upload = ws.path().join("upload");
    fs::create_dir_all(&upload).unwrap();

    let err = ws
        .grader("cs101")
        .add_submissions("lab1", Some("../escape"), &upload)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GradeError::Submission(SubmissionError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_edit_and_regrade() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission(
        "cs101",
        "lab1",
        None,
        "alice",
        &[("main.sh", "#!/bin/sh\necho 4\n")],
    );
    let grader = ws.grader("cs101");

    let run = grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.results[0].grade, 0.0);

    let files = grader
        .get_submission_files("lab1", None, "alice")
        .await
        .unwrap();
    assert_eq!(
        files,
        vec![SubmissionFile {
            name: "main.sh".to_owned(),
            content: "#!/bin/sh\necho 4\n".to_owned(),
        }]
    );

    grader
        .update_submission_files(
            "lab1",
            None,
            "alice",
            &[SubmissionFile {
                name: "main.sh".to_owned(),
                content: ECHO.to_owned(),
            }],
        )
        .await
        .unwrap();

    let run = grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.results[0].grade, 100.0);
}

#[tokio::test]
async fn test_update_rejects_traversal_and_unknown_submission() {
    let ws = Workspace::new();
    ws.add_submission("cs101", "lab1", None, "alice", &[("main.sh", ECHO)]);
    let grader = ws.grader("cs101");

    let escape = [SubmissionFile {
        name: "../evil.sh".to_owned(),
        content: String::new(),
    }];
    assert!(matches!(
        grader
            .update_submission_files("lab1", None, "alice", &escape)
            .await,
        Err(GradeError::Submission(SubmissionError::InvalidName(_)))
    ));

    assert!(matches!(
        grader.get_submission_files("lab1", None, "nobody").await,
        Err(GradeError::Submission(SubmissionError::NotFound(_)))
    ));
}

#[tokio::test]
async fn test_save_single_submission_then_grade() {
    let ws = Workspace::new();
    ws.add_test_case("cs101", "lab1", "1", "5\n", "5\n");
    ws.add_submission(
        "cs101",
        "lab1",
        None,
        "alice",
        &[("old.sh", "#!/bin/sh\necho 4\n")],
    );
    let grader = ws.grader("cs101");

    let unit = grader
        .context()
        .save_submission(
            "lab1",
            None,
            "alice",
            &[SubmissionFile {
                name: "main.sh".to_owned(),
                content: ECHO.to_owned(),
            }],
        )
        .await
        .unwrap();
    assert_eq!(unit.id, "alice");
    assert!(!unit.path.join("old.sh").exists());

    let run = grader
        .run_grader("lab1", &RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(run.results.len(), 1);
    assert_eq!(run.results[0].grade, 100.0);

    assert!(matches!(
        grader.context().save_submission("lab1", None, "../x", &[]).await,
        Err(GradeError::Submission(SubmissionError::InvalidName(_)))
    ));
}
