//! Staging uploads across sessions and threads.

use efw_upload::{SessionFiles, UploadPart, UploadStaging};
use std::fs;
use std::sync::Arc;

fn file_part(name: &str, data: &str) -> UploadPart {
    UploadPart::new(format!(r#"form-data; name="file"; filename="{name}""#), data.to_string())
}

#[test]
fn test_stage_returns_empty_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(SessionFiles::new());
    let staging = UploadStaging::new(files.clone()).with_dir(dir.path());

    let reply = staging
        .stage("session-1", &[file_part("report.csv", "a,b\n1,2\n")])
        .unwrap();
    assert_eq!(reply, "[]");

    let path = files.get("session-1", "report.csv").unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "a,b\n1,2\n");
}

#[test]
fn test_sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(SessionFiles::new());
    let staging = UploadStaging::new(files.clone()).with_dir(dir.path());

    staging.stage("alice", &[file_part("data.txt", "alice")]).unwrap();
    staging.stage("bob", &[file_part("data.txt", "bob")]).unwrap();

    let alice = files.get("alice", "data.txt").unwrap();
    let bob = files.get("bob", "data.txt").unwrap();
    assert_ne!(alice, bob);
    assert_eq!(fs::read_to_string(&alice).unwrap(), "alice");

    assert_eq!(files.clear_session("alice"), 1);
    assert!(!alice.exists());
    assert!(bob.exists());
}

#[test]
fn test_taken_file_survives_clear() {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(SessionFiles::new());
    let staging = UploadStaging::new(files.clone()).with_dir(dir.path());

    staging
        .stage("s", &[file_part("keep.txt", "k"), file_part("drop.txt", "d")])
        .unwrap();
    let kept = files.take("s", "keep.txt").unwrap();
    let dropped = files.get("s", "drop.txt").unwrap();

    files.clear_session("s");
    assert!(kept.exists());
    assert!(!dropped.exists());
}

#[test]
fn test_concurrent_staging() {
    let dir = tempfile::tempdir().unwrap();
    let files = Arc::new(SessionFiles::new());
    let staging = UploadStaging::new(files.clone()).with_dir(dir.path());

    std::thread::scope(|s| {
        for worker in 0..8 {
            let staging = &staging;
            s.spawn(move || {
                let session = format!("session-{worker}");
                staging
                    .stage(&session, &[file_part("upload.bin", &session)])
                    .unwrap();
            });
        }
    });

    assert_eq!(files.session_count(), 8);
    for worker in 0..8 {
        let session = format!("session-{worker}");
        let path = files.get(&session, "upload.bin").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), session);
    }
}
