use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_acadhistd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn acadhistd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn mixed_batch_reports_per_item_outcomes_and_commits_good_items() {
    let workspace = temp_dir("acadhist-backfill-partial");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "catalog.upsertCourse",
        json!({ "code": "MAT-101", "name": "Mathematics I", "credits": 4, "semester": "2026-1" }),
    )["course"]["id"]
        .as_str()
        .expect("course id")
        .to_string();

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "backfill.apply",
        json!({
            "studentId": "stu-1",
            "suggestions": [
                { "courseId": course.clone() },
                { "courseId": "no-such-course" },
                { "courseId": course, "grade": 99.0 }
            ]
        }),
    );
    assert_eq!(applied.get("applied").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(applied.get("failed").and_then(|v| v.as_i64()), Some(2));

    let outcomes = applied.get("outcomes").and_then(|v| v.as_array()).expect("outcomes");
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].get("ok").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(outcomes[1].get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        outcomes[1].get("errorCode").and_then(|v| v.as_str()),
        Some("unknown_course")
    );
    assert_eq!(outcomes[2].get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        outcomes[2].get("errorCode").and_then(|v| v.as_str()),
        Some("invalid_input")
    );

    // Only the good item landed; the failed duplicate did not clobber it.
    let records = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "records.list",
        json!({ "studentId": "stu-1" }),
    );
    let rows = records.get("records").and_then(|v| v.as_array()).expect("records");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("grade").and_then(|v| v.as_f64()), Some(16.0));
}

#[test]
fn retrying_only_the_failed_item_succeeds_after_the_cause_is_fixed() {
    let workspace = temp_dir("acadhist-backfill-retry");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backfill.apply",
        json!({ "studentId": "stu-1", "suggestions": [{ "courseId": "later" }] }),
    );
    assert_eq!(applied.get("failed").and_then(|v| v.as_i64()), Some(1));

    // The missing course shows up in the catalog afterwards.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "catalog.upsertCourse",
        json!({
            "id": "later",
            "code": "QUI-101",
            "name": "Chemistry I",
            "credits": 3,
            "semester": "2026-1"
        }),
    );

    let retried = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backfill.apply",
        json!({ "studentId": "stu-1", "suggestions": [{ "courseId": "later" }] }),
    );
    assert_eq!(retried.get("applied").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(retried.get("failed").and_then(|v| v.as_i64()), Some(0));
}
