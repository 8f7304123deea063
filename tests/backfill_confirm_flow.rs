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

fn create_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    code: &str,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        id,
        "catalog.upsertCourse",
        json!({
            "code": code,
            "name": format!("Course {}", code),
            "credits": 4,
            "semester": "2026-1"
        }),
    );
    result
        .get("course")
        .and_then(|c| c.get("id"))
        .and_then(|v| v.as_str())
        .expect("course id")
        .to_string()
}

#[test]
fn confirmed_backfill_unblocks_the_original_validation() {
    let workspace = temp_dir("acadhist-backfill-flow");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let fis101 = create_course(&mut stdin, &mut reader, "2", "FIS-101");
    let mat101 = create_course(&mut stdin, &mut reader, "3", "MAT-101");
    let fis202 = create_course(&mut stdin, &mut reader, "4", "FIS-202");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "catalog.setPrerequisites",
        json!({ "courseId": fis202.clone(), "prerequisiteIds": [fis101.clone(), mat101.clone()] }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "records.upsert",
        json!({ "studentId": "stu-1", "courseId": fis101, "status": "passed", "grade": 13.0 }),
    );

    let check = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "validation.check",
        json!({ "studentId": "stu-1", "courseId": fis202.clone(), "proposedStatus": "passed" }),
    );
    assert_eq!(check.get("valid").and_then(|v| v.as_bool()), Some(false));
    let suggestions = check.get("suggestions").cloned().expect("suggestions");

    // The user confirms; the UI replays the suggestions verbatim.
    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "backfill.apply",
        json!({ "studentId": "stu-1", "suggestions": suggestions }),
    );
    assert_eq!(applied.get("applied").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(applied.get("failed").and_then(|v| v.as_i64()), Some(0));
    let outcome = &applied.get("outcomes").and_then(|v| v.as_array()).expect("outcomes")[0];
    let record = outcome.get("record").expect("record");
    assert_eq!(
        record.get("courseId").and_then(|v| v.as_str()),
        Some(mat101.as_str())
    );
    assert_eq!(record.get("status").and_then(|v| v.as_str()), Some("passed"));
    assert_eq!(record.get("grade").and_then(|v| v.as_f64()), Some(16.0));
    assert_eq!(
        record.get("autoGenerated").and_then(|v| v.as_bool()),
        Some(true)
    );

    let recheck = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "validation.check",
        json!({ "studentId": "stu-1", "courseId": fis202, "proposedStatus": "passed" }),
    );
    assert_eq!(recheck.get("valid").and_then(|v| v.as_bool()), Some(true));
}

#[test]
fn reapplying_the_same_suggestion_updates_instead_of_duplicating() {
    let workspace = temp_dir("acadhist-backfill-idempotent");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let mat101 = create_course(&mut stdin, &mut reader, "2", "MAT-101");

    let suggestions = json!([{ "courseId": mat101 }]);
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "backfill.apply",
        json!({ "studentId": "stu-1", "suggestions": suggestions.clone() }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backfill.apply",
        json!({ "studentId": "stu-1", "suggestions": suggestions }),
    );

    let first_id = first["outcomes"][0]["record"]["id"].as_str().expect("id");
    let second_id = second["outcomes"][0]["record"]["id"].as_str().expect("id");
    assert_eq!(first_id, second_id);

    let records = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "records.list",
        json!({ "studentId": "stu-1" }),
    );
    assert_eq!(
        records.get("records").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );
}
