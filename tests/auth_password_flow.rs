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

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_studiod");
    let mut child = Command::new(exe)
        .env("STUDIOD_ADMIN_SECRET", "test-secret")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn studiod");
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
    let payload = json!({ "id": id, "method": method, "params": params });
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

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert!(
        !value.get("ok").and_then(|v| v.as_bool()).unwrap_or(true),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value["error"]["code"].as_str().expect("error code").to_string()
}

#[test]
fn login_password_change_and_delete_flow() {
    let workspace = temp_dir("studiod-auth-flow");
    let (_child, mut stdin, mut reader) = spawn_daemon();

    // Data methods are dead until a store is opened.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "auth.login",
        json!({ "name": "Kim", "password": "1234" }),
    );
    assert_eq!(code, "store_unavailable");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "store.open",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "auth.admin",
        json!({ "secret": "nope" }),
    );
    assert_eq!(code, "wrong_password");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.admin",
        json!({ "secret": "test-secret" }),
    );

    let reg = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.register",
        json!({ "name": "Kim", "phone": "010-1234-5678" }),
    );
    let student_id = reg["studentId"].as_str().expect("studentId").to_string();

    let _ = request_ok(&mut stdin, &mut reader, "6", "auth.logout", json!({}));

    // Default password is the last four characters of the phone, hyphens
    // stripped.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "auth.login",
        json!({ "name": "Kim", "password": "0000" }),
    );
    assert_eq!(code, "wrong_password");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "auth.login",
        json!({ "name": "Nobody", "password": "5678" }),
    );
    assert_eq!(code, "not_found");
    let login = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "auth.login",
        json!({ "name": "Kim", "password": "5678" }),
    );
    assert_eq!(login["name"].as_str(), Some("Kim"));

    // Change rules: length >= 4 and a matching confirmation.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "auth.changePassword",
        json!({ "newPassword": "abc", "confirm": "abc" }),
    );
    assert_eq!(code, "validation_failed");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "auth.changePassword",
        json!({ "newPassword": "paint99", "confirm": "paint98" }),
    );
    assert_eq!(code, "validation_failed");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "auth.changePassword",
        json!({ "newPassword": "paint99", "confirm": "paint99" }),
    );

    // The stored password now wins; the phone default is gone for good.
    let _ = request_ok(&mut stdin, &mut reader, "13", "auth.logout", json!({}));
    let code = request_err(
        &mut stdin,
        &mut reader,
        "14",
        "auth.login",
        json!({ "name": "Kim", "password": "5678" }),
    );
    assert_eq!(code, "wrong_password");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "auth.login",
        json!({ "name": "Kim", "password": "paint99" }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "16",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    assert_eq!(code, "forbidden");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "auth.admin",
        json!({ "secret": "test-secret" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "students.delete",
        json!({ "studentId": student_id }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "19",
        "auth.login",
        json!({ "name": "Kim", "password": "paint99" }),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn change_password_requires_a_logged_in_student() {
    let workspace = temp_dir("studiod-auth-gate");
    let (_child, mut stdin, mut reader) = spawn_daemon();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "store.open",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "auth.changePassword",
        json!({ "newPassword": "paint99", "confirm": "paint99" }),
    );
    assert_eq!(code, "auth_required");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.admin",
        json!({ "secret": "test-secret" }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "auth.changePassword",
        json!({ "newPassword": "paint99", "confirm": "paint99" }),
    );
    assert_eq!(code, "forbidden");
}
