//! The `dq` binary against the mock backend.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use common::{spawn_backend, MockBackend, PASSWORD, TOKEN, USERNAME};

fn dq_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dq"))
}

fn write_config(mock: &MockBackend, root: &Path) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join("dq.toml");
    fs::write(
        &path,
        format!(
            r#"
[server]
base_url = "{}"

[session]
store_path = "{}"
"#,
            mock.base_url,
            root.join("session").join("storage.json").display()
        ),
    )
    .unwrap();
    path
}

async fn run_dq(config: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(dq_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("DQ_BASE_URL")
        .env_remove("DQ_PASSWORD")
        .env_remove("DQ_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run dq");

    let mut pipe = child.stdin.take().unwrap();
    if let Some(input) = stdin {
        pipe.write_all(input.as_bytes()).await.unwrap();
    }
    drop(pipe);
    child.wait_with_output().await.unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

async fn signed_in(mock: &MockBackend, tmp: &TempDir) -> PathBuf {
    let config = write_config(mock, tmp.path());
    let output = run_dq(
        &config,
        &["login", "--username", USERNAME, "--password", PASSWORD],
        None,
    )
    .await;
    assert!(output.status.success(), "login failed: {}", stderr(&output));
    config
}

#[tokio::test]
async fn ask_prints_answer_sources_and_time() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(&config, &["ask", "What were Q3 sales?"], None).await;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Revenue grew 12% in Q3."));
    assert!(out.contains("1. North region"));
    assert!(out.contains("report7.pdf"));
    assert!(out.contains("excerpt 7"));
    assert!(out.contains("(1.20s)"));
}

#[tokio::test]
async fn ask_json_is_parseable() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(&config, &["ask", "q", "--format", "json"], None).await;

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["sources"].as_array().unwrap().len(), 7);
    assert_eq!(value["processing_time"], 1.2);
}

#[tokio::test]
async fn ask_blank_question_fails_without_request() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(&config, &["ask", "   "], None).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Please enter a question."));
    assert!(mock.log().is_empty());
}

#[tokio::test]
async fn ask_reports_backend_error() {
    let mock = spawn_backend().await;
    mock.set_query_status(500);
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(&config, &["ask", "q"], None).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Query engine not initialized"));
}

#[tokio::test]
async fn admin_commands_require_login() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(&config, &["admin", "list"], None).await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("dq login"));
    assert!(mock.log().is_empty());
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(
        &config,
        &["login", "--username", USERNAME, "--password", "wrong"],
        None,
    )
    .await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("login failed"));
    assert!(!tmp.path().join("session").join("storage.json").exists());
}

#[tokio::test]
async fn login_stores_token_and_logout_clears_it() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = signed_in(&mock, &tmp).await;

    let store = tmp.path().join("session").join("storage.json");
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(saved["token"], TOKEN);

    let output = run_dq(&config, &["logout"], None).await;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Signed out."));
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&store).unwrap()).unwrap();
    assert!(saved.get("token").is_none());
}

#[tokio::test]
async fn upload_directory_then_list() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = signed_in(&mock, &tmp).await;

    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("b.docx"), b"word").unwrap();
    fs::write(docs.join("a.pdf"), b"pdf").unwrap();
    fs::write(docs.join("notes.txt"), b"skipped").unwrap();

    let output = run_dq(
        &config,
        &["admin", "upload", docs.to_str().unwrap(), "--progress", "json"],
        None,
    )
    .await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let err = stderr(&output);
    let events: Vec<serde_json::Value> = err
        .lines()
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    let done = events.iter().find(|e| e["event"] == "done").unwrap();
    assert_eq!(done["succeeded"], 2);
    assert_eq!(done["failed"], 0);

    assert_eq!(mock.count("POST /api/admin/upload a.pdf"), 1);
    assert_eq!(mock.count("POST /api/admin/upload b.docx"), 1);
    assert_eq!(mock.count("POST /api/admin/upload notes.txt"), 0);
    assert_eq!(mock.max_uploads_in_flight(), 1);

    let output = run_dq(&config, &["admin", "list", "--format", "json"], None).await;
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_upload_exits_nonzero_but_finishes_batch() {
    let mock = spawn_backend().await;
    mock.reject_upload("a.pdf");
    let tmp = TempDir::new().unwrap();
    let config = signed_in(&mock, &tmp).await;

    let a = tmp.path().join("a.pdf");
    let b = tmp.path().join("b.pdf");
    fs::write(&a, b"x").unwrap();
    fs::write(&b, b"x").unwrap();

    let output = run_dq(
        &config,
        &[
            "admin",
            "upload",
            a.to_str().unwrap(),
            b.to_str().unwrap(),
            "--progress",
            "off",
        ],
        None,
    )
    .await;

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to upload 'a.pdf'"));
    assert_eq!(mock.count("POST /api/admin/upload b.pdf"), 1);
    assert_eq!(mock.count("GET /api/admin/documents"), 1);
}

#[tokio::test]
async fn delete_asks_for_confirmation() {
    let mock = spawn_backend().await;
    mock.add_document("old.pdf");
    let tmp = TempDir::new().unwrap();
    let config = signed_in(&mock, &tmp).await;

    let output = run_dq(&config, &["admin", "delete", "old.pdf"], Some("n\n")).await;
    assert!(output.status.success());
    assert!(stderr(&output).contains("Cancelled."));
    assert_eq!(mock.count("DELETE /api/admin/documents old.pdf"), 0);

    let output = run_dq(&config, &["admin", "delete", "old.pdf"], Some("y\n")).await;
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("deleted successfully"));
    assert!(stdout(&output).contains("No documents uploaded yet."));
}

#[tokio::test]
async fn rebuild_with_yes_skips_prompt() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = signed_in(&mock, &tmp).await;

    let output = run_dq(&config, &["admin", "rebuild", "--yes"], None).await;

    assert!(output.status.success());
    assert!(stderr(&output).contains("Index rebuild initiated"));
    assert_eq!(mock.count("POST /api/admin/rebuild-index"), 1);
}

#[tokio::test]
async fn stats_and_health() {
    let mock = spawn_backend().await;
    mock.add_document("a.pdf");
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(&config, &["health"], None).await;
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("healthy"));
    assert!(out.contains("1.0.0"));

    let config = signed_in(&mock, &tmp).await;
    let output = run_dq(&config, &["admin", "stats"], None).await;
    assert!(output.status.success());
    assert!(stdout(&output).contains("Indexed documents:"));
}

#[tokio::test]
async fn chat_reads_questions_until_quit() {
    let mock = spawn_backend().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&mock, tmp.path());

    let output = run_dq(&config, &["chat"], Some("first\n/2\n/quit\nnever sent\n")).await;

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let log = mock.log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], "POST /api/query first");
    assert!(log[1].starts_with("POST /api/query Summarize"));
    assert_eq!(stdout(&output).matches("(1.20s)").count(), 2);
}
