use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const AAA_TEXT: &str = "Revenue grew in fiscal 2023 on services demand.";
const BBB_TEXT: &str = "Margins declined because freight costs doubled.";

#[allow(deprecated)]
fn mark(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mark").expect("binary");
    cmd.env("MARK_EMBEDDING_MODE", "stub")
        .env_remove("BATCH_SIZE")
        .env_remove("SAVE_EVERY")
        .arg("--quiet")
        .arg("--root")
        .arg(root);
    cmd
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

fn setup_corpus() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let clean = temp.path().join("data/text_clean");
    fs::create_dir_all(&clean).unwrap();
    fs::write(clean.join("AAA_10-K_2023.txt"), AAA_TEXT).unwrap();
    fs::write(clean.join("BBB_10-K_2023.txt"), BBB_TEXT).unwrap();
    temp
}

fn chunk_and_index(root: &Path) {
    let chunked = run_json(mark(root).arg("chunk"));
    assert_eq!(chunked["documents"], 2);
    assert_eq!(chunked["chunks"], 2);

    let indexed = run_json(mark(root).arg("index"));
    assert_eq!(indexed["indexed"], 2);
    assert_eq!(indexed["total_entries"], 2);
}

#[test]
fn extract_prepares_text_for_chunking() {
    let temp = tempdir().unwrap();
    let raw = temp.path().join("data/documents_raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(
        raw.join("AAA_10-K_2023.html"),
        format!("<html><body><p>Cover</p><p>FORM 10-K</p><p>{AAA_TEXT}</p></body></html>"),
    )
    .unwrap();

    let extracted = run_json(mark(temp.path()).arg("extract"));
    assert_eq!(extracted["documents"], 1);
    let text = fs::read_to_string(temp.path().join("data/text_clean/AAA_10-K_2023.txt")).unwrap();
    assert_eq!(text, format!("FORM 10-K\n{AAA_TEXT}"));

    let rerun = run_json(mark(temp.path()).arg("extract"));
    assert_eq!(rerun["documents"], 0);
    assert_eq!(rerun["skipped_existing"], 1);

    let chunked = run_json(mark(temp.path()).arg("chunk"));
    assert_eq!(chunked["chunks"], 1);
}

#[test]
fn exact_chunk_text_is_retrieved_with_high_confidence() {
    let temp = setup_corpus();
    chunk_and_index(temp.path());

    let response = run_json(mark(temp.path()).args(["context", AAA_TEXT, "--ticker", "aaa"]));

    assert_eq!(response["confidence"], "high");
    assert_eq!(response["fallback_used"], false);
    assert_eq!(response["source_identifiers"][0], "AAA_10-K_2023_chunk1.txt");
    assert_eq!(response["passages"][0]["text"], AAA_TEXT);
}

#[test]
fn ticker_filter_excludes_other_companies() {
    let temp = setup_corpus();
    chunk_and_index(temp.path());

    let response = run_json(mark(temp.path()).args(["context", AAA_TEXT, "--ticker", "BBB"]));

    let ids = response["source_identifiers"].as_array().unwrap();
    assert!(ids
        .iter()
        .all(|id| id.as_str().unwrap().starts_with("BBB_")));
}

#[test]
fn second_index_run_is_incremental() {
    let temp = setup_corpus();
    chunk_and_index(temp.path());

    let rerun = run_json(mark(temp.path()).arg("index"));
    assert_eq!(rerun["indexed"], 0);
    assert_eq!(rerun["skipped_existing"], 2);

    let rebuilt = run_json(mark(temp.path()).args(["index", "--full"]));
    assert_eq!(rebuilt["indexed"], 2);
    assert_eq!(rebuilt["total_entries"], 2);
}

#[test]
fn trace_flag_reports_pipeline_stages() {
    let temp = setup_corpus();
    chunk_and_index(temp.path());

    let response = run_json(mark(temp.path()).args(["context", BBB_TEXT, "--trace"]));

    let trace: Vec<&str> = response["trace"]
        .as_array()
        .unwrap()
        .iter()
        .map(|stage| stage.as_str().unwrap())
        .collect();
    assert_eq!(trace, vec!["query_received", "primary_retrieval", "assemble"]);
}

#[test]
fn context_without_index_fails() {
    let temp = setup_corpus();
    mark(temp.path())
        .args(["context", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mark index"));
}

#[test]
fn doctor_reports_consistent_index() {
    let temp = setup_corpus();
    chunk_and_index(temp.path());

    let report = run_json(mark(temp.path()).args(["doctor", "--json"]));

    assert_eq!(report["vectors"], 2);
    assert_eq!(report["metadata_rows"], 2);
    assert_eq!(report["aligned"], true);
    assert_eq!(report["chunk_files"], 2);
    assert_eq!(report["issues"].as_array().unwrap().len(), 0);
}

#[test]
fn doctor_flags_missing_chunk_files() {
    let temp = setup_corpus();
    chunk_and_index(temp.path());
    fs::remove_file(temp.path().join("data/chunks/BBB_10-K_2023_chunk1.txt")).unwrap();

    let output = mark(temp.path())
        .args(["doctor", "--json"])
        .output()
        .expect("command run");

    assert!(!output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(report["missing_chunk_files"][0], "BBB_10-K_2023_chunk1.txt");
}

#[test]
fn doctor_fails_without_index() {
    let temp = setup_corpus();
    mark(temp.path()).arg("doctor").assert().failure();
}

#[test]
fn schema_describes_context_response() {
    let temp = tempdir().unwrap();
    mark(temp.path())
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("source_identifiers"))
        .stdout(predicate::str::contains("fallback_topic"));
}

#[test]
fn invalid_config_is_rejected() {
    let temp = setup_corpus();
    chunk_and_index(temp.path());
    let config = temp.path().join("mark.toml");
    fs::write(&config, "[context]\nmax_chunks = 0\n").unwrap();

    mark(temp.path())
        .arg("--config")
        .arg(&config)
        .args(["context", AAA_TEXT])
        .assert()
        .failure();
}
