use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn bia_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("bia");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Six rows spanning two quarters, two products, two regions, and
    // all four age groups.
    fs::write(
        data_dir.join("sales.csv"),
        "Date,Product,Region,Sales,Customer_Age,Customer_Gender,Customer_Satisfaction\n\
         2023-01-10,Widget A,North,100.0,22,Male,4.5\n\
         2023-02-15,Widget A,South,200.0,30,Female,4.0\n\
         2023-03-20,Widget B,North,150.0,45,Male,3.5\n\
         2023-04-05,Widget B,South,250.0,60,Female,4.2\n\
         2023-05-11,Widget A,North,300.0,28,Male,4.8\n\
         2023-06-30,Widget B,South,120.0,19,Female,3.9\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[dataset]
csv_path = "{root}/data/sales.csv"
documents_path = "{root}/kb/documents.json"
charts_dir = "{root}/kb/charts"

[db]
path = "{root}/data/bia.sqlite"

[retrieval]
top_k = 4
max_history_turns = 10
"#,
        root = root.display()
    );

    let config_path = config_dir.join("bia.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_bia(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = bia_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run bia binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_bia(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_bia(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_bia(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_summarize_writes_documents_and_charts() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_bia(&config_path, &["summarize"]);
    assert!(
        success,
        "summarize failed: stdout={}, stderr={}",
        stdout, stderr
    );
    // 2 quarters + 2 products + 2 regions + 4 age groups + overall
    assert!(stdout.contains("documents: 11"));
    assert!(stdout.contains("records:   6"));

    let documents_path = tmp.path().join("kb/documents.json");
    let json = fs::read_to_string(&documents_path).unwrap();
    assert!(json.contains("Sales Summary for Widget A"));
    assert!(json.contains("Total Sales: $600.00"));
    assert!(json.contains("Overall Sales Summary"));
    assert!(json.contains("Total Sales: $1120.00"));
    assert!(json.contains("overall_summary"));
    assert!(json.contains("product_Widget_A"));
    assert!(json.contains("time_2023-Q1"));

    let charts: Vec<_> = fs::read_dir(tmp.path().join("kb/charts"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "svg").unwrap_or(false))
        .collect();
    assert_eq!(charts.len(), 11, "expected one chart per document");
}

#[test]
fn test_summarize_is_repeatable() {
    let (tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_bia(&config_path, &["summarize"]);
    assert!(success1, "First summarize failed");
    let first = fs::read_to_string(tmp.path().join("kb/documents.json")).unwrap();

    let (_, _, success2) = run_bia(&config_path, &["summarize"]);
    assert!(success2, "Second summarize failed");
    let second = fs::read_to_string(tmp.path().join("kb/documents.json")).unwrap();

    assert_eq!(first, second, "rebuild should be byte-identical");
}

#[test]
fn test_summarize_missing_csv_fails() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("data/sales.csv")).unwrap();

    let (_, stderr, success) = run_bia(&config_path, &["summarize"]);
    assert!(!success);
    assert!(stderr.contains("failed to load sales dataset"));
}

#[test]
fn test_ask_without_database_reports_unavailable() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_bia(&config_path, &["ask", "What were total sales?"]);
    assert!(!success);
    assert!(
        stderr.contains("knowledge base unavailable"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_ask_without_index_reports_unavailable() {
    let (_tmp, config_path) = setup_test_env();

    run_bia(&config_path, &["init"]);
    let (_, stderr, success) = run_bia(&config_path, &["ask", "What were total sales?"]);
    assert!(!success);
    assert!(
        stderr.contains("knowledge base unavailable"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_index_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env();

    run_bia(&config_path, &["init"]);
    run_bia(&config_path, &["summarize"]);
    let (_, stderr, success) = run_bia(&config_path, &["index"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_zero_batch_size_is_rejected_at_config_load() {
    let (tmp, config_path) = setup_test_env();

    let bad_config = format!(
        r#"[dataset]
csv_path = "{root}/data/sales.csv"

[db]
path = "{root}/data/bia.sqlite"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
batch_size = 0
"#,
        root = tmp.path().display()
    );
    fs::write(&config_path, bad_config).unwrap();

    run_bia(&config_path, &["init"]);
    // Must fail during config load, before the index build touches
    // any rows.
    let (_, stderr, success) = run_bia(&config_path, &["index"]);
    assert!(!success);
    assert!(stderr.contains("batch_size"), "stderr={}", stderr);
}

#[test]
fn test_stats_before_init() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_bia(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("no database"));
}

#[test]
fn test_eval_without_dataset_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_bia(&config_path, &["init"]);
    let (_, stderr, success) = run_bia(&config_path, &["eval"]);
    assert!(!success);
    assert!(stderr.contains("No evaluation dataset"), "stderr={}", stderr);
}
