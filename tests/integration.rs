use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docscan_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docscan");
    path
}

fn page(title: &str, heading: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><title>{}</title></head>\
         <body><h1>{}</h1><p>{}</p></body></html>",
        title, heading, body
    )
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs_dir = root.join("docs");
    fs::create_dir_all(docs_dir.join("nested")).unwrap();
    fs::write(
        docs_dir.join("01.html"),
        page("Acme investor deck", "Investor overview", "Seed round for Acme."),
    )
    .unwrap();
    fs::write(
        docs_dir.join("02.html"),
        page("Globex investor deck", "Investor overview", "Series A for Globex."),
    )
    .unwrap();
    // Not valid UTF-8.
    fs::write(docs_dir.join("03.html"), [0x3c, 0x70, 0x3e, 0xff, 0xfe, 0xfd]).unwrap();
    fs::write(
        docs_dir.join("04.html"),
        page("UI design notes", "Design system", "Buttons and spacing."),
    )
    .unwrap();
    fs::write(
        docs_dir.join("nested/05.htm"),
        page("Marketing plan", "Marketing", "Campaign calendar."),
    )
    .unwrap();
    fs::write(docs_dir.join("readme.txt"), "not html").unwrap();

    let config_content = format!(
        r#"[store]
path = "{root}/data/docscan.sqlite"

[analysis]
enabled = false

[ingest]
include_globs = ["**/*.html", "**/*.htm"]

[similarity]
min_score = 30
top_k = 5
duplicate_score = 60
"#,
        root = root.display()
    );

    let config_path = config_dir.join("docscan.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docscan(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docscan_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docscan binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn ingest_all(tmp: &TempDir, config_path: &Path) {
    let docs = tmp.path().join("docs");
    let (stdout, stderr, success) = run_docscan(
        config_path,
        &["ingest", docs.to_str().unwrap(), "--progress", "off"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
}

/// Short ids printed in the first column of the table view.
fn table_ids(config_path: &Path) -> Vec<String> {
    let (stdout, _, success) = run_docscan(config_path, &["list", "--view", "table"]);
    assert!(success);
    stdout
        .lines()
        .skip(2)
        .filter_map(|line| {
            line.split_whitespace()
                .find(|t| t.len() == 8 && t.chars().all(|c| c.is_ascii_hexdigit() || c == '-'))
                .map(str::to_string)
        })
        .collect()
}

#[test]
fn test_init_creates_store() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_docscan(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_docscan(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_docscan(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_keeps_going_after_a_bad_file() {
    let (tmp, config_path) = setup_test_env();
    let docs = tmp.path().join("docs");

    let (stdout, stderr, success) = run_docscan(
        &config_path,
        &["ingest", docs.to_str().unwrap(), "--progress", "off"],
    );
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files found: 5"));
    assert!(stdout.contains("analyzed: 4"));
    assert!(stdout.contains("failed: 1"));
    assert!(stdout.contains("documents in store: 5"));

    let (json, _, success) = run_docscan(&config_path, &["export", "json"]);
    assert!(success);
    let records: serde_json::Value = serde_json::from_str(&json).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[2]["filename"], "03.html");
    assert_eq!(records[2]["collection"], "error");
    assert_eq!(records[2]["tags"][0], "error");
    assert!(records[2]["summary"].as_str().unwrap().starts_with("error: "));
    assert_eq!(records[4]["filename"], "nested/05.htm");
}

#[test]
fn test_ingest_without_html_fails() {
    let (tmp, config_path) = setup_test_env();
    let empty = tmp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let (_, stderr, success) = run_docscan(
        &config_path,
        &["ingest", empty.to_str().unwrap(), "--progress", "off"],
    );
    assert!(!success);
    assert!(stderr.contains("no HTML files found"));
}

#[test]
fn test_export_csv_filtered_by_collection() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let out = tmp.path().join("exports/ir.csv");
    let (_, stderr, success) = run_docscan(
        &config_path,
        &[
            "export",
            "csv",
            "--collection",
            "IR materials",
            "--output",
            out.to_str().unwrap(),
        ],
    );
    assert!(success, "export failed: {}", stderr);

    let csv = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.split('\n').collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("filename,title,summary"));
    assert!(lines[1].starts_with("\"01.html\""));
}

#[test]
fn test_list_views() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let (stdout, _, success) = run_docscan(
        &config_path,
        &["list", "--view", "table", "--sort", "similarity", "--desc"],
    );
    assert!(success);
    assert!(stdout.contains("TITLE"));
    let first_row = stdout.lines().nth(2).unwrap();
    assert!(first_row.contains("investor deck"), "{}", first_row);

    let (stdout, _, success) = run_docscan(&config_path, &["list", "--search", "globex"]);
    assert!(success);
    assert!(stdout.contains("Globex investor deck"));
    assert!(!stdout.contains("Acme investor deck"));

    let (stdout, _, success) = run_docscan(&config_path, &["list", "--view", "timeline"]);
    assert!(success);
    assert!(stdout.contains("UI design notes"));

    let svg = tmp.path().join("graph.svg");
    let (_, _, success) = run_docscan(
        &config_path,
        &["list", "--view", "graph", "--output", svg.to_str().unwrap()],
    );
    assert!(success);
    let svg = fs::read_to_string(svg).unwrap();
    assert!(svg.starts_with("<svg"));
    assert_eq!(svg.matches("<circle cx=\"16\"").count(), 6);
}

#[test]
fn test_stats_report() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let (stdout, stderr, success) = run_docscan(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Documents:       5"));
    assert!(stdout.contains("Failed:          1"));
    assert!(stdout.contains("Near-duplicates: 2"));
    assert!(stdout.contains("IR materials"));
    assert!(stdout.contains("Top tags:"));
    assert!(stdout.contains("#IR (2)  #design (1)  #error (1)  #marketing (1)"));
}

#[test]
fn test_unknown_tag_filter_points_to_tag_cloud() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let (stdout, stderr, success) = run_docscan(&config_path, &["list", "--tag", "finance"]);
    assert!(success);
    assert!(stdout.contains("No documents to display."));
    assert!(stderr.contains("No document is tagged #finance"));

    let (_, stderr, success) = run_docscan(&config_path, &["list", "--tag", "IR"]);
    assert!(success);
    assert!(!stderr.contains("No document is tagged"));
}

#[test]
fn test_csv_export_flattens_multi_line_descriptions() {
    let (tmp, config_path) = setup_test_env();
    let docs = tmp.path().join("multiline");
    fs::create_dir_all(&docs).unwrap();
    for i in 1..=3 {
        fs::write(
            docs.join(format!("{}.html", i)),
            format!(
                "<html><head><title>Report {}</title>\
                 <meta name=\"description\" content=\"First line.\nSecond line.\">\
                 </head><body><p>Body</p></body></html>",
                i
            ),
        )
        .unwrap();
    }
    let (_, stderr, success) = run_docscan(
        &config_path,
        &["ingest", docs.to_str().unwrap(), "--progress", "off"],
    );
    assert!(success, "ingest failed: {}", stderr);

    let (stdout, _, success) = run_docscan(&config_path, &["export", "csv"]);
    assert!(success);
    assert_eq!(stdout.trim_end().split('\n').count(), 4);
    assert!(stdout.contains("\"First line. Second line.\""));
}

#[test]
fn test_similar_favorite_and_remove() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let ids = table_ids(&config_path);
    assert_eq!(ids.len(), 5);

    // Sorted by title: "03.html" (error doc) sorts first, then the Acme deck.
    let acme = &ids[1];
    let (stdout, _, success) = run_docscan(&config_path, &["similar", acme]);
    assert!(success);
    assert!(stdout.contains("Globex investor deck"));

    let (stdout, _, success) = run_docscan(&config_path, &["favorite", acme]);
    assert!(success);
    assert!(stdout.contains("Starred"));
    let (stdout, _, _) = run_docscan(&config_path, &["list", "--favorites"]);
    assert!(stdout.contains("Acme investor deck"));
    assert!(!stdout.contains("Globex"));

    let (stdout, _, success) = run_docscan(&config_path, &["show", acme, "--json"]);
    assert!(success);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["favorite"], true);
    assert!(record["rawContent"].as_str().unwrap().contains("Seed round"));

    let (_, _, success) = run_docscan(&config_path, &["remove", acme]);
    assert!(success);
    assert_eq!(table_ids(&config_path).len(), 4);
}

#[test]
fn test_compare_requires_known_ids() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let (_, stderr, success) = run_docscan(&config_path, &["compare", "nope-1", "nope-2"]);
    assert!(!success);
    assert!(stderr.contains("No document matches"));
}

#[test]
fn test_compare_flags_documents_without_fields() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let ids = table_ids(&config_path);
    let (stdout, stderr, success) = run_docscan(&config_path, &["compare", &ids[1], &ids[2]]);
    assert!(success, "compare failed: {}", stderr);
    assert!(stdout.contains("Comparing 2 documents"));
    assert!(stdout.contains("No structured data (2 documents)"));
    assert!(stdout.contains("common tags:     #IR"));
}

#[test]
fn test_reanalyze_refuses_error_documents() {
    let (tmp, config_path) = setup_test_env();
    ingest_all(&tmp, &config_path);

    let ids = table_ids(&config_path);
    let (_, stderr, success) = run_docscan(&config_path, &["reanalyze", &ids[0]]);
    assert!(!success);
    assert!(stderr.contains("no stored content"));
}

#[test]
fn test_bad_config_is_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("bad.toml");
    fs::write(&bad, "[similarity]\ntop_k = 0\n").unwrap();

    let (_, stderr, success) = run_docscan(&bad, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("top_k"));
}
