//! Command-line driver tests: pipelines loaded from JSON and TOML files,
//! NDJSON in and out, and error reporting.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::{Builder, NamedTempFile};

fn gritflow() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gritflow"))
}

fn spec_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    write!(file, "{}", contents).unwrap();
    file.flush().unwrap();
    file
}

fn records_file(lines: &[&str]) -> NamedTempFile {
    let mut file = Builder::new().suffix(".jsonl").tempfile().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file.flush().unwrap();
    file
}

fn stdout_records(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

const COVERAGE_SPEC: &str =
    r#"{"transforms": [{"type": "coverage", "chrom": "chrom", "start": "start", "end": "end"}]}"#;

#[test]
fn test_run_coverage_from_file() {
    let spec = spec_file(".json", COVERAGE_SPEC);
    let input = records_file(&[
        r#"{"chrom": "chr1", "start": 0, "end": 4}"#,
        r#"{"chrom": "chr1", "start": 2, "end": 6}"#,
        "",
        r#"{"chrom": "chr2", "start": 0, "end": 3}"#,
    ]);

    let output = gritflow()
        .args(["run", "--pipeline"])
        .arg(spec.path())
        .arg("--input")
        .arg(input.path())
        .output()
        .expect("Failed to run gritflow");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let records = stdout_records(&output);
    assert_eq!(records.len(), 4);
    assert_eq!(records[1]["coverage"], 2.0);
    assert_eq!(records[3]["chrom"], "chr2");
}

#[test]
fn test_run_reads_stdin_and_toml() {
    let spec = spec_file(
        ".toml",
        r#"
[[transforms]]
type = "filter"
expr = "datum.score > 5"

[[transforms]]
type = "formula"
expr = "datum.score * 2"
as = "double"
"#,
    );

    let mut child = gritflow()
        .args(["run", "--pipeline"])
        .arg(spec.path())
        .args(["--input", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run gritflow");

    {
        let stdin = child.stdin.as_mut().unwrap();
        for score in [1, 7, 3, 9] {
            writeln!(stdin, r#"{{"score": {}}}"#, score).unwrap();
        }
    }
    drop(child.stdin.take());
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let doubles: Vec<f64> = stdout_records(&output)
        .iter()
        .map(|r| r["double"].as_f64().unwrap())
        .collect();
    assert_eq!(doubles, vec![14.0, 18.0]);
}

#[test]
fn test_run_with_facets() {
    let spec = spec_file(
        ".json",
        r#"{"transforms": [{"type": "pileup", "start": "start", "end": "end"}]}"#,
    );
    let input = records_file(&[
        r#"{"track": "a", "start": 0, "end": 10}"#,
        r#"{"track": "b", "start": 1, "end": 10}"#,
        r#"{"track": "a", "start": 2, "end": 10}"#,
    ]);

    let output = gritflow()
        .args(["run", "--pipeline"])
        .arg(spec.path())
        .arg("--input")
        .arg(input.path())
        .args(["--facet-by", "track"])
        .output()
        .unwrap();
    assert!(output.status.success());

    // Each facet is packed on its own
    let lanes: Vec<(String, f64)> = stdout_records(&output)
        .iter()
        .map(|r| {
            (
                r["track"].as_str().unwrap().to_string(),
                r["lane"].as_f64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        lanes,
        vec![
            ("a".to_string(), 0.0),
            ("a".to_string(), 1.0),
            ("b".to_string(), 0.0)
        ]
    );
}

#[test]
fn test_describe_prints_the_node_tree() {
    let spec = spec_file(
        ".json",
        r#"{"transforms": [{"type": "formula", "expr": "1", "as": "one"}]}"#,
    );

    let output = gritflow()
        .args(["describe", "--pipeline"])
        .arg(spec.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "* formula [modifies]\n  * collect [collects]\n");
}

#[test]
fn test_transforms_lists_types() {
    let output = gritflow().arg("transforms").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for t in ["coverage", "pileup", "regexFold", "stack", "sample"] {
        assert!(stdout.lines().any(|l| l == t), "missing {}", t);
    }
    assert!(stdout.contains("gather"));
}

#[test]
fn test_unknown_transform_fails() {
    let spec = spec_file(".json", r#"{"transforms": [{"type": "bogus"}]}"#);

    let output = gritflow()
        .args(["describe", "--pipeline"])
        .arg(spec.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
    assert!(stderr.contains("bogus"));
}

#[test]
fn test_bad_record_fails() {
    let spec = spec_file(".json", COVERAGE_SPEC);
    let input = records_file(&[r#"{"chrom": "chr1", "start": 0, "end": 4}"#, "not json"]);

    let output = gritflow()
        .args(["run", "--pipeline"])
        .arg(spec.path())
        .arg("--input")
        .arg(input.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}

#[test]
fn test_strict_order_flag_rejects_unsorted_input() {
    let spec = spec_file(".json", COVERAGE_SPEC);
    let input = records_file(&[
        r#"{"chrom": "chr1", "start": 10, "end": 20}"#,
        r#"{"chrom": "chr1", "start": 5, "end": 20}"#,
    ]);

    let run = |strict: bool| {
        let mut cmd = gritflow();
        cmd.args(["run", "--pipeline"])
            .arg(spec.path())
            .arg("--input")
            .arg(input.path());
        if strict {
            cmd.arg("--strict-order");
        }
        cmd.output().unwrap()
    };

    assert!(run(false).status.success());

    let output = run(true);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not sorted"));
}
