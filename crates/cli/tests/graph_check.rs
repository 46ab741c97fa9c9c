use std::path::PathBuf;
use std::process::Command;

use assert_cmd::prelude::*;
use serde_json::Value;

fn temp_graph_path() -> PathBuf {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let mut path = std::env::temp_dir();
    let pid = std::process::id();
    let counter = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    path.push(format!("stacks.graph.it.{pid}.{counter}.json"));
    path
}

/// Synthesise the items stack and return its resource graph JSON.
fn items_graph() -> Result<Value, Box<dyn std::error::Error>> {
    let path = temp_graph_path();
    let output = Command::cargo_bin("stacks")?
        .env_remove("BUILD_ENV")
        .env_remove("STACK_NAME")
        .args(["synth", "--graph", path.to_str().expect("path")])
        .output()?;
    assert!(
        output.status.success(),
        "synth failed: status={:?}, stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let graph = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    std::fs::remove_file(&path).ok();
    Ok(graph)
}

fn check(
    graph: &Value,
    extra: &[&str],
) -> Result<std::process::Output, Box<dyn std::error::Error>> {
    let path = temp_graph_path();
    std::fs::write(&path, serde_json::to_vec_pretty(graph)?)?;
    let output = Command::cargo_bin("stacks")?
        .args(["graph", "check", "--input", path.to_str().expect("path")])
        .args(extra)
        .output()?;
    std::fs::remove_file(&path).ok();
    Ok(output)
}

#[test]
fn synthesised_graph_checks_clean() -> Result<(), Box<dyn std::error::Error>> {
    let output = check(&items_graph()?, &[])?;
    assert!(output.status.success(), "check failed: {output:?}");
    let stdout = String::from_utf8(output.stdout)?;
    assert!(
        stdout.contains("graph is valid (3 resources"),
        "unexpected stdout: {stdout}"
    );
    assert!(stdout.contains("8 steps"), "unexpected stdout: {stdout}");
    Ok(())
}

#[test]
fn json_mode_reports_counts() -> Result<(), Box<dyn std::error::Error>> {
    let output = check(&items_graph()?, &["--json"])?;
    assert!(output.status.success(), "check failed: {output:?}");
    let response: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(response["status"], "ok");
    assert_eq!(response["resource_count"], 3);
    assert_eq!(response["step_count"], 8);
    assert_eq!(response["diagnostics"], Value::Array(Vec::new()));
    Ok(())
}

#[test]
fn dropping_the_store_reports_dangling_references() -> Result<(), Box<dyn std::error::Error>> {
    let mut graph = items_graph()?;
    graph["resources"]
        .as_array_mut()
        .expect("resources array")
        .retain(|resource| resource["id"] != "items");

    let output = check(&graph, &["--json"])?;
    assert!(!output.status.success(), "expected failure: {output:?}");
    let response: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(response["status"], "error");
    assert!(response.get("step_count").is_none());
    let diagnostics = response["diagnostics"].as_array().expect("diagnostics");
    assert!(!diagnostics.is_empty());
    assert!(
        diagnostics
            .iter()
            .all(|diag| diag["code"] == "STK200" && diag["subsystem"] == "binding"),
        "unexpected diagnostics: {diagnostics:?}"
    );
    Ok(())
}

#[test]
fn malformed_schedule_is_reported_in_text_mode() -> Result<(), Box<dyn std::error::Error>> {
    let mut graph = items_graph()?;
    let edges = graph["edges"].as_array_mut().expect("edges array");
    let rule = edges
        .iter_mut()
        .find(|edge| edge["kind"] == "schedule")
        .expect("schedule edge");
    rule["expression"] = Value::String("cron(0 25 * * ? *)".into());

    let output = check(&graph, &[])?;
    assert!(!output.status.success(), "expected failure: {output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[STK202] error(binding)"), "unexpected stderr: {stderr}");
    assert!(
        stderr.contains("location: importerEventBridgeRule"),
        "unexpected stderr: {stderr}"
    );
    Ok(())
}

#[test]
fn json_cannot_be_combined_with_dot() -> Result<(), Box<dyn std::error::Error>> {
    let output = check(&items_graph()?, &["--json", "--emit-dot"])?;
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("--json cannot be combined with --emit-dot or --dot"),
        "unexpected stderr: {stderr}"
    );
    Ok(())
}

#[test]
fn emit_dot_prints_the_graph() -> Result<(), Box<dyn std::error::Error>> {
    let output = check(&items_graph()?, &["--emit-dot"])?;
    assert!(output.status.success(), "check failed: {output:?}");
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("digraph stack {"));
    assert!(stdout.contains("\"importerFunction\" -> \"items\" [label=\"read+write\"];"));
    Ok(())
}
