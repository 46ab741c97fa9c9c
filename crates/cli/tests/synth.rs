use std::path::PathBuf;
use std::process::Command;

use assert_cmd::prelude::*;
use proptest::prelude::*;
use serde_json::Value;

fn temp_path(label: &str) -> PathBuf {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let mut path = std::env::temp_dir();
    let pid = std::process::id();
    let counter = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    path.push(format!("stacks.{label}.it.{pid}.{counter}"));
    path
}

fn stacks() -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("stacks")?;
    cmd.env_remove("BUILD_ENV").env_remove("STACK_NAME");
    Ok(cmd)
}

fn synth_plan(args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
    let output = stacks()?.arg("synth").args(args).output()?;
    assert!(
        output.status.success(),
        "stacks synth failed: status={:?}, stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn unit_environment(plan: &Value, unit: &str) -> Value {
    plan["steps"]
        .as_array()
        .and_then(|steps| {
            steps
                .iter()
                .find(|step| step["id"] == Value::String(format!("unit/{unit}")))
        })
        .map(|step| step["action"]["unit"]["environment"].clone())
        .unwrap_or_default()
}

#[test]
fn synth_prints_ordered_plan() -> Result<(), Box<dyn std::error::Error>> {
    let plan = synth_plan(&[])?;
    assert_eq!(plan["stack"]["name"], "springfieldMeetupApi");

    let ids: Vec<&str> = plan["steps"]
        .as_array()
        .map(|steps| steps.iter().filter_map(|step| step["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(
        ids,
        vec![
            "store/items",
            "unit/getAllItemsFunction",
            "unit/importerFunction",
            "grant/getAllItemsFunction/items",
            "grant/importerFunction/items",
            "schedule/importerEventBridgeRule",
            "route/GET /items",
            "route/OPTIONS /items",
        ]
    );
    assert_eq!(
        unit_environment(&plan, "getAllItemsFunction")["NODE_ENV"]["value"],
        "development"
    );
    Ok(())
}

#[test]
fn build_env_variable_selects_production() -> Result<(), Box<dyn std::error::Error>> {
    let output = stacks()?
        .env("BUILD_ENV", "production")
        .env("STACK_NAME", "itemsProd")
        .arg("synth")
        .output()?;
    assert!(output.status.success(), "synth failed: {output:?}");
    let plan: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(plan["stack"]["name"], "itemsProd");
    assert_eq!(
        unit_environment(&plan, "importerFunction")["NODE_ENV"]["value"],
        "production"
    );
    let packaging = &plan["steps"][2]["action"]["unit"]["packaging"];
    let commands = packaging["pre-bundle"].as_array().map(Vec::len);
    assert_eq!(commands, Some(1), "unexpected packaging: {packaging}");
    Ok(())
}

#[test]
fn unknown_build_env_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let output = stacks()?.args(["synth", "--build-env", "staging"]).output()?;
    assert!(!output.status.success(), "expected failure: {output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("staging"), "unexpected stderr: {stderr}");
    Ok(())
}

#[test]
fn placeholder_credentials_warn_but_synthesise() -> Result<(), Box<dyn std::error::Error>> {
    let plan = synth_plan(&["--placeholder-credentials"])?;
    let env = unit_environment(&plan, "importerFunction");
    assert_eq!(env["LAMBDA_AWS_ACCESS_KEY_ID"]["value"], "anything");
    let codes: Vec<&str> = plan["warnings"]
        .as_array()
        .map(|warnings| warnings.iter().filter_map(|w| w["code"].as_str()).collect())
        .unwrap_or_default();
    assert!(!codes.is_empty());
    assert!(codes.iter().all(|code| *code == "STK400"), "codes: {codes:?}");
    Ok(())
}

#[test]
fn synth_writes_requested_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let out = temp_path("plan.json");
    let graph = temp_path("graph.json");
    let dot = temp_path("plan.dot");
    let output = stacks()?
        .arg("synth")
        .args(["--out", out.to_str().expect("path")])
        .args(["--graph", graph.to_str().expect("path")])
        .args(["--dot", dot.to_str().expect("path")])
        .output()?;
    assert!(output.status.success(), "synth failed: {output:?}");
    assert!(output.stdout.is_empty());

    let plan: Value = serde_json::from_str(&std::fs::read_to_string(&out)?)?;
    assert_eq!(plan["steps"].as_array().map(Vec::len), Some(8));
    let graph_json: Value = serde_json::from_str(&std::fs::read_to_string(&graph)?)?;
    assert_eq!(graph_json["resources"].as_array().map(Vec::len), Some(3));
    let dot_text = std::fs::read_to_string(&dot)?;
    assert!(dot_text.starts_with("digraph plan {"));

    for path in [out, graph, dot] {
        std::fs::remove_file(path).ok();
    }
    Ok(())
}

#[test]
fn schema_command_emits_both_documents() -> Result<(), Box<dyn std::error::Error>> {
    for (kind, title) in [
        ("graph", "Stack Resource Graph"),
        ("plan", "Stack Deployment Plan"),
    ] {
        let output = stacks()?.args(["schema", kind]).output()?;
        assert!(output.status.success(), "schema {kind} failed: {output:?}");
        let schema: Value = serde_json::from_slice(&output.stdout)?;
        assert!(schema["definitions"].is_object(), "{kind} schema lacks definitions");
        assert_eq!(schema["title"], title);
    }
    Ok(())
}

#[test]
fn stack_names_flow_into_the_plan() {
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig {
        cases: 8,
        ..ProptestConfig::default()
    });
    runner
        .run(&"[a-zA-Z][a-zA-Z0-9-]{0,15}", |name| {
            let plan = synth_plan(&["--stack-name", name.as_str()])
                .map_err(|err| TestCaseError::fail(err.to_string()))?;
            prop_assert_eq!(plan["stack"]["name"].as_str(), Some(name.as_str()));
            Ok(())
        })
        .expect("stack name property");
}
