use std::process::Command;

use assert_cmd::prelude::*;
use serde_json::Value;

fn deploy_local(args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
    let output = Command::cargo_bin("stacks")?
        .env_remove("BUILD_ENV")
        .env_remove("STACK_NAME")
        .args(["deploy", "local"])
        .args(args)
        .output()?;
    assert!(
        output.status.success(),
        "stacks deploy local failed: status={:?}, stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn default_run_exercises_every_route() -> Result<(), Box<dyn std::error::Error>> {
    let report = deploy_local(&[])?;
    assert_eq!(report["stack"], "springfieldMeetupApi");
    assert_eq!(report["endpoint"], "inproc://springfieldMeetupApi/itemsApi");

    let env = &report["environments"]["getAllItemsFunction"];
    assert_eq!(env["TABLE_NAME"], "items");
    assert_eq!(env["PRIMARY_KEY"], "itemId");
    assert_eq!(env["NODE_ENV"], "development");

    let responses = report["responses"].as_array().expect("responses");
    assert_eq!(responses.len(), 2);

    let get = &responses[0];
    assert_eq!(get["request"], "GET /items");
    assert_eq!(get["status"], 200);
    assert_eq!(get["body"]["unit"], "getAllItemsFunction");
    assert_eq!(get["body"]["event"]["httpMethod"], "GET");
    assert_eq!(get["body"]["environment"]["TABLE_NAME"], "items");

    let preflight = &responses[1];
    assert_eq!(preflight["request"], "OPTIONS /items");
    assert_eq!(preflight["status"], 200);
    assert_eq!(preflight["headers"]["Access-Control-Allow-Origin"], "*");
    assert_eq!(preflight["body"], Value::Null);
    Ok(())
}

#[test]
fn unmatched_requests_get_gateway_errors() -> Result<(), Box<dyn std::error::Error>> {
    let report = deploy_local(&["--request", "POST /items", "--request", "GET /users"])?;
    let responses = report["responses"].as_array().expect("responses");
    assert_eq!(responses[0]["status"], 405);
    assert_eq!(responses[0]["headers"]["Allow"], "GET,OPTIONS");
    assert_eq!(responses[1]["status"], 404);
    Ok(())
}

#[test]
fn schedules_fire_on_demand_and_when_due() -> Result<(), Box<dyn std::error::Error>> {
    let report = deploy_local(&[
        "--request",
        "GET /items",
        "--fire",
        "importerEventBridgeRule",
        "--at",
        "2026-10-16T02:00",
    ])?;
    let schedules = report["schedules"].as_array().expect("schedules");
    assert_eq!(schedules.len(), 2);
    for outcome in schedules {
        assert_eq!(outcome["rule"], "importerEventBridgeRule");
        assert_eq!(outcome["output"]["unit"], "importerFunction");
        assert_eq!(outcome["output"]["event"]["source"], "schedule");
    }

    let quiet = deploy_local(&["--request", "GET /items", "--at", "2026-10-16T03:00"])?;
    assert_eq!(quiet["schedules"], Value::Array(Vec::new()));
    Ok(())
}

#[test]
fn early_calendar_years_are_scheduled() -> Result<(), Box<dyn std::error::Error>> {
    let report = deploy_local(&["--request", "GET /items", "--at", "0000-01-15T02:00"])?;
    let schedules = report["schedules"].as_array().expect("schedules");
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0]["rule"], "importerEventBridgeRule");
    Ok(())
}

#[test]
fn unknown_rules_are_reported_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let report = deploy_local(&["--request", "GET /items", "--fire", "hourly"])?;
    let outcome = &report["schedules"][0];
    assert_eq!(outcome["rule"], "hourly");
    assert!(outcome.get("output").is_none());
    assert!(
        outcome["error"].as_str().is_some_and(|err| err.contains("hourly")),
        "unexpected outcome: {outcome}"
    );
    Ok(())
}

#[test]
fn malformed_times_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let output = Command::cargo_bin("stacks")?
        .args(["deploy", "local", "--at", "tomorrow"])
        .output()?;
    assert!(!output.status.success(), "expected failure: {output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("YYYY-MM-DDTHH:MM"), "unexpected stderr: {stderr}");
    Ok(())
}
