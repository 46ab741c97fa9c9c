use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use clap::Args;
use host_inproc::{GatewayRequest, GatewayResponse, HostRuntime, InProcessBackend, UnitRegistry};
use serde::Serialize;
use serde_json::{Value, json};
use stack_core::{HttpMethod, ResourceId};
use stack_plan::{DeploymentPlan, PlanAction};
use tracing::info;

use crate::{StackArgs, synthesise};

#[derive(Args, Debug)]
pub struct DeployLocalArgs {
    #[command(flatten)]
    stack: StackArgs,
    /// Request to send through the local gateway, as `METHOD /path`. Repeatable; defaults
    /// to one request per declared route.
    #[arg(long = "request", value_name = "METHOD /PATH")]
    requests: Vec<String>,
    /// Schedule rule to fire after the requests. Repeatable.
    #[arg(long = "fire", value_name = "RULE")]
    fire: Vec<String>,
    /// Fire every rule due at this UTC time, formatted `YYYY-MM-DDTHH:MM`.
    #[arg(long, value_parser = parse_utc_minute)]
    at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize)]
struct LocalReport {
    stack: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    environments: BTreeMap<ResourceId, BTreeMap<String, String>>,
    responses: Vec<RouteOutcome>,
    schedules: Vec<ScheduleOutcome>,
}

#[derive(Debug, Serialize)]
struct RouteOutcome {
    request: String,
    #[serde(flatten)]
    response: GatewayResponse,
}

#[derive(Debug, Serialize)]
struct ScheduleOutcome {
    rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ScheduleOutcome {
    fn new<E: std::fmt::Display>(rule: String, result: Result<Value, E>) -> Self {
        match result {
            Ok(output) => Self {
                rule,
                output: Some(output),
                error: None,
            },
            Err(err) => Self {
                rule,
                output: None,
                error: Some(err.to_string()),
            },
        }
    }
}

pub fn run(args: DeployLocalArgs) -> Result<()> {
    let (_, plan) = synthesise(&args.stack)?;
    let units = echo_units(&plan)?;
    let requests = if args.requests.is_empty() {
        route_requests(&plan)
    } else {
        args.requests
            .iter()
            .map(|raw| parse_request(raw))
            .collect::<Result<Vec<_>>>()?
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let report = runtime.block_on(async {
        let backend = InProcessBackend::new();
        let host = HostRuntime::deploy(&backend, plan, units)
            .await
            .context("local deployment failed")?;

        let mut responses = Vec::with_capacity(requests.len());
        for (method, path) in requests {
            let request = format!("{method} {path}");
            let response = host.handle(GatewayRequest::new(method, path)).await;
            info!(%request, status = response.status, "request served");
            responses.push(RouteOutcome { request, response });
        }

        let mut schedules = Vec::new();
        for rule in &args.fire {
            schedules.push(ScheduleOutcome::new(rule.clone(), host.fire(rule).await));
        }
        if let Some(time) = &args.at {
            for (rule, result) in host.tick(time).await {
                schedules.push(ScheduleOutcome::new(rule, result));
            }
        }

        let provisioned = host.provisioned();
        Ok::<_, anyhow::Error>(LocalReport {
            stack: provisioned.stack.name.clone(),
            endpoint: provisioned.endpoint_url().map(str::to_string),
            environments: provisioned.environments.clone(),
            responses,
            schedules,
        })
    })?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Stand-in implementation for every compute unit: echoes its environment and event.
fn echo_units(plan: &DeploymentPlan) -> Result<UnitRegistry> {
    let mut units = UnitRegistry::new();
    for step in &plan.steps {
        if let PlanAction::CreateComputeUnit { resource, .. } = &step.action {
            let unit = resource.to_string();
            units.register_fn(resource.clone(), move |env, event| {
                Ok(json!({ "unit": unit, "environment": env, "event": event }))
            })?;
        }
    }
    Ok(units)
}

fn route_requests(plan: &DeploymentPlan) -> Vec<(HttpMethod, String)> {
    plan.steps
        .iter()
        .filter_map(|step| match &step.action {
            PlanAction::AddRoute { route } => Some((route.method, route.path.as_str().to_string())),
            _ => None,
        })
        .collect()
}

fn parse_request(raw: &str) -> Result<(HttpMethod, String)> {
    let (method, path) = raw
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(|| anyhow!("request `{raw}` must look like `METHOD /path`"))?;
    let method: HttpMethod = method.parse()?;
    let path = path.trim();
    if !path.starts_with('/') {
        return Err(anyhow!("request path `{path}` must start with `/`"));
    }
    Ok((method, path.to_string()))
}

const AT_FORMAT: &str = "%Y-%m-%dT%H:%M";

fn parse_utc_minute(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw, AT_FORMAT)
        .map_err(|err| format!("`{raw}` is not a `YYYY-MM-DDTHH:MM` time: {err}"))
}
