//! In-process host: deploys a plan in memory and serves its routes and schedules locally.

mod backend;

use std::collections::BTreeMap;
use std::sync::Arc;

use capabilities::{
    BackendError, ComputeUnit, DeploymentBackend, EnvironmentMap, ProvisionedStack, UnitError,
    UnitResult, unit_fn,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use stack_core::{
    BindingError, CronExpression, HttpMethod, Integration, ResourceId, RoutePath, ScheduleRule,
};
use stack_plan::{DeploymentPlan, PlanAction};
use tracing::{debug, info, warn};

pub use backend::InProcessBackend;

/// Failures surfaced by the in-process host.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("compute unit `{0}` is registered twice")]
    DuplicateUnit(ResourceId),
    #[error("no implementation registered for compute unit(s): {}", .units.join(", "))]
    MissingUnits { units: Vec<String> },
    #[error("compute unit `{0}` is not part of the deployment")]
    UnknownUnit(ResourceId),
    #[error("schedule rule `{0}` is not part of the deployment")]
    UnknownRule(String),
    #[error("schedule rule is malformed: {0}")]
    Schedule(#[from] BindingError),
    #[error("compute unit `{unit}` failed: {source}")]
    Unit {
        unit: ResourceId,
        #[source]
        source: UnitError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Implementations for the compute units a plan declares.
#[derive(Default, Clone)]
pub struct UnitRegistry {
    units: BTreeMap<ResourceId, Arc<dyn ComputeUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: impl Into<ResourceId>,
        unit: Arc<dyn ComputeUnit>,
    ) -> Result<(), HostError> {
        let id = id.into();
        if self.units.contains_key(&id) {
            return Err(HostError::DuplicateUnit(id));
        }
        self.units.insert(id, unit);
        Ok(())
    }

    /// Register a synchronous closure as the implementation of `id`.
    pub fn register_fn<F>(&mut self, id: impl Into<ResourceId>, handler: F) -> Result<(), HostError>
    where
        F: Fn(&EnvironmentMap, JsonValue) -> UnitResult<JsonValue> + Send + Sync + 'static,
    {
        self.register(id, Arc::new(unit_fn(handler)))
    }

    pub fn get(&self, id: &ResourceId) -> Option<Arc<dyn ComputeUnit>> {
        self.units.get(id).cloned()
    }
}

/// What caused a compute unit invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Route { key: String },
    Schedule { rule: String },
    Direct,
}

/// Invocation context handed to environment plugins.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub unit: ResourceId,
    pub trigger: Trigger,
}

/// Environment plugins observe unit invocations to inject environment-specific behaviour
/// (tracing, recording, fault injection in tests).
pub trait EnvironmentPlugin: Send + Sync {
    /// Invoked before the unit runs.
    fn before_invoke(&self, _invocation: &Invocation) {}

    /// Invoked once the unit finishes (success or failure).
    fn after_invoke(&self, _invocation: &Invocation, _outcome: Result<&JsonValue, &UnitError>) {}
}

/// HTTP request routed through the local gateway.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: JsonValue,
}

impl GatewayRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: JsonValue::Null,
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = body;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: JsonValue,
}

impl GatewayResponse {
    fn json(status: u16, body: JsonValue) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A deployed plan wired to its unit implementations.
#[derive(Clone)]
pub struct HostRuntime {
    plan: Arc<DeploymentPlan>,
    provisioned: Arc<ProvisionedStack>,
    units: Arc<UnitRegistry>,
    schedules: Arc<Vec<(ScheduleRule, CronExpression)>>,
    plugins: Arc<Vec<Arc<dyn EnvironmentPlugin>>>,
}

impl HostRuntime {
    /// Deploy `plan` through `backend` and bind the result to `units`.
    pub async fn deploy(
        backend: &dyn DeploymentBackend,
        plan: DeploymentPlan,
        units: UnitRegistry,
    ) -> Result<Self, HostError> {
        Self::preflight(&plan, &units)?;
        let provisioned = backend.deploy(&plan).await?;

        let schedules = plan
            .steps
            .iter()
            .filter_map(|step| match &step.action {
                PlanAction::AttachSchedule { rule } => Some(rule),
                _ => None,
            })
            .map(|rule| CronExpression::parse(&rule.expression).map(|cron| (rule.clone(), cron)))
            .collect::<Result<Vec<_>, BindingError>>()?;

        info!(
            stack = %plan.stack.name,
            schedules = schedules.len(),
            endpoint = provisioned.endpoint_url().unwrap_or("-"),
            "host runtime ready"
        );
        Ok(Self {
            plan: Arc::new(plan),
            provisioned: Arc::new(provisioned),
            units: Arc::new(units),
            schedules: Arc::new(schedules),
            plugins: Arc::new(Vec::new()),
        })
    }

    /// Attach environment plugins.
    pub fn with_plugins(mut self, plugins: Vec<Arc<dyn EnvironmentPlugin>>) -> Self {
        self.plugins = Arc::new(plugins);
        self
    }

    /// Fail fast if a compute unit in the plan has no implementation.
    pub fn preflight(plan: &DeploymentPlan, units: &UnitRegistry) -> Result<(), HostError> {
        let missing: Vec<String> = plan
            .steps
            .iter()
            .filter_map(|step| match &step.action {
                PlanAction::CreateComputeUnit { resource, .. } if units.get(resource).is_none() => {
                    Some(resource.to_string())
                }
                _ => None,
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HostError::MissingUnits { units: missing })
        }
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    pub fn provisioned(&self) -> &ProvisionedStack {
        &self.provisioned
    }

    /// Invoke `unit` with its resolved environment.
    pub async fn invoke(
        &self,
        unit: &ResourceId,
        event: JsonValue,
        trigger: Trigger,
    ) -> Result<JsonValue, HostError> {
        let implementation = self
            .units
            .get(unit)
            .ok_or_else(|| HostError::UnknownUnit(unit.clone()))?;
        let env = self
            .provisioned
            .environment(unit)
            .ok_or_else(|| HostError::UnknownUnit(unit.clone()))?;

        let invocation = Invocation {
            unit: unit.clone(),
            trigger,
        };
        for plugin in self.plugins.iter() {
            plugin.before_invoke(&invocation);
        }
        let result = implementation.invoke(env, event).await;
        for plugin in self.plugins.iter() {
            plugin.after_invoke(&invocation, result.as_ref());
        }

        result.map_err(|source| HostError::Unit {
            unit: unit.clone(),
            source,
        })
    }

    /// Serve one request the way the deployed gateway would.
    ///
    /// Literal path segments outrank `{param}` segments, which outrank a greedy `{param+}`;
    /// equally specific routes keep plan order.
    pub async fn handle(&self, request: GatewayRequest) -> GatewayResponse {
        let mut candidates: Vec<_> = self
            .plan
            .steps
            .iter()
            .filter_map(|step| match &step.action {
                PlanAction::AddRoute { route } if route.path.matches(&request.path) => Some(route),
                _ => None,
            })
            .collect();
        if candidates.is_empty() {
            return GatewayResponse::json(404, json!({ "message": "Not Found" }));
        }
        candidates.sort_by_key(|route| path_specificity(&route.path));

        let Some(route) = candidates
            .iter()
            .find(|route| route.method == request.method)
        else {
            let mut allowed: Vec<&str> = Vec::new();
            for route in &candidates {
                if !allowed.contains(&route.method.as_str()) {
                    allowed.push(route.method.as_str());
                }
            }
            let mut response =
                GatewayResponse::json(405, json!({ "message": "Method Not Allowed" }));
            response
                .headers
                .insert("Allow".to_string(), allowed.join(","));
            return response;
        };

        match &route.integration {
            Integration::Mock(mock) => GatewayResponse {
                status: mock.status_code,
                headers: mock.headers.clone(),
                body: JsonValue::Null,
            },
            Integration::ComputeBacked { unit } => {
                let event = json!({
                    "httpMethod": request.method.as_str(),
                    "path": request.path,
                    "resource": route.path.as_str(),
                    "body": request.body,
                });
                let key = route.key();
                match self.invoke(unit, event, Trigger::Route { key }).await {
                    Ok(body) => GatewayResponse::json(200, body),
                    Err(err) => {
                        warn!(route = %route.key(), error = %err, "integration failed");
                        GatewayResponse::json(502, json!({ "message": err.to_string() }))
                    }
                }
            }
        }
    }

    /// Rules whose expression matches `time`, in plan order.
    pub fn due(&self, time: &NaiveDateTime) -> Vec<&ScheduleRule> {
        self.schedules
            .iter()
            .filter(|(_, cron)| cron.matches(time))
            .map(|(rule, _)| rule)
            .collect()
    }

    /// Fire `rule_id` now, regardless of its expression.
    pub async fn fire(&self, rule_id: &str) -> Result<JsonValue, HostError> {
        let (rule, _) = self
            .schedules
            .iter()
            .find(|(rule, _)| rule.id == rule_id)
            .ok_or_else(|| HostError::UnknownRule(rule_id.to_string()))?;
        debug!(rule = %rule.id, target = %rule.target, "firing schedule");
        let event = json!({ "source": "schedule", "rule": rule.id });
        self.invoke(
            &rule.target,
            event,
            Trigger::Schedule {
                rule: rule.id.clone(),
            },
        )
        .await
    }

    /// Fire every rule due at `time`.
    pub async fn tick(&self, time: &NaiveDateTime) -> Vec<(String, Result<JsonValue, HostError>)> {
        let mut outcomes = Vec::new();
        for rule in self.due(time) {
            outcomes.push((rule.id.clone(), self.fire(&rule.id).await));
        }
        outcomes
    }
}

/// Sort key for matching routes: greedy paths last, then fewer parameters first.
fn path_specificity(path: &RoutePath) -> (bool, usize) {
    let greedy = path.segments().last().is_some_and(|segment| segment.ends_with("+}"));
    let parameters = path
        .segments()
        .filter(|segment| segment.starts_with('{'))
        .count();
    (greedy, parameters)
}
