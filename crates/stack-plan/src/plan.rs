use std::fmt;

use schemars::JsonSchema;
use schemars::schema::RootSchema;
use serde::{Deserialize, Serialize};
use stack_core::{
    ApiRoute, ComputeUnitSpec, Diagnostic, GatewaySpec, Grant, ResourceId, ScheduleRule,
    StackMetadata, TableSpec,
};

pub const DEPLOYMENT_PLAN_SCHEMA_FILE: &str = "deployment_plan.schema.json";

/// Stable identifier of a plan step, e.g. `unit/getAll` or `route/GET /items`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn store(id: &ResourceId) -> Self {
        Self(format!("store/{id}"))
    }

    pub fn unit(id: &ResourceId) -> Self {
        Self(format!("unit/{id}"))
    }

    pub fn grant(unit: &ResourceId, store: &ResourceId) -> Self {
        Self(format!("grant/{unit}/{store}"))
    }

    pub fn schedule(rule_id: &str) -> Self {
        Self(format!("schedule/{rule_id}"))
    }

    pub fn route(route: &ApiRoute) -> Self {
        Self(format!("route/{}", route.key()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a deployment backend must do for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    CreateStore {
        resource: ResourceId,
        table: TableSpec,
    },
    CreateComputeUnit {
        resource: ResourceId,
        unit: ComputeUnitSpec,
    },
    GrantAccess {
        grant: Grant,
        /// Concrete actions the permission set expands to.
        actions: Vec<String>,
    },
    AttachSchedule {
        rule: ScheduleRule,
    },
    AddRoute {
        route: ApiRoute,
    },
}

impl PlanAction {
    /// Short label used in logs and DOT output.
    pub fn label(&self) -> &'static str {
        match self {
            PlanAction::CreateStore { .. } => "create store",
            PlanAction::CreateComputeUnit { .. } => "create compute unit",
            PlanAction::GrantAccess { .. } => "grant access",
            PlanAction::AttachSchedule { .. } => "attach schedule",
            PlanAction::AddRoute { .. } => "add route",
        }
    }
}

/// One ordered step of a plan. Every dependency precedes the step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanStep {
    pub id: StepId,
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    pub action: PlanAction,
}

/// Non-fatal finding carried alongside a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanWarning {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl From<&Diagnostic> for PlanWarning {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            code: diagnostic.code.code.to_string(),
            message: diagnostic.message.clone(),
            location: diagnostic.location.clone(),
        }
    }
}

/// Ordered, immutable output of assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentPlan {
    pub stack: StackMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewaySpec>,
    pub steps: Vec<PlanStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PlanWarning>,
}

impl DeploymentPlan {
    pub fn step(&self, id: &StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|step| &step.id == id)
    }

    /// Position of `id` in the plan.
    pub fn position(&self, id: &StepId) -> Option<usize> {
        self.steps.iter().position(|step| &step.id == id)
    }

    pub fn step_ids(&self) -> impl Iterator<Item = &StepId> {
        self.steps.iter().map(|step| &step.id)
    }
}

pub fn deployment_plan_schema() -> RootSchema {
    stack_core::schema::annotate(
        schemars::schema_for!(DeploymentPlan),
        "https://stacks.dev/schemas/deployment_plan.schema.json",
        "Stack Deployment Plan",
        "Dependency-ordered steps a deployment backend applies to provision a stack.",
    )
}
