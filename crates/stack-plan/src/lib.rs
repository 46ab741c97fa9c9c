//! Validation and dependency-ordered assembly of resource graphs into deployment plans.

mod order;
mod plan;
mod validate;

pub use plan::{
    DEPLOYMENT_PLAN_SCHEMA_FILE, DeploymentPlan, PlanAction, PlanStep, PlanWarning, StepId,
    deployment_plan_schema,
};
pub use validate::{ValidatedGraph, validate};

use stack_core::{AssemblyError, ResourceGraph};
use tracing::{debug, info, instrument, warn};

/// Validate `graph` and order it into a plan.
///
/// Stores come first, then compute units, then grants, then schedules and routes; ties are
/// broken by declaration order. Any validation error or dependency cycle aborts assembly
/// without a partial plan.
#[instrument(skip_all, fields(stack = %graph.stack().name))]
pub fn assemble(graph: &ResourceGraph) -> Result<DeploymentPlan, AssemblyError> {
    let validated = validate(graph).map_err(|diagnostics| {
        debug!(count = diagnostics.len(), "graph rejected");
        AssemblyError::Rejected { diagnostics }
    })?;
    for diagnostic in validated.warnings() {
        warn!(code = diagnostic.code.code, "{}", diagnostic.message);
    }

    let steps = order::order_steps(validated.graph())?;
    let plan = DeploymentPlan {
        stack: graph.stack().clone(),
        gateway: graph.gateway().cloned(),
        steps,
        warnings: validated.warnings().iter().map(PlanWarning::from).collect(),
    };
    info!(steps = plan.steps.len(), warnings = plan.warnings.len(), "assembled plan");
    Ok(plan)
}
