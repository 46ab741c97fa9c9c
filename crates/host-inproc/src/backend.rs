use std::collections::HashSet;

use async_trait::async_trait;
use capabilities::{
    BackendError, BackendResult, DeploymentBackend, ProvisionedResource, ProvisionedStack,
    resolve_environment,
};
use stack_plan::{DeploymentPlan, PlanAction};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Deployment backend that "provisions" a plan in memory.
///
/// Identifiers are derived from the stack name and resource ids, so the same plan always
/// provisions to the same identifiers. Each deploy replaces the previous deployment wholesale.
#[derive(Debug, Default)]
pub struct InProcessBackend {
    current: RwLock<Option<ProvisionedStack>>,
}

impl InProcessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent successful deployment.
    pub async fn current(&self) -> Option<ProvisionedStack> {
        self.current.read().await.clone()
    }
}

#[async_trait]
impl DeploymentBackend for InProcessBackend {
    #[instrument(skip_all, fields(stack = %plan.stack.name, steps = plan.steps.len()))]
    async fn deploy(&self, plan: &DeploymentPlan) -> BackendResult<ProvisionedStack> {
        let stack_name = plan.stack.name.as_str();
        let mut provisioned = ProvisionedStack::new(plan.stack.clone());
        let mut applied = HashSet::new();
        let mut pending_routes = plan
            .steps
            .iter()
            .filter(|step| matches!(step.action, PlanAction::AddRoute { .. }))
            .count();

        // The endpoint is published once every route is in place.
        let publish_endpoint = |provisioned: &mut ProvisionedStack| {
            if let Some(gateway) = &plan.gateway {
                provisioned.resources.insert(
                    gateway.id.clone(),
                    ProvisionedResource::Gateway {
                        endpoint_url: format!("inproc://{stack_name}/{}", gateway.id),
                    },
                );
            }
        };
        if pending_routes == 0 {
            publish_endpoint(&mut provisioned);
        }

        for step in &plan.steps {
            if let Some(missing) = step
                .depends_on
                .iter()
                .find(|dependency| !applied.contains(*dependency))
            {
                return Err(BackendError::OutOfOrder {
                    step: step.id.to_string(),
                    missing: missing.to_string(),
                });
            }

            match &step.action {
                PlanAction::CreateStore { resource, table } => {
                    let table_name = table
                        .table_name
                        .clone()
                        .unwrap_or_else(|| format!("{stack_name}-{resource}"));
                    debug!(%resource, %table_name, "created store");
                    provisioned
                        .resources
                        .insert(resource.clone(), ProvisionedResource::Table { table_name });
                }
                PlanAction::CreateComputeUnit { resource, unit } => {
                    let environment = resolve_environment(resource, unit, |reference| {
                        provisioned.attribute(reference)
                    })?;
                    let function_arn = format!("arn:inproc:function:{stack_name}:{resource}");
                    debug!(
                        %resource,
                        %function_arn,
                        keys = environment.len(),
                        "created compute unit"
                    );
                    provisioned.environments.insert(resource.clone(), environment);
                    provisioned.resources.insert(
                        resource.clone(),
                        ProvisionedResource::ComputeUnit { function_arn },
                    );
                }
                PlanAction::GrantAccess { grant, actions } => {
                    debug!(unit = %grant.unit, store = %grant.store, ?actions, "granted access");
                }
                PlanAction::AttachSchedule { rule } => {
                    debug!(rule = %rule.id, target = %rule.target, "attached schedule");
                }
                PlanAction::AddRoute { route } => {
                    debug!(route = %route.key(), "added route");
                    pending_routes -= 1;
                    if pending_routes == 0 {
                        publish_endpoint(&mut provisioned);
                    }
                }
            }
            applied.insert(&step.id);
        }

        info!(resources = provisioned.resources.len(), "deployment applied");
        *self.current.write().await = Some(provisioned.clone());
        Ok(provisioned)
    }
}
