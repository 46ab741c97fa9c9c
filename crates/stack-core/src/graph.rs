use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BindingError, ConfigurationError, StackResult};
use crate::ir::{
    ApiRoute, Edge, EnvironmentBinding, GatewaySpec, Grant, Resource, ResourceConfig, ResourceId,
    ResourceKind, ScheduleRule, StackMetadata,
};

/// Declared resources and the derived edges between them.
///
/// The graph is the explicit build context: every definition and binder call takes it by
/// mutable reference, and nothing else holds stack state. Nodes and edges are append-only;
/// ordering is left to the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceGraph {
    stack: StackMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gateway: Option<GatewaySpec>,
    #[serde(default)]
    resources: Vec<Resource>,
    #[serde(default)]
    edges: Vec<Edge>,
}

impl ResourceGraph {
    /// Create an empty graph for the named stack.
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack: StackMetadata::new(stack_name),
            gateway: None,
            resources: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn stack(&self) -> &StackMetadata {
        &self.stack
    }

    pub fn gateway(&self) -> Option<&GatewaySpec> {
        self.gateway.as_ref()
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Edges in declaration order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|resource| &resource.id == id)
    }

    /// Kind of whatever owns `id`, gateway included.
    pub fn kind_of(&self, id: &ResourceId) -> Option<ResourceKind> {
        if self.gateway.as_ref().is_some_and(|gateway| &gateway.id == id) {
            return Some(ResourceKind::Gateway);
        }
        self.resource(id).map(Resource::kind)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.kind_of(id).is_some()
    }

    pub fn grants(&self) -> impl Iterator<Item = &Grant> {
        self.edges.iter().filter_map(|edge| match edge {
            Edge::Grant(grant) => Some(grant),
            _ => None,
        })
    }

    pub fn environment_bindings(&self) -> impl Iterator<Item = &EnvironmentBinding> {
        self.edges.iter().filter_map(|edge| match edge {
            Edge::Environment(binding) => Some(binding),
            _ => None,
        })
    }

    pub fn schedules(&self) -> impl Iterator<Item = &ScheduleRule> {
        self.edges.iter().filter_map(|edge| match edge {
            Edge::Schedule(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn routes(&self) -> impl Iterator<Item = &ApiRoute> {
        self.edges.iter().filter_map(|edge| match edge {
            Edge::Route(route) => Some(route),
            _ => None,
        })
    }

    /// Register a resource.
    ///
    /// Compute units referencing other resources in their environment get one
    /// environment edge per reference; every referenced resource must already exist.
    pub fn register(&mut self, resource: Resource) -> StackResult<ResourceId> {
        if let Some(reason) = resource.id.problem() {
            return Err(ConfigurationError::InvalidDefinition {
                field: "resource id",
                reason,
            }
            .into());
        }
        if self.contains(&resource.id) {
            return Err(ConfigurationError::DuplicateResource(resource.id).into());
        }

        let bindings: Vec<Edge> = match &resource.config {
            ResourceConfig::ComputeUnit(unit) => unit
                .references()
                .map(|(key, target)| {
                    Edge::Environment(EnvironmentBinding {
                        unit: resource.id.clone(),
                        key: key.to_string(),
                        target: target.clone(),
                    })
                })
                .collect(),
            ResourceConfig::Table(_) => Vec::new(),
        };

        // Check references before mutating so a failed registration leaves no trace.
        for binding in &bindings {
            for reference in binding.references() {
                if reference.id == &resource.id {
                    if reference.expected != resource.kind() {
                        return Err(BindingError::KindMismatch {
                            id: resource.id.clone(),
                            role: reference.role,
                            expected: reference.expected,
                            found: resource.kind(),
                        }
                        .into());
                    }
                    continue;
                }
                self.check_reference(reference.id, reference.expected, reference.role)?;
            }
        }

        let id = resource.id.clone();
        debug!(resource = %id, kind = %resource.kind(), "registered resource");
        self.resources.push(resource);
        self.edges.extend(bindings);
        Ok(id)
    }

    /// Append an edge after checking that all of its endpoints exist with the right kind.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), BindingError> {
        self.check_edge(&edge)?;
        self.edges.push(edge);
        Ok(())
    }

    /// Check an edge's endpoints without adding it.
    pub fn check_edge(&self, edge: &Edge) -> Result<(), BindingError> {
        for reference in edge.references() {
            self.check_reference(reference.id, reference.expected, reference.role)?;
        }
        Ok(())
    }

    fn check_reference(
        &self,
        id: &ResourceId,
        expected: ResourceKind,
        role: &'static str,
    ) -> Result<(), BindingError> {
        match self.kind_of(id) {
            None => Err(BindingError::UnknownResource {
                id: id.clone(),
                role,
            }),
            Some(found) if found != expected => Err(BindingError::KindMismatch {
                id: id.clone(),
                role,
                expected,
                found,
            }),
            Some(_) => Ok(()),
        }
    }

    pub(crate) fn declare_gateway(&mut self, gateway: GatewaySpec) -> StackResult<ResourceId> {
        if let Some(existing) = &self.gateway {
            return Err(ConfigurationError::GatewayAlreadyDeclared(existing.id.clone()).into());
        }
        if let Some(reason) = gateway.id.problem() {
            return Err(ConfigurationError::InvalidDefinition {
                field: "gateway id",
                reason,
            }
            .into());
        }
        if self.contains(&gateway.id) {
            return Err(ConfigurationError::DuplicateResource(gateway.id).into());
        }
        let id = gateway.id.clone();
        self.gateway = Some(gateway);
        Ok(id)
    }

    pub(crate) fn grant_mut(
        &mut self,
        unit: &ResourceId,
        store: &ResourceId,
    ) -> Option<&mut Grant> {
        self.edges.iter_mut().find_map(|edge| match edge {
            Edge::Grant(grant) if &grant.unit == unit && &grant.store == store => Some(grant),
            _ => None,
        })
    }
}
