use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Environment handed to a compute unit on every invocation.
pub type EnvironmentMap = BTreeMap<String, String>;

pub mod unit {
    use super::*;
    use serde_json::Value;

    /// Canonical error type surfaced by compute units.
    #[derive(Debug, thiserror::Error)]
    pub enum UnitError {
        #[error("missing environment binding `{0}`")]
        MissingEnvironment(String),
        #[error("unit failed: {0}")]
        Failed(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }

    pub type UnitResult<T> = Result<T, UnitError>;

    /// Business logic deployed behind a routed or scheduled compute unit.
    ///
    /// Implementations receive the resolved environment bindings and the triggering event,
    /// and report success or failure; what happens inside is opaque to the stack.
    #[async_trait]
    pub trait ComputeUnit: Send + Sync {
        async fn invoke(&self, env: &EnvironmentMap, event: Value) -> UnitResult<Value>;
    }

    /// Look up a binding the unit cannot run without.
    pub fn require<'a>(env: &'a EnvironmentMap, key: &str) -> UnitResult<&'a str> {
        env.get(key)
            .map(String::as_str)
            .ok_or_else(|| UnitError::MissingEnvironment(key.to_string()))
    }

    /// Compute unit backed by a synchronous closure.
    pub struct FnUnit<F>(F);

    pub fn unit_fn<F>(handler: F) -> FnUnit<F>
    where
        F: Fn(&EnvironmentMap, Value) -> UnitResult<Value> + Send + Sync,
    {
        FnUnit(handler)
    }

    #[async_trait]
    impl<F> ComputeUnit for FnUnit<F>
    where
        F: Fn(&EnvironmentMap, Value) -> UnitResult<Value> + Send + Sync,
    {
        async fn invoke(&self, env: &EnvironmentMap, event: Value) -> UnitResult<Value> {
            (self.0)(env, event)
        }
    }

}

pub mod backend {
    use super::*;
    use stack_core::{
        AttributeRef, ComputeUnitSpec, EnvValue, ResourceAttribute, ResourceId, StackMetadata,
    };
    use stack_plan::DeploymentPlan;

    /// Identifier a backend assigned to one provisioned resource.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum ProvisionedResource {
        Table { table_name: String },
        ComputeUnit { function_arn: String },
        Gateway { endpoint_url: String },
    }

    impl ProvisionedResource {
        /// Value of `attribute`, when this resource exposes it.
        pub fn attribute(&self, attribute: ResourceAttribute) -> Option<&str> {
            match (self, attribute) {
                (ProvisionedResource::Table { table_name }, ResourceAttribute::TableName) => {
                    Some(table_name)
                }
                (
                    ProvisionedResource::ComputeUnit { function_arn },
                    ResourceAttribute::FunctionArn,
                ) => Some(function_arn),
                (
                    ProvisionedResource::Gateway { endpoint_url },
                    ResourceAttribute::EndpointUrl,
                ) => Some(endpoint_url),
                _ => None,
            }
        }
    }

    /// Everything a backend reports after applying a plan.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProvisionedStack {
        pub stack: StackMetadata,
        pub resources: BTreeMap<ResourceId, ProvisionedResource>,
        /// Resolved environment of every compute unit.
        pub environments: BTreeMap<ResourceId, EnvironmentMap>,
    }

    impl ProvisionedStack {
        pub fn new(stack: StackMetadata) -> Self {
            Self {
                stack,
                resources: BTreeMap::new(),
                environments: BTreeMap::new(),
            }
        }

        pub fn attribute(&self, reference: &AttributeRef) -> Option<&str> {
            self.resources
                .get(&reference.resource)
                .and_then(|resource| resource.attribute(reference.attribute))
        }

        pub fn environment(&self, unit: &ResourceId) -> Option<&EnvironmentMap> {
            self.environments.get(unit)
        }

        /// Endpoint of the stack's gateway, once provisioned.
        pub fn endpoint_url(&self) -> Option<&str> {
            self.resources.values().find_map(|resource| match resource {
                ProvisionedResource::Gateway { endpoint_url } => Some(endpoint_url.as_str()),
                _ => None,
            })
        }
    }

    /// Canonical error type surfaced by deployment backends.
    #[derive(Debug, thiserror::Error)]
    pub enum BackendError {
        #[error("unit `{unit}` binds `{key}` to `{reference}`, which is not provisioned")]
        Unresolved {
            unit: ResourceId,
            key: String,
            reference: String,
        },
        #[error("step `{step}` depends on `{missing}`, which has not been applied")]
        OutOfOrder { step: String, missing: String },
        #[error("provisioning failed: {0}")]
        Provisioning(#[from] anyhow::Error),
    }

    pub type BackendResult<T> = Result<T, BackendError>;

    /// Provisions a plan and reports the identifiers it assigned.
    #[async_trait]
    pub trait DeploymentBackend: Send + Sync {
        async fn deploy(&self, plan: &DeploymentPlan) -> BackendResult<ProvisionedStack>;
    }

    /// Resolve every environment binding of `spec` to a concrete string.
    pub fn resolve_environment<'a, F>(
        unit: &ResourceId,
        spec: &ComputeUnitSpec,
        lookup: F,
    ) -> BackendResult<EnvironmentMap>
    where
        F: Fn(&AttributeRef) -> Option<&'a str>,
    {
        spec.environment
            .iter()
            .map(|(key, value)| {
                let resolved = match value {
                    EnvValue::Literal { value } => value.clone(),
                    EnvValue::Ref(reference) => lookup(reference)
                        .map(str::to_string)
                        .ok_or_else(|| BackendError::Unresolved {
                            unit: unit.clone(),
                            key: key.clone(),
                            reference: reference.to_string(),
                        })?,
                };
                Ok((key.clone(), resolved))
            })
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use stack_core::ComputeUnitDefinition;

        use super::*;

        fn provisioned() -> ProvisionedStack {
            let mut stack = ProvisionedStack::new(StackMetadata::new("demo"));
            stack.resources.insert(
                "items".into(),
                ProvisionedResource::Table {
                    table_name: "items".into(),
                },
            );
            stack.resources.insert(
                "api".into(),
                ProvisionedResource::Gateway {
                    endpoint_url: "inproc://demo/api".into(),
                },
            );
            stack
        }

        fn unit_spec() -> ComputeUnitSpec {
            ComputeUnitDefinition::new("get-all.ts")
                .env("PRIMARY_KEY", EnvValue::literal("itemId"))
                .env(
                    "TABLE_NAME",
                    EnvValue::reference("items", ResourceAttribute::TableName),
                )
                .build("getAll")
                .expect("unit")
                .as_compute_unit()
                .cloned()
                .expect("compute unit spec")
        }

        #[test]
        fn references_resolve_to_provisioned_identifiers() {
            let stack = provisioned();
            let env = resolve_environment(&"getAll".into(), &unit_spec(), |reference| {
                stack.attribute(reference)
            })
            .expect("resolve");
            assert_eq!(env.get("TABLE_NAME").map(String::as_str), Some("items"));
            assert_eq!(env.get("PRIMARY_KEY").map(String::as_str), Some("itemId"));
            assert_eq!(stack.endpoint_url(), Some("inproc://demo/api"));
        }

        #[test]
        fn unprovisioned_reference_is_reported() {
            let stack = ProvisionedStack::new(StackMetadata::new("demo"));
            let err = resolve_environment(&"getAll".into(), &unit_spec(), |reference| {
                stack.attribute(reference)
            })
            .expect_err("nothing provisioned");
            assert_eq!(
                err.to_string(),
                "unit `getAll` binds `TABLE_NAME` to `items.tableName`, which is not provisioned"
            );
        }

        #[test]
        fn attributes_only_resolve_on_their_owner_kind() {
            let table = ProvisionedResource::Table {
                table_name: "items".into(),
            };
            assert_eq!(table.attribute(ResourceAttribute::TableName), Some("items"));
            assert_eq!(table.attribute(ResourceAttribute::FunctionArn), None);
        }
    }
}

pub use backend::{
    BackendError, BackendResult, DeploymentBackend, ProvisionedResource, ProvisionedStack,
    resolve_environment,
};
pub use unit::{ComputeUnit, UnitError, UnitResult, unit_fn};
