//! Value builders for the resources a stack declares.

use std::collections::BTreeMap;

use crate::error::ConfigurationError;
use crate::ir::{
    AttributeType, ComputeUnitSpec, EnvValue, KeyAttribute, PackagingPhase, PackagingSteps,
    RemovalPolicy, Resource, ResourceConfig, ResourceId, Runtime, TableSpec,
};

/// Builder for a key-value table.
#[derive(Debug, Clone)]
pub struct StoreDefinition {
    partition_key: KeyAttribute,
    table_name: Option<String>,
    removal_policy: RemovalPolicy,
}

impl StoreDefinition {
    /// Start a table keyed by `name` of type `attribute_type`.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            partition_key: KeyAttribute {
                name: name.into(),
                attribute_type,
            },
            table_name: None,
            removal_policy: RemovalPolicy::default(),
        }
    }

    /// Pin the physical table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    /// Produce the table resource registered under `id`.
    pub fn build(self, id: impl Into<ResourceId>) -> Result<Resource, ConfigurationError> {
        if self.partition_key.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidDefinition {
                field: "partition key",
                reason: "name cannot be empty".to_string(),
            });
        }
        if let Some(name) = &self.table_name {
            if name.trim().is_empty() {
                return Err(ConfigurationError::InvalidDefinition {
                    field: "table name",
                    reason: "name cannot be empty when set".to_string(),
                });
            }
        }
        Ok(Resource::new(
            id,
            ResourceConfig::Table(TableSpec {
                partition_key: self.partition_key,
                table_name: self.table_name,
                removal_policy: self.removal_policy,
            }),
        ))
    }
}

/// Builder for a compute unit.
///
/// Environment entries are collected in declaration order and checked for duplicate keys
/// when the unit is built; after that the environment is fixed.
#[derive(Debug, Clone)]
pub struct ComputeUnitDefinition {
    entry: String,
    handler: String,
    runtime: Runtime,
    environment: Vec<(String, EnvValue)>,
    packaging: PackagingSteps,
    deps_lock_file: Option<String>,
}

impl ComputeUnitDefinition {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            handler: "handler".to_string(),
            runtime: Runtime::default(),
            environment: Vec::new(),
            packaging: PackagingSteps::new(),
            deps_lock_file: None,
        }
    }

    pub fn handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn deps_lock_file(mut self, path: impl Into<String>) -> Self {
        self.deps_lock_file = Some(path.into());
        self
    }

    /// Add one environment binding.
    pub fn env(mut self, key: impl Into<String>, value: EnvValue) -> Self {
        self.environment.push((key.into(), value));
        self
    }

    /// Add a shared base environment.
    pub fn environment<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, EnvValue)>,
        K: Into<String>,
    {
        self.environment
            .extend(entries.into_iter().map(|(key, value)| (key.into(), value)));
        self
    }

    /// Append a command to a packaging phase.
    pub fn packaging_step(mut self, phase: PackagingPhase, command: impl Into<String>) -> Self {
        self.packaging.push(phase, command);
        self
    }

    /// Append several commands to a packaging phase, preserving their order.
    pub fn packaging_steps<I, C>(mut self, phase: PackagingPhase, commands: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        for command in commands {
            self.packaging.push(phase, command);
        }
        self
    }

    /// Produce the compute unit resource registered under `id`.
    pub fn build(self, id: impl Into<ResourceId>) -> Result<Resource, ConfigurationError> {
        if self.entry.trim().is_empty() {
            return Err(ConfigurationError::InvalidDefinition {
                field: "entry",
                reason: "entry reference cannot be empty".to_string(),
            });
        }
        if self.handler.trim().is_empty() {
            return Err(ConfigurationError::InvalidDefinition {
                field: "handler",
                reason: "handler cannot be empty".to_string(),
            });
        }

        let mut environment = BTreeMap::new();
        for (key, value) in self.environment {
            if key.trim().is_empty() {
                return Err(ConfigurationError::InvalidDefinition {
                    field: "environment key",
                    reason: "keys cannot be empty".to_string(),
                });
            }
            if environment.contains_key(&key) {
                return Err(ConfigurationError::DuplicateEnvironmentKey { key });
            }
            environment.insert(key, value);
        }

        Ok(Resource::new(
            id,
            ResourceConfig::ComputeUnit(ComputeUnitSpec {
                entry: self.entry,
                handler: self.handler,
                runtime: self.runtime,
                environment,
                packaging: self.packaging,
                deps_lock_file: self.deps_lock_file,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ResourceAttribute, ResourceKind};

    #[test]
    fn store_definition_defaults_to_retain() {
        let resource = StoreDefinition::new("itemId", AttributeType::String)
            .build("items")
            .expect("build store");
        assert_eq!(resource.kind(), ResourceKind::Table);
        let table = resource.as_table().expect("table config");
        assert_eq!(table.removal_policy, RemovalPolicy::Retain);
        assert_eq!(table.partition_key.name, "itemId");
        assert!(table.table_name.is_none());
    }

    #[test]
    fn store_definition_rejects_blank_partition_key() {
        let err = StoreDefinition::new("  ", AttributeType::String)
            .build("items")
            .expect_err("blank key should fail");
        assert!(matches!(
            err,
            ConfigurationError::InvalidDefinition {
                field: "partition key",
                ..
            }
        ));
    }

    #[test]
    fn compute_unit_rejects_duplicate_environment_keys() {
        let err = ComputeUnitDefinition::new("lambdas/get-all.ts")
            .env("PRIMARY_KEY", EnvValue::literal("itemId"))
            .environment([("PRIMARY_KEY", EnvValue::literal("other"))])
            .build("getAll")
            .expect_err("duplicate key should fail");
        assert_eq!(
            err,
            ConfigurationError::DuplicateEnvironmentKey {
                key: "PRIMARY_KEY".to_string()
            }
        );
    }

    #[test]
    fn compute_unit_keeps_packaging_order_per_phase() {
        let resource = ComputeUnitDefinition::new("lambdas/importer.ts")
            .runtime(Runtime::Nodejs18)
            .packaging_step(PackagingPhase::PreBundle, "cp {input_dir}/key {output_dir}")
            .packaging_step(PackagingPhase::PreBundle, "cp {input_dir}/.env {output_dir}")
            .env(
                "TABLE_NAME",
                EnvValue::reference("items", ResourceAttribute::TableName),
            )
            .build("importer")
            .expect("build unit");

        let unit = resource.as_compute_unit().expect("compute unit config");
        assert_eq!(
            unit.packaging.commands(PackagingPhase::PreBundle),
            [
                "cp {input_dir}/key {output_dir}",
                "cp {input_dir}/.env {output_dir}"
            ]
        );
        assert!(unit.packaging.commands(PackagingPhase::PreInstall).is_empty());
        let references: Vec<_> = unit.references().collect();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].0, "TABLE_NAME");
    }
}
