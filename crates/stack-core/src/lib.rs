//! Resource graph, definitions, and binders for composing a serverless stack.

pub mod binder;
pub mod config;
pub mod cron;
mod definition;
mod diagnostics;
mod error;
mod graph;
mod ir;
pub mod schema;

pub use binder::{GatewayBinder, GrantOutcome, PermissionBinder, ScheduleBinder};
pub use config::{BuildMode, StackConfig};
pub use cron::CronExpression;
pub use definition::{ComputeUnitDefinition, StoreDefinition};
pub use diagnostics::{DIAGNOSTIC_CODES, Diagnostic, DiagnosticCode, Severity, diagnostic_codes};
pub use error::{AssemblyError, BindingError, ConfigurationError, StackError, StackResult};
pub use graph::ResourceGraph;
pub use ir::*;
pub use serde_json;

/// Convenient prelude re-exporting the items a stack definition needs.
pub mod prelude {
    pub use crate::binder::{GatewayBinder, PermissionBinder, ScheduleBinder};
    pub use crate::config::{BuildMode, StackConfig};
    pub use crate::definition::{ComputeUnitDefinition, StoreDefinition};
    pub use crate::error::{StackError, StackResult};
    pub use crate::graph::ResourceGraph;
    pub use crate::ir::{
        AttributeType, CorsConfig, EnvValue, HttpMethod, PackagingPhase, Permission,
        RemovalPolicy, ResourceAttribute, ResourceId, Runtime,
    };
}
