use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::ir::{HttpMethod, ResourceId, ResourceKind};

/// Declarations that contradict each other or are malformed on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Attempted to register a resource id twice.
    #[error("resource id `{0}` already exists in stack")]
    DuplicateResource(ResourceId),
    /// Attempted to register the same method twice on one path.
    #[error("route `{method} {path}` is already registered")]
    DuplicateRoute { path: String, method: HttpMethod },
    /// Schedule rule ids are unique within a stack.
    #[error("schedule rule `{0}` already exists in stack")]
    DuplicateScheduleRule(String),
    #[error("environment key `{key}` is declared more than once")]
    DuplicateEnvironmentKey { key: String },
    #[error("gateway `{0}` is already declared; a stack hosts a single gateway")]
    GatewayAlreadyDeclared(ResourceId),
    #[error("invalid {field}: {reason}")]
    InvalidDefinition { field: &'static str, reason: String },
}

/// Derived edges that cannot be attached to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("{role} `{id}` is not registered in the stack")]
    UnknownResource { id: ResourceId, role: &'static str },
    #[error("{role} `{id}` must be a {expected}, found {found}")]
    KindMismatch {
        id: ResourceId,
        role: &'static str,
        expected: ResourceKind,
        found: ResourceKind,
    },
    #[error("malformed schedule expression `{expression}`: {reason}")]
    MalformedSchedule { expression: String, reason: String },
    #[error("no gateway declared; declare one before adding routes")]
    MissingGateway,
}

/// Failures while ordering a graph into a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("cycle detected between plan steps: {}", .members.join(", "))]
    Cycle { members: Vec<String> },
    #[error("graph rejected with {} diagnostic(s)", .diagnostics.len())]
    Rejected { diagnostics: Vec<Diagnostic> },
}

/// Umbrella error surfaced by graph construction and assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("binding error: {0}")]
    Binding(#[from] BindingError),
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),
}

impl StackError {
    /// Diagnostic code registered for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            StackError::Configuration(ConfigurationError::DuplicateResource(_)) => "STK100",
            StackError::Configuration(ConfigurationError::DuplicateRoute { .. }) => "STK101",
            StackError::Configuration(ConfigurationError::DuplicateScheduleRule(_)) => "STK102",
            StackError::Configuration(ConfigurationError::DuplicateEnvironmentKey { .. }) => {
                "STK103"
            }
            StackError::Configuration(ConfigurationError::GatewayAlreadyDeclared(_)) => "STK104",
            StackError::Configuration(ConfigurationError::InvalidDefinition { .. }) => "STK105",
            StackError::Binding(BindingError::UnknownResource { .. }) => "STK200",
            StackError::Binding(BindingError::KindMismatch { .. }) => "STK201",
            StackError::Binding(BindingError::MalformedSchedule { .. }) => "STK202",
            StackError::Binding(BindingError::MissingGateway) => "STK203",
            StackError::Assembly(AssemblyError::Cycle { .. }) => "STK300",
            StackError::Assembly(AssemblyError::Rejected { .. }) => "STK301",
        }
    }
}

/// Convenient result alias for graph construction.
pub type StackResult<T> = Result<T, StackError>;
