use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Canonical diagnostic severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Synthesis must halt.
    Error,
    /// Action recommended but a plan may still be emitted.
    Warn,
    /// Informational context only.
    Info,
}

/// Structured metadata for a diagnostic emitted while checking a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticCode {
    /// Stable identifier (e.g. `STK300`).
    pub code: &'static str,
    /// Phase that produces the diagnostic.
    pub subsystem: &'static str,
    /// Default severity when policies do not override the level.
    pub default_severity: Severity,
    /// Short human-readable description.
    pub summary: &'static str,
}

/// Concrete diagnostic emitted during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Diagnostic code metadata.
    pub code: &'static DiagnosticCode,
    /// Long form message presented to the user.
    pub message: String,
    /// Optional machine-readable location (resource id, route key, etc.).
    pub location: Option<String>,
}

impl Diagnostic {
    /// Convenience constructor.
    pub fn new(code: &'static DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    /// Look up `code` in the registry.
    ///
    /// Panics when the code is not registered; codes are compile-time constants.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let entry = diagnostic_codes()
            .iter()
            .find(|item| item.code == code)
            .unwrap_or_else(|| panic!("unknown diagnostic code `{code}`"));
        Self::new(entry, message)
    }

    /// Attach location metadata to an existing diagnostic.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.code.default_severity == Severity::Error
    }
}

/// Public accessor for the registry.
pub fn diagnostic_codes() -> &'static [DiagnosticCode] {
    &DIAGNOSTIC_CODES
}

/// Canonical diagnostic registry used across the workspace.
pub static DIAGNOSTIC_CODES: Lazy<Vec<DiagnosticCode>> = Lazy::new(|| {
    vec![
        DiagnosticCode {
            code: "STK100",
            subsystem: "configuration",
            default_severity: Severity::Error,
            summary: "Resource id is declared more than once",
        },
        DiagnosticCode {
            code: "STK101",
            subsystem: "configuration",
            default_severity: Severity::Error,
            summary: "Route method is registered twice on the same path",
        },
        DiagnosticCode {
            code: "STK102",
            subsystem: "configuration",
            default_severity: Severity::Error,
            summary: "Schedule rule id is declared more than once",
        },
        DiagnosticCode {
            code: "STK103",
            subsystem: "configuration",
            default_severity: Severity::Error,
            summary: "Environment key is declared more than once on a compute unit",
        },
        DiagnosticCode {
            code: "STK104",
            subsystem: "configuration",
            default_severity: Severity::Error,
            summary: "Stack declares more than one gateway",
        },
        DiagnosticCode {
            code: "STK105",
            subsystem: "configuration",
            default_severity: Severity::Error,
            summary: "Resource definition is malformed",
        },
        DiagnosticCode {
            code: "STK200",
            subsystem: "binding",
            default_severity: Severity::Error,
            summary: "Edge references a resource that is not registered",
        },
        DiagnosticCode {
            code: "STK201",
            subsystem: "binding",
            default_severity: Severity::Error,
            summary: "Edge endpoint has the wrong resource kind",
        },
        DiagnosticCode {
            code: "STK202",
            subsystem: "binding",
            default_severity: Severity::Error,
            summary: "Schedule expression is not a well-formed cron expression",
        },
        DiagnosticCode {
            code: "STK203",
            subsystem: "binding",
            default_severity: Severity::Error,
            summary: "Route declared without a gateway",
        },
        DiagnosticCode {
            code: "STK204",
            subsystem: "binding",
            default_severity: Severity::Error,
            summary: "More than one grant edge for the same unit and store",
        },
        DiagnosticCode {
            code: "STK300",
            subsystem: "assembly",
            default_severity: Severity::Error,
            summary: "Cycle detected between plan steps",
        },
        DiagnosticCode {
            code: "STK301",
            subsystem: "assembly",
            default_severity: Severity::Error,
            summary: "Graph rejected by validation",
        },
        DiagnosticCode {
            code: "STK310",
            subsystem: "lint",
            default_severity: Severity::Warn,
            summary: "CORS allowed methods do not cover the methods registered on the path",
        },
        DiagnosticCode {
            code: "STK400",
            subsystem: "lint",
            default_severity: Severity::Warn,
            summary: "Environment binding carries a credential-like literal",
        },
    ]
});
