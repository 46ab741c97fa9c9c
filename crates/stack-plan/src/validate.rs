use std::collections::{BTreeMap, HashSet};

use stack_core::{
    BindingError, CronExpression, Diagnostic, Edge, EnvValue, HttpMethod, Resource,
    ResourceConfig, ResourceGraph, RoutePath, StackError, identifier_problem,
};

/// Literal environment keys containing one of these fragments are flagged.
const CREDENTIAL_MARKERS: [&str; 4] = ["SECRET", "ACCESS_KEY", "PASSWORD", "TOKEN"];

/// Result of a successful validation run.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    graph: ResourceGraph,
    warnings: Vec<Diagnostic>,
}

impl ValidatedGraph {
    /// Access the validated graph.
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Warning-level diagnostics found while validating.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Consume the validated wrapper and return the underlying graph.
    pub fn into_inner(self) -> ResourceGraph {
        self.graph
    }
}

/// Validate a graph and return diagnostics if errors are discovered.
///
/// Graphs built through the binders already satisfy most of these checks; graphs read back
/// from JSON do not, so everything is re-checked here. The error list also carries any
/// warnings found in the same pass.
pub fn validate(graph: &ResourceGraph) -> Result<ValidatedGraph, Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();

    check_duplicate_ids(graph, &mut diagnostics);
    check_identifiers(graph, &mut diagnostics);
    check_definitions(graph, &mut diagnostics);
    check_edge_references(graph, &mut diagnostics);
    check_duplicate_grants(graph, &mut diagnostics);
    check_schedules(graph, &mut diagnostics);
    check_routes(graph, &mut diagnostics);
    check_cors_coverage(graph, &mut diagnostics);
    check_credential_literals(graph, &mut diagnostics);

    if diagnostics.iter().any(Diagnostic::is_error) {
        Err(diagnostics)
    } else {
        Ok(ValidatedGraph {
            graph: graph.clone(),
            warnings: diagnostics,
        })
    }
}

fn check_duplicate_ids(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    let ids = graph
        .gateway()
        .map(|gateway| &gateway.id)
        .into_iter()
        .chain(graph.resources().iter().map(|resource| &resource.id));
    for id in ids {
        if !seen.insert(id) {
            diagnostics.push(
                diagnostic("STK100", format!("duplicate resource id `{id}`"))
                    .with_location(id.as_str()),
            );
        }
    }
}

fn check_identifiers(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    let ids = graph
        .gateway()
        .map(|gateway| gateway.id.as_str())
        .into_iter()
        .chain(graph.resources().iter().map(|resource| resource.id.as_str()))
        .chain(graph.schedules().map(|rule| rule.id.as_str()));
    for id in ids {
        if let Some(problem) = identifier_problem(id) {
            diagnostics.push(diagnostic("STK105", problem).with_location(id));
        }
    }
}

fn check_definitions(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    for Resource { id, config } in graph.resources() {
        let problem = match config {
            ResourceConfig::Table(table) if table.partition_key.name.trim().is_empty() => {
                Some("partition key name is empty")
            }
            ResourceConfig::Table(table)
                if table
                    .table_name
                    .as_deref()
                    .is_some_and(|name| name.trim().is_empty()) =>
            {
                Some("table name is empty")
            }
            ResourceConfig::ComputeUnit(unit) if unit.entry.trim().is_empty() => {
                Some("entry point is empty")
            }
            ResourceConfig::ComputeUnit(unit) if unit.handler.trim().is_empty() => {
                Some("handler is empty")
            }
            _ => None,
        };
        if let Some(problem) = problem {
            diagnostics.push(
                diagnostic("STK105", format!("resource `{id}`: {problem}"))
                    .with_location(id.as_str()),
            );
        }
    }
}

fn check_edge_references(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    for edge in graph.edges() {
        // Routes without any gateway are reported once by `check_routes`.
        if matches!(edge, Edge::Route(_)) && graph.gateway().is_none() {
            continue;
        }
        if let Err(err) = graph.check_edge(edge) {
            diagnostics.push(binding_diagnostic(err));
        }
    }
}

fn check_duplicate_grants(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for grant in graph.grants() {
        if grant.permissions.is_empty() {
            diagnostics.push(diagnostic(
                "STK105",
                format!(
                    "grant from `{}` to `{}` names no permissions",
                    grant.unit, grant.store
                ),
            ));
        }
        if !seen.insert((&grant.unit, &grant.store)) {
            diagnostics.push(
                diagnostic(
                    "STK204",
                    format!(
                        "`{}` holds more than one grant on `{}`",
                        grant.unit, grant.store
                    ),
                )
                .with_location(grant.unit.as_str()),
            );
        }
    }
}

fn check_schedules(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for rule in graph.schedules() {
        if !seen.insert(rule.id.as_str()) {
            diagnostics.push(
                diagnostic("STK102", format!("duplicate schedule rule `{}`", rule.id))
                    .with_location(rule.id.as_str()),
            );
        }
        if let Err(err) = CronExpression::parse(&rule.expression) {
            diagnostics.push(binding_diagnostic(err).with_location(rule.id.as_str()));
        }
    }
}

fn check_routes(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    if graph.gateway().is_none() {
        if let Some(route) = graph.routes().next() {
            diagnostics.push(
                binding_diagnostic(BindingError::MissingGateway).with_location(route.key()),
            );
        }
        return;
    }

    let mut seen = HashSet::new();
    for route in graph.routes() {
        if let Err(err) = RoutePath::parse(route.path.as_str()) {
            diagnostics.push(
                diagnostic("STK105", err.to_string()).with_location(route.key()),
            );
        }
        if !seen.insert((&route.path, route.method)) {
            diagnostics.push(
                diagnostic("STK101", format!("route `{}` is registered twice", route.key()))
                    .with_location(route.key()),
            );
        }
    }
}

fn check_cors_coverage(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    let mut methods_by_path: BTreeMap<&RoutePath, Vec<HttpMethod>> = BTreeMap::new();
    for route in graph.routes() {
        if route.method != HttpMethod::Options {
            methods_by_path
                .entry(&route.path)
                .or_default()
                .push(route.method);
        }
    }

    for route in graph.routes() {
        let Some(cors) = &route.cors else {
            continue;
        };
        let uncovered: Vec<&str> = methods_by_path
            .get(&route.path)
            .into_iter()
            .flatten()
            .filter(|method| !cors.allows(**method))
            .map(|method| method.as_str())
            .collect();
        if !uncovered.is_empty() {
            diagnostics.push(
                diagnostic(
                    "STK310",
                    format!(
                        "preflight on `{}` does not allow {}",
                        route.path,
                        uncovered.join(", ")
                    ),
                )
                .with_location(route.key()),
            );
        }
    }
}

fn check_credential_literals(graph: &ResourceGraph, diagnostics: &mut Vec<Diagnostic>) {
    for resource in graph.resources() {
        let Some(unit) = resource.as_compute_unit() else {
            continue;
        };
        for (key, value) in &unit.environment {
            let upper = key.to_ascii_uppercase();
            let flagged = CREDENTIAL_MARKERS
                .iter()
                .any(|marker| upper.contains(marker));
            if flagged && matches!(value, EnvValue::Literal { .. }) {
                diagnostics.push(
                    diagnostic(
                        "STK400",
                        format!(
                            "compute unit `{}` sets credential-like `{key}` from a literal",
                            resource.id
                        ),
                    )
                    .with_location(format!("{}.{key}", resource.id)),
                );
            }
        }
    }
}

fn binding_diagnostic(err: BindingError) -> Diagnostic {
    let message = err.to_string();
    diagnostic(StackError::from(err).code(), message)
}

fn diagnostic(code: &str, message: impl Into<String>) -> Diagnostic {
    Diagnostic::from_code(code, message)
}
