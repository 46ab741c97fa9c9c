use std::fmt::Write as _;

use serde_json::Value;
use stack_core::{Edge, Integration, ResourceGraph, ResourceKind};
use stack_plan::{DeploymentPlan, PlanAction};

/// Serialise a plan into a `serde_json::Value`.
pub fn to_json_value(plan: &DeploymentPlan) -> Result<Value, serde_json::Error> {
    serde_json::to_value(plan)
}

/// Emit a Graphviz DOT view of the declared resources and their edges.
pub fn graph_to_dot(graph: &ResourceGraph) -> String {
    let mut buffer = String::new();
    buffer.push_str("digraph stack {\n");

    if let Some(gateway) = graph.gateway() {
        node(&mut buffer, gateway.id.as_str(), &gateway.name, shape(ResourceKind::Gateway));
    }
    for resource in graph.resources() {
        node(
            &mut buffer,
            resource.id.as_str(),
            &format!("{}\\n({})", resource.id, resource.kind()),
            shape(resource.kind()),
        );
    }

    for edge in graph.edges() {
        match edge {
            Edge::Grant(grant) => {
                let permissions: Vec<&str> = grant
                    .permissions
                    .iter()
                    .map(|permission| permission.as_str())
                    .collect();
                arrow(
                    &mut buffer,
                    grant.unit.as_str(),
                    grant.store.as_str(),
                    &permissions.join("+"),
                );
            }
            Edge::Environment(binding) => arrow(
                &mut buffer,
                binding.target.resource.as_str(),
                binding.unit.as_str(),
                &binding.key,
            ),
            Edge::Schedule(rule) => {
                let rule_node = format!("schedule:{}", rule.id);
                node(&mut buffer, &rule_node, &rule.expression, "note");
                arrow(&mut buffer, &rule_node, rule.target.as_str(), &rule.id);
            }
            Edge::Route(route) => match &route.integration {
                Integration::ComputeBacked { unit } => {
                    arrow(&mut buffer, route.gateway.as_str(), unit.as_str(), &route.key());
                }
                Integration::Mock(response) => {
                    let mock_node = format!("mock:{}", route.key());
                    node(
                        &mut buffer,
                        &mock_node,
                        &format!("mock {}", response.status_code),
                        "plaintext",
                    );
                    arrow(&mut buffer, route.gateway.as_str(), &mock_node, &route.key());
                }
            },
        }
    }

    buffer.push_str("}\n");
    buffer
}

/// Emit a Graphviz DOT view of plan steps, edges pointing from dependency to dependent.
pub fn plan_to_dot(plan: &DeploymentPlan) -> String {
    let mut buffer = String::new();
    buffer.push_str("digraph plan {\n");
    buffer.push_str("    rankdir=LR;\n");

    for (position, step) in plan.steps.iter().enumerate() {
        let shape = match step.action {
            PlanAction::CreateStore { .. } => "cylinder",
            PlanAction::CreateComputeUnit { .. } => "box",
            PlanAction::GrantAccess { .. } => "diamond",
            PlanAction::AttachSchedule { .. } => "note",
            PlanAction::AddRoute { .. } => "component",
        };
        node(
            &mut buffer,
            step.id.as_str(),
            &format!("{}. {}\\n{}", position + 1, step.action.label(), step.id),
            shape,
        );
    }
    for step in &plan.steps {
        for dependency in &step.depends_on {
            let _ = writeln!(
                buffer,
                "    \"{}\" -> \"{}\";",
                escape(dependency.as_str()),
                escape(step.id.as_str())
            );
        }
    }

    buffer.push_str("}\n");
    buffer
}

fn shape(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Table => "cylinder",
        ResourceKind::ComputeUnit => "box",
        ResourceKind::Gateway => "house",
    }
}

fn node(buffer: &mut String, id: &str, label: &str, shape: &str) {
    let _ = writeln!(
        buffer,
        "    \"{}\" [label=\"{}\", shape={shape}];",
        escape(id),
        escape(label)
    );
}

fn arrow(buffer: &mut String, from: &str, to: &str, label: &str) {
    let _ = writeln!(
        buffer,
        "    \"{}\" -> \"{}\" [label=\"{}\"];",
        escape(from),
        escape(to),
        escape(label)
    );
}

fn escape(value: &str) -> String {
    value.replace('"', "\\\"")
}
