use tracing::{debug, instrument};

use crate::cron::CronExpression;
use crate::error::{ConfigurationError, StackResult};
use crate::graph::ResourceGraph;
use crate::ir::{Edge, ResourceId, ScheduleRule, identifier_problem};

/// Attaches cron triggers to compute units.
pub struct ScheduleBinder<'g> {
    graph: &'g mut ResourceGraph,
}

impl<'g> ScheduleBinder<'g> {
    pub fn new(graph: &'g mut ResourceGraph) -> Self {
        Self { graph }
    }

    /// Record rule `rule_id` firing `unit` on `expression`.
    ///
    /// Each rule targets exactly one unit; a unit may be the target of several rules.
    #[instrument(skip_all, fields(rule = rule_id, unit = %unit))]
    pub fn schedule(
        &mut self,
        rule_id: &str,
        unit: &ResourceId,
        expression: &str,
    ) -> StackResult<CronExpression> {
        if let Some(reason) = identifier_problem(rule_id) {
            return Err(ConfigurationError::InvalidDefinition {
                field: "schedule rule id",
                reason,
            }
            .into());
        }
        if self.graph.schedules().any(|rule| rule.id == rule_id) {
            return Err(ConfigurationError::DuplicateScheduleRule(rule_id.to_string()).into());
        }

        let cron = CronExpression::parse(expression)?;
        self.graph.add_edge(Edge::Schedule(ScheduleRule {
            id: rule_id.to_string(),
            expression: cron.as_str().to_string(),
            target: unit.clone(),
        }))?;
        debug!(schedule = %cron.describe(), "recorded schedule rule");
        Ok(cron)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ComputeUnitDefinition;
    use crate::error::{BindingError, StackError};

    fn graph_with_importer() -> (ResourceGraph, ResourceId) {
        let mut graph = ResourceGraph::new("sample");
        let unit = graph
            .register(
                ComputeUnitDefinition::new("importer.ts")
                    .build("importer")
                    .expect("unit"),
            )
            .expect("register");
        (graph, unit)
    }

    #[test]
    fn schedule_records_a_rule_per_call() {
        let (mut graph, unit) = graph_with_importer();
        let mut binder = ScheduleBinder::new(&mut graph);
        let nightly = binder
            .schedule("nightly", &unit, "cron(0 2 * * ? *)")
            .expect("nightly");
        binder
            .schedule("hourly", &unit, "0 * * * *")
            .expect("hourly");

        assert_eq!(nightly.daily_at(), Some((2, 0)));
        let rules: Vec<_> = graph.schedules().collect();
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|rule| rule.target == unit));
        assert_eq!(rules[0].expression, "cron(0 2 * * ? *)");
    }

    #[test]
    fn malformed_expression_is_a_binding_error_and_adds_nothing() {
        let (mut graph, unit) = graph_with_importer();
        let err = ScheduleBinder::new(&mut graph)
            .schedule("nightly", &unit, "cron(0 25 * * ? *)")
            .expect_err("hour out of range");
        assert!(matches!(
            err,
            StackError::Binding(BindingError::MalformedSchedule { .. })
        ));
        assert_eq!(graph.schedules().count(), 0);
    }

    #[test]
    fn rule_ids_are_unique() {
        let (mut graph, unit) = graph_with_importer();
        let mut binder = ScheduleBinder::new(&mut graph);
        binder
            .schedule("nightly", &unit, "cron(0 2 * * ? *)")
            .expect("first");
        let err = binder
            .schedule("nightly", &unit, "cron(0 3 * * ? *)")
            .expect_err("duplicate id");
        assert_eq!(
            err,
            StackError::Configuration(ConfigurationError::DuplicateScheduleRule(
                "nightly".to_string()
            ))
        );
    }

    #[test]
    fn rule_ids_cannot_contain_separators() {
        let (mut graph, unit) = graph_with_importer();
        let mut binder = ScheduleBinder::new(&mut graph);
        for id in ["", "nightly/import", "nightly import"] {
            let err = binder
                .schedule(id, &unit, "cron(0 2 * * ? *)")
                .expect_err("bad rule id");
            assert!(matches!(
                err,
                StackError::Configuration(ConfigurationError::InvalidDefinition {
                    field: "schedule rule id",
                    ..
                })
            ));
        }
        assert_eq!(graph.schedules().count(), 0);
    }

    #[test]
    fn schedule_target_must_be_registered() {
        let (mut graph, _) = graph_with_importer();
        let err = ScheduleBinder::new(&mut graph)
            .schedule("nightly", &ResourceId::new("ghost"), "cron(0 2 * * ? *)")
            .expect_err("unknown target");
        assert!(matches!(
            err,
            StackError::Binding(BindingError::UnknownResource { .. })
        ));
    }
}
