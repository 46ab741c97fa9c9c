use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use stack_core::{AssemblyError, Edge, ResourceConfig, ResourceGraph, ResourceId, ResourceKind};
use tracing::debug;

use crate::plan::{PlanAction, PlanStep, StepId};

/// Steps of one tier may only be emitted once nothing of a lower tier is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Store,
    Unit,
    Grant,
    Attachment,
}

struct PendingStep {
    id: StepId,
    tier: Tier,
    action: PlanAction,
    depends_on: BTreeSet<usize>,
}

/// Turn a validated graph into dependency-ordered steps.
///
/// Kahn's algorithm over the step graph; among ready steps the lowest (tier, declaration
/// index) goes first, so equal graphs always produce equal plans.
pub(crate) fn order_steps(graph: &ResourceGraph) -> Result<Vec<PlanStep>, AssemblyError> {
    let mut steps = collect_steps(graph);
    wire_dependencies(graph, &mut steps);

    let mut indegree: Vec<usize> = steps.iter().map(|step| step.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    for (index, step) in steps.iter().enumerate() {
        for &dependency in &step.depends_on {
            dependents[dependency].push(index);
        }
    }

    let mut ready: BinaryHeap<Reverse<(Tier, usize)>> = steps
        .iter()
        .enumerate()
        .filter(|(index, _)| indegree[*index] == 0)
        .map(|(index, step)| Reverse((step.tier, index)))
        .collect();

    let mut emitted = Vec::with_capacity(steps.len());
    while let Some(Reverse((_, index))) = ready.pop() {
        emitted.push(index);
        for &dependent in &dependents[index] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(Reverse((steps[dependent].tier, dependent)));
            }
        }
    }

    if emitted.len() < steps.len() {
        let members: Vec<String> = indegree
            .iter()
            .enumerate()
            .filter(|(_, remaining)| **remaining > 0)
            .map(|(index, _)| steps[index].id.to_string())
            .collect();
        debug!(?members, "plan steps form a cycle");
        return Err(AssemblyError::Cycle { members });
    }

    let ids: Vec<StepId> = steps.iter().map(|step| step.id.clone()).collect();
    let mut slots: Vec<Option<PendingStep>> = steps.into_iter().map(Some).collect();
    Ok(emitted
        .into_iter()
        .filter_map(|index| slots[index].take())
        .map(|step| PlanStep {
            depends_on: step
                .depends_on
                .iter()
                .map(|&dependency| ids[dependency].clone())
                .collect(),
            id: step.id,
            action: step.action,
        })
        .collect())
}

fn collect_steps(graph: &ResourceGraph) -> Vec<PendingStep> {
    let mut steps = Vec::new();
    for resource in graph.resources() {
        let step = match &resource.config {
            ResourceConfig::Table(table) => PendingStep {
                id: StepId::store(&resource.id),
                tier: Tier::Store,
                action: PlanAction::CreateStore {
                    resource: resource.id.clone(),
                    table: table.clone(),
                },
                depends_on: BTreeSet::new(),
            },
            ResourceConfig::ComputeUnit(unit) => PendingStep {
                id: StepId::unit(&resource.id),
                tier: Tier::Unit,
                action: PlanAction::CreateComputeUnit {
                    resource: resource.id.clone(),
                    unit: unit.clone(),
                },
                depends_on: BTreeSet::new(),
            },
        };
        steps.push(step);
    }

    for edge in graph.edges() {
        let step = match edge {
            Edge::Grant(grant) => PendingStep {
                id: StepId::grant(&grant.unit, &grant.store),
                tier: Tier::Grant,
                action: PlanAction::GrantAccess {
                    grant: grant.clone(),
                    actions: grant.actions(),
                },
                depends_on: BTreeSet::new(),
            },
            Edge::Schedule(rule) => PendingStep {
                id: StepId::schedule(&rule.id),
                tier: Tier::Attachment,
                action: PlanAction::AttachSchedule { rule: rule.clone() },
                depends_on: BTreeSet::new(),
            },
            Edge::Route(route) => PendingStep {
                id: StepId::route(route),
                tier: Tier::Attachment,
                action: PlanAction::AddRoute {
                    route: route.clone(),
                },
                depends_on: BTreeSet::new(),
            },
            // Folded into the bound unit's dependencies.
            Edge::Environment(_) => continue,
        };
        steps.push(step);
    }
    steps
}

fn wire_dependencies(graph: &ResourceGraph, steps: &mut [PendingStep]) {
    let index_of: HashMap<StepId, usize> = steps
        .iter()
        .enumerate()
        .map(|(index, step)| (step.id.clone(), index))
        .collect();
    let lookup = |id: &StepId| index_of.get(id).copied();

    let route_steps: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, step)| matches!(step.action, PlanAction::AddRoute { .. }))
        .map(|(index, _)| index)
        .collect();
    let mut grants_by_unit: HashMap<&ResourceId, Vec<usize>> = HashMap::new();
    for grant in graph.grants() {
        if let Some(index) = lookup(&StepId::grant(&grant.unit, &grant.store)) {
            grants_by_unit.entry(&grant.unit).or_default().push(index);
        }
    }

    // Triggers wait for the unit and every grant it holds.
    let unit_with_grants = |unit: &ResourceId| -> Vec<usize> {
        lookup(&StepId::unit(unit))
            .into_iter()
            .chain(grants_by_unit.get(unit).into_iter().flatten().copied())
            .collect()
    };

    let mut wiring: Vec<(usize, Vec<usize>)> = Vec::new();

    for binding in graph.environment_bindings() {
        let Some(unit) = lookup(&StepId::unit(&binding.unit)) else {
            continue;
        };
        let target = &binding.target.resource;
        let providers = match graph.kind_of(target) {
            Some(ResourceKind::Table) => lookup(&StepId::store(target)).into_iter().collect(),
            Some(ResourceKind::ComputeUnit) => lookup(&StepId::unit(target)).into_iter().collect(),
            // The endpoint only exists once every route is deployed.
            Some(ResourceKind::Gateway) => route_steps.clone(),
            None => Vec::new(),
        };
        wiring.push((unit, providers));
    }

    for (index, step) in steps.iter().enumerate() {
        let providers = match &step.action {
            PlanAction::GrantAccess { grant, .. } => [
                lookup(&StepId::unit(&grant.unit)),
                lookup(&StepId::store(&grant.store)),
            ]
            .into_iter()
            .flatten()
            .collect(),
            PlanAction::AttachSchedule { rule } => unit_with_grants(&rule.target),
            PlanAction::AddRoute { route } => match route.integration.unit() {
                Some(unit) => unit_with_grants(unit),
                None => Vec::new(),
            },
            PlanAction::CreateStore { .. } | PlanAction::CreateComputeUnit { .. } => continue,
        };
        wiring.push((index, providers));
    }

    for (index, providers) in wiring {
        steps[index].depends_on.extend(providers);
    }
}
