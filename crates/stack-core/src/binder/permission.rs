use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::error::{ConfigurationError, StackResult};
use crate::graph::ResourceGraph;
use crate::ir::{Edge, Grant, Permission, ResourceId};

/// Effect of a grant call on the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// A new grant edge was recorded.
    Created,
    /// An existing grant gained permissions.
    Widened,
    /// Every requested permission was already granted.
    Unchanged,
}

/// Records permission edges from compute units to stores.
pub struct PermissionBinder<'g> {
    graph: &'g mut ResourceGraph,
}

impl<'g> PermissionBinder<'g> {
    pub fn new(graph: &'g mut ResourceGraph) -> Self {
        Self { graph }
    }

    /// Grant `unit` the given permissions on `store`.
    ///
    /// There is at most one grant edge per (unit, store) pair; repeated calls union the
    /// permission sets, so a grant can widen but never narrow.
    #[instrument(skip_all, fields(unit = %unit, store = %store))]
    pub fn grant<I>(
        &mut self,
        unit: &ResourceId,
        store: &ResourceId,
        permissions: I,
    ) -> StackResult<GrantOutcome>
    where
        I: IntoIterator<Item = Permission>,
    {
        let permissions: BTreeSet<Permission> = permissions.into_iter().collect();
        if permissions.is_empty() {
            return Err(ConfigurationError::InvalidDefinition {
                field: "grant",
                reason: format!("grant from `{unit}` to `{store}` names no permissions"),
            }
            .into());
        }

        let edge = Edge::Grant(Grant {
            unit: unit.clone(),
            store: store.clone(),
            permissions: permissions.clone(),
        });
        self.graph.check_edge(&edge)?;

        if let Some(existing) = self.graph.grant_mut(unit, store) {
            let before = existing.permissions.len();
            existing.permissions.extend(permissions);
            let outcome = if existing.permissions.len() > before {
                GrantOutcome::Widened
            } else {
                GrantOutcome::Unchanged
            };
            debug!(?outcome, permissions = ?existing.permissions, "grant already recorded");
            return Ok(outcome);
        }

        debug!(?permissions, "recording grant");
        self.graph.add_edge(edge)?;
        Ok(GrantOutcome::Created)
    }

    /// Shorthand for read and write access.
    pub fn grant_read_write(
        &mut self,
        unit: &ResourceId,
        store: &ResourceId,
    ) -> StackResult<GrantOutcome> {
        self.grant(unit, store, Permission::READ_WRITE)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::definition::{ComputeUnitDefinition, StoreDefinition};
    use crate::error::{BindingError, StackError};
    use crate::ir::{AttributeType, ResourceKind};

    fn sample_graph() -> (ResourceGraph, ResourceId, ResourceId) {
        let mut graph = ResourceGraph::new("sample");
        let store = graph
            .register(
                StoreDefinition::new("itemId", AttributeType::String)
                    .build("items")
                    .expect("store"),
            )
            .expect("register store");
        let unit = graph
            .register(
                ComputeUnitDefinition::new("get-all.ts")
                    .build("getAll")
                    .expect("unit"),
            )
            .expect("register unit");
        (graph, unit, store)
    }

    #[test]
    fn repeated_grants_collapse_into_one_edge() {
        let (mut graph, unit, store) = sample_graph();
        let mut binder = PermissionBinder::new(&mut graph);
        assert_eq!(
            binder.grant_read_write(&unit, &store).expect("grant"),
            GrantOutcome::Created
        );
        assert_eq!(
            binder.grant_read_write(&unit, &store).expect("grant"),
            GrantOutcome::Unchanged
        );

        let grants: Vec<_> = graph.grants().collect();
        assert_eq!(grants.len(), 1);
        assert_eq!(
            grants[0].permissions,
            BTreeSet::from([Permission::Read, Permission::Write])
        );
    }

    #[test]
    fn grants_widen_but_never_narrow() {
        let (mut graph, unit, store) = sample_graph();
        let mut binder = PermissionBinder::new(&mut graph);
        binder
            .grant(&unit, &store, [Permission::Read])
            .expect("read");
        assert_eq!(
            binder
                .grant(&unit, &store, Permission::READ_WRITE)
                .expect("read write"),
            GrantOutcome::Widened
        );
        assert_eq!(
            binder
                .grant(&unit, &store, [Permission::Read])
                .expect("read again"),
            GrantOutcome::Unchanged
        );
        let grant = graph.grants().next().expect("grant edge");
        assert!(grant.permissions.contains(&Permission::Write));
        assert_eq!(
            grant.actions(),
            vec![
                "store:BatchGetItem",
                "store:BatchWriteItem",
                "store:ConditionCheckItem",
                "store:DeleteItem",
                "store:DescribeTable",
                "store:GetItem",
                "store:PutItem",
                "store:Query",
                "store:Scan",
                "store:UpdateItem",
            ]
        );
    }

    #[test]
    fn grant_to_unknown_store_is_a_binding_error() {
        let (mut graph, unit, _) = sample_graph();
        let before = graph.clone();
        let err = PermissionBinder::new(&mut graph)
            .grant_read_write(&unit, &ResourceId::new("orders"))
            .expect_err("unknown store");
        assert_eq!(
            err,
            StackError::Binding(BindingError::UnknownResource {
                id: "orders".into(),
                role: "grant target"
            })
        );
        assert_eq!(graph, before);
    }

    #[test]
    fn grant_endpoints_must_have_matching_kinds() {
        let (mut graph, unit, store) = sample_graph();
        let err = PermissionBinder::new(&mut graph)
            .grant_read_write(&store, &unit)
            .expect_err("swapped endpoints");
        assert_eq!(
            err,
            StackError::Binding(BindingError::KindMismatch {
                id: store,
                role: "grantee",
                expected: ResourceKind::ComputeUnit,
                found: ResourceKind::Table,
            })
        );
    }

    fn permission_sets() -> impl Strategy<Value = Vec<Vec<Permission>>> {
        let permission = prop_oneof![Just(Permission::Read), Just(Permission::Write)];
        proptest::collection::vec(proptest::collection::vec(permission, 1..=2), 1..8)
    }

    proptest! {
        #[test]
        fn grant_sequences_yield_the_union(requests in permission_sets()) {
            let (mut graph, unit, store) = sample_graph();
            let mut expected = BTreeSet::new();
            for request in &requests {
                expected.extend(request.iter().copied());
                PermissionBinder::new(&mut graph)
                    .grant(&unit, &store, request.iter().copied())
                    .expect("grant");
                let grants: Vec<_> = graph.grants().collect();
                prop_assert_eq!(grants.len(), 1);
                prop_assert_eq!(&grants[0].permissions, &expected);
            }
        }
    }
}
