//! Binders attach derived edges to a [`ResourceGraph`](crate::ResourceGraph).
//!
//! Each binder borrows the graph mutably for the duration of its calls, so binding happens in
//! the same single pass as declaration.

mod gateway;
mod permission;
mod schedule;

pub use gateway::GatewayBinder;
pub use permission::{GrantOutcome, PermissionBinder};
pub use schedule::ScheduleBinder;
