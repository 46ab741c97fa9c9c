//! The items service: a key-value store of items, a query unit behind `GET /items`, and an
//! import unit triggered nightly.

use stack_core::prelude::*;
use stack_core::{AssemblyError, ResourceGraph};
use stack_plan::DeploymentPlan;
use tracing::{debug, instrument};

pub const DEFAULT_STACK_NAME: &str = "springfieldMeetupApi";

pub const STORE_ID: &str = "items";
pub const GET_ALL_UNIT_ID: &str = "getAllItemsFunction";
pub const IMPORTER_UNIT_ID: &str = "importerFunction";
pub const IMPORT_RULE_ID: &str = "importerEventBridgeRule";
pub const GATEWAY_ID: &str = "itemsApi";
pub const GATEWAY_NAME: &str = "Items Service";
pub const ITEMS_PATH: &str = "/items";
pub const IMPORT_SCHEDULE: &str = "cron(0 2 * * ? *)";

const PRIMARY_KEY: &str = "itemId";

/// Failure to build or assemble the stack.
#[derive(Debug, thiserror::Error)]
pub enum ItemsStackError {
    #[error(transparent)]
    Build(#[from] StackError),
    #[error(transparent)]
    Assemble(#[from] AssemblyError),
}

/// Environment shared by both compute units.
fn shared_environment(config: &StackConfig) -> Vec<(&'static str, EnvValue)> {
    let mut env = vec![
        ("PRIMARY_KEY", EnvValue::literal(PRIMARY_KEY)),
        (
            "TABLE_NAME",
            EnvValue::reference(STORE_ID, ResourceAttribute::TableName),
        ),
        ("NODE_ENV", EnvValue::literal(config.build_mode.as_str())),
    ];
    if config.placeholder_credentials {
        env.push(("LAMBDA_AWS_ACCESS_KEY_ID", EnvValue::literal("anything")));
        env.push(("LAMBDA_AWS_SECRET_ACCESS_KEY", EnvValue::literal("at-all")));
    }
    env
}

fn node_unit(config: &StackConfig, entry: &str) -> ComputeUnitDefinition {
    ComputeUnitDefinition::new(config.source_path(entry))
        .runtime(Runtime::Nodejs18)
        .deps_lock_file(config.source_path("package-lock.json"))
        .environment(shared_environment(config))
}

/// Commands run before the importer is bundled.
pub fn importer_pre_bundle_commands(mode: BuildMode) -> Vec<String> {
    let mut commands = vec!["cp {input_dir}/meetup-private-key {output_dir}".to_string()];
    if !mode.is_production() {
        commands.push("cp {input_dir}/.env {output_dir}".to_string());
    }
    commands
}

/// Declare every resource and edge of the stack.
#[instrument(skip_all, fields(stack = %config.stack_name, mode = %config.build_mode))]
pub fn build(config: &StackConfig) -> StackResult<ResourceGraph> {
    let mut graph = ResourceGraph::new(config.stack_name.clone());

    let store = graph.register(
        StoreDefinition::new(PRIMARY_KEY, AttributeType::String)
            .table_name(STORE_ID)
            .removal_policy(RemovalPolicy::Destroy)
            .build(STORE_ID)?,
    )?;
    let get_all = graph.register(node_unit(config, "get-all.ts").build(GET_ALL_UNIT_ID)?)?;
    let importer = graph.register(
        node_unit(config, "importer.ts")
            .packaging_steps(
                PackagingPhase::PreBundle,
                importer_pre_bundle_commands(config.build_mode),
            )
            .build(IMPORTER_UNIT_ID)?,
    )?;

    let mut permissions = PermissionBinder::new(&mut graph);
    permissions.grant_read_write(&get_all, &store)?;
    permissions.grant_read_write(&importer, &store)?;

    let schedule =
        ScheduleBinder::new(&mut graph).schedule(IMPORT_RULE_ID, &importer, IMPORT_SCHEDULE)?;
    debug!(rule = IMPORT_RULE_ID, schedule = %schedule.describe(), "import scheduled");

    let mut gateway = GatewayBinder::new(&mut graph);
    gateway.declare(GATEWAY_ID, GATEWAY_NAME)?;
    gateway.route(ITEMS_PATH, HttpMethod::Get, &get_all)?;
    gateway.add_cors(ITEMS_PATH)?;

    Ok(graph)
}

/// Build the stack and assemble it into a deployment plan.
pub fn plan(config: &StackConfig) -> Result<DeploymentPlan, ItemsStackError> {
    let graph = build(config)?;
    Ok(stack_plan::assemble(&graph)?)
}

/// Stack configuration with the service's default name.
pub fn default_config() -> StackConfig {
    StackConfig::new(DEFAULT_STACK_NAME)
}
