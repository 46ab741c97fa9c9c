mod local;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use exporters::{graph_to_dot, plan_to_dot, to_json_value};
use serde::Serialize;
use stack_core::{
    AssemblyError, BuildMode, Diagnostic, ResourceGraph, Severity, StackConfig, StackError,
    schema::resource_graph_schema,
};
use stack_plan::{DeploymentPlan, assemble, deployment_plan_schema, validate};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(
    name = "stacks",
    version,
    author,
    about = "Synthesise, check, and locally deploy serverless stacks"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the items stack and print its deployment plan.
    Synth(SynthArgs),
    /// Resource graph inspection and validation commands.
    #[command(subcommand)]
    Graph(GraphCommand),
    /// Print the JSON schema of a serialised document.
    Schema(SchemaArgs),
    /// Deployment commands.
    #[command(subcommand)]
    Deploy(DeployCommand),
}

#[derive(Subcommand, Debug)]
enum GraphCommand {
    /// Validate and order a resource graph JSON document.
    Check(GraphCheckArgs),
}

#[derive(Subcommand, Debug)]
enum DeployCommand {
    /// Deploy the plan in-process and exercise its routes and schedules.
    Local(local::DeployLocalArgs),
}

/// Inputs shared by every command that builds the items stack.
#[derive(Args, Debug, Clone)]
struct StackArgs {
    /// Build mode; also exported to units as `NODE_ENV`.
    #[arg(long, env = "BUILD_ENV", default_value_t = BuildMode::Development)]
    build_env: BuildMode,
    #[arg(long, env = "STACK_NAME", default_value = items_api::DEFAULT_STACK_NAME)]
    stack_name: String,
    /// Directory holding the compute unit sources.
    #[arg(long, default_value = "lambdas")]
    source_dir: PathBuf,
    /// Inject placeholder cloud credentials into unit environments.
    #[arg(long)]
    placeholder_credentials: bool,
}

impl StackArgs {
    fn config(&self) -> StackConfig {
        StackConfig::new(self.stack_name.clone())
            .with_build_mode(self.build_env)
            .with_source_dir(self.source_dir.clone())
            .with_placeholder_credentials(self.placeholder_credentials)
    }
}

#[derive(Args, Debug)]
struct SynthArgs {
    #[command(flatten)]
    stack: StackArgs,
    /// Write the plan JSON to this path instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Write the resource graph JSON to this path.
    #[arg(long)]
    graph: Option<PathBuf>,
    /// Write a DOT rendering of the plan to this path.
    #[arg(long)]
    dot: Option<PathBuf>,
    /// Write a DOT rendering of the resource graph to this path.
    #[arg(long)]
    graph_dot: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GraphCheckArgs {
    /// Path to a resource graph JSON document. Reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
    /// Write DOT graph to the provided path.
    #[arg(long)]
    dot: Option<PathBuf>,
    /// Print DOT graph to stdout.
    #[arg(long)]
    emit_dot: bool,
    /// Emit structured JSON instead of human-readable text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaKind {
    Graph,
    Plan,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    #[arg(value_enum)]
    kind: SchemaKind,
    /// Write the schema to this path instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Synth(args) => run_synth(args),
        Command::Graph(GraphCommand::Check(args)) => run_graph_check(args),
        Command::Schema(args) => run_schema(args),
        Command::Deploy(DeployCommand::Local(args)) => local::run(args),
    }
}

/// Build the items stack and assemble it, printing diagnostics on failure.
fn synthesise(stack: &StackArgs) -> Result<(ResourceGraph, DeploymentPlan)> {
    let config = stack.config();
    let graph = items_api::build(&config).map_err(|err| {
        eprintln!("✗ stack definition failed:");
        eprintln!("{}", format_text_diagnostic(&build_diagnostic(&err)));
        anyhow!("stack definition failed")
    })?;
    let plan = assemble(&graph).map_err(|err| {
        let diagnostics = assembly_diagnostics(&err);
        eprintln!(
            "✗ synthesis failed with {} diagnostic(s):",
            diagnostics.len()
        );
        for diag in &diagnostics {
            eprintln!("{}", format_text_diagnostic(diag));
        }
        anyhow!("synthesis failed")
    })?;
    Ok((graph, plan))
}

fn run_synth(args: SynthArgs) -> Result<()> {
    let (graph, plan) = synthesise(&args.stack)?;

    if let Some(path) = &args.graph {
        write_file(path, &serde_json::to_string_pretty(&graph)?, "resource graph")?;
    }
    if let Some(path) = &args.graph_dot {
        write_file(path, &graph_to_dot(&graph), "graph DOT")?;
    }
    if let Some(path) = &args.dot {
        write_file(path, &plan_to_dot(&plan), "plan DOT")?;
    }

    let json = serde_json::to_string_pretty(&to_json_value(&plan)?)?;
    match &args.out {
        Some(path) => write_file(path, &json, "deployment plan")?,
        None => println!("{json}"),
    }
    Ok(())
}

fn run_graph_check(args: GraphCheckArgs) -> Result<()> {
    if args.json && (args.emit_dot || args.dot.is_some()) {
        return Err(anyhow!("--json cannot be combined with --emit-dot or --dot"));
    }

    let payload = match args.input {
        Some(path) => {
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read resource graph from stdin")?;
            buf
        }
    };

    let graph: ResourceGraph =
        serde_json::from_slice(&payload).context("input is not valid resource graph JSON")?;

    let resource_count = graph.resources().len();
    let edge_count = graph.edges().len();

    // Validation reports warnings; cycles only surface once steps are ordered.
    let outcome = validate(&graph).and_then(|validated| {
        let warnings = validated.warnings().to_vec();
        match assemble(&graph) {
            Ok(plan) => Ok((warnings, plan.steps.len())),
            Err(err) => Err(assembly_diagnostics(&err)),
        }
    });

    match outcome {
        Ok((warnings, step_count)) => {
            if args.json {
                let response = GraphCheckResponse {
                    status: GraphStatus::Ok,
                    resource_count,
                    edge_count,
                    step_count: Some(step_count),
                    diagnostics: warnings.iter().map(DiagnosticPayload::from).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }
            println!(
                "✓ graph is valid ({resource_count} resources, {edge_count} edges, {step_count} steps)"
            );
            for diag in &warnings {
                eprintln!("{}", format_text_diagnostic(diag));
            }
        }
        Err(diags) => {
            if args.json {
                let response = GraphCheckResponse {
                    status: GraphStatus::Error,
                    resource_count,
                    edge_count,
                    step_count: None,
                    diagnostics: diags.iter().map(DiagnosticPayload::from).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                eprintln!(
                    "✗ graph validation failed with {} diagnostic(s):",
                    diags.len()
                );
                for diag in &diags {
                    eprintln!("{}", format_text_diagnostic(diag));
                }
            }
            return Err(anyhow!("graph validation failed"));
        }
    }

    if args.emit_dot {
        println!("{}", graph_to_dot(&graph));
    }

    if let Some(path) = args.dot {
        write_file(&path, &graph_to_dot(&graph), "DOT graph")?;
    }

    Ok(())
}

fn run_schema(args: SchemaArgs) -> Result<()> {
    let schema = match args.kind {
        SchemaKind::Graph => serde_json::to_value(resource_graph_schema())?,
        SchemaKind::Plan => serde_json::to_value(deployment_plan_schema())?,
    };
    let json = serde_json::to_string_pretty(&schema)?;
    match &args.out {
        Some(path) => write_file(path, &json, "schema"),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn write_file(path: &Path, contents: &str, what: &str) -> Result<()> {
    fs::write(path, contents)
        .with_context(|| format!("failed to write {what} to {}", path.display()))?;
    eprintln!("{what} written to {}", path.display());
    Ok(())
}

fn build_diagnostic(err: &StackError) -> Diagnostic {
    Diagnostic::from_code(err.code(), err.to_string())
}

fn assembly_diagnostics(err: &AssemblyError) -> Vec<Diagnostic> {
    match err {
        AssemblyError::Rejected { diagnostics } => diagnostics.clone(),
        AssemblyError::Cycle { .. } => vec![Diagnostic::from_code("STK300", err.to_string())],
    }
}

fn format_text_diagnostic(diag: &Diagnostic) -> String {
    let severity = format_severity(diag.code.default_severity);
    let mut output = format!(
        "  [{}] {}({}): {}",
        diag.code.code, severity, diag.code.subsystem, diag.message
    );
    output.push('\n');
    output.push_str(&format!("      summary: {}", diag.code.summary));
    if let Some(location) = &diag.location {
        output.push('\n');
        output.push_str(&format!("      location: {location}"));
    }
    output
}

fn format_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warn => "warn",
        Severity::Info => "info",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum GraphStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
struct GraphCheckResponse {
    status: GraphStatus,
    resource_count: usize,
    edge_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    step_count: Option<usize>,
    diagnostics: Vec<DiagnosticPayload>,
}

#[derive(Debug, Serialize)]
struct DiagnosticPayload {
    code: String,
    severity: Severity,
    subsystem: String,
    summary: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

impl From<&Diagnostic> for DiagnosticPayload {
    fn from(diag: &Diagnostic) -> Self {
        Self {
            code: diag.code.code.to_string(),
            severity: diag.code.default_severity,
            subsystem: diag.code.subsystem.to_string(),
            summary: diag.code.summary.to_string(),
            message: diag.message.clone(),
            location: diag.location.clone(),
        }
    }
}
