use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    let schema_name = env::args()
        .nth(1)
        .unwrap_or_else(|| stack_core::schema::RESOURCE_GRAPH_SCHEMA_FILE.to_string());

    let Some(schema_json) = stack_core::schema::schema_json_for_file(schema_name.as_str()) else {
        eprintln!("unknown schema `{schema_name}`");
        return ExitCode::FAILURE;
    };

    match serde_json::to_string_pretty(&schema_json) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to serialize schema: {err}");
            ExitCode::FAILURE
        }
    }
}
