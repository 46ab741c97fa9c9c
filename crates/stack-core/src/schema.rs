use schemars::schema::{Metadata, RootSchema};

use crate::ResourceGraph;

pub const RESOURCE_GRAPH_SCHEMA_FILE: &str = "resource_graph.schema.json";

const RESOURCE_GRAPH_SCHEMA_ID: &str = "https://stacks.dev/schemas/resource_graph.schema.json";
const RESOURCE_GRAPH_SCHEMA_TITLE: &str = "Stack Resource Graph";
const RESOURCE_GRAPH_SCHEMA_DESCRIPTION: &str =
    "Declared resources of a serverless stack and the grant, environment, schedule and route edges between them.";

/// Stamp draft, id, title and description onto a generated schema.
pub fn annotate(mut schema: RootSchema, id: &str, title: &str, description: &str) -> RootSchema {
    schema.meta_schema = Some("https://json-schema.org/draft/2020-12/schema".to_string());

    let metadata = schema
        .schema
        .metadata
        .get_or_insert_with(|| Box::new(Metadata::default()));
    metadata.id = Some(id.to_string());
    metadata.title = Some(title.to_string());
    metadata.description = Some(description.to_string());

    schema
}

pub fn resource_graph_schema() -> RootSchema {
    annotate(
        schemars::schema_for!(ResourceGraph),
        RESOURCE_GRAPH_SCHEMA_ID,
        RESOURCE_GRAPH_SCHEMA_TITLE,
        RESOURCE_GRAPH_SCHEMA_DESCRIPTION,
    )
}

pub fn schema_json_for_file(file_name: &str) -> Option<serde_json::Value> {
    match file_name {
        RESOURCE_GRAPH_SCHEMA_FILE => serde_json::to_value(resource_graph_schema()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_schema_carries_metadata_and_definitions() {
        let schema = schema_json_for_file(RESOURCE_GRAPH_SCHEMA_FILE).expect("known schema");
        assert_eq!(schema["$id"], RESOURCE_GRAPH_SCHEMA_ID);
        assert_eq!(schema["title"], RESOURCE_GRAPH_SCHEMA_TITLE);
        let definitions = schema["definitions"].as_object().expect("definitions");
        for name in ["Resource", "Edge", "ApiRoute", "CorsConfig"] {
            assert!(definitions.contains_key(name), "missing `{name}` definition");
        }
    }

    #[test]
    fn unknown_schema_file_is_none() {
        assert!(schema_json_for_file("flow.schema.json").is_none());
    }
}
