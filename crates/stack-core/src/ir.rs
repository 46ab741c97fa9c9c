use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigurationError;

/// Unique identifier for a stack.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct StackId(pub String);

impl StackId {
    /// Deterministically derive a stack id from the stack name.
    pub fn new(name: &str) -> Self {
        let namespace = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"stacks.resource-graph");
        let uuid = Uuid::new_v5(&namespace, name.as_bytes());
        Self(uuid.to_string())
    }

    /// Access the underlying UUID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a declared resource, unique within a graph.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, PartialOrd, Ord,
)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Construct a resource id.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Why this id cannot name a resource, if it cannot.
    pub fn problem(&self) -> Option<String> {
        identifier_problem(&self.0)
    }
}

/// Why `id` cannot name a resource or schedule rule, if it cannot.
///
/// Ids are non-empty and use only ASCII letters, digits, `-`, `_` and `.`, so every plan step
/// id built from them (`grant/{unit}/{store}`) names exactly one step.
pub fn identifier_problem(id: &str) -> Option<String> {
    if id.is_empty() {
        return Some("id cannot be empty".to_string());
    }
    id.chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
        .map(|ch| {
            format!(
                "id `{id}` contains `{}`; use letters, digits, `-`, `_` or `.`",
                ch.escape_default()
            )
        })
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Name and derived identifier of the stack a graph describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StackMetadata {
    pub id: StackId,
    pub name: String,
}

impl StackMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: StackId::new(&name),
            name,
        }
    }
}

/// High-level resource categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Managed key-value table.
    Table,
    /// Serverless function.
    ComputeUnit,
    /// HTTP front door.
    Gateway,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Table => "table",
            ResourceKind::ComputeUnit => "compute unit",
            ResourceKind::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource node within the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Resource {
    /// Identifier unique within the stack.
    pub id: ResourceId,
    /// Kind-specific configuration.
    pub config: ResourceConfig,
}

impl Resource {
    pub fn new(id: impl Into<ResourceId>, config: ResourceConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self.config {
            ResourceConfig::Table(_) => ResourceKind::Table,
            ResourceConfig::ComputeUnit(_) => ResourceKind::ComputeUnit,
        }
    }

    pub fn as_table(&self) -> Option<&TableSpec> {
        match &self.config {
            ResourceConfig::Table(table) => Some(table),
            ResourceConfig::ComputeUnit(_) => None,
        }
    }

    pub fn as_compute_unit(&self) -> Option<&ComputeUnitSpec> {
        match &self.config {
            ResourceConfig::ComputeUnit(unit) => Some(unit),
            ResourceConfig::Table(_) => None,
        }
    }
}

/// Kind-tagged resource configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConfig {
    Table(TableSpec),
    ComputeUnit(ComputeUnitSpec),
}

/// Key-value table declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableSpec {
    /// The single partition key of the table.
    pub partition_key: KeyAttribute,
    /// Physical table name; the backend derives one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// What happens to the table when the stack is torn down.
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

/// Key attribute name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

/// Scalar attribute types usable as table keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

/// Teardown behaviour for stateful resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Keep the resource (and its data) when the stack is destroyed.
    #[default]
    Retain,
    /// Delete the resource together with the stack, data included.
    Destroy,
}

/// Function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ComputeUnitSpec {
    /// Entry source file handed to the bundler.
    pub entry: String,
    /// Exported handler symbol inside the entry.
    pub handler: String,
    pub runtime: Runtime,
    /// Environment bindings, fixed once the unit is declared.
    #[serde(default)]
    pub environment: BTreeMap<String, EnvValue>,
    /// Opaque bundling commands grouped by phase.
    #[serde(default, skip_serializing_if = "PackagingSteps::is_empty")]
    pub packaging: PackagingSteps,
    /// Dependency lock file used by the bundler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deps_lock_file: Option<String>,
}

impl ComputeUnitSpec {
    /// References to other resources' provisioned attributes, in key order.
    pub fn references(&self) -> impl Iterator<Item = (&str, &AttributeRef)> {
        self.environment
            .iter()
            .filter_map(|(key, value)| match value {
                EnvValue::Ref(reference) => Some((key.as_str(), reference)),
                EnvValue::Literal { .. } => None,
            })
    }
}

/// Runtime identifiers understood by deployment backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Runtime {
    #[default]
    #[serde(rename = "nodejs18.x")]
    Nodejs18,
    #[serde(rename = "nodejs20.x")]
    Nodejs20,
    #[serde(rename = "python3.12")]
    Python312,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

impl Runtime {
    pub fn identifier(self) -> &'static str {
        match self {
            Runtime::Nodejs18 => "nodejs18.x",
            Runtime::Nodejs20 => "nodejs20.x",
            Runtime::Python312 => "python3.12",
            Runtime::ProvidedAl2023 => "provided.al2023",
        }
    }
}

/// Environment binding value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvValue {
    /// Fixed string known at build time.
    Literal { value: String },
    /// Attribute of another resource, resolved by the deployment backend.
    Ref(AttributeRef),
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal {
            value: value.into(),
        }
    }

    pub fn reference(resource: impl Into<ResourceId>, attribute: ResourceAttribute) -> Self {
        EnvValue::Ref(AttributeRef {
            resource: resource.into(),
            attribute,
        })
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            EnvValue::Literal { value } => Some(value),
            EnvValue::Ref(_) => None,
        }
    }
}

/// Pointer to a provisioned attribute of a declared resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AttributeRef {
    pub resource: ResourceId,
    pub attribute: ResourceAttribute,
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.attribute.as_str())
    }
}

/// Identifiers that only exist once a backend has provisioned a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAttribute {
    TableName,
    FunctionArn,
    EndpointUrl,
}

impl ResourceAttribute {
    /// Kind of resource that exposes this attribute.
    pub fn owner_kind(self) -> ResourceKind {
        match self {
            ResourceAttribute::TableName => ResourceKind::Table,
            ResourceAttribute::FunctionArn => ResourceKind::ComputeUnit,
            ResourceAttribute::EndpointUrl => ResourceKind::Gateway,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceAttribute::TableName => "tableName",
            ResourceAttribute::FunctionArn => "functionArn",
            ResourceAttribute::EndpointUrl => "endpointUrl",
        }
    }
}

/// Bundling lifecycle phases, in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum PackagingPhase {
    PreInstall,
    PreBundle,
    PostBundle,
}

impl PackagingPhase {
    pub const ALL: [PackagingPhase; 3] = [
        PackagingPhase::PreInstall,
        PackagingPhase::PreBundle,
        PackagingPhase::PostBundle,
    ];
}

/// Shell-like commands per phase. Commands may use `{input_dir}` and `{output_dir}`
/// placeholders; they are never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PackagingSteps(BTreeMap<PackagingPhase, Vec<String>>);

impl PackagingSteps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, phase: PackagingPhase, command: impl Into<String>) {
        self.0.entry(phase).or_default().push(command.into());
    }

    pub fn commands(&self, phase: PackagingPhase) -> &[String] {
        self.0.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Iterate phases in execution order, skipping empty ones.
    pub fn iter(&self) -> impl Iterator<Item = (PackagingPhase, &[String])> {
        self.0
            .iter()
            .filter(|(_, commands)| !commands.is_empty())
            .map(|(phase, commands)| (*phase, commands.as_slice()))
    }
}

/// Single REST gateway fronting the stack's routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewaySpec {
    pub id: ResourceId,
    /// Display name of the API.
    pub name: String,
}

/// Derived relation between declared resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edge {
    Grant(Grant),
    Environment(EnvironmentBinding),
    Schedule(ScheduleRule),
    Route(ApiRoute),
}

/// Endpoint an edge expects to find in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeReference<'a> {
    pub id: &'a ResourceId,
    pub expected: ResourceKind,
    /// Role of the endpoint, used in error messages.
    pub role: &'static str,
}

impl Edge {
    /// Resources this edge points at, each with the kind it must have.
    pub fn references(&self) -> Vec<EdgeReference<'_>> {
        match self {
            Edge::Grant(grant) => vec![
                EdgeReference {
                    id: &grant.unit,
                    expected: ResourceKind::ComputeUnit,
                    role: "grantee",
                },
                EdgeReference {
                    id: &grant.store,
                    expected: ResourceKind::Table,
                    role: "grant target",
                },
            ],
            Edge::Environment(binding) => vec![
                EdgeReference {
                    id: &binding.unit,
                    expected: ResourceKind::ComputeUnit,
                    role: "bound unit",
                },
                EdgeReference {
                    id: &binding.target.resource,
                    expected: binding.target.attribute.owner_kind(),
                    role: "environment reference",
                },
            ],
            Edge::Schedule(rule) => vec![EdgeReference {
                id: &rule.target,
                expected: ResourceKind::ComputeUnit,
                role: "schedule target",
            }],
            Edge::Route(route) => {
                let mut refs = vec![EdgeReference {
                    id: &route.gateway,
                    expected: ResourceKind::Gateway,
                    role: "gateway",
                }];
                if let Integration::ComputeBacked { unit } = &route.integration {
                    refs.push(EdgeReference {
                        id: unit,
                        expected: ResourceKind::ComputeUnit,
                        role: "route integration",
                    });
                }
                refs
            }
        }
    }
}

/// Symbolic data-plane permissions on a store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub const READ_WRITE: [Permission; 2] = [Permission::Read, Permission::Write];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }

    /// Concrete store actions implied by the permission.
    pub fn actions(self) -> &'static [&'static str] {
        match self {
            Permission::Read => &[
                "store:BatchGetItem",
                "store:ConditionCheckItem",
                "store:DescribeTable",
                "store:GetItem",
                "store:Query",
                "store:Scan",
            ],
            Permission::Write => &[
                "store:BatchWriteItem",
                "store:DeleteItem",
                "store:DescribeTable",
                "store:PutItem",
                "store:UpdateItem",
            ],
        }
    }
}

/// Permission edge from a compute unit to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Grant {
    pub unit: ResourceId,
    pub store: ResourceId,
    pub permissions: BTreeSet<Permission>,
}

impl Grant {
    /// Sorted, de-duplicated action list covering every granted permission.
    pub fn actions(&self) -> Vec<String> {
        let actions: BTreeSet<&str> = self
            .permissions
            .iter()
            .flat_map(|permission| permission.actions().iter().copied())
            .collect();
        actions.into_iter().map(str::to_string).collect()
    }
}

/// Environment key of a unit bound to another resource's attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentBinding {
    pub unit: ResourceId,
    pub key: String,
    pub target: AttributeRef,
}

/// Time-based trigger invoking exactly one compute unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScheduleRule {
    pub id: String,
    /// Cron expression as declared, e.g. `cron(0 2 * * ? *)`.
    pub expression: String,
    pub target: ResourceId,
}

/// HTTP methods routable through the gateway.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(ConfigurationError::InvalidDefinition {
                field: "http method",
                reason: format!("unsupported method `{other}`"),
            }),
        }
    }
}

/// Normalised gateway path such as `/items` or `/items/{itemId}`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct RoutePath(String);

impl RoutePath {
    /// Parse and normalise a path; leading/trailing slashes are optional.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self("/".to_string()));
        }
        let mut normalised = String::new();
        for segment in trimmed.split('/') {
            if !valid_segment(segment) {
                return Err(ConfigurationError::InvalidDefinition {
                    field: "route path",
                    reason: format!("invalid segment `{segment}` in `{raw}`"),
                });
            }
            normalised.push('/');
            normalised.push_str(segment);
        }
        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Match a concrete request path, treating `{param}` segments as wildcards.
    pub fn matches(&self, request_path: &str) -> bool {
        let request: Vec<&str> = request_path
            .split('?')
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let pattern: Vec<&str> = self.segments().collect();
        if let Some(last) = pattern.last() {
            if last.ends_with("+}") {
                return request.len() >= pattern.len()
                    && pattern[..pattern.len() - 1]
                        .iter()
                        .zip(&request)
                        .all(|(p, r)| segment_matches(p, r));
            }
        }
        pattern.len() == request.len()
            && pattern
                .iter()
                .zip(&request)
                .all(|(p, r)| segment_matches(p, r))
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn valid_segment(segment: &str) -> bool {
    if let Some(inner) = segment
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    {
        let name = inner.strip_suffix('+').unwrap_or(inner);
        return !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    }
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn segment_matches(pattern: &str, request: &str) -> bool {
    pattern.starts_with('{') || pattern == request
}

/// HTTP route registered on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ApiRoute {
    pub gateway: ResourceId,
    pub path: RoutePath,
    pub method: HttpMethod,
    pub integration: Integration,
    /// Present on preflight routes synthesised for CORS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsConfig>,
}

impl ApiRoute {
    /// `METHOD /path` key, unique per gateway.
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Backend wired behind a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Integration {
    /// Requests are proxied to a compute unit.
    ComputeBacked { unit: ResourceId },
    /// The gateway answers with a static response; nothing is invoked.
    Mock(MockResponse),
}

impl Integration {
    pub fn unit(&self) -> Option<&ResourceId> {
        match self {
            Integration::ComputeBacked { unit } => Some(unit),
            Integration::Mock(_) => None,
        }
    }
}

/// How the gateway treats request bodies with no matching template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PassthroughBehavior {
    #[default]
    Never,
    WhenNoMatch,
    WhenNoTemplates,
}

/// Canned response computed at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MockResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request mapping template for `application/json`.
    pub request_template: String,
    #[serde(default)]
    pub passthrough: PassthroughBehavior,
}

impl MockResponse {
    /// Static 200 response carrying the CORS headers of `cors`.
    pub fn cors_preflight(cors: &CorsConfig) -> Self {
        Self {
            status_code: 200,
            headers: cors.response_headers(),
            request_template: r#"{"statusCode": 200}"#.to_string(),
            passthrough: PassthroughBehavior::Never,
        }
    }
}

pub const HEADER_ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const HEADER_ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const HEADER_ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";
pub const HEADER_ALLOW_METHODS: &str = "Access-Control-Allow-Methods";

/// Cross-origin policy answered by a preflight route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CorsConfig {
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<HttpMethod>,
    pub allowed_origin: String,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_headers: [
                "Content-Type",
                "X-Amz-Date",
                "Authorization",
                "X-Api-Key",
                "X-Amz-Security-Token",
                "X-Amz-User-Agent",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            allowed_methods: vec![
                HttpMethod::Options,
                HttpMethod::Get,
                HttpMethod::Put,
                HttpMethod::Post,
                HttpMethod::Delete,
            ],
            allowed_origin: "*".to_string(),
            allow_credentials: false,
        }
    }
}

impl CorsConfig {
    /// The four `Access-Control-Allow-*` headers, keyed by header name.
    pub fn response_headers(&self) -> BTreeMap<String, String> {
        let methods: Vec<&str> = self.allowed_methods.iter().map(|m| m.as_str()).collect();
        BTreeMap::from([
            (
                HEADER_ALLOW_HEADERS.to_string(),
                self.allowed_headers.join(","),
            ),
            (
                HEADER_ALLOW_ORIGIN.to_string(),
                self.allowed_origin.clone(),
            ),
            (
                HEADER_ALLOW_CREDENTIALS.to_string(),
                self.allow_credentials.to_string(),
            ),
            (HEADER_ALLOW_METHODS.to_string(), methods.join(",")),
        ])
    }

    pub fn allows(&self, method: HttpMethod) -> bool {
        self.allowed_methods.contains(&method)
    }
}
