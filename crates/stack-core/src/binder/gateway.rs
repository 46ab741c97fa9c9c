use tracing::{debug, instrument};

use crate::error::{BindingError, ConfigurationError, StackResult};
use crate::graph::ResourceGraph;
use crate::ir::{
    ApiRoute, CorsConfig, Edge, GatewaySpec, HttpMethod, Integration, MockResponse, ResourceId,
    RoutePath,
};

/// Declares the stack's gateway and attaches routes to it.
///
/// Functional routes proxy to compute units. Preflight routes answer with a static mock
/// response computed here, so no compute unit is provisioned just to serve `OPTIONS`.
pub struct GatewayBinder<'g> {
    graph: &'g mut ResourceGraph,
}

impl<'g> GatewayBinder<'g> {
    pub fn new(graph: &'g mut ResourceGraph) -> Self {
        Self { graph }
    }

    /// Declare the stack's single REST gateway.
    pub fn declare(
        &mut self,
        id: impl Into<ResourceId>,
        name: impl Into<String>,
    ) -> StackResult<ResourceId> {
        let spec = GatewaySpec {
            id: id.into(),
            name: name.into(),
        };
        debug!(gateway = %spec.id, name = %spec.name, "declaring gateway");
        self.graph.declare_gateway(spec)
    }

    /// Route `method path` to `unit`.
    #[instrument(skip_all, fields(method = %method, path = path, unit = %unit))]
    pub fn route(
        &mut self,
        path: &str,
        method: HttpMethod,
        unit: &ResourceId,
    ) -> StackResult<String> {
        self.add_route(
            path,
            method,
            Integration::ComputeBacked { unit: unit.clone() },
            None,
        )
    }

    /// Add an `OPTIONS` preflight on `path` using the default CORS policy.
    pub fn add_cors(&mut self, path: &str) -> StackResult<String> {
        self.add_cors_with(path, CorsConfig::default())
    }

    /// Add an `OPTIONS` preflight on `path` answering with `cors`.
    #[instrument(skip_all, fields(path = path))]
    pub fn add_cors_with(&mut self, path: &str, cors: CorsConfig) -> StackResult<String> {
        let response = MockResponse::cors_preflight(&cors);
        self.add_route(
            path,
            HttpMethod::Options,
            Integration::Mock(response),
            Some(cors),
        )
    }

    fn add_route(
        &mut self,
        path: &str,
        method: HttpMethod,
        integration: Integration,
        cors: Option<CorsConfig>,
    ) -> StackResult<String> {
        let gateway = self
            .graph
            .gateway()
            .map(|gateway| gateway.id.clone())
            .ok_or(BindingError::MissingGateway)?;
        let path = RoutePath::parse(path)?;
        if self
            .graph
            .routes()
            .any(|route| route.path == path && route.method == method)
        {
            return Err(ConfigurationError::DuplicateRoute {
                path: path.to_string(),
                method,
            }
            .into());
        }

        let route = ApiRoute {
            gateway,
            path,
            method,
            integration,
            cors,
        };
        let key = route.key();
        self.graph.add_edge(Edge::Route(route))?;
        debug!(route = %key, "recorded route");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ComputeUnitDefinition;
    use crate::error::StackError;
    use crate::ir::{
        HEADER_ALLOW_CREDENTIALS, HEADER_ALLOW_HEADERS, HEADER_ALLOW_METHODS, HEADER_ALLOW_ORIGIN,
    };

    fn graph_with_unit() -> (ResourceGraph, ResourceId) {
        let mut graph = ResourceGraph::new("sample");
        let unit = graph
            .register(
                ComputeUnitDefinition::new("get-all.ts")
                    .build("getAll")
                    .expect("unit"),
            )
            .expect("register");
        GatewayBinder::new(&mut graph)
            .declare("itemsApi", "Items Service")
            .expect("gateway");
        (graph, unit)
    }

    fn preflight(graph: &ResourceGraph, path: &str) -> MockResponse {
        graph
            .routes()
            .find(|route| route.method == HttpMethod::Options && route.path.as_str() == path)
            .and_then(|route| match &route.integration {
                Integration::Mock(response) => Some(response.clone()),
                Integration::ComputeBacked { .. } => None,
            })
            .expect("mock preflight route")
    }

    #[test]
    fn cors_preflight_is_static_and_complete() {
        let (mut graph, unit) = graph_with_unit();
        let mut binder = GatewayBinder::new(&mut graph);
        assert_eq!(
            binder.route("items", HttpMethod::Get, &unit).expect("route"),
            "GET /items"
        );
        assert_eq!(binder.add_cors("/items/").expect("cors"), "OPTIONS /items");

        let response = preflight(&graph, "/items");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.request_template, r#"{"statusCode": 200}"#);
        assert_eq!(
            response.headers.get(HEADER_ALLOW_HEADERS).map(String::as_str),
            Some("Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token,X-Amz-User-Agent")
        );
        assert_eq!(
            response.headers.get(HEADER_ALLOW_ORIGIN).map(String::as_str),
            Some("*")
        );
        assert_eq!(
            response.headers.get(HEADER_ALLOW_CREDENTIALS).map(String::as_str),
            Some("false")
        );
        assert_eq!(
            response.headers.get(HEADER_ALLOW_METHODS).map(String::as_str),
            Some("OPTIONS,GET,PUT,POST,DELETE")
        );
    }

    #[test]
    fn preflight_does_not_depend_on_registered_methods() {
        let (mut bare, _) = graph_with_unit();
        GatewayBinder::new(&mut bare).add_cors("/items").expect("cors");

        let (mut busy, unit) = graph_with_unit();
        let mut binder = GatewayBinder::new(&mut busy);
        for method in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Delete] {
            binder.route("/items", method, &unit).expect("route");
        }
        binder.add_cors("/items").expect("cors");

        assert_eq!(preflight(&bare, "/items"), preflight(&busy, "/items"));
    }

    #[test]
    fn duplicate_method_on_a_path_is_rejected() {
        let (mut graph, unit) = graph_with_unit();
        let mut binder = GatewayBinder::new(&mut graph);
        binder.route("/items", HttpMethod::Get, &unit).expect("first");
        binder.route("/items/{itemId}", HttpMethod::Get, &unit).expect("other path");
        let err = binder
            .route("items", HttpMethod::Get, &unit)
            .expect_err("duplicate");
        assert_eq!(
            err,
            StackError::Configuration(ConfigurationError::DuplicateRoute {
                path: "/items".to_string(),
                method: HttpMethod::Get,
            })
        );
    }

    #[test]
    fn routes_need_a_declared_gateway() {
        let mut graph = ResourceGraph::new("sample");
        let unit = graph
            .register(ComputeUnitDefinition::new("a.ts").build("a").expect("unit"))
            .expect("register");
        let err = GatewayBinder::new(&mut graph)
            .route("/a", HttpMethod::Get, &unit)
            .expect_err("no gateway");
        assert_eq!(err, StackError::Binding(BindingError::MissingGateway));
    }

    #[test]
    fn second_gateway_is_rejected() {
        let (mut graph, _) = graph_with_unit();
        let err = GatewayBinder::new(&mut graph)
            .declare("otherApi", "Other")
            .expect_err("second gateway");
        assert_eq!(
            err,
            StackError::Configuration(ConfigurationError::GatewayAlreadyDeclared(
                "itemsApi".into()
            ))
        );
    }

    #[test]
    fn route_to_unknown_unit_is_a_binding_error() {
        let (mut graph, _) = graph_with_unit();
        let err = GatewayBinder::new(&mut graph)
            .route("/items", HttpMethod::Get, &ResourceId::new("ghost"))
            .expect_err("unknown unit");
        assert!(matches!(
            err,
            StackError::Binding(BindingError::UnknownResource {
                role: "route integration",
                ..
            })
        ));
        assert_eq!(graph.routes().count(), 0);
    }
}
