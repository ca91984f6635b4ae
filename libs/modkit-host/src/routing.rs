//! HTTP route groups registered by modules.
//!
//! A module hands the host a [`RouteSet`]: route descriptors plus the axum handlers
//! serving them. Every registration replaces the registrar's previous group wholesale,
//! so re-registering after the router comes back is always safe.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use axum::{
    Extension, Router,
    extract::{Request, State},
    http::Method,
    middleware::from_fn_with_state,
    response::Response,
    routing::MethodRouter,
};
use tower::ServiceExt;

use crate::auth::{Authenticator, require_identity};

/// Descriptor of a single route, as published to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub name: &'static str,
    pub method: Method,
    pub path: &'static str,
    pub description: &'static str,
    pub requires_auth: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum RouteError {
    #[error("route binder is not bound to a registrar")]
    NotBound,
    #[error("registrar rejected route group '{group}': {reason}")]
    Registrar { group: String, reason: String },
}

/// A group of routes registered in one call.
#[derive(Default)]
#[must_use]
pub struct RouteSet {
    entries: Vec<(RouteSpec, MethodRouter)>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, spec: RouteSpec, handler: MethodRouter) -> Self {
        self.entries.push((spec, handler));
        self
    }

    /// Make `value` available to every handler in the set through `Extension<T>`.
    pub fn with_extension<T>(self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        Self {
            entries: self
                .entries
                .into_iter()
                .map(|(spec, handler)| (spec, handler.layer(Extension(value.clone()))))
                .collect(),
        }
    }

    pub fn specs(&self) -> impl Iterator<Item = &RouteSpec> {
        self.entries.iter().map(|(spec, _)| spec)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
pub trait RouteRegistrar: Send + Sync {
    /// Replace this registrar's route group with `routes`.
    ///
    /// # Errors
    /// Returns [`RouteError::Registrar`] if the group is rejected; the previous
    /// group then stays in place.
    async fn register(&self, routes: RouteSet) -> Result<(), RouteError>;
}

/// In-process registrar. Serves the most recently registered group.
pub struct RouteTable {
    group: &'static str,
    authenticator: Arc<dyn Authenticator>,
    router: ArcSwap<Router>,
    specs: ArcSwap<Vec<RouteSpec>>,
}

impl RouteTable {
    #[must_use]
    pub fn new(group: &'static str, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            group,
            authenticator,
            router: ArcSwap::from_pointee(Router::new()),
            specs: ArcSwap::from_pointee(Vec::new()),
        }
    }

    #[must_use]
    pub fn group(&self) -> &'static str {
        self.group
    }

    /// Descriptors of the currently registered routes.
    #[must_use]
    pub fn specs(&self) -> Arc<Vec<RouteSpec>> {
        self.specs.load_full()
    }

    #[must_use]
    pub fn has_route(&self, name: &str) -> bool {
        self.specs.load().iter().any(|spec| spec.name == name)
    }

    /// A router that forwards every request to the current group.
    pub fn service(self: &Arc<Self>) -> Router {
        Router::new().fallback(dispatch).with_state(self.clone())
    }

    fn build(&self, routes: RouteSet) -> Result<(Router, Vec<RouteSpec>), RouteError> {
        let mut seen = HashSet::new();
        let mut router = Router::new();
        let mut specs = Vec::with_capacity(routes.len());

        for (spec, handler) in routes.entries {
            if !seen.insert((spec.method.clone(), spec.path)) {
                tracing::error!(
                    group = self.group,
                    method = %spec.method,
                    path = spec.path,
                    "Duplicate (method, path) in route group"
                );
                return Err(RouteError::Registrar {
                    group: self.group.to_owned(),
                    reason: format!("duplicate route {} {}", spec.method, spec.path),
                });
            }

            let handler = if spec.requires_auth {
                handler.route_layer(from_fn_with_state(
                    self.authenticator.clone(),
                    require_identity,
                ))
            } else {
                handler
            };
            router = router.route(spec.path, handler);
            specs.push(spec);
        }

        Ok((router, specs))
    }
}

#[async_trait]
impl RouteRegistrar for RouteTable {
    async fn register(&self, routes: RouteSet) -> Result<(), RouteError> {
        let (router, specs) = self.build(routes)?;
        for spec in &specs {
            tracing::debug!(
                group = self.group,
                name = spec.name,
                method = %spec.method,
                path = spec.path,
                requires_auth = spec.requires_auth,
                "registered route"
            );
        }
        tracing::info!(group = self.group, count = specs.len(), "route group replaced");
        self.router.store(Arc::new(router));
        self.specs.store(Arc::new(specs));
        Ok(())
    }
}

async fn dispatch(State(table): State<Arc<RouteTable>>, request: Request) -> Response {
    let router = Router::clone(&table.router.load());
    match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::auth::{Identity, StaticAuthenticator};
    use axum::{body::Body, http::StatusCode, routing::get};
    use std::collections::BTreeMap;

    fn table() -> Arc<RouteTable> {
        let auth = StaticAuthenticator::new(BTreeMap::from([(
            "t".to_owned(),
            "erin@example.com".to_owned(),
        )]));
        Arc::new(RouteTable::new("app", Arc::new(auth)))
    }

    fn spec(name: &'static str, path: &'static str, requires_auth: bool) -> RouteSpec {
        RouteSpec {
            name,
            method: Method::GET,
            path,
            description: "test route",
            requires_auth,
        }
    }

    async fn status_of(router: Router, uri: &str, token: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn unregistered_table_answers_not_found() {
        let table = table();
        assert_eq!(status_of(table.service(), "/a", None).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn registration_replaces_previous_group() {
        let table = table();
        table
            .register(RouteSet::new().route(spec("a", "/a", false), get(|| async { "a" })))
            .await
            .unwrap();
        assert_eq!(status_of(table.service(), "/a", None).await, StatusCode::OK);

        table
            .register(RouteSet::new().route(spec("b", "/b", false), get(|| async { "b" })))
            .await
            .unwrap();
        assert_eq!(status_of(table.service(), "/a", None).await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(table.service(), "/b", None).await, StatusCode::OK);
        assert!(table.has_route("b"));
        assert!(!table.has_route("a"));
    }

    #[tokio::test]
    async fn authenticated_routes_require_a_valid_token() {
        let table = table();
        let handler = get(|Identity(who): Identity| async move { who.local_part().to_owned() });
        table
            .register(RouteSet::new().route(spec("me", "/me", true), handler))
            .await
            .unwrap();

        assert_eq!(
            status_of(table.service(), "/me", None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(table.service(), "/me", Some("wrong")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(table.service(), "/me", Some("t")).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn duplicate_routes_are_rejected() {
        let table = table();
        let set = RouteSet::new()
            .route(spec("a", "/a", false), get(|| async { "a" }))
            .route(spec("a2", "/a", false), get(|| async { "a2" }));

        let err = table.register(set).await.unwrap_err();
        assert!(matches!(err, RouteError::Registrar { .. }));
        assert!(table.specs().is_empty());
    }

    #[tokio::test]
    async fn extensions_reach_handlers() {
        let table = table();
        let handler = get(|Extension(greeting): Extension<&'static str>| async move { greeting });
        table
            .register(
                RouteSet::new()
                    .route(spec("hi", "/hi", false), handler)
                    .with_extension("hello"),
            )
            .await
            .unwrap();

        let response = table
            .service()
            .oneshot(Request::builder().uri("/hi").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello");
    }
}
