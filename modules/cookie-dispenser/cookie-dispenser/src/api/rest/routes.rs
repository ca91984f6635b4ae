//! Route binders for the admin and application groups.
//!
//! A binder is bound once to the registrar the host hands out, then registers its
//! whole group on every call to `register_routes`. The registrar replaces the
//! previous group, so calling it again after the router comes back is safe.

use std::sync::{Arc, OnceLock};

use axum::http::Method;
use axum::routing::{get, post};
use modkit_host::{RouteError, RouteRegistrar, RouteSet, RouteSpec};

use crate::domain::Service;

use super::handlers;

pub const RESET_PATH: &str = "/cookies/reset";
pub const GUEST_COOKIES_PATH: &str = "/cookies/guest";
pub const COOKIES_PATH: &str = "/cookies";

const GET_COOKIE_DESCRIPTION: &str = "Receive a free cookie... or get judged upon!";
const RESET_DESCRIPTION: &str = "Reset the amount of available cookies.";

#[derive(Default)]
struct Binding {
    registrar: OnceLock<Arc<dyn RouteRegistrar>>,
}

impl Binding {
    fn bind(&self, group: &'static str, registrar: Arc<dyn RouteRegistrar>) {
        if self.registrar.set(registrar).is_err() {
            tracing::debug!(group, "route binder already bound");
        }
    }

    fn is_bound(&self) -> bool {
        self.registrar.get().is_some()
    }

    fn registrar(&self) -> Result<&Arc<dyn RouteRegistrar>, RouteError> {
        self.registrar.get().ok_or(RouteError::NotBound)
    }
}

/// Administrative routes, served by the host under `/admin`.
pub struct AdminRoutes {
    service: Arc<Service>,
    binding: Binding,
}

impl AdminRoutes {
    #[must_use]
    pub fn new(service: Arc<Service>) -> Self {
        Self {
            service,
            binding: Binding::default(),
        }
    }

    /// Attach to `registrar`. Only the first call has an effect.
    pub fn bind(&self, registrar: Arc<dyn RouteRegistrar>) {
        self.binding.bind("admin", registrar);
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_bound()
    }

    pub fn route_set(&self) -> RouteSet {
        RouteSet::new()
            .route(
                RouteSpec {
                    name: "ResetCookies",
                    method: Method::POST,
                    path: RESET_PATH,
                    description: RESET_DESCRIPTION,
                    requires_auth: false,
                },
                post(handlers::reset_cookies),
            )
            .with_extension(self.service.clone())
    }

    /// # Errors
    /// Returns [`RouteError::NotBound`] before [`Self::bind`], or the registrar's error.
    pub async fn register_routes(&self) -> Result<(), RouteError> {
        let registrar = self.binding.registrar()?;
        registrar.register(self.route_set()).await
    }
}

/// Application routes, served by the host at the root.
///
/// The authenticated `GET /cookies` is only part of the group when authentication
/// was available at the time of registration.
pub struct AppRoutes {
    service: Arc<Service>,
    binding: Binding,
}

impl AppRoutes {
    #[must_use]
    pub fn new(service: Arc<Service>) -> Self {
        Self {
            service,
            binding: Binding::default(),
        }
    }

    /// Attach to `registrar`. Only the first call has an effect.
    pub fn bind(&self, registrar: Arc<dyn RouteRegistrar>) {
        self.binding.bind("app", registrar);
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_bound()
    }

    pub fn route_set(&self) -> RouteSet {
        let mut routes = RouteSet::new().route(
            RouteSpec {
                name: "GetCookieGuest",
                method: Method::GET,
                path: GUEST_COOKIES_PATH,
                description: GET_COOKIE_DESCRIPTION,
                requires_auth: false,
            },
            get(handlers::get_cookie_guest),
        );

        if self.service.state().auth_available() {
            routes = routes.route(
                RouteSpec {
                    name: "GetCookie",
                    method: Method::GET,
                    path: COOKIES_PATH,
                    description: GET_COOKIE_DESCRIPTION,
                    requires_auth: true,
                },
                get(handlers::get_cookie),
            );
        } else {
            tracing::info!("authentication unavailable, skipping authenticated cookie route");
        }

        routes.with_extension(self.service.clone())
    }

    /// # Errors
    /// Returns [`RouteError::NotBound`] before [`Self::bind`], or the registrar's error.
    pub async fn register_routes(&self) -> Result<(), RouteError> {
        let registrar = self.binding.registrar()?;
        registrar.register(self.route_set()).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::ModuleState;
    use crate::domain::metrics::CookieMetrics;
    use crate::domain::repo::ReceiptRepository;
    use crate::infra::InMemoryReceiptRepository;
    use axum::{
        Router,
        body::Body,
        extract::Request,
        http::{StatusCode, header},
    };
    use modkit_host::{RouteTable, StaticAuthenticator};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use tower::ServiceExt as _;

    struct NoMetrics;

    impl CookieMetrics for NoMetrics {
        fn record_requests(&self, _count: u64) {}
        fn set_cookies_left(&self, _value: u32) {}
    }

    async fn service(quota: u32, auth: bool) -> Arc<Service> {
        let state = Arc::new(ModuleState::new());
        assert_eq!(state.set_quota(quota), 0);
        state.replace_blocked_names(vec!["Alex".to_owned()]);
        state.set_auth_available(auth);
        let repo = Arc::new(InMemoryReceiptRepository::new());
        repo.ensure_schema().await.unwrap();
        Arc::new(Service::new(state, repo, Arc::new(NoMetrics)))
    }

    fn table(group: &'static str) -> Arc<RouteTable> {
        let auth = StaticAuthenticator::new(BTreeMap::from([(
            "erin-token".to_owned(),
            "erin@example.com".to_owned(),
        )]));
        Arc::new(RouteTable::new(group, Arc::new(auth)))
    }

    async fn send(router: Router, request: Request) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn unbound_binders_refuse_to_register() {
        let svc = service(1, false).await;
        assert!(matches!(
            AdminRoutes::new(svc.clone()).register_routes().await,
            Err(RouteError::NotBound)
        ));
        assert!(matches!(
            AppRoutes::new(svc).register_routes().await,
            Err(RouteError::NotBound)
        ));
    }

    #[tokio::test]
    async fn binding_is_idempotent() {
        let app = AppRoutes::new(service(1, false).await);
        let first = table("app");
        let second = table("app");
        app.bind(first.clone());
        app.bind(second.clone());
        assert!(app.is_bound());

        app.register_routes().await.unwrap();
        assert!(first.has_route("GetCookieGuest"));
        assert!(second.specs().is_empty());
    }

    #[tokio::test]
    async fn guest_route_dispenses_and_judges() {
        let app = AppRoutes::new(service(2, false).await);
        let table = table("app");
        app.bind(table.clone());
        app.register_routes().await.unwrap();

        let (status, body) = send(table.service(), get_req("/cookies/guest?name=Bob", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Hey there Bob, have a cookie.");

        let (status, body) = send(table.service(), get_req("/cookies/guest?name=alex", None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["detail"], "I'm sorry alex, no cookies for you today.");

        let (status, body) = send(table.service(), get_req("/cookies/guest?name=Carol", None)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "COOKIES_EXHAUSTED");
    }

    #[tokio::test]
    async fn authenticated_route_follows_auth_availability() {
        let without_auth = AppRoutes::new(service(5, false).await);
        let table_a = table("app");
        without_auth.bind(table_a.clone());
        without_auth.register_routes().await.unwrap();
        assert!(!table_a.has_route("GetCookie"));

        let with_auth = AppRoutes::new(service(5, true).await);
        let table_b = table("app");
        with_auth.bind(table_b.clone());
        with_auth.register_routes().await.unwrap();
        assert!(table_b.has_route("GetCookie"));

        let (status, _) = send(table_b.service(), get_req("/cookies", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(table_b.service(), get_req("/cookies", Some("erin-token"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Hey there erin, have a cookie.");
    }

    #[tokio::test]
    async fn reset_accepts_value_or_empty_body() {
        let svc = service(3, false).await;
        let admin = AdminRoutes::new(svc.clone());
        let table = table("admin");
        admin.bind(table.clone());
        admin.register_routes().await.unwrap();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/cookies/reset")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"cookies_left": 7}"#))
            .unwrap();
        let (status, body) = send(table.service(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["previous_cookies_left"], 3);
        assert_eq!(body["current_cookies_left"], 7);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/cookies/reset")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(table.service(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["previous_cookies_left"], 7);
        assert_eq!(body["current_cookies_left"], 20);
        assert_eq!(svc.state().remaining(), 20);
    }
}
