use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, TenancyConfig};
use crate::database::{ConnectionSource, DatabaseError, DatabaseManager, PgTenantDirectory, TenantDirectory};
use crate::handlers;
use crate::middleware::{require_known_tenant, require_main_surface, resolve_tenant_middleware};
use crate::services::{Provisioner, TenantService};
use crate::tenancy::TenantResolver;

/// Shared handles for every request
pub struct AppState<S = DatabaseManager, D = PgTenantDirectory> {
    pub db: S,
    pub resolver: Arc<TenantResolver<D>>,
    pub tenants: Arc<TenantService<D>>,
    pub provisioner: Provisioner<S>,
}

impl<S: Clone, D> Clone for AppState<S, D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            resolver: Arc::clone(&self.resolver),
            tenants: Arc::clone(&self.tenants),
            provisioner: self.provisioner.clone(),
        }
    }
}

impl<S: ConnectionSource, D> AppState<S, D> {
    pub fn new(db: S, directory: Arc<D>, tenancy: &TenancyConfig) -> Self {
        Self {
            resolver: Arc::new(TenantResolver::new(Arc::clone(&directory), tenancy)),
            tenants: Arc::new(TenantService::new(directory, tenancy.clone())),
            provisioner: Provisioner::new(db.clone()),
            db,
        }
    }
}

impl AppState {
    /// Build the state without touching the database; connections open on first use
    pub fn from_config(config: &AppConfig) -> Result<Self, DatabaseError> {
        let db = DatabaseManager::connect_lazy(&config.database)?;
        Ok(Self::new(db, Arc::new(PgTenantDirectory), &config.tenancy))
    }
}

pub fn app<S, D>(state: AppState<S, D>, config: &AppConfig) -> Router
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    let router = Router::new()
        // Public, no tenant resolution
        .route("/", get(handlers::platform::root))
        .route("/health", get(handlers::platform::health::<S, D>))
        .merge(tenant_scoped_routes(state.clone()))
        .layer(CorsLayer::permissive());

    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

/// Routes that run with the request's tenant partition active. Unmatched paths never
/// reach resolution.
fn tenant_scoped_routes<S, D>(state: AppState<S, D>) -> Router<AppState<S, D>>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    Router::new()
        .merge(tenant_routes())
        .merge(root_routes())
        .route_layer(from_fn_with_state(state, resolve_tenant_middleware::<S, D>))
}

fn tenant_routes<S, D>() -> Router<AppState<S, D>>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    Router::new()
        .route("/api/tenant", get(handlers::tenant::tenant_current::<S::Conn>))
        .route_layer(from_fn(require_known_tenant))
}

fn root_routes<S, D>() -> Router<AppState<S, D>>
where
    S: ConnectionSource,
    D: TenantDirectory<S::Conn> + 'static,
{
    use handlers::root::tenant;

    Router::new()
        .route(
            "/api/root/tenants",
            post(tenant::tenant_create::<S, D>).get(tenant::tenant_list::<S, D>),
        )
        .route(
            "/api/root/tenants/:subdomain",
            get(tenant::tenant_show::<S, D>).patch(tenant::tenant_update::<S, D>),
        )
        .route(
            "/api/root/tenants/:subdomain/provision",
            post(tenant::tenant_provision::<S, D>),
        )
        .route(
            "/api/root/tenants/:subdomain/health",
            get(tenant::tenant_health::<S, D>),
        )
        .route_layer(from_fn(require_main_surface))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tenant_record, MockBackend, MockDirectory, MockSource};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::development();
        config.api.enable_request_logging = false;
        config
    }

    /// Router over an in-memory database holding tenant `acme` (partition `t_abc123`)
    /// and `pending` (partition not created yet)
    fn router() -> Router {
        let mut backend = MockBackend::with_partitions(&["t_abc123"]);
        backend.tenants.push(tenant_record("acme", "t_abc123"));
        backend.tenants.push(tenant_record("pending", "t_def456"));
        router_over(MockSource::new(backend))
    }

    fn router_over(source: MockSource) -> Router {
        let config = test_config();
        let state = AppState::new(source, Arc::new(MockDirectory), &config.tenancy);
        app(state, &config)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(path: &str, host: &str) -> Request<Body> {
        Request::get(path).header(header::HOST, host).body(Body::empty()).unwrap()
    }

    fn post_json(path: &str, host: &str, body: Value) -> Request<Body> {
        Request::post(path)
            .header(header::HOST, host)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn root_does_not_need_the_database() {
        let (status, body) = send(router_over(MockSource::unavailable()), get("/", "localhost")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn known_tenant_runs_on_its_partition() {
        let (status, body) = send(router(), get("/api/tenant", "acme.example.com")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["subdomain"], "acme");
        assert_eq!(body["data"]["is_known_tenant"], true);
        assert_eq!(body["data"]["surface"], "tenant");
        assert_eq!(body["data"]["partition"], "t_abc123");
        assert_eq!(body["data"]["connection_partition"], "t_abc123");
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let (status, body) = send(router(), get("/api/tenant", "ghost.example.com")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn tenant_without_partition_is_unavailable() {
        let (status, _) = send(router(), get("/api/tenant", "pending.example.com")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn tenant_hosts_cannot_reach_root_routes() {
        let (status, body) = send(router(), get("/api/root/tenants", "acme.example.com")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn main_surface_lists_tenants() {
        let (status, body) = send(router(), get("/api/root/tenants", "localhost:8000")).await;

        assert_eq!(status, StatusCode::OK);
        let tenants = body["data"].as_array().unwrap();
        assert_eq!(tenants.len(), 2);
        assert_eq!(tenants[0]["subdomain"], "acme");
    }

    #[tokio::test]
    async fn reserved_signup_is_rejected() {
        let request = post_json("/api/root/tenants", "localhost", serde_json::json!({ "subdomain": "admin" }));

        let (status, body) = send(router(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["field_errors"]["subdomain"].is_string());
    }

    #[tokio::test]
    async fn system_schema_signup_is_rejected() {
        let request = post_json(
            "/api/root/tenants",
            "localhost",
            serde_json::json!({ "subdomain": "globex", "partition": "pg_catalog" }),
        );

        let (status, body) = send(router(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["field_errors"]["partition"].is_string());
    }

    #[tokio::test]
    async fn signup_registers_and_submits_provisioning() {
        let request = post_json("/api/root/tenants", "app.example.com", serde_json::json!({ "subdomain": "globex" }));

        let (status, body) = send(router(), request).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["subdomain"], "globex");
        assert!(body["data"]["schema_name"].as_str().unwrap().starts_with("tenant_"));
        assert!(body["data"]["provisioning"]["state"].is_string());
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let request = post_json("/api/root/tenants", "localhost", serde_json::json!({ "subdomain": "acme" }));

        let (status, _) = send(router(), request).await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn tenant_routes_report_unavailable_database() {
        let (status, body) = send(
            router_over(MockSource::unavailable()),
            get("/api/tenant", "acme.example.com"),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn health_reports_unavailable_database() {
        let (status, body) = send(router_over(MockSource::unavailable()), get("/health", "localhost")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["data"]["database"], "unavailable");
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let response = router_over(MockSource::unavailable())
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn builds_from_configuration_without_connecting() {
        let mut config = test_config();
        config.database.url = Some("postgres://nobody@127.0.0.1:1/none".to_string());

        assert!(AppState::from_config(&config).is_ok());

        config.database.url = None;
        assert!(matches!(
            AppState::from_config(&config),
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        ));
    }
}
