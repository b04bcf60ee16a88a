//! HTTP API: health, metrics, and the Basic-auth protected review endpoints.

use crate::auth;
use crate::config::Settings;
use crate::constants::export_file_name;
use crate::db::{Database, LocaleFilter, TranslationFilter};
use crate::error::HubError;
use crate::exporter::{write_locale_csv, ExportOptions};
use crate::metrics::HttpMetrics;
use crate::review::{self, Actor, ReviewAction, ReviewEdit, Role};
use crate::types::{Provenance, TranslationStatus};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    settings: Arc<Settings>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            settings: Arc::new(settings),
            metrics,
        }
    }

    /// Run `f` against the database on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> crate::error::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| HubError::command("database lock poisoned"))?;
            f(&*guard)
        })
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(ApiError::from)
    }

    /// Authenticate the request's Basic credentials, then run `f` as that actor.
    async fn with_actor<T, F>(&self, headers: &HeaderMap, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &Actor) -> crate::error::Result<T> + Send + 'static,
    {
        let (username, password) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(auth::parse_basic_auth)
            .ok_or(HubError::Unauthorized)?;

        self.with_db(move |db| {
            let user = auth::authenticate(db, &username, &password)?.ok_or(HubError::Unauthorized)?;
            let actor = Actor::load(db, user)?;
            f(db, &actor)
        })
        .await
    }
}

/// JSON error body `{"error": "..."}` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        let status = match &err {
            HubError::Unauthorized => StatusCode::UNAUTHORIZED,
            HubError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            HubError::NotFound(_) | HubError::LocaleNotFound(_) => StatusCode::NOT_FOUND,
            HubError::Validation(_) | HubError::Command(_) | HubError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            HubError::Database(e) if is_constraint_violation(e) => StatusCode::BAD_REQUEST,
            _ => {
                error!("request failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

macro_rules! rejection_into_api_error {
    ($($rejection:ty),+) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self::new(rejection.status(), rejection.body_text())
                }
            }
        )+
    };
}

rejection_into_api_error!(JsonRejection, QueryRejection, PathRejection);

/// UNIQUE / FOREIGN KEY failures come from client-supplied ids.
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "error": self.message }))).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"voyant_hub\""),
            );
        }
        response
    }
}

/// Reject requests whose Host header is not allowed, and time the rest.
async fn validate_host<B>(
    State(state): State<AppState>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or("")
        .to_string();
    if !state.settings.is_host_allowed(&host) {
        HttpMetrics::record_rejected_host();
        warn!(host = %host, "rejected request for disallowed host");
        return ApiError::new(StatusCode::BAD_REQUEST, "Invalid HTTP_HOST header").into_response();
    }

    let method = request.method().clone();
    let started = Instant::now();
    let response = next.run(request).await;
    HttpMetrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "voyant_hub",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
        .into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct LocaleQuery {
    enabled: Option<bool>,
    q: Option<String>,
}

async fn list_locales(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<LocaleQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let locales = state
        .with_actor(&headers, move |db, actor| {
            if actor.role == Role::NoAccess {
                return Err(HubError::PermissionDenied(
                    "no review role assigned".to_string(),
                ));
            }
            db.list_locales(&LocaleFilter {
                enabled_only: query.enabled.unwrap_or(false),
                search: query.q,
            })
        })
        .await?;
    Ok(Json(locales).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct TranslationQuery {
    locale: Option<String>,
    status: Option<String>,
    provenance: Option<String>,
    has_qa_warnings: Option<String>,
    q: Option<String>,
}

impl TranslationQuery {
    fn into_filter(self) -> crate::error::Result<TranslationFilter> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let has_qa_warnings = match non_blank(self.has_qa_warnings).as_deref() {
            None => None,
            Some(v) if matches!(v.to_ascii_lowercase().as_str(), "yes" | "true" | "1") => {
                Some(true)
            }
            Some(v) if matches!(v.to_ascii_lowercase().as_str(), "no" | "false" | "0") => {
                Some(false)
            }
            Some(v) => {
                return Err(HubError::Validation(format!(
                    "has_qa_warnings must be yes or no, got '{v}'"
                )))
            }
        };
        Ok(TranslationFilter {
            locale_code: non_blank(self.locale),
            status: non_blank(self.status)
                .map(|s| s.parse::<TranslationStatus>())
                .transpose()?,
            provenance: non_blank(self.provenance)
                .map(|s| s.parse::<Provenance>())
                .transpose()?,
            has_qa_warnings,
            search: non_blank(self.q),
            ..Default::default()
        })
    }
}

async fn list_translations(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<TranslationQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    let rows = state
        .with_actor(&headers, move |db, actor| review::visible_translations(db, actor, filter))
        .await?;
    Ok(Json(rows).into_response())
}

async fn get_translation(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let row = state
        .with_actor(&headers, move |db, actor| review::visible_translation(db, actor, id))
        .await?;
    Ok(Json(row).into_response())
}

async fn patch_translation(
    State(state): State<AppState>,
    headers: HeaderMap,
    id: Result<Path<i64>, PathRejection>,
    edit: Result<Json<ReviewEdit>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let Json(edit) = edit?;
    let outcome = state
        .with_actor(&headers, move |db, actor| {
            review::visible_translation(db, actor, id)?;
            review::save_review(db, actor, id, edit)
        })
        .await?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    ids: Vec<i64>,
}

async fn run_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(action): Path<String>,
    request: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = request?;
    let action: ReviewAction = action.parse()?;
    let outcome = state
        .with_actor(&headers, move |db, actor| {
            review::run_action(db, actor, action, &request.ids)
        })
        .await?;
    Ok(Json(json!({
        "action": action.as_str(),
        "selected": outcome.selected,
        "changed": outcome.changed,
    }))
    .into_response())
}

#[derive(Debug, Default, Deserialize)]
struct ExportQuery {
    #[serde(default)]
    missing_marker: String,
    #[serde(default)]
    only_missing: bool,
    #[serde(default)]
    include_source_updated: bool,
}

async fn export_locale(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let file_name = export_file_name(&code);
    let body = state
        .with_actor(&headers, move |db, actor| {
            let locale = db
                .get_locale_by_code(&code)?
                .ok_or_else(|| HubError::LocaleNotFound(code.clone()))?;
            let allowed = match &actor.role {
                Role::SuperAdmin => true,
                Role::Reviewer { locale_ids } => locale_ids.contains(&locale.id),
                Role::NoAccess => false,
            };
            if !allowed {
                return Err(HubError::PermissionDenied(format!(
                    "locale {code} is not assigned to {}",
                    actor.user.username
                )));
            }
            let options = ExportOptions {
                include_source_updated: query.include_source_updated,
                missing_marker: query.missing_marker,
                only_missing: query.only_missing,
            };
            let mut body = Vec::new();
            write_locale_csv(db, &locale, &options, &mut body)?;
            Ok(body)
        })
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Build the router with host validation, CORS and all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/locales", get(list_locales))
        .route("/api/locales/:code/export.csv", get(export_locale))
        .route("/api/translations", get(list_translations))
        .route("/api/translations/:id", get(get_translation).patch(patch_translation))
        .route("/api/translations/actions/:action", post(run_action))
        .layer(middleware::from_fn_with_state(state.clone(), validate_host))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn start_server(state: AppState, port: u16) -> crate::error::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/health");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {}", e);
            }
            info!("shutting down");
        })
        .await
        .map_err(|e| HubError::command(format!("server error: {e}")))
}
