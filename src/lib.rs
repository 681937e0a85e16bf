use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware as axum_middleware,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod service;

// Routing split by access level (Public, Authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenService;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::CatalogService;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from POST /auth/login."))
                        .build(),
                ),
            );
        }
    }
}

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and request/response schema into
/// the OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_books, handlers::get_books_with_authors, handlers::create_book,
        handlers::update_book, handlers::delete_book, handlers::get_authors,
        handlers::create_author, handlers::get_genres, handlers::create_genre,
        handlers::login, handlers::health
    ),
    components(
        schemas(
            models::Book, models::BookWithAuthor, models::Author, models::Genre,
            models::CreateBookRequest, models::UpdateBookRequest, models::CreateAuthorRequest,
            models::CreateGenreRequest, models::LoginRequest, models::LoginResponse,
            models::CreatedId, error::ErrorResponse, error::ErrorBody,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "book-catalog", description = "Book Catalog API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single immutable container shared by every request. Handlers pull the
/// part they need through the `FromRef` impls below.
#[derive(Clone)]
pub struct AppState {
    /// Catalog facade over the storage handle.
    pub catalog: CatalogService,
    /// Token issuer/verifier built from `config.jwt_secret`.
    pub tokens: TokenService,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the services for `repo` according to `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            catalog: CatalogService::new(repo),
            tokens: TokenService::new(&config.jwt_secret),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for CatalogService {
    fn from_ref(app_state: &AppState) -> CatalogService {
        app_state.catalog.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

/// create_router
///
/// Assembles the routing table, applies the bearer middleware to the
/// authenticated module only, and wraps everything in the observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let request_timeout = state.config.request_timeout;

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(
                axum_middleware::from_fn_with_state(state.clone(), middleware::require_bearer),
            ),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request carries its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
