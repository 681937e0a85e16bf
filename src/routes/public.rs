use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token. Every read in the catalog lives here, along
/// with author/genre creation and the login gateway.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check; answers "ok" without touching storage.
        .route("/health", get(handlers::health))
        // GET /books, GET /books?id=...
        // Lists the catalog, or returns one book when an id is given.
        .route("/books", get(handlers::get_books))
        // GET /books/withauthors
        // Books joined with their author's name.
        .route("/books/withauthors", get(handlers::get_books_with_authors))
        // GET/POST /authors
        .route(
            "/authors",
            get(handlers::get_authors).post(handlers::create_author),
        )
        // GET/POST /genres
        // Genre names are unique; a duplicate answers 409.
        .route(
            "/genres",
            get(handlers::get_genres).post(handlers::create_genre),
        )
        // POST /auth/login
        // Exchanges credentials for a short-lived HS256 access token.
        .route("/auth/login", post(handlers::login))
}
