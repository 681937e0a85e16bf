use crate::{AppState, handlers};
use axum::{
    Router,
    routing::post,
};

/// Authenticated Router Module
///
/// The mutating book endpoints. `create_router` wraps this module in the
/// `require_bearer` route layer, so every handler here receives a verified
/// `AuthUser`.
///
/// `/books` is also registered by the public module for GET; the two routers
/// are merged and each method keeps its own layering.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /books
        // Adds a book referencing an existing author and genre.
        // PATCH /books?id=...
        // Partial update of name and/or price; returns the updated book.
        // DELETE /books?id=...
        // Removes a book; an unknown id is still a 204.
        .route(
            "/books",
            post(handlers::create_book)
                .patch(handlers::update_book)
                .delete(handlers::delete_book),
        )
}
