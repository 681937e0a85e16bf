use crate::{
    auth::{AuthUser, TokenService},
    error::{ApiJson, ApiQuery, AppError, AppResult, ErrorResponse},
    models::{
        Author, Book, BookWithAuthor, CreateAuthorRequest, CreateBookRequest,
        CreateGenreRequest, CreatedId, Genre, LoginRequest, LoginResponse, NewBook,
        UpdateBookRequest,
    },
    service::CatalogService,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

// --- Query Structs ---

/// BookQuery
///
/// The `?id=` selector shared by the `/books` routes. Kept as a raw string so a
/// non-numeric value can be answered with a 400 in the standard envelope.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Book identifier.
    pub id: Option<String>,
}

impl BookQuery {
    fn optional_id(&self) -> AppResult<Option<i32>> {
        match self.id.as_deref() {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .map(Some)
                .map_err(|_| AppError::validation(format!("invalid id '{raw}'"))),
        }
    }

    fn required_id(&self) -> AppResult<i32> {
        self.optional_id()?
            .ok_or_else(|| AppError::validation("missing id query parameter"))
    }
}

// --- Books ---

/// get_books
///
/// [Public Route] Lists every book, or a single book when `?id=` is given.
#[utoipa::path(
    get,
    path = "/books",
    params(BookQuery),
    responses(
        (status = 200, description = "All books, or the one selected by id", body = [Book]),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn get_books(
    State(catalog): State<CatalogService>,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> AppResult<impl IntoResponse> {
    let response = match query.optional_id()? {
        Some(id) => Json(catalog.get_book_by_id(id).await?).into_response(),
        None => Json(catalog.get_all_books().await?).into_response(),
    };
    Ok(response)
}

/// get_books_with_authors
///
/// [Public Route] Lists books joined with their author's name.
#[utoipa::path(
    get,
    path = "/books/withauthors",
    responses((status = 200, description = "Books with author names", body = [BookWithAuthor]))
)]
pub async fn get_books_with_authors(
    State(catalog): State<CatalogService>,
) -> AppResult<Json<Vec<BookWithAuthor>>> {
    Ok(Json(catalog.get_all_with_authors().await?))
}

/// create_book
///
/// [Authenticated Route] Adds a book. `author_id` and `genre_id` must refer to
/// existing rows.
#[utoipa::path(
    post,
    path = "/books",
    request_body = CreateBookRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Book created", body = CreatedId),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn create_book(
    user: AuthUser,
    State(catalog): State<CatalogService>,
    ApiJson(payload): ApiJson<CreateBookRequest>,
) -> AppResult<impl IntoResponse> {
    let book = NewBook::from(payload);
    book.validate()?;

    let id = catalog.create_book(&user, book).await?;
    Ok((StatusCode::CREATED, Json(CreatedId { id })))
}

/// update_book
///
/// [Authenticated Route] Applies a partial update. Omitted keys are left as
/// they are; the updated book is returned.
#[utoipa::path(
    patch,
    path = "/books",
    params(BookQuery),
    request_body = UpdateBookRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid id or payload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Book not found", body = ErrorResponse)
    )
)]
pub async fn update_book(
    user: AuthUser,
    State(catalog): State<CatalogService>,
    ApiQuery(query): ApiQuery<BookQuery>,
    ApiJson(payload): ApiJson<UpdateBookRequest>,
) -> AppResult<Json<Book>> {
    let id = query.required_id()?;
    let patch = payload.into_update()?;

    catalog.update_book(&user, id, &patch).await?;
    Ok(Json(catalog.get_book_by_id(id).await?))
}

/// delete_book
///
/// [Authenticated Route] Removes a book. Deleting an unknown id still answers 204.
#[utoipa::path(
    delete,
    path = "/books",
    params(BookQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Book removed"),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn delete_book(
    user: AuthUser,
    State(catalog): State<CatalogService>,
    ApiQuery(query): ApiQuery<BookQuery>,
) -> AppResult<StatusCode> {
    let id = query.required_id()?;
    catalog.remove_book(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Authors & Genres ---

#[utoipa::path(
    get,
    path = "/authors",
    responses((status = 200, description = "All authors", body = [Author]))
)]
pub async fn get_authors(State(catalog): State<CatalogService>) -> AppResult<Json<Vec<Author>>> {
    Ok(Json(catalog.get_all_authors().await?))
}

#[utoipa::path(
    post,
    path = "/authors",
    request_body = CreateAuthorRequest,
    responses(
        (status = 201, description = "Author created", body = CreatedId),
        (status = 400, description = "Invalid payload", body = ErrorResponse)
    )
)]
pub async fn create_author(
    State(catalog): State<CatalogService>,
    ApiJson(payload): ApiJson<CreateAuthorRequest>,
) -> AppResult<impl IntoResponse> {
    let id = catalog.new_author(&payload.author).await?;
    Ok((StatusCode::CREATED, Json(CreatedId { id })))
}

#[utoipa::path(
    get,
    path = "/genres",
    responses((status = 200, description = "All genres", body = [Genre]))
)]
pub async fn get_genres(State(catalog): State<CatalogService>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(catalog.get_all_genres().await?))
}

#[utoipa::path(
    post,
    path = "/genres",
    request_body = CreateGenreRequest,
    responses(
        (status = 201, description = "Genre created", body = CreatedId),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 409, description = "Genre already exists", body = ErrorResponse)
    )
)]
pub async fn create_genre(
    State(catalog): State<CatalogService>,
    ApiJson(payload): ApiJson<CreateGenreRequest>,
) -> AppResult<impl IntoResponse> {
    let id = catalog.new_genre(&payload.genre).await?;
    Ok((StatusCode::CREATED, Json(CreatedId { id })))
}

// --- Auth ---

/// login
///
/// [Public Route] Exchanges a username and password for a 15-minute access token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Missing username or password", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
pub async fn login(
    State(catalog): State<CatalogService>,
    State(tokens): State<TokenService>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("username and password are required"));
    }

    let user = catalog
        .validate_user_credentials(&payload.username, &payload.password)
        .await?;

    let access_token = tokens
        .generate_access_token(user.id, &user.role)
        .map_err(|e| AppError::internal(e.to_string()))?;

    tracing::info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse { access_token }))
}

/// health
///
/// Liveness check for load balancers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}
