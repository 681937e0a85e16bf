use crate::{
    auth::{self, AuthUser, CredentialError},
    error::{AppError, AppResult},
    models::{Author, Book, BookUpdate, BookWithAuthor, Genre, NewBook, User},
    repository::{BookRepository, RepoError, RepositoryState},
};

/// apply_book_patch
///
/// The book update engine. Validates the patch as a whole before anything is
/// written, skips storage entirely for an empty patch, and otherwise issues one
/// update touching only the present fields.
///
/// Generic over `BookRepository` alone, so it runs against any storage that can
/// persist books.
pub async fn apply_book_patch<B>(books: &B, id: i32, patch: &BookUpdate) -> AppResult<()>
where
    B: BookRepository + ?Sized,
{
    if let Some(price) = patch.price {
        if price < 0 {
            return Err(AppError::validation("price must be non-negative"));
        }
    }
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(AppError::validation("book name cannot be empty"));
        }
    }
    if patch.is_empty() {
        return Ok(());
    }

    match books.update_book(id, patch).await {
        Ok(()) => Ok(()),
        Err(RepoError::NotFound) => Err(AppError::not_found(format!(
            "book with id {id} not found"
        ))),
        Err(e) => Err(e.into()),
    }
}

/// CatalogService
///
/// The facade the HTTP layer talks to. Cheap to clone: it only holds the
/// shared repository handle.
#[derive(Clone)]
pub struct CatalogService {
    repo: RepositoryState,
}

impl CatalogService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    // --- Authors & Genres ---

    pub async fn get_all_authors(&self) -> AppResult<Vec<Author>> {
        Ok(self.repo.get_all_authors().await?)
    }

    pub async fn new_author(&self, name: &str) -> AppResult<i32> {
        if name.trim().is_empty() {
            return Err(AppError::validation("author name cannot be empty"));
        }
        Ok(self.repo.new_author(name).await?)
    }

    pub async fn get_all_genres(&self) -> AppResult<Vec<Genre>> {
        Ok(self.repo.get_all_genres().await?)
    }

    pub async fn new_genre(&self, name: &str) -> AppResult<i32> {
        if name.trim().is_empty() {
            return Err(AppError::validation("genre name cannot be empty"));
        }
        match self.repo.new_genre(name).await {
            Ok(id) => Ok(id),
            Err(RepoError::Conflict) => {
                Err(AppError::Conflict(format!("genre '{name}' already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }

    // --- Books ---

    pub async fn create_book(&self, actor: &AuthUser, book: NewBook) -> AppResult<i32> {
        book.validate()?;
        let id = self.repo.new_book(&book).await?;
        tracing::info!(book_id = id, user_id = actor.id, "book created");
        Ok(id)
    }

    pub async fn get_book_by_id(&self, id: i32) -> AppResult<Book> {
        match self.repo.get_book_by_id(id).await {
            Ok(book) => Ok(book),
            Err(RepoError::NotFound) => {
                Err(AppError::not_found(format!("book with id {id} not found")))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_all_books(&self) -> AppResult<Vec<Book>> {
        Ok(self.repo.get_books().await?)
    }

    pub async fn get_all_with_authors(&self) -> AppResult<Vec<BookWithAuthor>> {
        Ok(self.repo.get_all_with_authors().await?)
    }

    /// Removing an id that does not exist is a silent success.
    pub async fn remove_book(&self, actor: &AuthUser, id: i32) -> AppResult<()> {
        self.repo.delete_book_by_id(id).await?;
        tracing::info!(book_id = id, user_id = actor.id, "book removed");
        Ok(())
    }

    pub async fn update_book(&self, actor: &AuthUser, id: i32, patch: &BookUpdate) -> AppResult<()> {
        apply_book_patch(&*self.repo, id, patch).await?;
        tracing::info!(
            book_id = id,
            user_id = actor.id,
            name = patch.name.is_some(),
            price = patch.price.is_some(),
            "book patched"
        );
        Ok(())
    }

    // --- Users ---

    /// validate_user_credentials
    ///
    /// Resolves a login attempt. An unknown username and a wrong password give
    /// the same `Unauthorized` answer.
    pub async fn validate_user_credentials(&self, username: &str, password: &str) -> AppResult<User> {
        let user = match self.repo.get_user_by_username(username).await {
            Ok(user) => user,
            Err(RepoError::NotFound) => {
                return Err(AppError::unauthorized("invalid credentials"));
            }
            Err(e) => return Err(e.into()),
        };

        match auth::check_password(&user.password, password) {
            Ok(()) => Ok(user),
            Err(CredentialError::Mismatch) => Err(AppError::unauthorized("invalid credentials")),
            Err(e) => Err(AppError::internal(format!(
                "password check failed for user {}: {e}",
                user.id
            ))),
        }
    }

    /// ensure_admin_user
    ///
    /// Startup bootstrap: creates `username` with role `admin` unless a user
    /// with that name already exists. Returns the new id, or `None` if nothing
    /// was created.
    pub async fn ensure_admin_user(&self, username: &str, password: &str) -> AppResult<Option<i32>> {
        match self.repo.get_user_by_username(username).await {
            Ok(_) => return Ok(None),
            Err(RepoError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let hash = auth::hash_password(password).map_err(|e| AppError::internal(e.to_string()))?;
        let id = self.repo.create_user(username, &hash, "admin").await?;
        Ok(Some(id))
    }
}
