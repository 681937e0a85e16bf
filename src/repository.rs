use crate::models::{Author, Book, BookUpdate, BookWithAuthor, Genre, NewBook, User};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::{
    collections::BTreeMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};
use thiserror::Error;

/// RepoError
///
/// What the storage layer tells the layers above it. Driver errors that carry a
/// recognised meaning are lifted into their own variants by [`RepoError::from_sqlx`].
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated")]
    Conflict,
    #[error("foreign key constraint violated")]
    InvalidReference,
    #[error("storage call exceeded its deadline")]
    Timeout,
    #[error("db error: {0}")]
    Db(sqlx::Error),
}

impl RepoError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(dbe) => match dbe.code().as_deref() {
                Some("23505") => RepoError::Conflict,
                Some("23503") => RepoError::InvalidReference,
                _ => RepoError::Db(e),
            },
            _ => RepoError::Db(e),
        }
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        RepoError::from_sqlx(e)
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

// --- Capability Traits ---
//
// Each entity group gets its own trait so a caller (or a test double) can depend
// on exactly the persistence it needs. `Send + Sync + async_trait` keep the
// trait objects usable behind `Arc` across axum's task boundaries.

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn get_all_authors(&self) -> RepoResult<Vec<Author>>;
    async fn new_author(&self, name: &str) -> RepoResult<i32>;
}

#[async_trait]
pub trait GenreRepository: Send + Sync {
    async fn get_all_genres(&self) -> RepoResult<Vec<Genre>>;
    async fn new_genre(&self, name: &str) -> RepoResult<i32>;
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn get_books(&self) -> RepoResult<Vec<Book>>;
    async fn new_book(&self, book: &NewBook) -> RepoResult<i32>;
    /// Fails with `RepoError::NotFound` when no row has this id.
    async fn get_book_by_id(&self, id: i32) -> RepoResult<Book>;
    /// Deleting an id that does not exist succeeds without effect.
    async fn delete_book_by_id(&self, id: i32) -> RepoResult<()>;
    async fn get_all_with_authors(&self) -> RepoResult<Vec<BookWithAuthor>>;
    /// Writes only the fields present in `update`, in one statement.
    /// Fails with `RepoError::NotFound` when no row has this id.
    async fn update_book(&self, id: i32, update: &BookUpdate) -> RepoResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user_by_username(&self, username: &str) -> RepoResult<User>;
    async fn create_user(&self, username: &str, password_hash: &str, role: &str)
    -> RepoResult<i32>;
}

/// Repository
///
/// The full persistence surface the application state carries. Anything that
/// implements all four capability traits is a `Repository`.
pub trait Repository: AuthorRepository + BookRepository + GenreRepository + UserRepository {}

impl<T> Repository for T where
    T: AuthorRepository + BookRepository + GenreRepository + UserRepository
{
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- PostgreSQL ---

/// PostgresRepository
///
/// The production implementation, backed by a `PgPool`. Every call runs under
/// a fixed deadline so a stalled connection cannot pin a request handler.
pub struct PostgresRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> RepoResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(RepoError::from_sqlx),
            Err(_) => {
                tracing::warn!(
                    op,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "storage call timed out"
                );
                Err(RepoError::Timeout)
            }
        }
    }

    /// Empties every catalog table and resets the id sequences. Used by the
    /// integration tests.
    pub async fn truncate_all(&self) -> RepoResult<()> {
        self.bounded(
            "truncate_all",
            sqlx::query("TRUNCATE TABLE authors, genres, books RESTART IDENTITY CASCADE")
                .execute(&self.pool),
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl AuthorRepository for PostgresRepository {
    async fn get_all_authors(&self) -> RepoResult<Vec<Author>> {
        self.bounded(
            "get_all_authors",
            sqlx::query_as::<_, Author>("SELECT id, author FROM authors ORDER BY id")
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn new_author(&self, name: &str) -> RepoResult<i32> {
        self.bounded(
            "new_author",
            sqlx::query_scalar::<_, i32>("INSERT INTO authors (author) VALUES ($1) RETURNING id")
                .bind(name)
                .fetch_one(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl GenreRepository for PostgresRepository {
    async fn get_all_genres(&self) -> RepoResult<Vec<Genre>> {
        self.bounded(
            "get_all_genres",
            sqlx::query_as::<_, Genre>("SELECT id, genre FROM genres ORDER BY id")
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn new_genre(&self, name: &str) -> RepoResult<i32> {
        self.bounded(
            "new_genre",
            sqlx::query_scalar::<_, i32>("INSERT INTO genres (genre) VALUES ($1) RETURNING id")
                .bind(name)
                .fetch_one(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl BookRepository for PostgresRepository {
    async fn get_books(&self) -> RepoResult<Vec<Book>> {
        self.bounded(
            "get_books",
            sqlx::query_as::<_, Book>(
                "SELECT id, name, price, author_id, genre_id FROM books ORDER BY id",
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn new_book(&self, book: &NewBook) -> RepoResult<i32> {
        self.bounded(
            "new_book",
            sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO books (name, author_id, genre_id, price)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(&book.name)
            .bind(book.author_id)
            .bind(book.genre_id)
            .bind(book.price)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_book_by_id(&self, id: i32) -> RepoResult<Book> {
        self.bounded(
            "get_book_by_id",
            sqlx::query_as::<_, Book>(
                "SELECT id, name, price, author_id, genre_id FROM books WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(RepoError::NotFound)
    }

    async fn delete_book_by_id(&self, id: i32) -> RepoResult<()> {
        self.bounded(
            "delete_book_by_id",
            sqlx::query("DELETE FROM books WHERE id = $1")
                .bind(id)
                .execute(&self.pool),
        )
        .await
        .map(|_| ())
    }

    async fn get_all_with_authors(&self) -> RepoResult<Vec<BookWithAuthor>> {
        self.bounded(
            "get_all_with_authors",
            sqlx::query_as::<_, BookWithAuthor>(
                r#"
                SELECT b.id, b.name, b.price, b.genre_id, b.author_id, a.author AS author_name
                FROM books b
                JOIN authors a ON b.author_id = a.id
                ORDER BY b.id
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    /// update_book
    ///
    /// Builds `UPDATE books SET ... WHERE id = $n` with one assignment per
    /// present field, using QueryBuilder so every value is a bound parameter.
    async fn update_book(&self, id: i32, update: &BookUpdate) -> RepoResult<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE books SET ");
        {
            let mut assignments = builder.separated(", ");
            if let Some(name) = &update.name {
                assignments.push("name = ");
                assignments.push_bind_unseparated(name.clone());
            }
            if let Some(price) = update.price {
                assignments.push("price = ");
                assignments.push_bind_unseparated(price);
            }
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = self
            .bounded("update_book", builder.build().execute(&self.pool))
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
        self.bounded(
            "get_user_by_username",
            sqlx::query_as::<_, User>(
                "SELECT id, username, password, role FROM users WHERE username = $1",
            )
            .bind(username)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(RepoError::NotFound)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> RepoResult<i32> {
        self.bounded(
            "create_user",
            sqlx::query_scalar::<_, i32>(
                "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(username)
            .bind(password_hash)
            .bind(role)
            .fetch_one(&self.pool),
        )
        .await
    }
}

// --- In-Memory ---

#[derive(Default)]
struct MemoryTables {
    authors: BTreeMap<i32, Author>,
    genres: BTreeMap<i32, Genre>,
    books: BTreeMap<i32, Book>,
    users: BTreeMap<i32, User>,
    next_author: i32,
    next_genre: i32,
    next_book: i32,
    next_user: i32,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// InMemoryRepository
///
/// A process-local implementation mirroring the Postgres schema rules: serial
/// ids starting at 1, unique genre and user names, foreign keys from books to
/// authors and genres, and `price >= 0`. Used by the test suites.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<MemoryTables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, MemoryTables> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AuthorRepository for InMemoryRepository {
    async fn get_all_authors(&self) -> RepoResult<Vec<Author>> {
        Ok(self.tables().authors.values().cloned().collect())
    }

    async fn new_author(&self, name: &str) -> RepoResult<i32> {
        let mut t = self.tables();
        let id = next_id(&mut t.next_author);
        t.authors.insert(
            id,
            Author {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl GenreRepository for InMemoryRepository {
    async fn get_all_genres(&self) -> RepoResult<Vec<Genre>> {
        Ok(self.tables().genres.values().cloned().collect())
    }

    async fn new_genre(&self, name: &str) -> RepoResult<i32> {
        let mut t = self.tables();
        if t.genres.values().any(|g| g.name == name) {
            return Err(RepoError::Conflict);
        }
        let id = next_id(&mut t.next_genre);
        t.genres.insert(
            id,
            Genre {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl BookRepository for InMemoryRepository {
    async fn get_books(&self) -> RepoResult<Vec<Book>> {
        Ok(self.tables().books.values().cloned().collect())
    }

    async fn new_book(&self, book: &NewBook) -> RepoResult<i32> {
        let mut t = self.tables();
        if !t.authors.contains_key(&book.author_id) || !t.genres.contains_key(&book.genre_id) {
            return Err(RepoError::InvalidReference);
        }
        if book.price < 0 {
            return Err(RepoError::Db(sqlx::Error::Protocol(
                "new row violates check constraint \"books_price_check\"".into(),
            )));
        }
        let id = next_id(&mut t.next_book);
        t.books.insert(
            id,
            Book {
                id,
                name: book.name.clone(),
                price: book.price,
                author_id: book.author_id,
                genre_id: book.genre_id,
            },
        );
        Ok(id)
    }

    async fn get_book_by_id(&self, id: i32) -> RepoResult<Book> {
        self.tables().books.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn delete_book_by_id(&self, id: i32) -> RepoResult<()> {
        self.tables().books.remove(&id);
        Ok(())
    }

    async fn get_all_with_authors(&self) -> RepoResult<Vec<BookWithAuthor>> {
        let t = self.tables();
        Ok(t.books
            .values()
            .filter_map(|b| {
                t.authors.get(&b.author_id).map(|a| BookWithAuthor {
                    id: b.id,
                    name: b.name.clone(),
                    price: b.price,
                    genre_id: b.genre_id,
                    author_id: b.author_id,
                    author_name: a.name.clone(),
                })
            })
            .collect())
    }

    async fn update_book(&self, id: i32, update: &BookUpdate) -> RepoResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        let mut t = self.tables();
        let book = t.books.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(name) = &update.name {
            book.name = name.clone();
        }
        if let Some(price) = update.price {
            book.price = price;
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
        self.tables()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> RepoResult<i32> {
        let mut t = self.tables();
        if t.users.values().any(|u| u.username == username) {
            return Err(RepoError::Conflict);
        }
        let id = next_id(&mut t.next_user);
        t.users.insert(
            id,
            User {
                id,
                username: username.to_string(),
                password: password_hash.to_string(),
                role: role.to_string(),
            },
        );
        Ok(id)
    }
}
