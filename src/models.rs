use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

// --- Core Catalog Schemas (Mapped to Database) ---

/// Book
///
/// A catalog entry from the `books` table. `price` is stored in minor currency
/// units and is guarded by a `CHECK (price >= 0)` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Book {
    pub id: i32,
    pub name: String,
    pub price: i32,
    pub author_id: i32,
    pub genre_id: i32,
}

/// BookWithAuthor
///
/// Listing row for `GET /books/withauthors`: a book joined with its author's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct BookWithAuthor {
    pub id: i32,
    pub name: String,
    pub price: i32,
    pub genre_id: i32,
    pub author_id: i32,
    pub author_name: String,
}

/// Author
///
/// Serialized as `{"id", "author"}` to keep the wire shape of the catalog API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Author {
    pub id: i32,
    #[serde(rename = "author")]
    #[sqlx(rename = "author")]
    pub name: String,
}

/// Genre
///
/// Serialized as `{"id", "genre"}`. Genre names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Genre {
    pub id: i32,
    #[serde(rename = "genre")]
    #[sqlx(rename = "genre")]
    pub name: String,
}

/// User
///
/// An account from the `users` table. Only used for login; `password` holds an
/// Argon2 PHC string and is never serialized.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password: String,
    pub role: String,
}

/// NewBook
///
/// The validated insert payload handed to the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub name: String,
    pub author_id: i32,
    pub genre_id: i32,
    pub price: i32,
}

impl NewBook {
    /// Checks every field invariant of a book before it reaches storage.
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("book name cannot be empty"));
        }
        if self.author_id <= 0 {
            return Err(AppError::validation("author_id must be positive"));
        }
        if self.genre_id <= 0 {
            return Err(AppError::validation("genre_id must be positive"));
        }
        if self.price < 0 {
            return Err(AppError::validation("price must be non-negative"));
        }
        Ok(())
    }
}

/// BookUpdate
///
/// A sparse patch: `None` leaves the column untouched, `Some` overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookUpdate {
    pub name: Option<String>,
    pub price: Option<i32>,
}

impl BookUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price.is_none()
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateBookRequest
///
/// Input payload for `POST /books`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateBookRequest {
    #[schema(example = "War and Peace")]
    pub name: String,
    pub author_id: i32,
    pub genre_id: i32,
    #[schema(example = 1000)]
    pub price: i32,
}

impl From<CreateBookRequest> for NewBook {
    fn from(req: CreateBookRequest) -> Self {
        NewBook {
            name: req.name,
            author_id: req.author_id,
            genre_id: req.genre_id,
            price: req.price,
        }
    }
}

/// UpdateBookRequest
///
/// Input payload for `PATCH /books?id=`. An omitted key means "leave unchanged";
/// an explicit `null` is rejected, since neither column is nullable.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UpdateBookRequest {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i32>)]
    pub price: Option<Option<i32>>,
}

/// Marks a key as present, keeping `null` distinguishable from an omitted key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdateBookRequest {
    pub fn price(price: i32) -> Self {
        Self {
            price: Some(Some(price)),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(Some(name.into())),
            ..Self::default()
        }
    }

    pub fn into_update(self) -> AppResult<BookUpdate> {
        let name = match self.name {
            None => None,
            Some(None) => return Err(AppError::validation("name cannot be null")),
            Some(Some(name)) => Some(name),
        };
        let price = match self.price {
            None => None,
            Some(None) => return Err(AppError::validation("price cannot be null")),
            Some(Some(price)) => Some(price),
        };
        Ok(BookUpdate { name, price })
    }
}

/// CreateAuthorRequest
///
/// Input payload for `POST /authors`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateAuthorRequest {
    #[schema(example = "Leo Tolstoy")]
    pub author: String,
}

/// CreateGenreRequest
///
/// Input payload for `POST /genres`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateGenreRequest {
    #[schema(example = "Novel")]
    pub genre: String,
}

/// LoginRequest
///
/// Input payload for `POST /auth/login`. The password is checked against the
/// stored hash and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// --- Response Payloads ---

/// CreatedId
///
/// Body of every `201 Created` response: the storage-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatedId {
    pub id: i32,
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_keys_are_absent() {
        let req: UpdateBookRequest = serde_json::from_str(r#"{"price": 5}"#).unwrap();
        let update = req.into_update().unwrap();
        assert_eq!(update.name, None);
        assert_eq!(update.price, Some(5));
    }

    #[test]
    fn explicit_null_is_rejected() {
        let req: UpdateBookRequest = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert!(matches!(req.into_update(), Err(AppError::Validation(_))));
    }

    #[test]
    fn empty_object_is_an_empty_patch() {
        let req: UpdateBookRequest = serde_json::from_str("{}").unwrap();
        assert!(req.into_update().unwrap().is_empty());
    }

    #[test]
    fn new_book_validation_checks_each_field() {
        let ok = NewBook {
            name: "Anna Karenina".into(),
            author_id: 1,
            genre_id: 1,
            price: 0,
        };
        assert!(ok.validate().is_ok());

        for bad in [
            NewBook { name: "  ".into(), ..ok.clone() },
            NewBook { author_id: 0, ..ok.clone() },
            NewBook { genre_id: -3, ..ok.clone() },
            NewBook { price: -1, ..ok.clone() },
        ] {
            assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
        }
    }
}
