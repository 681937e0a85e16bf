use book_catalog::{
    AppError,
    models::{Author, Book, CreateBookRequest, Genre, NewBook, UpdateBookRequest},
};
use serde_json::json;

// --- Wire Shapes ---

#[test]
fn test_author_and_genre_use_catalog_field_names() {
    let author = Author {
        id: 3,
        name: "Anton Chekhov".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&author).unwrap(),
        json!({"id": 3, "author": "Anton Chekhov"})
    );

    let genre: Genre = serde_json::from_value(json!({"id": 1, "genre": "Drama"})).unwrap();
    assert_eq!(genre.name, "Drama");
}

#[test]
fn test_book_serializes_all_columns() {
    let book = Book {
        id: 1,
        name: "The Cherry Orchard".to_string(),
        price: 450,
        author_id: 3,
        genre_id: 1,
    };
    assert_eq!(
        serde_json::to_value(&book).unwrap(),
        json!({"id": 1, "name": "The Cherry Orchard", "price": 450, "author_id": 3, "genre_id": 1})
    );
}

#[test]
fn test_create_book_request_rejects_string_ids() {
    let result: Result<CreateBookRequest, _> = serde_json::from_value(json!({
        "name": "Anna Karenina", "author_id": "1", "genre_id": 1, "price": 500
    }));
    assert!(result.is_err());
}

#[test]
fn test_create_book_request_converts_to_new_book() {
    let req: CreateBookRequest = serde_json::from_value(json!({
        "name": "Anna Karenina", "author_id": 1, "genre_id": 2, "price": 500
    }))
    .unwrap();

    let book = NewBook::from(req);
    assert!(book.validate().is_ok());
    assert_eq!(book.genre_id, 2);
}

// --- Partial Update Payloads ---

#[test]
fn test_update_request_distinguishes_null_from_absent() {
    let absent: UpdateBookRequest = serde_json::from_str(r#"{"name": "Kholstomer"}"#).unwrap();
    let update = absent.into_update().unwrap();
    assert_eq!(update.name.as_deref(), Some("Kholstomer"));
    assert_eq!(update.price, None);

    let null: UpdateBookRequest = serde_json::from_str(r#"{"price": null}"#).unwrap();
    assert!(matches!(null.into_update(), Err(AppError::Validation(_))));
}

#[test]
fn test_update_request_constructors_serialize_sparsely() {
    assert_eq!(
        serde_json::to_value(UpdateBookRequest::price(999)).unwrap(),
        json!({"price": 999})
    );
    assert_eq!(
        serde_json::to_value(UpdateBookRequest::name("Hadji Murat")).unwrap(),
        json!({"name": "Hadji Murat"})
    );
}
