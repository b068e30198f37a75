//! API integration tests
//!
//! Require a running server with a configured administrator account:
//! `LIBRARY_ADMIN__EMAIL` / `LIBRARY_ADMIN__PASSWORD` (read here as
//! `TEST_ADMIN_EMAIL` / `TEST_ADMIN_PASSWORD`).

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use timeless_library::isbn;

const BASE_URL: &str = "http://localhost:8080/api";

fn admin_credentials() -> (String, String) {
    (
        std::env::var("TEST_ADMIN_EMAIL").unwrap_or_else(|_| "admin@library.local".into()),
        std::env::var("TEST_ADMIN_PASSWORD").unwrap_or_else(|_| "admin-password".into()),
    )
}

/// Suffix keeping names, emails and ISBNs unique across runs
fn unique() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
        % 1_000_000_000
}

/// A valid ISBN-13 built from a 9-digit seed
fn isbn13(seed: u64) -> String {
    isbn::generate_isbn13(&format!("{:09}", seed % 1_000_000_000)).unwrap()
}

async fn admin_token(client: &Client) -> String {
    let (email, password) = admin_credentials();
    let response = client
        .post(format!("{}/login_check", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

async fn create_category(client: &Client, token: &str) -> i64 {
    let response = client
        .post(format!("{}/categories/new", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "name": format!("Category {}", unique()),
            "description": "Created by integration tests"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn create_book(client: &Client, token: &str, category_id: i64, isbn: &str) -> i64 {
    let response = client
        .post(format!("{}/books/new", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": format!("Integration Book {}", unique()),
            "ISBN": isbn,
            "publishedYear": "1999-01-01",
            "description": "A book",
            "image": "",
            "categoryId": category_id,
            "authorIds": []
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

/// Register a reader account, returning (id, email)
async fn register_reader(client: &Client) -> (i64, String) {
    let email = format!("reader{}@example.org", unique());
    let response = client
        .post(format!("{}/register", BASE_URL))
        .json(&json!({
            "email": email,
            "firstName": "Test",
            "lastName": "Reader",
            "userName": format!("reader{}", unique()),
            "phoneNumber": "0102030405",
            "subStartDate": "2024-01-01 00:00:00",
            "subEndDate": "2030-01-01 00:00:00",
            "password": "secret123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    (body["id"].as_i64().unwrap(), email)
}

/// Open a loan for `email` over the books with these ISBNs
async fn create_loan(client: &Client, token: &str, email: &str, isbns: &[&str]) -> reqwest::Response {
    let book_loans: Vec<Value> = isbns
        .iter()
        .map(|isbn| json!({ "book": { "ISBN": isbn } }))
        .collect();

    client
        .post(format!("{}/loans/new", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "user": { "email": email },
            "loanDate": "2024-03-01 10:00:00",
            "dueDate": "2024-03-15 10:00:00",
            "bookLoans": book_loans
        }))
        .send()
        .await
        .unwrap()
}

async fn created_id(response: reqwest::Response) -> i64 {
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn update_loan(client: &Client, token: &str, loan_id: i64, changes: Value) -> StatusCode {
    client
        .put(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(token)
        .json(&changes)
        .send()
        .await
        .unwrap()
        .status()
}

async fn book_available(client: &Client, token: &str, id: i64) -> bool {
    let body: Value = client
        .get(format!("{}/books/{}", BASE_URL, id))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["available"].as_bool().unwrap()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();
    let (email, _) = admin_credentials();

    let response = client
        .post(format!("{}/login_check", BASE_URL))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_login_returns_bearer_token() {
    let client = Client::new();
    let (email, password) = admin_credentials();

    let response = client
        .post(format!("{}/login_check", BASE_URL))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
}

#[tokio::test]
#[ignore]
async fn test_duplicate_email_is_conflict() {
    let client = Client::new();
    let token = admin_token(&client).await;
    let (_, email) = register_reader(&client).await;

    let response = client
        .post(format!("{}/users/new", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "email": email,
            "firstName": "Other",
            "lastName": "Reader",
            "userName": "other",
            "phoneNumber": "0600000000",
            "subStartDate": "2024-01-01",
            "subEndDate": "2025-01-01"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_loan_lifecycle_tracks_availability() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let category_id = create_category(&client, &token).await;
    let isbn = isbn13(unique());
    let book_id = create_book(&client, &token, category_id, &isbn).await;
    assert!(book_available(&client, &token, book_id).await);

    let (_, borrower) = register_reader(&client).await;
    let loan = json!({
        "user": { "email": borrower },
        "loanDate": "2024-03-01 10:00:00",
        "dueDate": "2024-03-15 10:00:00",
        "bookLoans": [{ "book": { "ISBN": isbn } }]
    });

    let response = client
        .post(format!("{}/loans/new", BASE_URL))
        .bearer_auth(&token)
        .json(&loan)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan_id = response.json::<Value>().await.unwrap()["id"].as_i64().unwrap();
    assert!(!book_available(&client, &token, book_id).await);

    // The book is out: a second loan must be refused
    let response = client
        .post(format!("{}/loans/new", BASE_URL))
        .bearer_auth(&token)
        .json(&loan)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(book_available(&client, &token, book_id).await);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body["returnDate"].is_string());
    assert_eq!(body["bookLoans"][0]["book"]["ISBN"], isbn.as_str());
}

#[tokio::test]
#[ignore]
async fn test_deleted_book_leaves_listing() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let category_id = create_category(&client, &token).await;
    let book_id = create_book(&client, &token, category_id, &isbn13(unique())).await;

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let books: Vec<Value> = client
        .get(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(books.iter().all(|b| b["id"].as_i64() != Some(book_id)));

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_category_with_books_cannot_be_deleted() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let category_id = create_category(&client, &token).await;
    create_book(&client, &token, category_id, &isbn13(unique())).await;

    let response = client
        .delete(format!("{}/categories/{}", BASE_URL, category_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_logout_revokes_token() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let response = client
        .post(format!("{}/logout", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{}/me", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_book_loan_records_follow_availability() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let category_id = create_category(&client, &token).await;
    let first = isbn13(unique());
    let first_id = create_book(&client, &token, category_id, &first).await;
    let second_id = create_book(&client, &token, category_id, &isbn13(unique())).await;
    let third_id = create_book(&client, &token, category_id, &isbn13(unique())).await;

    let (_, borrower) = register_reader(&client).await;
    let loan_id = created_id(create_loan(&client, &token, &borrower, &[&first]).await).await;
    assert!(!book_available(&client, &token, first_id).await);

    let add = |book_ids: Vec<i64>| {
        client
            .post(format!("{}/book/loan/create", BASE_URL))
            .bearer_auth(&token)
            .json(&json!({ "bookIds": book_ids, "loanId": loan_id }))
            .send()
    };

    let response = add(vec![second_id]).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Books successfully borrowed");
    assert!(!book_available(&client, &token, second_id).await);

    // already out on this open loan
    let response = add(vec![second_id]).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = add(vec![i32::MAX as i64]).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let loan: Value = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let record_id = loan["bookLoans"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["book"]["id"].as_i64() == Some(second_id))
        .and_then(|r| r["id"].as_i64())
        .unwrap();

    // moving the record to the first book clashes with the loan's other record
    let response = client
        .put(format!("{}/book/loan/{}", BASE_URL, record_id))
        .bearer_auth(&token)
        .json(&json!({ "bookId": first_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .put(format!("{}/book/loan/{}", BASE_URL, record_id))
        .bearer_auth(&token)
        .json(&json!({ "bookId": third_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["book"]["id"].as_i64(), Some(third_id));
    assert!(book_available(&client, &token, second_id).await);
    assert!(!book_available(&client, &token, third_id).await);

    let response = client
        .delete(format!("{}/book/loan/{}", BASE_URL, record_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(book_available(&client, &token, third_id).await);
    assert!(!book_available(&client, &token, first_id).await);

    let response = client
        .get(format!("{}/book/loan/{}", BASE_URL, record_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_loan_update_replaces_books_and_reopens() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let category_id = create_category(&client, &token).await;
    let first = isbn13(unique());
    let first_id = create_book(&client, &token, category_id, &first).await;
    let second = isbn13(unique());
    let second_id = create_book(&client, &token, category_id, &second).await;

    let (_, borrower) = register_reader(&client).await;
    let loan_id = created_id(create_loan(&client, &token, &borrower, &[&first]).await).await;

    // keeping its own book while adding another is not a clash
    let status = update_loan(
        &client,
        &token,
        loan_id,
        json!({ "bookLoans": [{ "book": { "ISBN": first } }, { "book": { "ISBN": second } }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!book_available(&client, &token, first_id).await);
    assert!(!book_available(&client, &token, second_id).await);

    let status = update_loan(
        &client,
        &token,
        loan_id,
        json!({ "bookLoans": [{ "book": { "ISBN": second } }] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(book_available(&client, &token, first_id).await);
    assert!(!book_available(&client, &token, second_id).await);

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(book_available(&client, &token, second_id).await);

    // explicit null reopens the loan
    let status = update_loan(&client, &token, loan_id, json!({ "returnDate": null })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!book_available(&client, &token, second_id).await);

    let status = update_loan(
        &client,
        &token,
        loan_id,
        json!({ "returnDate": "2024-03-10 12:00:00" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // while closed, another reader borrows the book; reopening must fail
    let (_, other) = register_reader(&client).await;
    let other_loan = create_loan(&client, &token, &other, &[&second]).await;
    assert_eq!(other_loan.status(), StatusCode::CREATED);

    let status = update_loan(&client, &token, loan_id, json!({ "returnDate": null })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let loan: Value = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(loan["returnDate"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_force_delete_user_frees_books() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let category_id = create_category(&client, &token).await;
    let isbn = isbn13(unique());
    let book_id = create_book(&client, &token, category_id, &isbn).await;

    let (user_id, borrower) = register_reader(&client).await;
    created_id(create_loan(&client, &token, &borrower, &[&isbn]).await).await;
    assert!(!book_available(&client, &token, book_id).await);

    let response = client
        .delete(format!("{}/users/{}", BASE_URL, user_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .delete(format!("{}/users/{}?force=true", BASE_URL, user_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(book_available(&client, &token, book_id).await);

    let response = client
        .get(format!("{}/users/{}", BASE_URL, user_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
