//! Shared helpers for coach-server integration tests
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use coach_common::db::init_memory_database;
use coach_server::auth::Role;
use coach_server::db::coaches::create_coach;
use coach_server::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub admin_token: String,
    pub coach_id: Uuid,
    pub coach_token: String,
}

/// In-memory database with one admin and one coach
pub async fn setup() -> TestApp {
    let pool = init_memory_database()
        .await
        .expect("Should create in-memory database");
    let (_, admin_token) = create_coach(&pool, "Admin", Role::Admin).await.unwrap();
    let (coach, coach_token) = create_coach(&pool, "Coach", Role::Coach).await.unwrap();

    TestApp {
        router: build_router(AppState::new(pool.clone())),
        pool,
        admin_token,
        coach_id: coach.id,
        coach_token,
    }
}

impl TestApp {
    /// Send a request and return status plus parsed JSON body (Null if empty)
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    /// Create a customer owned by the test coach and return its id
    pub async fn customer(&self, name: &str) -> String {
        let (status, body) = self
            .post("/api/customers", &self.coach_token, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Create a requirement owned by the test coach and return its id
    pub async fn requirement(&self, title: &str) -> String {
        let (status, body) = self
            .post(
                "/api/requirements",
                &self.coach_token,
                serde_json::json!({ "title": title }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}
