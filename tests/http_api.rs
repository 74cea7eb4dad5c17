//! End-to-end tests over the HTTP router with an in-memory store

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use sabil_registry::{
    config::{BootstrapAdmin, ServerConfig},
    db, server, AppContext,
};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-password-1";
const USER_PASSWORD: &str = "clerk-password-1";

struct TestApp {
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = ServerConfig::for_tests();
        config.authentication.bootstrap_admin = Some(BootstrapAdmin {
            username: "admin".to_string(),
            password: ADMIN_PASSWORD.to_string(),
            email: "admin@example.com".to_string(),
        });

        let pool = db::test_pool().await.unwrap();
        let ctx = AppContext::from_pool(config, pool).await.unwrap();

        Self {
            router: server::build_router(ctx),
        }
    }

    async fn send(
        &self,
        method: Method,
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
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["accessToken"].as_str().unwrap().to_string()
    }

    /// Admin token plus a user-role account logged in as "clerk"
    async fn sessions(&self) -> (String, String) {
        let admin = self.login("admin", ADMIN_PASSWORD).await;

        let (status, body) = self
            .send(
                Method::POST,
                "/api/accounts",
                Some(&admin),
                Some(json!({
                    "username": "clerk",
                    "email": "clerk@example.com",
                    "password": USER_PASSWORD,
                    "displayName": "Clerk One"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "account create failed: {}", body);

        let user = self.login("clerk", USER_PASSWORD).await;
        (admin, user)
    }

    async fn seed_household(&self, admin: &str) {
        for (person_id, name) in [(1001, "Head of House"), (1002, "Dependent")] {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/persons",
                    Some(admin),
                    Some(json!({
                        "personId": person_id,
                        "householdId": 1001,
                        "fullName": name,
                        "locationCode": 500,
                        "age": 40
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "seed failed: {}", body);
        }
    }
}

#[tokio::test]
async fn test_user_address_edit_verifies_household() {
    let app = TestApp::new().await;
    let (admin, user) = app.sessions().await;
    app.seed_household(&admin).await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/persons/1001",
            Some(&user),
            Some(json!({ "address": "12 Main St", "fullName": "Ignored" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["scope"], "household");
    assert_eq!(body["message"], "Address updated for all 2 household members");

    for id in [1001, 1002] {
        let (_, body) = app
            .send(Method::GET, &format!("/api/persons/{}", id), Some(&admin), None)
            .await;
        let person = &body["data"];
        assert_eq!(person["address"], "12 Main St");
        assert_eq!(person["verified"], true);
        assert_eq!(person["verifiedBy"], "Clerk One");
        assert!(person["verifiedAt"].is_string());
    }

    let (_, head) = app.send(Method::GET, "/api/persons/1001", Some(&admin), None).await;
    assert_eq!(head["data"]["fullName"], "Head of House");

    // Admin edits a person-specific field on the dependent
    let (status, body) = app
        .send(
            Method::PUT,
            "/api/persons/1002",
            Some(&admin),
            Some(json!({
                "personId": 1002,
                "householdId": 1001,
                "fullName": "Dependent",
                "locationCode": 500,
                "age": 31
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["scope"], "single_record");
    assert_eq!(body["message"], "Record updated successfully");

    for id in [1001, 1002] {
        let (_, body) = app
            .send(Method::GET, &format!("/api/persons/{}", id), Some(&admin), None)
            .await;
        assert_eq!(body["data"]["address"], "12 Main St");
        assert_eq!(body["data"]["verified"], true);
    }

    let (status, stats) = app.send(Method::GET, "/api/dashboard/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &stats["data"];
    assert_eq!(stats["totalHouseholds"], 1);
    assert_eq!(stats["verifiedHouseholds"], 1);
    assert_eq!(stats["unverifiedHouseholds"], 0);
    assert_eq!(stats["totalAccounts"], 2);
    assert_eq!(
        stats["verificationLeaderboard"],
        json!([{ "identity": "Clerk One", "count": 1 }])
    );
    assert_eq!(stats["recentVerifications"][0]["locationCode"], 500);
}

#[tokio::test]
async fn test_user_cannot_edit_dependent_or_delete() {
    let app = TestApp::new().await;
    let (admin, user) = app.sessions().await;
    app.seed_household(&admin).await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/persons/1002",
            Some(&user),
            Some(json!({ "address": "12 Main St" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, _) = app.send(Method::DELETE, "/api/persons/1001", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::GET, "/api/dashboard/stats", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_anonymous_write_is_unauthorized() {
    let app = TestApp::new().await;
    let (admin, _) = app.sessions().await;
    app.seed_household(&admin).await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/persons/1001",
            None,
            Some(json!({ "address": "12 Main St" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/persons/1001",
            Some("not-a-real-token"),
            Some(json!({ "address": "12 Main St" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_soft_delete_is_idempotent_and_hidden_from_search() {
    let app = TestApp::new().await;
    let (admin, _) = app.sessions().await;
    app.seed_household(&admin).await;

    let (status, body) = app.send(Method::DELETE, "/api/persons/1002", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["alreadyDeleted"], false);

    let (status, body) = app.send(Method::DELETE, "/api/persons/1002", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["alreadyDeleted"], true);

    let (_, body) = app
        .send(Method::GET, "/api/persons?locationCode=500", Some(&admin), None)
        .await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["personId"], 1001);

    let (_, body) = app.send(Method::GET, "/api/persons/1002", Some(&admin), None).await;
    assert_eq!(body["data"]["isDeleted"], true);
}

#[tokio::test]
async fn test_search_scopes() {
    let app = TestApp::new().await;
    let (admin, user) = app.sessions().await;
    app.seed_household(&admin).await;

    let (status, body) = app
        .send(Method::GET, "/api/persons?locationCode=", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 0);
    assert_eq!(body["data"], json!([]));

    let (_, body) = app
        .send(Method::GET, "/api/persons?sabilNo=500", Some(&admin), None)
        .await;
    assert_eq!(body["pagination"]["total"], 2);

    let (_, body) = app
        .send(Method::GET, "/api/persons?locationCode=500", Some(&user), None)
        .await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["personId"], 1001);
}

#[tokio::test]
async fn test_admin_cannot_act_on_own_account() {
    let app = TestApp::new().await;
    let (admin, _) = app.sessions().await;

    let (_, session) = app.send(Method::GET, "/api/auth/session", Some(&admin), None).await;
    let admin_id = session["data"]["accountId"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{}", admin_id),
            Some(&admin),
            Some(json!({ "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/accounts/{}", admin_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Still able to use the session afterwards
    let (status, _) = app.send(Method::GET, "/api/accounts", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_account_loses_access() {
    let app = TestApp::new().await;
    let (admin, user) = app.sessions().await;

    let (_, accounts) = app.send(Method::GET, "/api/accounts", Some(&admin), None).await;
    let clerk_id = accounts["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["username"] == "clerk")
        .map(|a| a["id"].as_str().unwrap().to_string())
        .unwrap();

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/accounts/{}", clerk_id),
            Some(&admin),
            Some(json!({ "isActive": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, "/api/auth/session", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "clerk", "password": USER_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["error"],
        "Your account has been disabled. Please contact the administrator."
    );
}

#[tokio::test]
async fn test_envelopes_for_bad_input_and_unknown_routes() {
    let app = TestApp::new().await;
    let (admin, _) = app.sessions().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/accounts",
            Some(&admin),
            Some(json!({ "username": "shortpw", "email": "s@example.com", "password": "123" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters long");

    let (status, body) = app.send(Method::GET, "/api/persons/abc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app.send(Method::GET, "/api/persons/9999", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = app.send(Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_geotag_crud() {
    let app = TestApp::new().await;
    let (admin, _) = app.sessions().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/geotags",
            Some(&admin),
            Some(json!({
                "sabilNo": "500",
                "name": "North Sabil",
                "category": "water",
                "tags": ["north"],
                "location": { "latitude": 23.0, "longitude": 72.5 }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            Method::POST,
            "/api/geotags",
            Some(&admin),
            Some(json!({
                "sabilNo": "500",
                "name": "Duplicate",
                "location": { "latitude": 1.0, "longitude": 1.0 }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.send(Method::GET, "/api/geotags/categories", Some(&admin), None).await;
    assert_eq!(body["data"], json!(["water"]));

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/geotags/{}", id),
            Some(&admin),
            Some(json!({ "location": { "latitude": 123.0 } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/geotags/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Method::GET, &format!("/api/geotags/{}", id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
