use axum::http::StatusCode;
use futures::StreamExt;
use kinboard_server::{server, storage};
use reqwest::Client;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

struct TestServer {
    base: String,
    client: Client,
    handle: tokio::task::JoinHandle<()>,
    _tempdir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let (addr, handle) = match start_server(&db_path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            handle,
            _tempdir: dir,
        })
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let url = format!("{}{}", self.base, path);
        let mut req = match method {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        let text = resp.text().await.unwrap();
        let val = if text.is_empty() {
            json!(null)
        } else {
            serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
        };
        (status, val)
    }

    async fn request_expect(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, path, token, body).await;
        assert_eq!(
            status, expected,
            "{method} {path} returned {status:?} with body {value:?}",
        );
        value
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(
    tmp_db: &Path,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    let config = server::AppConfig {
        jwt_secret: "test-access-secret".into(),
        refresh_secret: "test-refresh-secret".into(),
        listen_port: None,
        dev_cors_origin: None,
        // Low cost keeps the hashing fast in tests.
        bcrypt_cost: Some(4),
        chat_history_limit: 50,
    };

    let store = storage::Store::connect_sqlite(tmp_db.to_str().unwrap())
        .await
        .expect("db");

    let state = server::AppState::new(config, store);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

/// A freshly registered family: Alice (parent) and Bob (child), both logged in.
struct Household {
    family_code: String,
    parent_token: String,
    parent_refresh: String,
    child_id: String,
    child_token: String,
}

async fn setup_household(server: &TestServer) -> Household {
    let registered = server
        .request_expect(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"familyName": "Smiths", "pin": "1234", "parentName": "Alice"})),
            StatusCode::CREATED,
        )
        .await;
    let family_code = registered["family"]["familyCode"].as_str().unwrap().to_string();
    let parent_token = registered["token"].as_str().unwrap().to_string();
    let parent_refresh = registered["refreshToken"].as_str().unwrap().to_string();

    let child = server
        .request_expect(
            "POST",
            "/api/auth/register-member",
            Some(&parent_token),
            Some(json!({"name": "Bob", "role": "child"})),
            StatusCode::CREATED,
        )
        .await;
    let child_id = child["id"].as_str().unwrap().to_string();

    let child_login = server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"familyCode": family_code, "pin": "1234", "userId": child_id})),
            StatusCode::OK,
        )
        .await;
    let child_token = child_login["token"].as_str().unwrap().to_string();

    Household {
        family_code,
        parent_token,
        parent_refresh,
        child_id,
        child_token,
    }
}

/// Creates a chore assigned to the given user, submits a completion with the
/// user's token, and approves it with the parent token.
async fn earn_points(
    server: &TestServer,
    parent_token: &str,
    user_token: &str,
    user_id: &str,
    points: i64,
) {
    let chore = server
        .request_expect(
            "POST",
            "/api/chores",
            Some(parent_token),
            Some(json!({
                "title": "Extra credit",
                "points": points,
                "schedule": {"frequency": "one-time"},
                "difficulty": "easy",
                "assignees": [user_id]
            })),
            StatusCode::CREATED,
        )
        .await;
    let chore_id = chore["id"].as_str().unwrap();
    let completion = server
        .request_expect(
            "POST",
            &format!("/api/chores/{chore_id}/complete"),
            Some(user_token),
            Some(json!({})),
            StatusCode::CREATED,
        )
        .await;
    let completion_id = completion["id"].as_str().unwrap();
    server
        .request_expect(
            "POST",
            &format!("/api/chores/{chore_id}/approve"),
            Some(parent_token),
            Some(json!({"completionId": completion_id, "approved": true})),
            StatusCode::OK,
        )
        .await;
}

#[tokio::test]
async fn health_probe_and_registration() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let health = server
        .request_expect("GET", "/api/health", None, None, StatusCode::OK)
        .await;
    assert_eq!(health["success"], json!(true));
    assert_eq!(health["message"], json!("ok"));

    server
        .request_expect(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"familyName": "Smiths"})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    let registered = server
        .request_expect(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"familyName": "Smiths", "pin": "1234", "parentName": "Alice"})),
            StatusCode::CREATED,
        )
        .await;
    let code = registered["family"]["familyCode"].as_str().unwrap();
    assert_eq!(code.len(), 6);
    assert!(
        code.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
        "family code {code} is not 6 uppercase alphanumerics"
    );
    assert!(registered["family"].get("pinHash").is_none());
    let user = &registered["user"];
    assert_eq!(user["role"], json!("parent"));
    assert_eq!(user["name"], json!("Alice"));
    assert_eq!(user["points"], json!(0));
    assert_eq!(user["streak"], json!(0));
    assert_eq!(
        user["jars"],
        json!({"spend": 0, "save": 0, "give": 0}),
    );
    assert!(registered["token"].as_str().is_some());
    assert!(registered["refreshToken"].as_str().is_some());
}

#[tokio::test]
async fn login_and_token_flows() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    // Family-only login: members come back but no token is issued.
    let family_only = server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"familyCode": household.family_code, "pin": "1234"})),
            StatusCode::OK,
        )
        .await;
    assert!(family_only.get("token").is_none());
    assert!(family_only.get("refreshToken").is_none());
    assert_eq!(family_only["family"]["members"].as_array().unwrap().len(), 2);

    // The code comparison is case-insensitive.
    server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "familyCode": household.family_code.to_lowercase(),
                "pin": "1234"
            })),
            StatusCode::OK,
        )
        .await;

    server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"familyCode": household.family_code, "pin": "9999"})),
            StatusCode::UNAUTHORIZED,
        )
        .await;
    server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"familyCode": "ZZZZZZ", "pin": "1234"})),
            StatusCode::UNAUTHORIZED,
        )
        .await;
    server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "familyCode": household.family_code,
                "pin": "1234",
                "userId": "no-such-user"
            })),
            StatusCode::NOT_FOUND,
        )
        .await;

    // Refresh rotates the access token; the new token is usable.
    let refreshed = server
        .request_expect(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({"refreshToken": household.parent_refresh})),
            StatusCode::OK,
        )
        .await;
    let new_token = refreshed["token"].as_str().unwrap();
    let me = server
        .request_expect("GET", "/api/auth/me", Some(new_token), None, StatusCode::OK)
        .await;
    assert_eq!(me["user"]["name"], json!("Alice"));
    assert_eq!(
        me["family"]["familyCode"].as_str().unwrap(),
        household.family_code
    );

    server
        .request_expect(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({"refreshToken": "garbage"})),
            StatusCode::FORBIDDEN,
        )
        .await;
    // An access token must not pass as a refresh token.
    server
        .request_expect(
            "POST",
            "/api/auth/refresh",
            None,
            Some(json!({"refreshToken": household.parent_token})),
            StatusCode::FORBIDDEN,
        )
        .await;
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let cases: Vec<(&str, &str)> = vec![
        ("GET", "/api/auth/me"),
        ("POST", "/api/auth/register-member"),
        ("GET", "/api/chores"),
        ("POST", "/api/chores"),
        ("GET", "/api/chores/some-id"),
        ("POST", "/api/chores/some-id/complete"),
        ("POST", "/api/chores/some-id/approve"),
        ("GET", "/api/allowance"),
        ("POST", "/api/allowance/distribute"),
        ("GET", "/api/rewards"),
        ("POST", "/api/rewards"),
        ("POST", "/api/rewards/some-id/redeem"),
        ("GET", "/api/chat"),
        ("POST", "/api/chat"),
    ];
    for (method, path) in &cases {
        server
            .request_expect(method, path, None, None, StatusCode::UNAUTHORIZED)
            .await;
        server
            .request_expect(
                method,
                path,
                Some("not-a-jwt"),
                None,
                StatusCode::FORBIDDEN,
            )
            .await;
    }
}

#[tokio::test]
async fn end_to_end_chore_workflow() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    let chore = server
        .request_expect(
            "POST",
            "/api/chores",
            Some(&household.parent_token),
            Some(json!({
                "title": "Dishes",
                "points": 10,
                "schedule": {"frequency": "weekly", "days": [1, 3, 5]},
                "difficulty": "medium",
                "assignees": [household.child_id]
            })),
            StatusCode::CREATED,
        )
        .await;
    let chore_id = chore["id"].as_str().unwrap().to_string();
    assert_eq!(chore["assignments"][0]["status"], json!("pending"));

    // The schedule must round-trip structurally, not as a string.
    let listed = server
        .request_expect(
            "GET",
            "/api/chores",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(
        listed[0]["schedule"],
        json!({"frequency": "weekly", "days": [1, 3, 5]})
    );

    // Nobody may submit for an assignment that is not theirs: the parent has
    // no assignment for this chore.
    server
        .request_expect(
            "POST",
            &format!("/api/chores/{chore_id}/complete"),
            Some(&household.parent_token),
            Some(json!({})),
            StatusCode::NOT_FOUND,
        )
        .await;

    let completion = server
        .request_expect(
            "POST",
            &format!("/api/chores/{chore_id}/complete"),
            Some(&household.child_token),
            Some(json!({
                "notes": "All sparkling",
                "timeSpent": 15,
                "afterPhotos": ["sink.jpg"]
            })),
            StatusCode::CREATED,
        )
        .await;
    let completion_id = completion["id"].as_str().unwrap().to_string();
    assert_eq!(completion["status"], json!("pending"));

    let detail = server
        .request_expect(
            "GET",
            &format!("/api/chores/{chore_id}"),
            Some(&household.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(detail["assignments"][0]["status"], json!("completed"));

    server
        .request_expect(
            "POST",
            &format!("/api/chores/{chore_id}/approve"),
            Some(&household.parent_token),
            Some(json!({"approved": true})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    let review = server
        .request_expect(
            "POST",
            &format!("/api/chores/{chore_id}/approve"),
            Some(&household.parent_token),
            Some(json!({"completionId": completion_id, "approved": true})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(review["success"], json!(true));
    assert_eq!(review["status"], json!("approved"));

    let me = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(me["user"]["points"], json!(10));
    assert_eq!(me["user"]["streak"], json!(1));

    let detail = server
        .request_expect(
            "GET",
            &format!("/api/chores/{chore_id}"),
            Some(&household.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(detail["assignments"][0]["status"], json!("approved"));
    let reviewed = &detail["assignments"][0]["completions"][0];
    assert_eq!(reviewed["status"], json!("approved"));
    assert!(reviewed["approvedAt"].as_str().is_some());

    // Reviewing the same completion twice must not award points twice.
    server
        .request_expect(
            "POST",
            &format!("/api/chores/{chore_id}/approve"),
            Some(&household.parent_token),
            Some(json!({"completionId": completion_id, "approved": true})),
            StatusCode::CONFLICT,
        )
        .await;
    let me = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(me["user"]["points"], json!(10));

    server
        .request_expect(
            "POST",
            "/api/chores/no-such-chore/complete",
            Some(&household.child_token),
            Some(json!({})),
            StatusCode::NOT_FOUND,
        )
        .await;
    server
        .request_expect(
            "GET",
            "/api/chores/no-such-chore",
            Some(&household.parent_token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
}

#[tokio::test]
async fn role_enforcement_forbids_children() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    let forbidden: Vec<(&str, &str, Value)> = vec![
        (
            "POST",
            "/api/rewards",
            json!({"title": "Ice cream", "pointCost": 10}),
        ),
        (
            "POST",
            "/api/allowance/distribute",
            json!({
                "amount": 1000,
                "distribution": {"spend": 50, "save": 30, "give": 20},
                "userIds": [household.child_id]
            }),
        ),
        (
            "POST",
            "/api/chores/any/approve",
            json!({"completionId": "any", "approved": true}),
        ),
        (
            "POST",
            "/api/auth/register-member",
            json!({"name": "Eve", "role": "child"}),
        ),
    ];
    for (method, path, body) in forbidden {
        server
            .request_expect(
                method,
                path,
                Some(&household.child_token),
                Some(body),
                StatusCode::FORBIDDEN,
            )
            .await;
    }

    // None of the refused calls may have mutated state.
    let rewards = server
        .request_expect(
            "GET",
            "/api/rewards",
            Some(&household.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(rewards.as_array().unwrap().is_empty());
    let me = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(me["user"]["jars"], json!({"spend": 0, "save": 0, "give": 0}));
    let members = server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"familyCode": household.family_code, "pin": "1234"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(members["family"]["members"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn allowance_distribution_ledger() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    for bad_body in [
        json!({"amount": 10_000}),
        json!({
            "amount": 0,
            "distribution": {"spend": 50, "save": 30, "give": 20},
            "userIds": [household.child_id]
        }),
        json!({
            "amount": 10_000,
            "distribution": {"spend": 50, "save": 30, "give": 30},
            "userIds": [household.child_id]
        }),
        json!({
            "amount": 10_000,
            "distribution": {"spend": 50, "save": 30, "give": 20},
            "userIds": []
        }),
    ] {
        server
            .request_expect(
                "POST",
                "/api/allowance/distribute",
                Some(&household.parent_token),
                Some(bad_body),
                StatusCode::BAD_REQUEST,
            )
            .await;
    }

    server
        .request_expect(
            "POST",
            "/api/allowance/distribute",
            Some(&household.parent_token),
            Some(json!({
                "amount": 10_000,
                "distribution": {"spend": 50, "save": 30, "give": 20},
                "userIds": ["no-such-user"]
            })),
            StatusCode::NOT_FOUND,
        )
        .await;

    // $100.00 at 50/30/20 lands as exactly 50.00/30.00/20.00.
    let distributed = server
        .request_expect(
            "POST",
            "/api/allowance/distribute",
            Some(&household.parent_token),
            Some(json!({
                "amount": 10_000,
                "distribution": {"spend": 50, "save": 30, "give": 20},
                "userIds": [household.child_id],
                "note": "weekly allowance"
            })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(distributed["success"], json!(true));
    let txns = distributed["transactions"].as_array().unwrap();
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0]["type"], json!("deposit"));
    assert_eq!(txns[0]["amount"], json!(10_000));
    assert_eq!(
        txns[0]["jarDistribution"],
        json!({"spend": 5_000, "save": 3_000, "give": 2_000})
    );

    let me = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(
        me["user"]["jars"],
        json!({"spend": 5_000, "save": 3_000, "give": 2_000})
    );

    // An uneven amount still sums exactly; give absorbs the remainder.
    server
        .request_expect(
            "POST",
            "/api/allowance/distribute",
            Some(&household.parent_token),
            Some(json!({
                "amount": 999,
                "distribution": {"spend": 33, "save": 33, "give": 34},
                "userIds": [household.child_id]
            })),
            StatusCode::OK,
        )
        .await;
    let me = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    let jars = &me["user"]["jars"];
    let total = jars["spend"].as_i64().unwrap()
        + jars["save"].as_i64().unwrap()
        + jars["give"].as_i64().unwrap();
    assert_eq!(total, 10_000 + 999);

    // A child sees only their own ledger; the parent sees the family's.
    let child_view = server
        .request_expect(
            "GET",
            "/api/allowance",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(child_view.as_array().unwrap().len(), 2);
    assert!(
        child_view
            .as_array()
            .unwrap()
            .iter()
            .all(|t| t["userId"].as_str().unwrap() == household.child_id)
    );
    let parent_view = server
        .request_expect(
            "GET",
            "/api/allowance",
            Some(&household.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(parent_view.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn reward_redemption_and_stock() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    let reward = server
        .request_expect(
            "POST",
            "/api/rewards",
            Some(&household.parent_token),
            Some(json!({"title": "Movie night", "pointCost": 60, "stock": 1})),
            StatusCode::CREATED,
        )
        .await;
    let reward_id = reward["id"].as_str().unwrap().to_string();
    assert_eq!(reward["stock"], json!(1));

    // Insufficient points leave everything untouched.
    server
        .request_expect(
            "POST",
            &format!("/api/rewards/{reward_id}/redeem"),
            Some(&household.child_token),
            None,
            StatusCode::CONFLICT,
        )
        .await;
    let rewards = server
        .request_expect(
            "GET",
            "/api/rewards",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(rewards[0]["stock"], json!(1));
    let me = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(me["user"]["points"], json!(0));

    earn_points(
        &server,
        &household.parent_token,
        &household.child_token,
        &household.child_id,
        100,
    )
    .await;

    let redemption = server
        .request_expect(
            "POST",
            &format!("/api/rewards/{reward_id}/redeem"),
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(redemption["status"], json!("pending"));
    assert_eq!(redemption["userId"].as_str().unwrap(), household.child_id);

    let me = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(me["user"]["points"], json!(40));
    let rewards = server
        .request_expect(
            "GET",
            "/api/rewards",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(rewards[0]["stock"], json!(0));

    // The stock is exhausted before the (now insufficient) balance matters.
    server
        .request_expect(
            "POST",
            &format!("/api/rewards/{reward_id}/redeem"),
            Some(&household.child_token),
            None,
            StatusCode::CONFLICT,
        )
        .await;

    server
        .request_expect(
            "POST",
            "/api/rewards/no-such-reward/redeem",
            Some(&household.child_token),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
}

#[tokio::test]
async fn concurrent_redemptions_take_exactly_one_unit() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    let second_child = server
        .request_expect(
            "POST",
            "/api/auth/register-member",
            Some(&household.parent_token),
            Some(json!({"name": "Cleo", "role": "child"})),
            StatusCode::CREATED,
        )
        .await;
    let second_id = second_child["id"].as_str().unwrap().to_string();
    let second_login = server
        .request_expect(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({
                "familyCode": household.family_code,
                "pin": "1234",
                "userId": second_id
            })),
            StatusCode::OK,
        )
        .await;
    let second_token = second_login["token"].as_str().unwrap().to_string();

    earn_points(
        &server,
        &household.parent_token,
        &household.child_token,
        &household.child_id,
        100,
    )
    .await;
    earn_points(
        &server,
        &household.parent_token,
        &second_token,
        &second_id,
        100,
    )
    .await;

    let reward = server
        .request_expect(
            "POST",
            "/api/rewards",
            Some(&household.parent_token),
            Some(json!({"title": "Last slice", "pointCost": 50, "stock": 1})),
            StatusCode::CREATED,
        )
        .await;
    let reward_id = reward["id"].as_str().unwrap().to_string();
    let path = format!("/api/rewards/{reward_id}/redeem");

    let (first, second) = tokio::join!(
        server.request("POST", &path, Some(&household.child_token), None),
        server.request("POST", &path, Some(&second_token), None),
    );
    let statuses = [first.0, second.0];
    assert!(
        statuses.contains(&StatusCode::OK) && statuses.contains(&StatusCode::CONFLICT),
        "expected exactly one success, got {statuses:?} ({:?} / {:?})",
        first.1,
        second.1
    );

    let rewards = server
        .request_expect(
            "GET",
            "/api/rewards",
            Some(&household.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(rewards[0]["stock"], json!(0));

    // Exactly one balance was debited.
    let me_first = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&household.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    let me_second = server
        .request_expect(
            "GET",
            "/api/auth/me",
            Some(&second_token),
            None,
            StatusCode::OK,
        )
        .await;
    let balances = [
        me_first["user"]["points"].as_i64().unwrap(),
        me_second["user"]["points"].as_i64().unwrap(),
    ];
    let mut sorted = balances;
    sorted.sort();
    assert_eq!(sorted, [50, 100]);
}

#[tokio::test]
async fn chat_history_is_chronological() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    server
        .request_expect(
            "POST",
            "/api/chat",
            Some(&household.child_token),
            Some(json!({"content": ""})),
            StatusCode::BAD_REQUEST,
        )
        .await;

    for content in ["A", "B", "C"] {
        server
            .request_expect(
                "POST",
                "/api/chat",
                Some(&household.child_token),
                Some(json!({"content": content})),
                StatusCode::CREATED,
            )
            .await;
        // Keep creation timestamps distinct.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let history = server
        .request_expect(
            "GET",
            "/api/chat",
            Some(&household.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    let contents: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["A", "B", "C"]);
    let author = &history.as_array().unwrap()[0]["user"];
    assert_eq!(author["name"], json!("Bob"));

    // Attachments-only messages are allowed and come back structured.
    let with_attachment = server
        .request_expect(
            "POST",
            "/api/chat",
            Some(&household.child_token),
            Some(json!({"type": "image", "attachments": ["photo.jpg"]})),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(with_attachment["attachments"], json!(["photo.jpg"]));
    assert_eq!(with_attachment["type"], json!("image"));
}

#[tokio::test]
async fn sse_stream_delivers_family_messages() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let household = setup_household(&server).await;

    // A bad token cannot join any room.
    let denied = server
        .client
        .get(format!("{}/api/chat/stream?token=bogus", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status().as_u16(), 403);

    let resp = server
        .client
        .get(format!(
            "{}/api/chat/stream?token={}",
            server.base, household.parent_token
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert!(
        resp.headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    let mut stream = resp.bytes_stream();

    // The subscription is live once the response headers have arrived.
    server
        .request_expect(
            "POST",
            "/api/chat",
            Some(&household.child_token),
            Some(json!({"content": "Hello family"})),
            StatusCode::CREATED,
        )
        .await;

    let mut buf = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let chunk = tokio::time::timeout_at(deadline, stream.next())
            .await
            .expect("timed out waiting for SSE event")
            .expect("SSE stream ended unexpectedly")
            .expect("SSE read failed");
        buf.push_str(&String::from_utf8_lossy(&chunk));
        if buf.contains("\n\n") && buf.contains("data:") {
            break;
        }
    }
    assert!(buf.contains("event: message"), "buf: {buf}");
    assert!(buf.contains("Hello family"), "buf: {buf}");
    assert!(buf.contains("Bob"), "buf: {buf}");
}
