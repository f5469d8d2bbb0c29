//! Integration tests for the onboarding REST surface.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory profile store and drives the wizard over HTTP.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use skillforge::config::AppConfig;
use skillforge::server::router;
use skillforge::store::{MemoryProfileStore, ProfileStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return (base url, store).
async fn start_server() -> (String, Arc<MemoryProfileStore>) {
    let store = Arc::new(MemoryProfileStore::new());
    let app = router(store.clone(), &AppConfig::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), store)
}

/// Create a session, optionally for a signed-in user. Returns its URL.
async fn create_session(client: &reqwest::Client, base: &str, principal: Option<&str>) -> String {
    let mut req = client.post(format!("{base}/api/onboarding/sessions"));
    if let Some(p) = principal {
        req = req.header("x-principal-id", p);
    }
    let resp = req.send().await.unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["snapshot"]["step"], "role");
    let id = body["session_id"].as_str().unwrap();
    format!("{base}/api/onboarding/sessions/{id}")
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client.post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn post_as(
    client: &reqwest::Client,
    url: String,
    principal: &str,
    body: Value,
) -> (u16, Value) {
    let resp = client
        .post(url)
        .header("x-principal-id", principal)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get_as(client: &reqwest::Client, url: String, principal: &str) -> (u16, Value) {
    let resp = client
        .get(url)
        .header("x-principal-id", principal)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

/// Walk a session up to (not including) the final submit.
async fn fill_session(client: &reqwest::Client, session: &str) {
    let (status, _) = post(client, format!("{session}/role"), json!({"role": "frontend"})).await;
    assert_eq!(status, 200);
    let (status, _) = post(client, format!("{session}/advance"), json!({})).await;
    assert_eq!(status, 200);
    for (skill, level) in [("react", 3), ("css", 2), ("js", 4), ("html", 5)] {
        let (status, _) = post(
            client,
            format!("{session}/skills"),
            json!({"skill": skill, "level": level}),
        )
        .await;
        assert_eq!(status, 200);
    }
    let (status, _) = post(client, format!("{session}/advance"), json!({})).await;
    assert_eq!(status, 200);
    let (status, body) = post(
        client,
        format!("{session}/time"),
        json!({"time_commitment": "10h/week"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["can_proceed"], true);
}

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let resp = reqwest::get(format!("{base}/health")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn catalog_lists_offered_choices() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let body: Value = reqwest::get(format!("{base}/api/onboarding/catalog"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!body["roles"].as_array().unwrap().is_empty());
        assert!(body["skills"].as_array().unwrap().len() >= 4);
        assert!(!body["time_commitments"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn full_flow_writes_profile_and_closes_session() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();

        store
            .merge_profile("u1", &json!({"uid": "u1", "email": "u1@example.com"}))
            .await
            .unwrap();

        let session = create_session(&client, &base, Some("u1")).await;
        fill_session(&client, &session).await;

        let (status, body) = post(&client, format!("{session}/advance"), json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(body["snapshot"]["step"], "complete");
        assert_eq!(body["snapshot"]["redirect_to"], "/dashboard");
        assert!(body["completed_at"].is_string());

        // Session is gone once complete
        let resp = client.get(&session).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        let (_, profile) = get_as(&client, format!("{base}/api/profiles/u1"), "u1").await;
        assert_eq!(profile["email"], "u1@example.com");
        assert_eq!(profile["onboardingCompleted"], true);
        assert_eq!(profile["onboarding"]["role"], "frontend");
        assert_eq!(
            profile["onboarding"]["skills"],
            json!({"react": 3, "css": 2, "js": 4, "html": 5})
        );
        assert_eq!(profile["onboarding"]["timeCommitment"], "10h/week");
        assert_eq!(profile["onboarding"]["completedAt"], body["completed_at"]);

        let (_, status) = get_as(&client, format!("{base}/api/profiles/u1/status"), "u1").await;
        assert_eq!(status["onboarding_completed"], true);
        assert_eq!(status["redirect_to"], "/dashboard");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn incomplete_step_is_conflict() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let session = create_session(&client, &base, Some("u1")).await;

        let (status, body) = post(&client, format!("{session}/advance"), json!({})).await;
        assert_eq!(status, 409);
        assert_eq!(body["snapshot"]["step"], "role");
        assert_eq!(body["snapshot"]["can_proceed"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_input_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let session = create_session(&client, &base, Some("u1")).await;

        let (status, _) = post(&client, format!("{session}/role"), json!({"role": "wizard"})).await;
        assert_eq!(status, 400);

        post(&client, format!("{session}/role"), json!({"role": "backend"})).await;
        post(&client, format!("{session}/advance"), json!({})).await;
        let (status, body) = post(
            &client,
            format!("{session}/skills"),
            json!({"skill": "python", "level": 9}),
        )
        .await;
        assert_eq!(status, 400);
        assert!(body["snapshot"]["skill_levels"].as_object().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn retreat_keeps_answers() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let session = create_session(&client, &base, Some("u1")).await;
        fill_session(&client, &session).await;

        let (status, body) = post(&client, format!("{session}/retreat"), json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(body["step"], "skills");
        assert_eq!(body["selected_role"], "frontend");
        assert_eq!(body["selected_time_commitment"], "10h/week");
        assert_eq!(body["skill_levels"].as_object().unwrap().len(), 4);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn anonymous_submit_is_unauthorized_and_writes_nothing() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();
        let session = create_session(&client, &base, None).await;
        fill_session(&client, &session).await;

        let (status, body) = post(&client, format!("{session}/advance"), json!({})).await;
        assert_eq!(status, 401);
        assert_eq!(body["snapshot"]["step"], "time_commitment");
        assert!(body["snapshot"]["last_error"].is_string());
        assert!(store.is_empty().await);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_and_malformed_sessions() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .get(format!("{base}/api/onboarding/sessions/not-a-uuid"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .get(format!(
                "{base}/api/onboarding/sessions/00000000-0000-0000-0000-000000000000"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn status_for_unknown_user_points_to_onboarding() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();

        let (code, _) = get_as(&client, format!("{base}/api/profiles/nobody"), "nobody").await;
        assert_eq!(code, 404);

        let (code, status) =
            get_as(&client, format!("{base}/api/profiles/nobody/status"), "nobody").await;
        assert_eq!(code, 200);
        assert_eq!(status["onboarding_completed"], false);
        assert_eq!(status["redirect_to"], "/onboarding");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn registration_then_onboarding_keeps_both() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();

        let (status, profile) = post_as(
            &client,
            format!("{base}/api/profiles/u7"),
            "u7",
            json!({"email": "u7@example.com"}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(profile["uid"], "u7");
        assert_eq!(profile["provider"], "password");
        assert!(profile["createdAt"].is_string());

        let (_, status) = get_as(&client, format!("{base}/api/profiles/u7/status"), "u7").await;
        assert_eq!(status["redirect_to"], "/onboarding");

        let session = create_session(&client, &base, Some("u7")).await;
        fill_session(&client, &session).await;
        let (status, _) = post(&client, format!("{session}/advance"), json!({})).await;
        assert_eq!(status, 200);

        let (_, profile) = get_as(&client, format!("{base}/api/profiles/u7"), "u7").await;
        assert_eq!(profile["email"], "u7@example.com");
        assert_eq!(profile["onboardingCompleted"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn repeat_registration_keeps_existing_fields() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();
        let url = format!("{base}/api/profiles/u1");

        let (_, first) = post_as(
            &client,
            url.clone(),
            "u1",
            json!({"email": "u1@example.com", "provider": "google"}),
        )
        .await;

        let (status, again) = post_as(&client, url, "u1", json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(again["email"], "u1@example.com");
        assert_eq!(again["provider"], "google");
        assert_eq!(again["createdAt"], first["createdAt"]);

        let stored = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(stored["email"], "u1@example.com");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn profiles_are_owner_only() {
    timeout(TEST_TIMEOUT, async {
        let (base, store) = start_server().await;
        let client = reqwest::Client::new();
        store
            .merge_profile("victim", &json!({"uid": "victim", "email": "victim@example.com"}))
            .await
            .unwrap();

        let (status, _) = post_as(
            &client,
            format!("{base}/api/profiles/victim"),
            "attacker",
            json!({"email": "attacker@example.com"}),
        )
        .await;
        assert_eq!(status, 403);

        let (status, _) = get_as(&client, format!("{base}/api/profiles/victim"), "attacker").await;
        assert_eq!(status, 403);
        let (status, _) =
            get_as(&client, format!("{base}/api/profiles/victim/status"), "attacker").await;
        assert_eq!(status, 403);

        let (status, _) = post(
            &client,
            format!("{base}/api/profiles/victim"),
            json!({"email": "anon@example.com"}),
        )
        .await;
        assert_eq!(status, 401);
        let resp = reqwest::get(format!("{base}/api/profiles/victim")).await.unwrap();
        assert_eq!(resp.status(), 401);

        let stored = store.get_profile("victim").await.unwrap().unwrap();
        assert_eq!(stored["email"], "victim@example.com");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn out_of_range_level_is_bad_request_with_snapshot() {
    timeout(TEST_TIMEOUT, async {
        let (base, _) = start_server().await;
        let client = reqwest::Client::new();
        let session = create_session(&client, &base, Some("u1")).await;
        post(&client, format!("{session}/role"), json!({"role": "backend"})).await;
        post(&client, format!("{session}/advance"), json!({})).await;

        for level in [300, -1] {
            let (status, body) = post(
                &client,
                format!("{session}/skills"),
                json!({"skill": "python", "level": level}),
            )
            .await;
            assert_eq!(status, 400);
            assert!(body["error"].is_string());
            assert_eq!(body["snapshot"]["step"], "skills");
        }
    })
    .await
    .expect("test timed out");
}
