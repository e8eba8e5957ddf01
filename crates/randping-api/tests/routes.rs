use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use randping_api::{AppState, AppStateInner, router};
use randping_core::geo::FixedCountry;
use randping_core::push::{PushTransport, TracingTransport};
use randping_core::{Accounts, DispatchQueue, DispatchTrigger, PingEngine, PingRequest};
use randping_db::{Database, DbError};

struct TestApp {
    app: Router,
    state: AppState,
    _queue: DispatchQueue,
}

fn test_app() -> TestApp {
    test_app_with(Database::open_in_memory().unwrap())
}

fn test_app_with(db: Database) -> TestApp {
    let transport: Arc<dyn PushTransport> = Arc::new(TracingTransport);
    let (trigger, queue) = DispatchTrigger::channel();

    let state = Arc::new(AppStateInner {
        accounts: Accounts::new(db.clone(), transport),
        pings: PingEngine::new(db, trigger),
        geo: Arc::new(FixedCountry(Some("fr".parse().unwrap()))),
        public_key: "BTestPublicKey".to_string(),
        trust_forwarded_for: false,
    });

    TestApp {
        app: router(state.clone()),
        state,
        _queue: queue,
    }
}

impl TestApp {
    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        self.send(req).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(&self) -> Uuid {
        let (status, body) = self.post("/user/register", json!({})).await;
        assert_eq!(status, StatusCode::OK);
        body["user_id"].as_str().unwrap().parse().unwrap()
    }

    async fn finalized_user(&self, endpoint: &str) -> Uuid {
        let user_id = self.register().await;
        let (_, body) = self
            .post(
                "/user/update_notification_subscription_object",
                json!({ "user_id": user_id, "subscription": { "endpoint": endpoint } }),
            )
            .await;
        assert_eq!(body, json!({ "ok": true }));
        let (_, body) = self
            .post("/user/finalize_creation", json!({ "user_id": user_id }))
            .await;
        assert_eq!(body, json!({ "ok": true }));
        user_id
    }
}

#[tokio::test]
async fn test_info_reports_key_and_cooldown() {
    let t = test_app();
    let (status, body) = t.get("/info").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "public_key": "BTestPublicKey", "ping_cooldown": 3 }));
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = t.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_returns_country() {
    let t = test_app();
    let (status, body) = t.post("/user/register", json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["user_id"].as_str().unwrap().parse::<Uuid>().is_ok());
    assert_eq!(body["country"]["iso"], "FR");
    assert_eq!(body["country"]["emoji"], "🇫🇷");
}

#[tokio::test]
async fn test_register_creates_provisional_account() {
    let t = test_app();
    let user_id = t.register().await;

    let account = t.state.accounts.account(user_id).await.unwrap().unwrap();
    assert!(!account.creation_finalized);
}

#[tokio::test]
async fn test_random_ping_then_cooldown_message() {
    let t = test_app();
    let alice = t.finalized_user("https://push.example/alice").await;
    t.finalized_user("https://push.example/bob").await;

    let (status, body) = t.post("/ping/random", json!({ "user_id": alice })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let (status, body) = t.post("/ping/random", json!({ "user_id": alice })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("You must wait before sending another ping.")
    );
}

#[tokio::test]
async fn test_provisional_user_cannot_ping() {
    let t = test_app();
    let user_id = t.register().await;

    let (status, body) = t
        .post(
            "/ping/random",
            json!({ "user_id": user_id, "display_country_of_origin": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_reply_once_only() {
    let t = test_app();
    let alice = t.finalized_user("https://push.example/alice").await;
    let bob = t.finalized_user("https://push.example/bob").await;

    let ping_id = t
        .state
        .pings
        .create_ping(PingRequest::random(alice, true).to(bob))
        .await
        .unwrap();

    let (_, body) = t
        .post("/ping/reply", json!({ "user_id": bob, "reply_to": ping_id }))
        .await;
    assert_eq!(body, json!({ "ok": true }));

    let (status, body) = t
        .post("/ping/reply", json!({ "user_id": bob, "reply_to": ping_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "ok": false, "error": "You have already replied to this ping." })
    );
}

#[tokio::test]
async fn test_reply_to_unknown_ping() {
    let t = test_app();
    let bob = t.finalized_user("https://push.example/bob").await;

    let (_, body) = t
        .post(
            "/ping/reply",
            json!({ "user_id": bob, "reply_to": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(body, json!({ "ok": false, "error": "Ping not found." }));
}

#[tokio::test]
async fn test_oversized_subscription_rejected() {
    let t = test_app();
    let user_id = t.register().await;

    let (status, body) = t
        .post(
            "/user/update_notification_subscription_object",
            json!({ "user_id": user_id, "subscription": { "endpoint": "x".repeat(2000) } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);

    let account = t.state.accounts.account(user_id).await.unwrap().unwrap();
    assert!(account.notification_subscription.is_none());
}

#[tokio::test]
async fn test_finalize_without_subscription_fails() {
    let t = test_app();
    let user_id = t.register().await;

    let (_, body) = t
        .post("/user/finalize_creation", json!({ "user_id": user_id }))
        .await;
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let t = test_app();
    let user_id = t.register().await;

    for _ in 0..2 {
        let (status, body) = t.post("/user/delete", json!({ "user_id": user_id })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }
    assert!(t.state.accounts.account(user_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_fields_rejected() {
    let t = test_app();
    let user_id = t.register().await;

    let (status, _) = t
        .post("/user/delete", json!({ "user_id": user_id, "admin": true }))
        .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_malformed_user_id_rejected() {
    let t = test_app();
    let (status, _) = t.post("/user/delete", json!({ "user_id": "nope" })).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_lock_timeout_is_reported_as_busy() {
    let db = Database::open_in_memory()
        .unwrap()
        .with_lock_timeout(Duration::from_millis(50));
    let t = test_app_with(db.clone());

    let (locked_tx, locked_rx) = tokio::sync::oneshot::channel();
    let holder = tokio::spawn(async move {
        db.with_transaction(move |_| {
            let _ = locked_tx.send(());
            std::thread::sleep(Duration::from_millis(400));
            Ok::<_, DbError>(())
        })
        .await
    });
    locked_rx.await.unwrap();

    let (status, body) = t.post("/user/register", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "ok": false, "error": "The server is busy, please try again in a moment." })
    );

    holder.await.unwrap().unwrap();
}
