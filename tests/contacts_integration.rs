use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

use transact_api::store::contacts::FIND_CONTACT;
use transact_api::store::memory::JournalEvent;
use transact_api::{run_server, ContactRepository, MemoryPool, RepositoryRegistry};

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    async fn patch(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .patch(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }
}

/// Serve the application on an ephemeral port backed by `pool`
async fn spawn_server(pool: &MemoryPool) -> (TestClient, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind to random port");
    let port = listener.local_addr().unwrap().port();

    let mut registry = RepositoryRegistry::new(Arc::new(pool.clone()));
    registry.register::<ContactRepository>().unwrap();
    registry.init().await.expect("repository setup failed");

    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        run_server(listener, Arc::new(registry), async {
            rx.await.ok();
        })
        .await
        .expect("server failed");
    });

    let client = TestClient::new(format!("http://127.0.0.1:{}", port));
    for _ in 0..50 {
        if client.get("/health").await.is_ok() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }

    (client, tx, server)
}

#[tokio::test]
async fn test_contacts_workflow_over_http() {
    let pool = MemoryPool::new(8);
    let (client, shutdown, server) = spawn_server(&pool).await;

    // bootstrap ran once and committed
    assert!(matches!(
        &pool.events_for(1)[..],
        [JournalEvent::Execute { sql, .. }, JournalEvent::Commit] if sql.contains("CREATE TABLE IF NOT EXISTS contacts")
    ));

    let health: Value = client.get("/health").await.unwrap().json().await.unwrap();
    assert_eq!(health["success"], true);
    assert_eq!(health["data"]["status"], "healthy");
    assert_eq!(health["data"]["pool"], "ready");

    let response = client
        .post("/contacts", json!({"name": "Ann", "email": "ann@example.com", "phone": "+15550100123"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["data"]["phone"], "+15550100123");
    assert!(created["data"]["id"].as_str().is_some_and(|id| !id.is_empty()));

    let response = client
        .post("/contacts", json!({"name": "Ann", "email": "ann@example.com", "phone": "12"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let rejected: Value = response.json().await.unwrap();
    assert_eq!(rejected["message"], r#""phone" must be of type "phone""#);

    let response = client
        .patch("/contacts/c-404", json!({"birthday": "1990-04-01"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let rejected: Value = response.json().await.unwrap();
    assert_eq!(rejected["message"], r#""birthday" must be of type "date""#);

    let response = client.get("/nonexistent").await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    shutdown.send(()).unwrap();
    server.await.unwrap();
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn test_failures_do_not_leak_details() {
    let pool = MemoryPool::new(2);
    pool.fail_on(FIND_CONTACT);
    let (client, shutdown, server) = spawn_server(&pool).await;

    let response = client.get("/contacts/c-1").await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.text().await.unwrap();
    assert_eq!(body, r#"{"success":false,"message":"Internal Server Error"}"#);
    assert!(!body.contains("scripted failure"));

    shutdown.send(()).unwrap();
    server.await.unwrap();
}
