//! Shared setup for integration tests: each test gets its own data dir,
//! database, and server bound to an ephemeral port.

use std::sync::Arc;

use tempfile::TempDir;
use tinta::ads::AdsCache;
use tinta::config::Config;
use tinta::state::{AppState, DbPool};
use tinta::{db, routes};

pub struct TestApp {
    pub base_url: String,
    pub db: DbPool,
    // Keep the tempdir alive for the duration of the test
    _data_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let data_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.database.path = Some(data_dir.path().join("test.db"));
    config.storage.path = Some(data_dir.path().join("uploads"));
    config.auth.token_secret = TEST_SECRET.to_string();
    tweak(&mut config);

    std::fs::create_dir_all(config.uploads_path()).unwrap();

    let pool = db::create_pool(config.db_path()).unwrap();
    db::run_migrations(&pool).unwrap();

    let ads = AdsCache::from_config(&config.ads).unwrap();
    let state = AppState {
        db: pool.clone(),
        config,
        ads: Arc::new(ads),
    };

    let app = routes::api_router().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        db: pool,
        _data_dir: data_dir,
    }
}

pub const TEST_SECRET: &str = "integration-test-secret";

/// Register a user and log in, returning the session token.
pub async fn register_and_login(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
    email: &str,
    password: &str,
) -> String {
    let res = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201, "registration should succeed");

    let res = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&serde_json::json!({
            "identifier": email,
            "password": password,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200, "login should succeed");

    let body: serde_json::Value = res.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

/// Create a post as the given user, returning its id.
pub async fn create_post(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    title: &str,
    content: &str,
) -> i64 {
    let res = client
        .post(format!("{}/api/posts", base_url))
        .bearer_auth(token)
        .json(&serde_json::json!({ "title": title, "content": content }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201, "post creation should succeed");

    let body: serde_json::Value = res.json().await.unwrap();
    body["postId"].as_i64().unwrap()
}
