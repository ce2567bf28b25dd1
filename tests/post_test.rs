//! Posts: creation limits, listing aggregates, the ownership-checked
//! deletion protocol, and search.

mod common;

use common::{create_post, register_and_login, spawn_app};
use serde_json::json;

#[tokio::test]
async fn create_post_returns_integer_post_id() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.base_url, "ana", "ana@example.com", "pw").await;

    let res = client
        .post(format!("{}/api/posts", app.base_url))
        .bearer_auth(&token)
        .json(&json!({ "title": "Hello", "content": "First post" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 201);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["postId"].is_i64());
}

#[tokio::test]
async fn create_post_requires_auth() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/posts", app.base_url))
        .json(&json!({ "title": "No auth", "content": "Should fail" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
}

#[tokio::test]
async fn create_post_enforces_length_limits() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.base_url, "bea", "bea@example.com", "pw").await;

    // Title of exactly 256 characters is one over the limit
    let long_title = "t".repeat(256);
    let res = client
        .post(format!("{}/api/posts", app.base_url))
        .bearer_auth(&token)
        .json(&json!({ "title": long_title, "content": "ok" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    // Content of exactly 1001 characters is one over the limit
    let long_content = "c".repeat(1001);
    let res = client
        .post(format!("{}/api/posts", app.base_url))
        .bearer_auth(&token)
        .json(&json!({ "title": "ok", "content": long_content }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    // At the limits both are accepted
    let res = client
        .post(format!("{}/api/posts", app.base_url))
        .bearer_auth(&token)
        .json(&json!({ "title": "t".repeat(255), "content": "c".repeat(1000) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    // Missing fields
    let res = client
        .post(format!("{}/api/posts", app.base_url))
        .bearer_auth(&token)
        .json(&json!({ "title": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn list_posts_includes_aggregates() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.base_url, "cam", "cam@example.com", "pw").await;

    let post_id = create_post(&client, &app.base_url, &token, "Aggregated", "body").await;

    client
        .post(format!("{}/api/posts/{}/comments", app.base_url, post_id))
        .bearer_auth(&token)
        .json(&json!({ "content": "a comment" }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/api/posts/{}/like", app.base_url, post_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    // Authenticated caller sees their own like reflected
    let res = client
        .get(format!("{}/api/posts", app.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    let posts = body["posts"].as_array().unwrap();
    let post = posts.iter().find(|p| p["id"] == post_id).unwrap();
    assert_eq!(post["username"], "cam");
    assert_eq!(post["likesCount"], 1);
    assert_eq!(post["likedByCurrentUser"], true);
    assert_eq!(post["comments"].as_array().unwrap().len(), 1);
    assert_eq!(post["comments"][0]["content"], "a comment");

    // Anonymous caller sees the count but not the flag
    let anon: serde_json::Value = client
        .get(format!("{}/api/posts", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post = anon["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == post_id)
        .unwrap();
    assert_eq!(post["likesCount"], 1);
    assert_eq!(post["likedByCurrentUser"], false);
}

#[tokio::test]
async fn list_posts_paginates() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.base_url, "dot", "dot@example.com", "pw").await;

    for i in 0..5 {
        create_post(&client, &app.base_url, &token, &format!("Post {}", i), "x").await;
    }

    let res: serde_json::Value = client
        .get(format!("{}/api/posts?page=1&limit=2", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(res["posts"].as_array().unwrap().len(), 2);

    let page3: serde_json::Value = client
        .get(format!("{}/api/posts?page=3&limit=2", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page3["posts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn get_post_by_id() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.base_url, "eli", "eli@example.com", "pw").await;

    let post_id = create_post(&client, &app.base_url, &token, "Find me", "by id").await;

    let res = client
        .get(format!("{}/api/posts/{}", app.base_url, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["post"]["title"], "Find me");

    let missing = client
        .get(format!("{}/api/posts/999999", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn delete_distinguishes_missing_from_foreign() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let owner = register_and_login(&client, &app.base_url, "fay", "fay@example.com", "pw").await;
    let other = register_and_login(&client, &app.base_url, "gus", "gus@example.com", "pw").await;

    let post_id = create_post(&client, &app.base_url, &owner, "Mine", "owned").await;

    // Nonexistent post: 404 even though the caller is authenticated
    let missing = client
        .delete(format!("{}/api/posts/999999", app.base_url))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    // Existing post, wrong owner: 403, never 404
    let forbidden = client
        .delete(format!("{}/api/posts/{}", app.base_url, post_id))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), 403);

    // The post is untouched after the forbidden attempt
    let still_there = client
        .get(format!("{}/api/posts/{}", app.base_url, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(still_there.status(), 200);

    // Owner can delete
    let ok = client
        .delete(format!("{}/api/posts/{}", app.base_url, post_id))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), 200);

    let gone = client
        .get(format!("{}/api/posts/{}", app.base_url, post_id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn deleting_post_removes_its_comments_and_likes() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.base_url, "hal", "hal@example.com", "pw").await;

    let post_id = create_post(&client, &app.base_url, &token, "Cascade", "x").await;
    client
        .post(format!("{}/api/posts/{}/comments", app.base_url, post_id))
        .bearer_auth(&token)
        .json(&json!({ "content": "will vanish" }))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{}/api/posts/{}/like", app.base_url, post_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    client
        .delete(format!("{}/api/posts/{}", app.base_url, post_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();

    let conn = app.db.get().unwrap();
    let comments: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
            rusqlite::params![post_id],
            |r| r.get(0),
        )
        .unwrap();
    let likes: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            rusqlite::params![post_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(comments, 0);
    assert_eq!(likes, 0);
}

#[tokio::test]
async fn search_matches_hashtags_and_plain_text() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &app.base_url, "ida", "ida@example.com", "pw").await;

    create_post(&client, &app.base_url, &token, "Rust tips", "Learning #rust today").await;
    create_post(&client, &app.base_url, &token, "Cooking", "Pasta with #basil").await;
    create_post(&client, &app.base_url, &token, "Mixed", "#rust and #basil together").await;

    // Hashtag search matches only content containing the literal tag
    let res: serde_json::Value = client
        .get(format!("{}/api/posts/search?query=%23rust", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = res["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&"Rust tips"));
    assert!(titles.contains(&"Mixed"));
    assert!(!titles.contains(&"Cooking"));

    // Multiple hashtags must all match
    let res: serde_json::Value = client
        .get(format!(
            "{}/api/posts/search?query=%23rust%20%23basil",
            app.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = res["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Mixed"]);

    // Plain text matches title or content, case-insensitively
    let res: serde_json::Value = client
        .get(format!("{}/api/posts/search?query=pasta", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = res["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Cooking"]);

    // Missing query parameter
    let res = client
        .get(format!("{}/api/posts/search", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}
