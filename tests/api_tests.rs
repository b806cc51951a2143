//! End-to-end API tests: the router is served on an ephemeral loopback port and
//! driven over HTTP with reqwest.

use anyhow::Result;
use reqwest::Client;
use serde_json::{json, Value};

use serieshub::config::ServerConfig;
use serieshub::server::{build_state, router, AppState};

struct TestApp {
    base: String,
    client: Client,
    state: AppState,
}

impl TestApp {
    fn url(&self, path: &str) -> String { format!("{}{}", self.base, path) }

    /// Register an account and return (access token, user id).
    async fn register(&self, username: &str) -> Result<(String, u64)> {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/register/"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "password123",
                "password_confirm": "password123",
            }))
            .send()
            .await?;
        assert_eq!(resp.status().as_u16(), 201, "register {username}");
        let body: Value = resp.json().await?;
        let access = body["access"].as_str().unwrap_or_default().to_string();
        let id = body["user"]["id"].as_u64().unwrap_or_default();
        Ok((access, id))
    }

    async fn admin(&self) -> Result<(String, u64)> {
        let admin = serieshub::security::ensure_admin(&self.state.store, "root", "rootroot1")?;
        let body: Value = self
            .client
            .post(self.url("/api/token/"))
            .json(&json!({"username": "root", "password": "rootroot1"}))
            .send()
            .await?
            .json()
            .await?;
        Ok((body["access"].as_str().unwrap_or_default().to_string(), admin.id))
    }

    async fn create_series(&self, token: &str, title: &str, genre: &str) -> Result<u64> {
        let resp = self
            .client
            .post(self.url("/api/v1/series/"))
            .bearer_auth(token)
            .json(&json!({"title": title, "description": "A show", "year": 2019, "genre": genre}))
            .send()
            .await?;
        assert_eq!(resp.status().as_u16(), 201);
        let body: Value = resp.json().await?;
        Ok(body["id"].as_u64().unwrap_or_default())
    }

    async fn create_review(&self, token: &str, series: u64, rating: u8) -> Result<u64> {
        let resp = self
            .client
            .post(self.url("/api/v1/reviews/"))
            .bearer_auth(token)
            .json(&json!({"series": series, "text": "Worth watching", "rating": rating}))
            .send()
            .await?;
        assert_eq!(resp.status().as_u16(), 201);
        let body: Value = resp.json().await?;
        Ok(body["id"].as_u64().unwrap_or_default())
    }
}

async fn spawn_app() -> Result<TestApp> {
    let state = build_state(ServerConfig::ephemeral())?;
    let app = router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(TestApp { base: format!("http://{addr}"), client: Client::new(), state })
}

#[tokio::test]
async fn anonymous_can_read_but_not_write() -> Result<()> {
    let app = spawn_app().await?;
    let resp = app.client.get(app.url("/api/v1/series/")).send().await?;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .client
        .post(app.url("/api/v1/series/"))
        .json(&json!({"title": "Dark", "description": "d", "year": 2017}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 401);
    let body: Value = resp.json().await?;
    assert_eq!(body["code"], "not_authenticated");
    assert_eq!(body["status"], "error");

    let resp = app.client.get(app.url("/api/v1/series/mine/")).send().await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn series_writes_are_owner_only_even_for_admins() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, _) = app.register("ana").await?;
    let (bia, _) = app.register("bia").await?;
    let (root, _) = app.admin().await?;
    let id = app.create_series(&ana, "Dark", "sci_fi").await?;
    let url = app.url(&format!("/api/v1/series/{id}/"));

    let resp = app.client.patch(&url).bearer_auth(&bia).json(&json!({"title": "Mine now"})).send().await?;
    assert_eq!(resp.status().as_u16(), 403);
    let body: Value = resp.json().await?;
    assert_eq!(body["code"], "permission_denied");

    let resp = app.client.patch(&url).bearer_auth(&root).json(&json!({"title": "Admin edit"})).send().await?;
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app.client.patch(&url).json(&json!({"title": "Anon edit"})).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app.client.patch(&url).bearer_auth(&ana).json(&json!({"title": "  Dark (2017) "})).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["title"], "Dark (2017)");
    assert_eq!(body["created_by_username"], "ana");
    assert_eq!(body["genre_display"], "Science Fiction");

    let resp = app.client.delete(&url).bearer_auth(&root).send().await?;
    assert_eq!(resp.status().as_u16(), 403);
    let resp = app.client.delete(&url).bearer_auth(&ana).send().await?;
    assert_eq!(resp.status().as_u16(), 204);
    let resp = app.client.get(&url).send().await?;
    assert_eq!(resp.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
async fn reviews_can_be_moderated_by_admins() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, _) = app.register("ana").await?;
    let (bia, _) = app.register("bia").await?;
    let (root, _) = app.admin().await?;
    let series = app.create_series(&ana, "Lost", "drama").await?;
    let review = app.create_review(&bia, series, 4).await?;
    let url = app.url(&format!("/api/v1/reviews/{review}/"));

    let resp = app.client.patch(&url).bearer_auth(&ana).json(&json!({"rating": 1})).send().await?;
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app.client.patch(&url).bearer_auth(&bia).json(&json!({"rating": 6})).send().await?;
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await?;
    assert!(body["fields"]["rating"].is_array());

    let resp = app.client.delete(&url).bearer_auth(&root).send().await?;
    assert_eq!(resp.status().as_u16(), 204);

    let resp = app
        .client
        .post(app.url("/api/v1/reviews/"))
        .bearer_auth(&bia)
        .json(&json!({"series": 999, "text": "?", "rating": 3}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);
    Ok(())
}

#[tokio::test]
async fn registration_is_validated() -> Result<()> {
    let app = spawn_app().await?;
    app.register("ana").await?;

    let cases = [
        (json!({"username": "bia", "email": "bia@example.com", "password": "short", "password_confirm": "short"}), "password"),
        (json!({"username": "bia", "email": "bia@example.com", "password": "password123", "password_confirm": "password124"}), "password"),
        (json!({"username": "ANA", "email": "other@example.com", "password": "password123", "password_confirm": "password123"}), "username"),
        (json!({"username": "bia", "email": "ana@example.com", "password": "password123", "password_confirm": "password123"}), "email"),
        (json!({"username": "bia", "email": "not-an-email", "password": "password123", "password_confirm": "password123"}), "email"),
    ];
    for (payload, field) in cases {
        let resp = app.client.post(app.url("/api/v1/auth/register/")).json(&payload).send().await?;
        assert_eq!(resp.status().as_u16(), 400, "{payload}");
        let body: Value = resp.json().await?;
        assert!(body["fields"][field].is_array(), "{payload} -> {body}");
    }
    Ok(())
}

#[tokio::test]
async fn series_payloads_are_validated() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, _) = app.register("ana").await?;
    let cases = [
        (json!({"title": "X", "description": "d", "year": 2000}), "title"),
        (json!({"title": "Old", "description": "d", "year": 1899}), "year"),
        (json!({"title": "Old", "description": "d", "year": 2000, "genre": "polka"}), "genre"),
        (json!({"title": "Pic", "description": "d", "year": 2000, "image": {"name": "cover.bmp", "size": 10}}), "image"),
        (json!({"title": "Pic", "description": "d", "year": 2000, "image": {"name": "cover.png", "size": 6 * 1024 * 1024}}), "image"),
    ];
    for (payload, field) in cases {
        let resp = app.client.post(app.url("/api/v1/series/")).bearer_auth(&ana).json(&payload).send().await?;
        assert_eq!(resp.status().as_u16(), 400, "{payload}");
        let body: Value = resp.json().await?;
        assert!(body["fields"][field].is_array(), "{payload} -> {body}");
    }

    let resp = app
        .client
        .post(app.url("/api/v1/series/"))
        .bearer_auth(&ana)
        .json(&json!({"title": "Pic", "description": "d", "year": 2000, "image": {"name": "cover.PNG", "size": 1024}}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 201);
    let body: Value = resp.json().await?;
    assert_eq!(body["image_url"], "/media/cover.PNG");
    assert_eq!(body["genre"], "other");
    Ok(())
}

#[tokio::test]
async fn token_lifecycle() -> Result<()> {
    let app = spawn_app().await?;
    app.register("ana").await?;

    let resp = app.client.post(app.url("/api/token/")).json(&json!({"username": "ana", "password": "wrong"})).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let pair: Value = app
        .client
        .post(app.url("/api/v1/auth/login/"))
        .json(&json!({"username": "ana", "password": "password123"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(pair["user"]["username"], "ana");
    let access = pair["access"].as_str().unwrap_or_default().to_string();
    let refresh = pair["refresh"].as_str().unwrap_or_default().to_string();

    let resp = app.client.post(app.url("/api/token/verify/")).json(&json!({"token": access})).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app.client.post(app.url("/api/token/verify/")).json(&json!({"token": "garbage"})).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let fresh: Value = app
        .client
        .post(app.url("/api/token/refresh/"))
        .json(&json!({"refresh": refresh}))
        .send()
        .await?
        .json()
        .await?;
    let fresh = fresh["access"].as_str().unwrap_or_default().to_string();
    let resp = app.client.get(app.url("/api/v1/users/me/")).bearer_auth(&fresh).send().await?;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app.client.post(app.url("/api/v1/auth/logout/")).bearer_auth(&access).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app.client.get(app.url("/api/v1/users/me/")).bearer_auth(&access).send().await?;
    assert_eq!(resp.status().as_u16(), 401);
    let resp = app.client.get(app.url("/api/v1/users/me/")).bearer_auth(&fresh).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    // A bad bearer token is rejected even on public endpoints.
    let resp = app.client.get(app.url("/api/v1/series/")).bearer_auth("nope").send().await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn change_password_rotates_tokens() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, _) = app.register("ana").await?;

    let resp = app
        .client
        .post(app.url("/api/v1/users/change_password/"))
        .bearer_auth(&ana)
        .json(&json!({"old_password": "nope", "new_password": "newpassword1", "new_password_confirm": "newpassword1"}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = app
        .client
        .post(app.url("/api/v1/users/change_password/"))
        .bearer_auth(&ana)
        .json(&json!({"old_password": "password123", "new_password": "newpassword1", "new_password_confirm": "newpassword1"}))
        .send()
        .await?
        .json()
        .await?;
    let new_access = body["access"].as_str().unwrap_or_default().to_string();

    let resp = app.client.get(app.url("/api/v1/users/me/")).bearer_auth(&ana).send().await?;
    assert_eq!(resp.status().as_u16(), 401);
    let resp = app.client.get(app.url("/api/v1/users/me/")).bearer_auth(&new_access).send().await?;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app.client.post(app.url("/api/token/")).json(&json!({"username": "ana", "password": "newpassword1"})).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    Ok(())
}

#[tokio::test]
async fn users_can_edit_themselves_and_only_admins_delete() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, ana_id) = app.register("ana").await?;
    let (bia, _) = app.register("bia").await?;
    let (root, _) = app.admin().await?;
    let url = app.url(&format!("/api/v1/users/{ana_id}/"));

    let resp = app.client.get(&url).send().await?;
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app.client.patch(&url).bearer_auth(&bia).json(&json!({"first_name": "Bia"})).send().await?;
    assert_eq!(resp.status().as_u16(), 403);
    let resp = app.client.patch(&url).bearer_auth(&ana).json(&json!({"first_name": "Ana", "last_name": "Lima"})).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["full_name"], "Ana Lima");
    let resp = app.client.patch(&url).bearer_auth(&root).json(&json!({"email": "bia@example.com"})).send().await?;
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app.client.delete(&url).bearer_auth(&ana).send().await?;
    assert_eq!(resp.status().as_u16(), 403);
    let resp = app.client.delete(&url).bearer_auth(&root).send().await?;
    assert_eq!(resp.status().as_u16(), 204);
    let resp = app.client.get(app.url("/api/v1/users/me/")).bearer_auth(&ana).send().await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn activity_history_is_private() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, ana_id) = app.register("ana").await?;
    let (bia, _) = app.register("bia").await?;
    let (root, _) = app.admin().await?;
    let series = app.create_series(&bia, "Severance", "thriller").await?;
    app.create_review(&ana, series, 5).await?;
    let url = app.url(&format!("/api/v1/users/{ana_id}/activities/"));

    let resp = app.client.get(&url).send().await?;
    assert_eq!(resp.status().as_u16(), 401);
    let resp = app.client.get(&url).bearer_auth(&bia).send().await?;
    assert_eq!(resp.status().as_u16(), 403);
    let resp = app.client.get(&url).bearer_auth(&root).send().await?;
    assert_eq!(resp.status().as_u16(), 200);

    let list: Value = app.client.get(&url).bearer_auth(&ana).send().await?.json().await?;
    let items = list.as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "review");
    Ok(())
}

#[tokio::test]
async fn profiles() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, ana_id) = app.register("ana").await?;
    let (bia, _) = app.register("bia").await?;

    let resp = app.client.get(app.url("/api/v1/profile/")).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .client
        .post(app.url("/api/v1/profile/"))
        .bearer_auth(&ana)
        .json(&json!({"bio": "Binge watcher", "website": "https://ana.example.com", "favorite_genres": ["drama", "sci_fi"], "first_name": "Ana"}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["bio"], "Binge watcher");
    assert_eq!(body["first_name"], "Ana");
    assert_eq!(body["favorite_genres"], json!(["Drama", "Science Fiction"]));

    let resp = app.client.post(app.url("/api/v1/profile/")).bearer_auth(&ana).json(&json!({"website": "ftp://x"})).send().await?;
    assert_eq!(resp.status().as_u16(), 400);

    let body: Value = app
        .client
        .post(app.url("/api/v1/profile/avatar/"))
        .bearer_auth(&ana)
        .json(&json!({"avatar": {"name": "me.jpg", "size": 2048}}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["avatar_url"], "/media/me.jpg");
    let body: Value = app.client.delete(app.url("/api/v1/profile/avatar/")).bearer_auth(&ana).send().await?.json().await?;
    assert!(body["avatar_url"].is_null());

    let url = app.url(&format!("/api/v1/profiles/{ana_id}/"));
    let resp = app.client.get(&url).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app.client.patch(&url).bearer_auth(&bia).json(&json!({"bio": "hacked"})).send().await?;
    assert_eq!(resp.status().as_u16(), 403);
    let resp = app.client.patch(&url).bearer_auth(&ana).json(&json!({"bio": "Updated"})).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["bio"], "Updated");
    Ok(())
}

#[tokio::test]
async fn read_models_and_pages() -> Result<()> {
    let app = spawn_app().await?;
    let (ana, _) = app.register("ana").await?;
    let base = app.create_series(&ana, "<b>Bold</b> & Co", "drama").await?;
    app.create_series(&ana, "The Wire", "drama").await?;
    app.create_series(&ana, "Fleabag", "comedy").await?;
    app.create_review(&ana, base, 4).await?;
    app.create_review(&ana, base, 5).await?;

    let related: Value = app.client.get(app.url(&format!("/api/v1/series/{base}/related/"))).send().await?.json().await?;
    assert_eq!(related.as_array().map(|a| a.len()), Some(1));
    assert_eq!(related[0]["title"], "The Wire");

    let stats: Value = app.client.get(app.url("/api/v1/series/stats/")).send().await?.json().await?;
    assert_eq!(stats["total_series"], 3);
    assert_eq!(stats["series_by_genre"]["drama"], 2);

    let detail: Value = app.client.get(app.url(&format!("/api/v1/series/{base}/"))).send().await?.json().await?;
    assert_eq!(detail["review_count"], 2);
    assert_eq!(detail["average_rating"], 4.5);

    let reviews: Value = app.client.get(app.url(&format!("/api/v1/series/{base}/reviews/"))).send().await?.json().await?;
    assert_eq!(reviews.as_array().map(|a| a.len()), Some(2));

    let mine: Value = app.client.get(app.url("/api/v1/series/mine/")).bearer_auth(&ana).send().await?.json().await?;
    assert_eq!(mine.as_array().map(|a| a.len()), Some(3));

    let genres: Value = app.client.get(app.url("/api/v1/genres/")).send().await?.json().await?;
    assert_eq!(genres.as_array().map(|a| a.len()), Some(14));

    let html = app.client.get(app.url(&format!("/series/{base}/"))).send().await?.text().await?;
    assert!(html.contains("&lt;b&gt;Bold&lt;/b&gt; &amp; Co"));
    assert!(!html.contains("<b>Bold</b>"));
    let html = app.client.get(app.url("/")).send().await?.text().await?;
    assert!(html.contains("The Wire"));

    let health = app.client.get(app.url("/health")).send().await?.text().await?;
    assert_eq!(health, "serieshub ok");
    Ok(())
}
