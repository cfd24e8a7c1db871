//! Space API and service endpoint tests.
//!
//! Run with: `cargo test -p gallery-api --test spaces_test`

mod helpers;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use gallery_core::models::{PictureView, Space, SpaceLevel, SpaceLevelInfo};
use gallery_services::test_helpers::{admin, member, png_bytes};
use helpers::{api_path, as_user, setup_test_app};
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn test_create_space_once_per_user() {
    let app = setup_test_app().await;
    let member = app.register(member());

    let (name, value) = as_user(member.id);
    let created = app
        .client()
        .post(&api_path("/spaces"))
        .add_header(name, value)
        .json(&json!({ "spaceName": "Holidays" }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let id: Uuid = serde_json::from_value(created.json::<Value>()["id"].clone()).unwrap();

    let (name, value) = as_user(member.id);
    let fetched = app
        .client()
        .get(&api_path(&format!("/spaces/{}", id)))
        .add_header(name, value)
        .await;
    assert_eq!(fetched.status_code(), StatusCode::OK);
    let space = fetched.json::<Space>();
    assert_eq!(space.space_name, "Holidays");
    assert_eq!(space.space_level, SpaceLevel::Common);
    assert_eq!(space.max_count, SpaceLevel::Common.default_max_count());

    let (name, value) = as_user(member.id);
    let second = app
        .client()
        .post(&api_path("/spaces"))
        .add_header(name, value)
        .json(&json!({ "spaceName": "Another" }))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);
    assert_eq!(app.spaces.count_for(member.id), 1);
}

#[tokio::test]
async fn test_member_cannot_pick_higher_level() {
    let app = setup_test_app().await;
    let member = app.register(member());
    let admin = app.register(admin());

    let (name, value) = as_user(member.id);
    let denied = app
        .client()
        .post(&api_path("/spaces"))
        .add_header(name, value)
        .json(&json!({ "spaceName": "Big", "spaceLevel": "FLAGSHIP" }))
        .await;
    assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(app.spaces.count_for(member.id), 0);

    let (name, value) = as_user(admin.id);
    let allowed = app
        .client()
        .post(&api_path("/spaces"))
        .add_header(name, value)
        .json(&json!({ "spaceName": "Big", "spaceLevel": "FLAGSHIP" }))
        .await;
    assert_eq!(allowed.status_code(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_space_is_private_to_its_owner() {
    let app = setup_test_app().await;
    let owner = app.register(member());
    let stranger = app.register(member());

    let (name, value) = as_user(owner.id);
    let created = app
        .client()
        .post(&api_path("/spaces"))
        .add_header(name, value)
        .json(&json!({}))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let id = created.json::<Value>()["id"].as_str().unwrap().to_string();

    let (name, value) = as_user(stranger.id);
    let denied = app
        .client()
        .get(&api_path(&format!("/spaces/{}", id)))
        .add_header(name, value)
        .await;
    assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);

    let (name, value) = as_user(owner.id);
    let missing = app
        .client()
        .get(&api_path(&format!("/spaces/{}", Uuid::new_v4())))
        .add_header(name, value)
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_into_own_space() {
    let app = setup_test_app().await;
    let owner = app.register(member());

    let (name, value) = as_user(owner.id);
    let created = app
        .client()
        .post(&api_path("/spaces"))
        .add_header(name, value)
        .json(&json!({ "spaceName": "Private" }))
        .await;
    let space_id = created.json::<Value>()["id"].as_str().unwrap().to_string();

    let form = MultipartForm::new()
        .add_text("spaceId", space_id.clone())
        .add_part(
            "file",
            Part::bytes(png_bytes(12, 12).to_vec())
                .file_name("private.png")
                .mime_type("image/png"),
        );
    let (name, value) = as_user(owner.id);
    let uploaded = app
        .client()
        .post(&api_path("/pictures/upload"))
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(uploaded.status_code(), StatusCode::OK);
    let view = uploaded.json::<PictureView>();
    assert_eq!(view.space_id.map(|id| id.to_string()), Some(space_id.clone()));
    assert!(app
        .blobs
        .keys()
        .iter()
        .all(|key| key.starts_with(&format!("space/{}/", space_id))));
}

#[tokio::test]
async fn test_space_levels_are_listed() {
    let app = setup_test_app().await;
    let member = app.register(member());

    let (name, value) = as_user(member.id);
    let response = app
        .client()
        .get(&api_path("/spaces/levels"))
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let levels = response.json::<Vec<SpaceLevelInfo>>();
    let values: Vec<i32> = levels.iter().map(|l| l.value).collect();
    assert_eq!(values, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_health_ignores_identification() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(&api_path("/health"))
        .add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("not-a-uuid"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let doc = response.json::<Value>();
    assert!(doc["paths"]["/api/v1/spaces"].is_object());
}
