//! Picture API integration tests.
//!
//! Run with: `cargo test -p gallery-api --test pictures_test`

mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use gallery_core::models::{Page, PictureView, ReviewStatus, TagCategory};
use gallery_services::test_helpers::{admin, member, png_bytes};
use helpers::{api_path, as_user, setup_test_app, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;

fn png_form(file_name: &str, width: u32, height: u32) -> MultipartForm {
    let part = Part::bytes(png_bytes(width, height).to_vec())
        .file_name(file_name.to_string())
        .mime_type("image/png");
    MultipartForm::new().add_part("file", part)
}

async fn upload_as(app: &TestApp, user_id: Uuid, form: MultipartForm) -> PictureView {
    let (name, value) = as_user(user_id);
    let response = app
        .client()
        .post(&api_path("/pictures/upload"))
        .add_header(name, value)
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<PictureView>()
}

#[tokio::test]
async fn test_unknown_user_is_unauthorized() {
    let app = setup_test_app().await;
    let (name, value) = as_user(Uuid::new_v4());

    let response = app
        .client()
        .post(&api_path("/pictures/list"))
        .add_header(name, value)
        .json(&json!({}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body = response.json::<Value>();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_anonymous_upload_is_unauthorized() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/pictures/upload"))
        .multipart(png_form("sunset.png", 8, 8))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.blobs.put_count(), 0);
}

#[tokio::test]
async fn test_admin_upload_is_listed_publicly() {
    let app = setup_test_app().await;
    let admin = app.register(admin());

    let form = png_form("sunset.png", 40, 30).add_text("picName", "Sunset");
    let view = upload_as(&app, admin.id, form).await;

    assert_eq!(view.name, "Sunset");
    assert_eq!(view.pic_width, 40);
    assert_eq!(view.pic_height, 30);
    assert_eq!(view.user_id, admin.id);
    assert!(view.user.is_some());

    let stored = app.pictures.get(view.id).unwrap();
    assert_eq!(stored.review_status, ReviewStatus::Pass);

    let fetched = app
        .client()
        .get(&api_path(&format!("/pictures/{}", view.id)))
        .await;
    assert_eq!(fetched.status_code(), StatusCode::OK);
    assert_eq!(fetched.json::<PictureView>().id, view.id);

    let listed = app
        .client()
        .post(&api_path("/pictures/list"))
        .json(&json!({ "current": 1, "pageSize": 10 }))
        .await;
    assert_eq!(listed.status_code(), StatusCode::OK);
    let page = listed.json::<Page<PictureView>>();
    assert_eq!(page.total, 1);
    assert_eq!(page.records[0].id, view.id);
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let app = setup_test_app().await;
    let member = app.register(member());
    let (name, value) = as_user(member.id);

    let response = app
        .client()
        .post(&api_path("/pictures/upload"))
        .add_header(name, value)
        .multipart(png_form("notes.txt", 8, 8))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(app.blobs.put_count(), 0);
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let app = setup_test_app().await;
    let member = app.register(member());
    let (name, value) = as_user(member.id);

    let response = app
        .client()
        .post(&api_path("/pictures/upload"))
        .add_header(name, value)
        .multipart(MultipartForm::new().add_text("picName", "nothing"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_upload_waits_for_review() {
    let app = setup_test_app().await;
    let member = app.register(member());
    let admin = app.register(admin());

    let view = upload_as(&app, member.id, png_form("cat.png", 16, 16)).await;
    let path = api_path(&format!("/pictures/{}", view.id));

    // Hidden from the public until approved.
    let anonymous = app.client().get(&path).await;
    assert_eq!(anonymous.status_code(), StatusCode::NOT_FOUND);

    let (name, value) = as_user(member.id);
    let owner = app.client().get(&path).add_header(name, value).await;
    assert_eq!(owner.status_code(), StatusCode::OK);

    let (name, value) = as_user(member.id);
    let self_review = app
        .client()
        .post(&api_path("/pictures/review"))
        .add_header(name, value)
        .json(&json!({ "id": view.id, "reviewStatus": "PASS" }))
        .await;
    assert_eq!(self_review.status_code(), StatusCode::FORBIDDEN);

    let (name, value) = as_user(admin.id);
    let approved = app
        .client()
        .post(&api_path("/pictures/review"))
        .add_header(name, value)
        .json(&json!({ "id": view.id, "reviewStatus": "PASS", "reviewMessage": "ok" }))
        .await;
    assert_eq!(approved.status_code(), StatusCode::NO_CONTENT);

    let (name, value) = as_user(admin.id);
    let repeated = app
        .client()
        .post(&api_path("/pictures/review"))
        .add_header(name, value)
        .json(&json!({ "id": view.id, "reviewStatus": "PASS" }))
        .await;
    assert_eq!(repeated.status_code(), StatusCode::CONFLICT);

    let public = app.client().get(&path).await;
    assert_eq!(public.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_reupload_reports_the_owner() {
    let app = setup_test_app().await;
    let member = app.register(member());
    let admin = app.register(admin());

    let original = upload_as(&app, member.id, png_form("cat.png", 16, 16)).await;
    let form = png_form("cat-v2.png", 24, 24).add_text("id", original.id.to_string());
    let updated = upload_as(&app, admin.id, form).await;

    assert_eq!(updated.id, original.id);
    assert_eq!(updated.user_id, member.id);
    assert_eq!(updated.user.map(|u| u.id), Some(member.id));
    assert_eq!(
        app.pictures.get(original.id).unwrap().review_status,
        ReviewStatus::Pass
    );
}

#[tokio::test]
async fn test_review_with_unknown_status_is_bad_request() {
    let app = setup_test_app().await;
    let member = app.register(member());
    let admin = app.register(admin());
    let view = upload_as(&app, member.id, png_form("cat.png", 16, 16)).await;

    let (name, value) = as_user(admin.id);
    let response = app
        .client()
        .post(&api_path("/pictures/review"))
        .add_header(name, value)
        .json(&json!({ "id": view.id, "reviewStatus": "MAYBE" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_edit_and_delete_require_owner() {
    let app = setup_test_app().await;
    let owner = app.register(member());
    let stranger = app.register(member());
    let view = upload_as(&app, owner.id, png_form("dog.png", 16, 16)).await;
    let path = api_path(&format!("/pictures/{}", view.id));

    let (name, value) = as_user(stranger.id);
    let denied = app
        .client()
        .put(&path)
        .add_header(name, value)
        .json(&json!({ "name": "mine now" }))
        .await;
    assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);

    let (name, value) = as_user(owner.id);
    let edited = app
        .client()
        .put(&path)
        .add_header(name, value)
        .json(&json!({ "name": "Rex", "tags": ["pets", " pets ", "dogs"] }))
        .await;
    assert_eq!(edited.status_code(), StatusCode::OK);
    let stored = app.pictures.get(view.id).unwrap();
    assert_eq!(stored.name, "Rex");
    assert_eq!(stored.tags, vec!["pets".to_string(), "dogs".to_string()]);

    let (name, value) = as_user(stranger.id);
    let denied = app.client().delete(&path).add_header(name, value).await;
    assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);

    let (name, value) = as_user(owner.id);
    let deleted = app.client().delete(&path).add_header(name, value).await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
    assert!(app.pictures.get(view.id).is_none());

    let (name, value) = as_user(owner.id);
    let gone = app.client().get(&path).add_header(name, value).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_upload_is_admin_only() {
    let app = setup_test_app().await;
    let member = app.register(member());
    let (name, value) = as_user(member.id);

    let response = app
        .client()
        .post(&api_path("/pictures/upload/batch"))
        .add_header(name, value)
        .json(&json!({ "searchText": "mountains", "count": 3 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_rejects_unknown_sort_field() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/pictures/list"))
        .json(&json!({ "sortField": "password; drop table picture" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tag_category_is_public() {
    let app = setup_test_app().await;

    let response = app.client().get(&api_path("/pictures/tag_category")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let catalogue = response.json::<TagCategory>();
    assert!(!catalogue.tag_list.is_empty());
    assert!(!catalogue.category_list.is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/pictures/list"))
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
