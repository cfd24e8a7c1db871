//! Test helpers: the real router over in-memory backends.
//!
//! Run with `cargo test -p gallery-api`. No database or Redis is needed.

#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use gallery_api::auth::USER_ID_HEADER;
use gallery_api::constants::API_PREFIX;
use gallery_api::{setup_routes, AppState, Backends, Settings};
use gallery_core::models::User;
use gallery_services::test_helpers::{
    InMemoryCache, InMemoryPictureStore, InMemorySpaceStore, InMemoryUserStore, MemoryBlobStore,
};
use gallery_services::UploadConfig;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

/// Header identifying `user_id` to the gallery.
pub fn as_user(user_id: Uuid) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(USER_ID_HEADER),
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    )
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub pictures: Arc<InMemoryPictureStore>,
    pub spaces: Arc<InMemorySpaceStore>,
    pub users: Arc<InMemoryUserStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn register(&self, user: User) -> User {
        self.users.add(user)
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let pictures = Arc::new(InMemoryPictureStore::new());
    let spaces = Arc::new(InMemorySpaceStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let blobs = Arc::new(MemoryBlobStore::default());

    let backends = Backends {
        pictures: pictures.clone(),
        spaces: spaces.clone(),
        users: users.clone(),
        blobs: blobs.clone(),
        remote_cache: Some(Arc::new(InMemoryCache::new())),
    };
    let settings = Settings {
        upload: UploadConfig {
            temp_dir: temp_dir.path().to_path_buf(),
            allow_private_ips: true,
            ..UploadConfig::default()
        },
        ..Settings::default()
    };

    let state = Arc::new(AppState::build(backends, settings).unwrap());
    let server = TestServer::new(setup_routes(state.clone())).unwrap();

    TestApp {
        server,
        state,
        pictures,
        spaces,
        users,
        blobs,
        _temp_dir: temp_dir,
    }
}
