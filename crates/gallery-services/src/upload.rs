//! Upload pipeline.
//!
//! ```text
//! source ─► validate ─► stage (temp file) ─► Blob Store ─► UploadResult ─► Picture ─► Store
//!                           └──────── removed on every exit ────────┘
//! ```
//!
//! A request carrying an id replaces the content of that picture; otherwise a
//! new picture is created. Blobs that end up unreferenced (a failed persist, or
//! the previous content of an updated picture) are handed to the cleanup queue.

use chrono::Utc;
use gallery_core::models::{Picture, ReviewStatus, Space, SpaceUsage, UploadPictureRequest, User};
use gallery_core::validation::validate_picture;
use gallery_core::AppError;
use gallery_db::{PictureStore, SpaceStore};
use gallery_storage::keys::{generate_picture_key, public_prefix, space_prefix};
use gallery_storage::{BlobStore, PictureStoreOutcome};
use gallery_worker::{CleanupJob, CleanupQueue};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::review::ReviewStateMachine;
use crate::source::checks::name_stem;
use crate::source::{PictureSource, SourceContext, StagedFile};

/// What the Blob Store produced for one upload, consumed once to fill a [`Picture`].
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub url: String,
    pub thumbnail_url: Option<String>,
    /// Set when the primary artifact is a derived copy rather than the original.
    pub original_url: Option<String>,
    pub pic_name: String,
    pub pic_size: i64,
    pub width: i32,
    pub height: i32,
    pub format: String,
}

impl UploadResult {
    /// The compressed copy, when present, is the primary artifact. The
    /// thumbnail falls back to the compressed copy.
    pub fn from_outcome(outcome: &PictureStoreOutcome, pic_name: String) -> Result<Self, AppError> {
        let compressed = outcome.compressed();
        let primary = compressed.unwrap_or(&outcome.primary);
        let thumbnail_url = outcome
            .thumbnail()
            .or(compressed)
            .map(|artifact| artifact.url.clone());
        let original_url = compressed.map(|_| outcome.primary.url.clone());

        Ok(Self {
            url: primary.url.clone(),
            thumbnail_url,
            original_url,
            pic_name,
            pic_size: to_i64(primary.size)?,
            width: to_i32(primary.width)?,
            height: to_i32(primary.height)?,
            format: primary.format.clone(),
        })
    }
}

fn to_i32(value: u32) -> Result<i32, AppError> {
    i32::try_from(value)
        .map_err(|_| AppError::InvalidParams(format!("Picture dimension {} is too large", value)))
}

fn to_i64(value: u64) -> Result<i64, AppError> {
    i64::try_from(value)
        .map_err(|_| AppError::InvalidParams(format!("Picture size {} is too large", value)))
}

/// A space the upload goes into, with its usage at validation time.
struct TargetSpace {
    space: Space,
    usage: SpaceUsage,
}

pub struct UploadPipeline {
    sources: SourceContext,
    pictures: Arc<dyn PictureStore>,
    spaces: Arc<dyn SpaceStore>,
    blobs: Arc<dyn BlobStore>,
    cleanup: CleanupQueue,
}

impl UploadPipeline {
    pub fn new(
        sources: SourceContext,
        pictures: Arc<dyn PictureStore>,
        spaces: Arc<dyn SpaceStore>,
        blobs: Arc<dyn BlobStore>,
        cleanup: CleanupQueue,
    ) -> Self {
        Self {
            sources,
            pictures,
            spaces,
            blobs,
            cleanup,
        }
    }

    pub fn sources(&self) -> &SourceContext {
        &self.sources
    }

    /// Upload `source` as a new picture, or as the new content of `request.id`.
    #[tracing::instrument(
        skip(self, source, request, user),
        fields(source = source.kind(), user.id = %user.id, picture.id = ?request.id)
    )]
    pub async fn upload(
        &self,
        source: PictureSource,
        request: UploadPictureRequest,
        user: &User,
    ) -> Result<Picture, AppError> {
        request.validate()?;

        let existing = match request.id {
            Some(id) => Some(self.load_for_update(id, user).await?),
            None => None,
        };
        let space_id = resolve_space_id(request.space_id, existing.as_ref())?;
        let target = match space_id {
            Some(id) => Some(self.target_space(id, user, existing.is_none()).await?),
            None => None,
        };

        source.validate(&self.sources).await?;
        let staged = source.stage(&self.sources).await?;

        let owner = existing.as_ref().map_or(user.id, |p| p.user_id);
        let stored = self
            .store_staged(&staged, owner, target.as_ref(), existing.as_ref())
            .await;
        staged.remove();
        let outcome = stored?;

        let pic_name = request
            .pic_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| name_stem(&source.describe_original_name()));
        let result = UploadResult::from_outcome(&outcome, pic_name);
        let picture = match result {
            Ok(result) => build_picture(result, existing.as_ref(), owner, space_id, user),
            Err(e) => {
                self.discard_blobs(Uuid::new_v4(), &outcome);
                return Err(e);
            }
        };

        let persisted = match self.persist(&picture, existing.is_some()).await {
            Ok(persisted) => persisted,
            Err(e) => {
                self.discard_blobs(picture.id, &outcome);
                return Err(e);
            }
        };

        if let Some(old) = existing {
            self.submit_cleanup(CleanupJob::new(old.id, old.url.clone(), old.blob_urls()));
        }

        tracing::info!(
            picture_id = %persisted.id,
            url = %persisted.url,
            size_bytes = persisted.pic_size,
            review_status = %persisted.review_status,
            "Picture uploaded"
        );
        Ok(persisted)
    }

    async fn load_for_update(&self, id: Uuid, user: &User) -> Result<Picture, AppError> {
        let picture = self
            .pictures
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", id)))?;
        if !picture.is_owned_by(user.id) && !user.is_admin() {
            return Err(AppError::Forbidden(
                "Only the owner or an administrator may update this picture".to_string(),
            ));
        }
        Ok(picture)
    }

    /// Load the target space. Only its owner may add a picture to it, administrators
    /// included. Updates were already authorized against the picture itself.
    async fn target_space(
        &self,
        space_id: Uuid,
        user: &User,
        adds_picture: bool,
    ) -> Result<TargetSpace, AppError> {
        let space = self
            .spaces
            .get_by_id(space_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Space {} not found", space_id)))?;
        if adds_picture && space.user_id != user.id {
            return Err(AppError::Forbidden(
                "Only the space owner may upload into it".to_string(),
            ));
        }

        let usage = self.pictures.space_usage(space_id).await?;
        if adds_picture && usage.total_count >= space.max_count {
            return Err(AppError::InvalidParams(
                "Space quota exceeded: picture count".to_string(),
            ));
        }
        Ok(TargetSpace { space, usage })
    }

    async fn store_staged(
        &self,
        staged: &StagedFile,
        owner: Uuid,
        target: Option<&TargetSpace>,
        replacing: Option<&Picture>,
    ) -> Result<PictureStoreOutcome, AppError> {
        let prefix = match target {
            Some(target) => {
                let freed = replacing.map_or(0, |p| p.pic_size);
                let added = to_i64(staged.size())?;
                if target.usage.total_size - freed + added > target.space.max_size {
                    return Err(AppError::InvalidParams(
                        "Space quota exceeded: total size".to_string(),
                    ));
                }
                space_prefix(target.space.id)
            }
            None => public_prefix(owner),
        };

        let key = generate_picture_key(&prefix, staged.extension());
        Ok(self.blobs.store_picture(&key, staged.path()).await?)
    }

    async fn persist(&self, picture: &Picture, is_update: bool) -> Result<Picture, AppError> {
        validate_picture(picture)?;
        if is_update {
            self.pictures.update(picture).await
        } else {
            self.pictures.insert(picture).await
        }
    }

    /// Queue the blobs of an upload that never made it into the Store.
    fn discard_blobs(&self, picture_id: Uuid, outcome: &PictureStoreOutcome) {
        let urls: Vec<String> = std::iter::once(&outcome.primary)
            .chain(outcome.derived.iter())
            .map(|artifact| artifact.url.clone())
            .collect();
        let reference = outcome
            .compressed()
            .map_or_else(|| outcome.primary.url.clone(), |c| c.url.clone());
        self.submit_cleanup(CleanupJob::new(picture_id, reference, urls));
    }

    fn submit_cleanup(&self, job: CleanupJob) {
        let picture_id = job.picture_id;
        if let Err(e) = self.cleanup.submit(job) {
            tracing::warn!(picture_id = %picture_id, error = %e, "Failed to queue blob cleanup");
        }
    }
}

/// An update stays in the picture's space. A space given on update must match it.
fn resolve_space_id(
    requested: Option<Uuid>,
    existing: Option<&Picture>,
) -> Result<Option<Uuid>, AppError> {
    match (requested, existing) {
        (Some(requested), Some(old)) if old.space_id != Some(requested) => Err(
            AppError::InvalidParams("spaceId does not match the picture's space".to_string()),
        ),
        (Some(requested), _) => Ok(Some(requested)),
        (None, Some(old)) => Ok(old.space_id),
        (None, None) => Ok(None),
    }
}

fn build_picture(
    result: UploadResult,
    existing: Option<&Picture>,
    owner: Uuid,
    space_id: Option<Uuid>,
    user: &User,
) -> Picture {
    let now = Utc::now();
    let mut picture = Picture {
        id: existing.map_or_else(Uuid::new_v4, |p| p.id),
        url: result.url,
        thumbnail_url: result.thumbnail_url,
        original_url: result.original_url,
        name: result.pic_name,
        introduction: existing.and_then(|p| p.introduction.clone()),
        category: existing.and_then(|p| p.category.clone()),
        tags: existing.map(|p| p.tags.clone()).unwrap_or_default(),
        pic_size: result.pic_size,
        pic_width: 0,
        pic_height: 0,
        pic_scale: 0.0,
        pic_format: Some(result.format),
        user_id: owner,
        space_id,
        review_status: ReviewStatus::Reviewing,
        review_message: None,
        reviewer_id: None,
        review_time: None,
        create_time: existing.map_or(now, |p| p.create_time),
        edit_time: now,
    };
    picture.set_dimensions(result.width, result.height);
    ReviewStateMachine::fill_review_params(&mut picture, user);
    picture
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::BlobCleanupHandler;
    use crate::config::UploadConfig;
    use crate::test_helpers::{
        admin, member, picture, png_bytes, InMemoryPictureStore, InMemorySpaceStore,
        MemoryBlobStore,
    };
    use bytes::Bytes;
    use gallery_core::models::SpaceLevel;
    use gallery_storage::{ArtifactInfo, ArtifactKind};
    use gallery_worker::CleanupQueueConfig;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        temp_dir: std::path::PathBuf,
        pictures: Arc<InMemoryPictureStore>,
        spaces: Arc<InMemorySpaceStore>,
        blobs: Arc<MemoryBlobStore>,
        pipeline: UploadPipeline,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().unwrap();
        let temp_dir = temp.path().join("staging");
        let sources = SourceContext::new(UploadConfig {
            temp_dir: temp_dir.clone(),
            allow_private_ips: true,
            ..UploadConfig::default()
        })
        .unwrap();
        let pictures = Arc::new(InMemoryPictureStore::new());
        let spaces = Arc::new(InMemorySpaceStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let cleanup = CleanupQueue::new(
            CleanupQueueConfig::default(),
            Arc::new(BlobCleanupHandler::new(pictures.clone(), blobs.clone())),
        );
        let pipeline = UploadPipeline::new(
            sources,
            pictures.clone(),
            spaces.clone(),
            blobs.clone(),
            cleanup,
        );
        Fixture {
            _temp: temp,
            temp_dir,
            pictures,
            spaces,
            blobs,
            pipeline,
        }
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    fn png_file(name: &str, width: u32, height: u32) -> PictureSource {
        PictureSource::File {
            file_name: name.to_string(),
            data: png_bytes(width, height),
        }
    }

    fn space_for(owner: Uuid, max_count: i64, max_size: i64) -> Space {
        let now = Utc::now();
        Space {
            id: Uuid::new_v4(),
            space_name: "mine".to_string(),
            space_level: SpaceLevel::Common,
            max_size,
            max_count,
            user_id: owner,
            create_time: now,
            edit_time: now,
        }
    }

    #[tokio::test]
    async fn test_file_upload_creates_picture() {
        let fx = fixture();
        let user = member();

        let pic = fx
            .pipeline
            .upload(
                png_file("sunset.png", 300, 200),
                UploadPictureRequest::default(),
                &user,
            )
            .await
            .unwrap();

        assert_eq!(pic.name, "sunset");
        assert_eq!(pic.pic_width, 300);
        assert_eq!(pic.pic_height, 200);
        assert_eq!(pic.pic_scale, Picture::compute_scale(300, 200));
        assert_eq!(pic.user_id, user.id);
        assert_eq!(pic.review_status, ReviewStatus::Reviewing);
        assert!(pic.url.starts_with(&format!("memory://blobs/public/{}/", user.id)));
        assert!(pic.original_url.is_some());
        assert!(fx.pictures.get(pic.id).is_some());
        assert_eq!(staged_files(&fx.temp_dir), 0);
    }

    #[tokio::test]
    async fn test_admin_upload_is_auto_approved_with_name_override() {
        let fx = fixture();
        let request = UploadPictureRequest {
            pic_name: Some("  cover  ".to_string()),
            ..Default::default()
        };

        let pic = fx
            .pipeline
            .upload(png_file("raw.png", 40, 80), request, &admin())
            .await
            .unwrap();

        assert_eq!(pic.name, "cover");
        assert_eq!(pic.review_status, ReviewStatus::Pass);
        assert_eq!(pic.pic_scale, 2.0);
    }

    #[tokio::test]
    async fn test_failed_upload_removes_staged_file() {
        let fx = fixture();
        let source = PictureSource::File {
            file_name: "broken.png".to_string(),
            data: Bytes::from_static(b"definitely not a png"),
        };

        let result = fx
            .pipeline
            .upload(source, UploadPictureRequest::default(), &member())
            .await;

        assert!(matches!(result, Err(AppError::InvalidParams(_))));
        assert_eq!(staged_files(&fx.temp_dir), 0);
        assert!(fx.pictures.is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_owner_or_admin() {
        let fx = fixture();
        let owner = member();
        let existing = picture(owner.id, ReviewStatus::Pass);
        fx.pictures.put(existing.clone());
        let request = UploadPictureRequest {
            id: Some(existing.id),
            ..Default::default()
        };

        let stranger = fx
            .pipeline
            .upload(png_file("new.png", 10, 10), request.clone(), &member())
            .await;
        assert!(matches!(stranger, Err(AppError::Forbidden(_))));
        assert_eq!(fx.blobs.put_count(), 0);

        let by_owner = fx
            .pipeline
            .upload(png_file("new.png", 10, 10), request.clone(), &owner)
            .await
            .unwrap();
        assert_eq!(by_owner.id, existing.id);
        assert_eq!(by_owner.user_id, owner.id);
        assert_eq!(by_owner.create_time, existing.create_time);
        assert_ne!(by_owner.url, existing.url);
        assert_eq!(by_owner.review_status, ReviewStatus::Reviewing);

        let by_admin = fx
            .pipeline
            .upload(png_file("new.png", 10, 10), request, &admin())
            .await
            .unwrap();
        assert_eq!(by_admin.user_id, owner.id);
        assert_eq!(by_admin.review_status, ReviewStatus::Pass);
    }

    #[tokio::test]
    async fn test_admin_may_update_picture_in_member_space() {
        let fx = fixture();
        let owner = member();
        let space = space_for(owner.id, 1, 100 * 1024 * 1024);
        fx.spaces.put(space.clone());
        let mut existing = picture(owner.id, ReviewStatus::Pass);
        existing.space_id = Some(space.id);
        fx.pictures.put(existing.clone());
        let request = UploadPictureRequest {
            id: Some(existing.id),
            ..Default::default()
        };

        let updated = fx
            .pipeline
            .upload(png_file("new.png", 20, 20), request.clone(), &admin())
            .await
            .unwrap();
        assert_eq!(updated.id, existing.id);
        assert_eq!(updated.user_id, owner.id);
        assert_eq!(updated.space_id, Some(space.id));
        assert!(updated.url.contains(&format!("/space/{}/", space.id)));

        let stranger = fx
            .pipeline
            .upload(png_file("new.png", 20, 20), request, &member())
            .await;
        assert!(matches!(stranger, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_in_space_still_checks_size_quota() {
        let fx = fixture();
        let owner = member();
        let space = space_for(owner.id, 10, 10);
        fx.spaces.put(space.clone());
        let mut existing = picture(owner.id, ReviewStatus::Pass);
        existing.space_id = Some(space.id);
        existing.pic_size = 0;
        fx.pictures.put(existing.clone());
        let request = UploadPictureRequest {
            id: Some(existing.id),
            ..Default::default()
        };

        let result = fx
            .pipeline
            .upload(png_file("new.png", 20, 20), request, &admin())
            .await;
        assert!(matches!(result, Err(AppError::InvalidParams(_))));
        assert_eq!(fx.blobs.put_count(), 0);
    }

    #[tokio::test]
    async fn test_update_of_missing_picture_is_not_found() {
        let fx = fixture();
        let request = UploadPictureRequest {
            id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let result = fx
            .pipeline
            .upload(png_file("a.png", 10, 10), request, &admin())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_space_upload_uses_space_prefix_and_quota() {
        let fx = fixture();
        let owner = member();
        let space = space_for(owner.id, 1, 100 * 1024 * 1024);
        fx.spaces.put(space.clone());
        let request = UploadPictureRequest {
            space_id: Some(space.id),
            ..Default::default()
        };

        let first = fx
            .pipeline
            .upload(png_file("a.png", 20, 20), request.clone(), &owner)
            .await
            .unwrap();
        assert_eq!(first.space_id, Some(space.id));
        assert!(first.url.contains(&format!("/space/{}/", space.id)));

        let puts = fx.blobs.put_count();
        let second = fx
            .pipeline
            .upload(png_file("b.png", 20, 20), request.clone(), &owner)
            .await;
        assert!(matches!(second, Err(AppError::InvalidParams(_))));
        assert_eq!(fx.blobs.put_count(), puts);

        let admin_upload = fx
            .pipeline
            .upload(png_file("c.png", 20, 20), request, &admin())
            .await;
        assert!(matches!(admin_upload, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_space_size_quota() {
        let fx = fixture();
        let owner = member();
        let space = space_for(owner.id, 100, 10);
        fx.spaces.put(space.clone());
        let request = UploadPictureRequest {
            space_id: Some(space.id),
            ..Default::default()
        };

        let result = fx
            .pipeline
            .upload(png_file("a.png", 20, 20), request, &owner)
            .await;
        assert!(matches!(result, Err(AppError::InvalidParams(_))));
        assert_eq!(fx.blobs.put_count(), 0);
        assert_eq!(staged_files(&fx.temp_dir), 0);
    }

    #[tokio::test]
    async fn test_url_upload_downloads_and_stores() {
        let mut server = mockito::Server::new_async().await;
        let body = png_bytes(64, 32);
        let head = server
            .mock("HEAD", "/photos/tower.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .create_async()
            .await;
        let get = server
            .mock("GET", "/photos/tower.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(body.to_vec())
            .create_async()
            .await;

        let fx = fixture();
        let source = PictureSource::Url {
            url: format!("{}/photos/tower.png", server.url()),
        };
        let pic = fx
            .pipeline
            .upload(source, UploadPictureRequest::default(), &member())
            .await
            .unwrap();

        head.assert_async().await;
        get.assert_async().await;
        assert_eq!(pic.name, "tower");
        assert_eq!((pic.pic_width, pic.pic_height), (64, 32));
        assert_eq!(pic.pic_scale, 0.5);
        assert_eq!(staged_files(&fx.temp_dir), 0);
    }

    #[tokio::test]
    async fn test_oversized_content_length_fails_before_blob_store() {
        let mut server = mockito::Server::new_async().await;
        let _head = server
            .mock("HEAD", "/huge.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_header("content-length", "3000000")
            .create_async()
            .await;

        let fx = fixture();
        let source = PictureSource::Url {
            url: format!("{}/huge.png", server.url()),
        };
        let result = fx
            .pipeline
            .upload(source, UploadPictureRequest::default(), &member())
            .await;

        assert!(matches!(result, Err(AppError::InvalidParams(_))));
        assert_eq!(fx.blobs.put_count(), 0);
        assert_eq!(staged_files(&fx.temp_dir), 0);
    }

    #[test]
    fn test_result_prefers_compressed_copy() {
        let artifact = |kind, key: &str, size, format: &str| ArtifactInfo {
            kind,
            key: key.to_string(),
            url: format!("memory://blobs/{}", key),
            size,
            width: 100,
            height: 50,
            format: format.to_string(),
        };
        let outcome = PictureStoreOutcome {
            primary: artifact(ArtifactKind::Original, "p/a.png", 5000, "png"),
            derived: vec![artifact(ArtifactKind::Compressed, "p/a.webp", 1200, "webp")],
        };

        let result = UploadResult::from_outcome(&outcome, "a".to_string()).unwrap();
        assert_eq!(result.url, "memory://blobs/p/a.webp");
        assert_eq!(result.thumbnail_url.as_deref(), Some("memory://blobs/p/a.webp"));
        assert_eq!(result.original_url.as_deref(), Some("memory://blobs/p/a.png"));
        assert_eq!(result.pic_size, 1200);
        assert_eq!(result.format, "webp");

        let plain = PictureStoreOutcome {
            primary: outcome.primary.clone(),
            derived: Vec::new(),
        };
        let result = UploadResult::from_outcome(&plain, "a".to_string()).unwrap();
        assert_eq!(result.url, "memory://blobs/p/a.png");
        assert_eq!(result.thumbnail_url, None);
        assert_eq!(result.original_url, None);
    }

    #[test]
    fn test_space_id_resolution() {
        let mut old = picture(Uuid::new_v4(), ReviewStatus::Pass);
        let space = Uuid::new_v4();
        old.space_id = Some(space);

        assert_eq!(resolve_space_id(None, Some(&old)).unwrap(), Some(space));
        assert_eq!(resolve_space_id(Some(space), Some(&old)).unwrap(), Some(space));
        assert!(resolve_space_id(Some(Uuid::new_v4()), Some(&old)).is_err());
        assert_eq!(resolve_space_id(None, None).unwrap(), None);
    }
}
