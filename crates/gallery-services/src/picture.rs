//! Picture edits, deletion and single-picture reads.

use chrono::Utc;
use gallery_core::models::{Picture, PictureEditRequest, PictureView, ReviewStatus, TagCategory, User, UserView};
use gallery_core::validation::{validate_picture, validate_picture_edit};
use gallery_core::AppError;
use gallery_db::{PictureStore, UserStore};
use gallery_worker::{CleanupJob, CleanupQueue};
use std::sync::Arc;
use uuid::Uuid;

use crate::review::ReviewStateMachine;

pub struct PictureService {
    pictures: Arc<dyn PictureStore>,
    users: Arc<dyn UserStore>,
    cleanup: CleanupQueue,
}

impl PictureService {
    pub fn new(
        pictures: Arc<dyn PictureStore>,
        users: Arc<dyn UserStore>,
        cleanup: CleanupQueue,
    ) -> Self {
        Self {
            pictures,
            users,
            cleanup,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Picture, AppError> {
        self.pictures
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", id)))
    }

    fn ensure_can_modify(picture: &Picture, user: &User) -> Result<(), AppError> {
        if !picture.is_owned_by(user.id) && !user.is_admin() {
            return Err(AppError::Forbidden(
                "Only the owner or an administrator may modify this picture".to_string(),
            ));
        }
        Ok(())
    }

    /// Change a picture's metadata. The picture goes back through review unless
    /// an administrator made the change.
    #[tracing::instrument(skip(self, request, user), fields(picture.id = ?request.id, user.id = %user.id))]
    pub async fn edit(&self, request: PictureEditRequest, user: &User) -> Result<Picture, AppError> {
        validate_picture_edit(&request)?;
        let id = request
            .id
            .ok_or_else(|| AppError::InvalidParams("id must not be empty".to_string()))?;

        let mut picture = self.load(id).await?;
        Self::ensure_can_modify(&picture, user)?;

        if let Some(name) = request.name {
            picture.name = name;
        }
        if let Some(introduction) = request.introduction {
            picture.introduction = Some(introduction);
        }
        if let Some(category) = request.category {
            picture.category = Some(category);
        }
        if let Some(tags) = request.tags {
            picture.tags = dedup_tags(tags);
        }
        picture.edit_time = Utc::now();
        ReviewStateMachine::fill_review_params(&mut picture, user);
        validate_picture(&picture)?;

        let updated = self.pictures.update(&picture).await?;
        tracing::info!(picture_id = %id, review_status = %updated.review_status, "Picture edited");
        Ok(updated)
    }

    /// Remove a picture and queue its blobs for cleanup.
    #[tracing::instrument(skip(self, user), fields(user.id = %user.id))]
    pub async fn delete(&self, id: Uuid, user: &User) -> Result<(), AppError> {
        let picture = self.load(id).await?;
        Self::ensure_can_modify(&picture, user)?;

        if !self.pictures.delete(id).await? {
            return Err(AppError::NotFound(format!("Picture {} not found", id)));
        }

        let job = CleanupJob::new(picture.id, picture.url.clone(), picture.blob_urls());
        if let Err(e) = self.cleanup.submit(job) {
            tracing::warn!(picture_id = %id, error = %e, "Failed to queue blob cleanup");
        }

        tracing::info!(picture_id = %id, "Picture deleted");
        Ok(())
    }

    /// Picture with its owner's profile. Pictures that have not passed review
    /// are only visible to their owner and to administrators.
    pub async fn get_view(&self, id: Uuid, viewer: Option<&User>) -> Result<PictureView, AppError> {
        let picture = self.load(id).await?;
        let privileged = viewer.is_some_and(|u| u.is_admin() || picture.is_owned_by(u.id));
        if picture.review_status != ReviewStatus::Pass && !privileged {
            return Err(AppError::NotFound(format!("Picture {} not found", id)));
        }

        self.with_owner(picture).await
    }

    /// Attach the owner's public profile, whoever is looking.
    pub async fn with_owner(&self, picture: Picture) -> Result<PictureView, AppError> {
        let owner = self
            .users
            .get_by_id(picture.user_id)
            .await?
            .map(|user| UserView::from(&user));
        Ok(PictureView::from_picture(picture, owner))
    }

    pub fn tag_category() -> TagCategory {
        TagCategory::catalogue()
    }
}

/// Tags form a set; keep the first occurrence of each.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::BlobCleanupHandler;
    use crate::test_helpers::{admin, member, picture, InMemoryPictureStore, InMemoryUserStore, MemoryBlobStore};
    use bytes::Bytes;
    use gallery_storage::BlobStore;
    use gallery_worker::CleanupQueueConfig;
    use std::time::Duration;

    struct Fixture {
        pictures: Arc<InMemoryPictureStore>,
        users: Arc<InMemoryUserStore>,
        blobs: Arc<MemoryBlobStore>,
        cleanup: CleanupQueue,
        service: PictureService,
    }

    fn fixture() -> Fixture {
        let pictures = Arc::new(InMemoryPictureStore::new());
        let users = Arc::new(InMemoryUserStore::new());
        let blobs = Arc::new(MemoryBlobStore::default());
        let cleanup = CleanupQueue::new(
            CleanupQueueConfig::default(),
            Arc::new(BlobCleanupHandler::new(pictures.clone(), blobs.clone())),
        );
        let service = PictureService::new(pictures.clone(), users.clone(), cleanup.clone());
        Fixture {
            pictures,
            users,
            blobs,
            cleanup,
            service,
        }
    }

    fn edit(id: Uuid) -> PictureEditRequest {
        PictureEditRequest {
            id: Some(id),
            name: Some("renamed".to_string()),
            introduction: Some("by the sea".to_string()),
            category: Some("travel".to_string()),
            tags: Some(vec!["sea".to_string(), "sea".to_string(), " sun ".to_string()]),
        }
    }

    #[tokio::test]
    async fn test_owner_edit_returns_to_review() {
        let fx = fixture();
        let owner = member();
        let pic = picture(owner.id, ReviewStatus::Pass);
        fx.pictures.put(pic.clone());

        let updated = fx.service.edit(edit(pic.id), &owner).await.unwrap();

        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.tags, vec!["sea".to_string(), "sun".to_string()]);
        assert_eq!(updated.review_status, ReviewStatus::Reviewing);
        assert!(updated.edit_time >= pic.edit_time);
        assert_eq!(fx.pictures.get(pic.id).unwrap().name, "renamed");
    }

    #[tokio::test]
    async fn test_edit_access_and_validation() {
        let fx = fixture();
        let pic = picture(Uuid::new_v4(), ReviewStatus::Reviewing);
        fx.pictures.put(pic.clone());

        assert!(matches!(
            fx.service.edit(edit(pic.id), &member()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            fx.service.edit(edit(Uuid::new_v4()), &admin()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.edit(PictureEditRequest::default(), &admin()).await,
            Err(AppError::InvalidParams(_))
        ));

        let long_intro = PictureEditRequest {
            introduction: Some("x".repeat(801)),
            ..edit(pic.id)
        };
        assert!(matches!(
            fx.service.edit(long_intro, &admin()).await,
            Err(AppError::InvalidParams(_))
        ));

        let long_category = PictureEditRequest {
            category: Some("c".repeat(65)),
            ..edit(pic.id)
        };
        assert!(matches!(
            fx.service.edit(long_category, &admin()).await,
            Err(AppError::InvalidParams(_))
        ));

        let by_admin = fx.service.edit(edit(pic.id), &admin()).await.unwrap();
        assert_eq!(by_admin.review_status, ReviewStatus::Pass);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_blobs() {
        let fx = fixture();
        let owner = member();
        let key = format!("public/{}/gone.webp", owner.id);
        let url = fx
            .blobs
            .put_object(&key, Bytes::from_static(b"webp"))
            .await
            .unwrap();
        let mut pic = picture(owner.id, ReviewStatus::Pass);
        pic.url = url;
        fx.pictures.put(pic.clone());

        assert!(matches!(
            fx.service.delete(pic.id, &member()).await,
            Err(AppError::Forbidden(_))
        ));
        fx.service.delete(pic.id, &owner).await.unwrap();
        assert!(fx.pictures.get(pic.id).is_none());

        for _ in 0..50 {
            if fx.cleanup.stats().completed == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(fx.cleanup.stats().completed, 1);
        assert!(!fx.blobs.contains(&key));
    }

    #[tokio::test]
    async fn test_unreviewed_pictures_are_hidden_from_others() {
        let fx = fixture();
        let owner = fx.users.add(member());
        let pic = picture(owner.id, ReviewStatus::Reviewing);
        fx.pictures.put(pic.clone());

        assert!(matches!(
            fx.service.get_view(pic.id, None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.get_view(pic.id, Some(&member())).await,
            Err(AppError::NotFound(_))
        ));

        let own = fx.service.get_view(pic.id, Some(&owner)).await.unwrap();
        assert_eq!(own.user.map(|u| u.id), Some(owner.id));
        let by_admin = fx.service.get_view(pic.id, Some(&admin())).await.unwrap();
        assert_eq!(by_admin.user.map(|u| u.id), Some(owner.id));
    }

    #[test]
    fn test_tag_category() {
        assert!(!PictureService::tag_category().tag_list.is_empty());
    }
}
