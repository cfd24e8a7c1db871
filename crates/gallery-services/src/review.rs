//! Moderation workflow.
//!
//! ```text
//!   create/edit by user ──► REVIEWING ──review──► PASS | REJECT
//!   create/edit by admin ─────────────────────► PASS
//! ```
//!
//! `REVIEWING` is never a review target, and a review that would not change
//! the status is rejected as a conflict.

use chrono::Utc;
use gallery_core::models::{Picture, PictureReviewRequest, ReviewDecision, ReviewStatus, User};
use gallery_core::AppError;
use gallery_db::PictureStore;
use std::sync::Arc;
use validator::Validate;

/// Message recorded when an administrator's own upload is approved on creation.
pub const AUTO_REVIEW_MESSAGE: &str = "Auto-approved: uploaded by an administrator";

#[derive(Clone)]
pub struct ReviewStateMachine {
    pictures: Arc<dyn PictureStore>,
}

impl ReviewStateMachine {
    pub fn new(pictures: Arc<dyn PictureStore>) -> Self {
        Self { pictures }
    }

    /// Assign the review state of a picture that is being created or changed by `user`.
    pub fn fill_review_params(picture: &mut Picture, user: &User) {
        if user.is_admin() {
            picture.review_status = ReviewStatus::Pass;
            picture.review_message = Some(AUTO_REVIEW_MESSAGE.to_string());
            picture.reviewer_id = Some(user.id);
            picture.review_time = Some(Utc::now());
        } else {
            picture.review_status = ReviewStatus::Reviewing;
            picture.review_message = None;
            picture.reviewer_id = None;
            picture.review_time = None;
        }
    }

    /// Apply an administrator's decision to a picture.
    #[tracing::instrument(skip(self, request, reviewer), fields(picture.id = ?request.id, reviewer.id = %reviewer.id))]
    pub async fn review(
        &self,
        request: &PictureReviewRequest,
        reviewer: &User,
    ) -> Result<(), AppError> {
        if !reviewer.is_admin() {
            return Err(AppError::Forbidden(
                "Only administrators may review pictures".to_string(),
            ));
        }

        request.validate()?;
        let id = request
            .id
            .ok_or_else(|| AppError::InvalidParams("id must not be empty".to_string()))?;
        let status = parse_target_status(request.review_status.as_deref())?;

        let picture = self
            .pictures
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", id)))?;

        if picture.review_status == status {
            return Err(AppError::Conflict(format!(
                "Picture {} is already {}",
                id, status
            )));
        }

        let decision = ReviewDecision {
            status,
            message: request.review_message.clone(),
            reviewer_id: reviewer.id,
            review_time: Utc::now(),
        };

        // The store re-checks the status, so a concurrent identical review loses here.
        if !self.pictures.update_review(id, &decision).await? {
            return Err(AppError::Conflict(format!(
                "Picture {} was reviewed concurrently",
                id
            )));
        }

        tracing::info!(picture_id = %id, status = %status, "Picture reviewed");
        Ok(())
    }
}

fn parse_target_status(raw: Option<&str>) -> Result<ReviewStatus, AppError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::InvalidParams("reviewStatus must not be empty".to_string()))?;
    match raw.parse::<ReviewStatus>() {
        Ok(ReviewStatus::Reviewing) => Err(AppError::InvalidParams(
            "REVIEWING is not a valid review decision".to_string(),
        )),
        Ok(status) => Ok(status),
        Err(_) => Err(AppError::InvalidParams(format!(
            "Unknown review status: {}",
            raw
        ))),
    }
}
