use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Moderation status of a picture. `Reviewing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "review_status", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Reviewing,
    Pass,
    Reject,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReviewStatus::Reviewing)
    }
}

impl FromStr for ReviewStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "REVIEWING" => Ok(ReviewStatus::Reviewing),
            "PASS" => Ok(ReviewStatus::Pass),
            "REJECT" => Ok(ReviewStatus::Reject),
            _ => Err(anyhow::anyhow!("Unknown review status: {}", s)),
        }
    }
}

impl Display for ReviewStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ReviewStatus::Reviewing => write!(f, "REVIEWING"),
            ReviewStatus::Pass => write!(f, "PASS"),
            ReviewStatus::Reject => write!(f, "REJECT"),
        }
    }
}

/// Review decision submitted by an administrator.
///
/// `review_status` is kept as the raw client string so that unknown values are
/// reported as invalid parameters by the review workflow.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PictureReviewRequest {
    pub id: Option<Uuid>,
    pub review_status: Option<String>,
    #[validate(length(max = 512))]
    pub review_message: Option<String>,
}

/// A review outcome as written to the Store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDecision {
    pub status: ReviewStatus,
    pub message: Option<String>,
    pub reviewer_id: Uuid,
    pub review_time: DateTime<Utc>,
}
