use uuid::Uuid;

/// Blobs left behind by a deleted or replaced picture.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupJob {
    pub id: Uuid,
    pub picture_id: Uuid,
    /// Primary URL used for the reference check.
    pub reference_url: String,
    /// Every blob URL to remove, the primary one included.
    pub urls: Vec<String>,
    /// Number of failed attempts so far.
    pub attempt: u32,
}

impl CleanupJob {
    pub fn new(picture_id: Uuid, reference_url: String, urls: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            picture_id,
            reference_url,
            urls,
            attempt: 0,
        }
    }
}

/// What a handler did with a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Blobs were deleted (or were already gone).
    Deleted(usize),
    /// Another record still points at the primary URL; nothing was deleted.
    StillReferenced,
}
