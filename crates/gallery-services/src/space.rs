//! Space allocation.
//!
//! Each user owns at most one space. Creation runs under a per-owner lock so
//! two requests from the same user in this process cannot both pass the
//! store's existence check; the store's transaction and unique index cover
//! other processes.

use chrono::Utc;
use gallery_core::constants::DEFAULT_SPACE_NAME;
use gallery_core::models::{CreateSpaceRequest, Space, SpaceLevel, SpaceLevelInfo, User};
use gallery_core::validation::validate_space_name;
use gallery_core::AppError;
use gallery_db::SpaceStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use uuid::Uuid;

type OwnerLock = tokio::sync::Mutex<()>;

pub struct SpaceAllocator {
    spaces: Arc<dyn SpaceStore>,
    /// Locks are dropped once no request holds them; stale entries are pruned on lookup.
    locks: Mutex<HashMap<Uuid, Weak<OwnerLock>>>,
}

impl SpaceAllocator {
    pub fn new(spaces: Arc<dyn SpaceStore>) -> Self {
        Self {
            spaces,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn owner_lock(&self, owner: Uuid) -> Arc<OwnerLock> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(lock) = locks.get(&owner).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(OwnerLock::new(()));
        locks.insert(owner, Arc::downgrade(&lock));
        lock
    }

    /// Create the caller's space and return its id.
    #[tracing::instrument(skip(self, request, user), fields(user.id = %user.id))]
    pub async fn create_space(
        &self,
        request: CreateSpaceRequest,
        user: &User,
    ) -> Result<Uuid, AppError> {
        let space = build_space(request, user)?;

        let lock = self.owner_lock(user.id);
        let _guard = lock.lock().await;

        let created = self.spaces.create_exclusive(&space).await?;

        tracing::info!(
            space_id = %created.id,
            level = %created.space_level,
            max_count = created.max_count,
            max_size = created.max_size,
            "Space created"
        );
        Ok(created.id)
    }

    /// Space by id. Only its owner or an administrator may see it.
    pub async fn get_space(&self, id: Uuid, user: &User) -> Result<Space, AppError> {
        let space = self
            .spaces
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Space {} not found", id)))?;
        if space.user_id != user.id && !user.is_admin() {
            return Err(AppError::Forbidden(
                "Only the owner may access this space".to_string(),
            ));
        }
        Ok(space)
    }

    pub fn list_space_levels() -> Vec<SpaceLevelInfo> {
        SpaceLevel::ALL.iter().map(|level| level.info()).collect()
    }
}

/// Apply defaults and privilege rules to a creation request.
fn build_space(request: CreateSpaceRequest, user: &User) -> Result<Space, AppError> {
    let level = request.space_level.unwrap_or(SpaceLevel::Common);
    if level > SpaceLevel::Common && !user.is_admin() {
        return Err(AppError::Forbidden(format!(
            "Only administrators may create {} spaces",
            level
        )));
    }
    if (request.max_size.is_some() || request.max_count.is_some()) && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only administrators may set space quotas".to_string(),
        ));
    }

    let space_name = request
        .space_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_SPACE_NAME.to_string());
    validate_space_name(&space_name)?;

    let max_size = request.max_size.unwrap_or_else(|| level.default_max_size());
    let max_count = request
        .max_count
        .unwrap_or_else(|| level.default_max_count());
    if max_size <= 0 || max_count <= 0 {
        return Err(AppError::InvalidParams(
            "Space quotas must be positive".to_string(),
        ));
    }

    let now = Utc::now();
    Ok(Space {
        id: Uuid::new_v4(),
        space_name,
        space_level: level,
        max_size,
        max_count,
        user_id: user.id,
        create_time: now,
        edit_time: now,
    })
}
