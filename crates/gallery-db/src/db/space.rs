use async_trait::async_trait;
use gallery_core::{models::Space, AppError};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::TransactionGuard;

const SPACE_COLUMNS: &str =
    "id, space_name, space_level, max_size, max_count, user_id, create_time, edit_time";

/// Persistence for spaces. Each owner has at most one.
#[async_trait]
pub trait SpaceStore: Send + Sync {
    /// Insert `space` unless its owner already has one, in which case `Conflict`.
    async fn create_exclusive(&self, space: &Space) -> Result<Space, AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Space>, AppError>;

    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Space>, AppError>;
}

fn already_has_space(user_id: Uuid) -> AppError {
    AppError::Conflict(format!("User {} already has a space", user_id))
}

/// Repository for the `space` table
#[derive(Clone)]
pub struct PgSpaceRepository {
    pool: PgPool,
}

impl PgSpaceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SpaceStore for PgSpaceRepository {
    /// Existence check and insert share one transaction; the unique index on
    /// `space.user_id` turns a race lost to another process into `Conflict`.
    #[tracing::instrument(skip(self, space), fields(db.table = "space", db.operation = "insert", db.user_id = %space.user_id))]
    async fn create_exclusive(&self, space: &Space) -> Result<Space, AppError> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM space WHERE user_id = $1)",
        )
        .bind(space.user_id)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            tx.rollback().await?;
            return Err(already_has_space(space.user_id));
        }

        let inserted = sqlx::query_as::<Postgres, Space>(&format!(
            r#"
            INSERT INTO space (id, space_name, space_level, max_size, max_count, user_id, create_time, edit_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SPACE_COLUMNS
        ))
        .bind(space.id)
        .bind(&space.space_name)
        .bind(space.space_level)
        .bind(space.max_size)
        .bind(space.max_count)
        .bind(space.user_id)
        .bind(space.create_time)
        .bind(space.edit_time)
        .fetch_one(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(space) => space,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::warn!(user_id = %space.user_id, "Concurrent space creation lost on unique index");
                return Err(already_has_space(space.user_id));
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;

        Ok(inserted)
    }

    #[tracing::instrument(skip(self), fields(db.table = "space", db.operation = "select", db.record_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Space>, AppError> {
        let space = sqlx::query_as::<Postgres, Space>(&format!(
            "SELECT {} FROM space WHERE id = $1",
            SPACE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(space)
    }

    #[tracing::instrument(skip(self), fields(db.table = "space", db.operation = "select", db.user_id = %user_id))]
    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Space>, AppError> {
        let space = sqlx::query_as::<Postgres, Space>(&format!(
            "SELECT {} FROM space WHERE user_id = $1",
            SPACE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(space)
    }
}
