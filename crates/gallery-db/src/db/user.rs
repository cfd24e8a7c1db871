use async_trait::async_trait;
use gallery_core::{models::User, AppError};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const USER_COLUMNS: &str =
    r#"id, user_account, user_name, user_avatar, user_profile, user_role, create_time"#;

/// Read access to accounts. Accounts are provisioned by the identity provider.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Users for the given ids. Unknown ids are skipped.
    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError>;
}

/// Repository for the `"user"` table
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    #[tracing::instrument(skip(self), fields(db.table = "user", db.operation = "select", db.record_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(&format!(
            r#"SELECT {} FROM "user" WHERE id = $1"#,
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "user", db.operation = "select", db.count = ids.len()))]
    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<Postgres, User>(&format!(
            r#"SELECT {} FROM "user" WHERE id = ANY($1)"#,
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
