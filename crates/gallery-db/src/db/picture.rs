use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gallery_core::{
    models::{Picture, PictureQueryRequest, ReviewDecision, ReviewStatus, SpaceUsage},
    AppError,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const PICTURE_COLUMNS: &str = "id, url, thumbnail_url, original_url, name, introduction, category, \
     tags, pic_size, pic_width, pic_height, pic_scale, pic_format, user_id, space_id, \
     review_status, review_message, reviewer_id, review_time, create_time, edit_time";

/// Persistence for picture records.
#[async_trait]
pub trait PictureStore: Send + Sync {
    async fn insert(&self, picture: &Picture) -> Result<Picture, AppError>;

    /// Overwrite every mutable column of an existing record.
    async fn update(&self, picture: &Picture) -> Result<Picture, AppError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Picture>, AppError>;

    /// Returns false when no record had this id.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// One page of records matching the filters, plus the total match count.
    async fn query(&self, query: &PictureQueryRequest) -> Result<(Vec<Picture>, i64), AppError>;

    /// Number of records whose primary URL is `url`.
    async fn count_by_url(&self, url: &str) -> Result<i64, AppError>;

    async fn space_usage(&self, space_id: Uuid) -> Result<SpaceUsage, AppError>;

    /// Apply a review decision unless the record already has that status.
    ///
    /// Returns false when the record is missing or already in `decision.status`.
    async fn update_review(&self, id: Uuid, decision: &ReviewDecision) -> Result<bool, AppError>;
}

#[derive(Debug, FromRow)]
struct PictureRow {
    id: Uuid,
    url: String,
    thumbnail_url: Option<String>,
    original_url: Option<String>,
    name: String,
    introduction: Option<String>,
    category: Option<String>,
    tags: Json<Vec<String>>,
    pic_size: i64,
    pic_width: i32,
    pic_height: i32,
    pic_scale: f64,
    pic_format: Option<String>,
    user_id: Uuid,
    space_id: Option<Uuid>,
    review_status: ReviewStatus,
    review_message: Option<String>,
    reviewer_id: Option<Uuid>,
    review_time: Option<DateTime<Utc>>,
    create_time: DateTime<Utc>,
    edit_time: DateTime<Utc>,
}

impl PictureRow {
    fn to_domain(self) -> Picture {
        Picture {
            id: self.id,
            url: self.url,
            thumbnail_url: self.thumbnail_url,
            original_url: self.original_url,
            name: self.name,
            introduction: self.introduction,
            category: self.category,
            tags: self.tags.0,
            pic_size: self.pic_size,
            pic_width: self.pic_width,
            pic_height: self.pic_height,
            pic_scale: self.pic_scale,
            pic_format: self.pic_format,
            user_id: self.user_id,
            space_id: self.space_id,
            review_status: self.review_status,
            review_message: self.review_message,
            reviewer_id: self.reviewer_id,
            review_time: self.review_time,
            create_time: self.create_time,
            edit_time: self.edit_time,
        }
    }
}

/// Wrap a user-supplied fragment for `ILIKE`, escaping its wildcards.
fn contains_pattern(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Append the `WHERE` clause shared by the page and count queries.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &PictureQueryRequest) {
    builder.push(" WHERE TRUE");

    if let Some(id) = query.id {
        builder.push(" AND id = ").push_bind(id);
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(space_id) = query.space_id {
        builder.push(" AND space_id = ").push_bind(space_id);
    }
    if query.null_space_id {
        builder.push(" AND space_id IS NULL");
    }
    if let Some(width) = query.pic_width {
        builder.push(" AND pic_width = ").push_bind(width);
    }
    if let Some(height) = query.pic_height {
        builder.push(" AND pic_height = ").push_bind(height);
    }
    if let Some(size) = query.pic_size {
        builder.push(" AND pic_size = ").push_bind(size);
    }
    if let Some(scale) = query.pic_scale {
        builder.push(" AND pic_scale = ").push_bind(scale);
    }
    if let Some(status) = query.review_status {
        builder.push(" AND review_status = ").push_bind(status);
    }
    if let Some(reviewer_id) = query.reviewer_id {
        builder.push(" AND reviewer_id = ").push_bind(reviewer_id);
    }

    let substring_filters = [
        ("name", &query.name),
        ("introduction", &query.introduction),
        ("pic_format", &query.pic_format),
        ("category", &query.category),
        ("review_message", &query.review_message),
    ];
    for (column, value) in substring_filters {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            builder
                .push(format!(" AND {} ILIKE ", column))
                .push_bind(contains_pattern(value));
        }
    }

    if let Some(text) = query.search_text.as_deref().filter(|t| !t.is_empty()) {
        let pattern = contains_pattern(text);
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR introduction ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(ref tags) = query.tags {
        for tag in tags {
            builder
                .push(" AND tags @> ")
                .push_bind(Json(vec![tag.clone()]));
        }
    }
}

/// Repository for the `picture` table
#[derive(Clone)]
pub struct PgPictureRepository {
    pool: PgPool,
}

impl PgPictureRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PictureStore for PgPictureRepository {
    #[tracing::instrument(skip(self, picture), fields(db.table = "picture", db.operation = "insert", db.record_id = %picture.id))]
    async fn insert(&self, picture: &Picture) -> Result<Picture, AppError> {
        let row = sqlx::query_as::<Postgres, PictureRow>(&format!(
            r#"
            INSERT INTO picture (
                id, url, thumbnail_url, original_url, name, introduction, category, tags,
                pic_size, pic_width, pic_height, pic_scale, pic_format, user_id, space_id,
                review_status, review_message, reviewer_id, review_time, create_time, edit_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21)
            RETURNING {}
            "#,
            PICTURE_COLUMNS
        ))
        .bind(picture.id)
        .bind(&picture.url)
        .bind(&picture.thumbnail_url)
        .bind(&picture.original_url)
        .bind(&picture.name)
        .bind(&picture.introduction)
        .bind(&picture.category)
        .bind(Json(&picture.tags))
        .bind(picture.pic_size)
        .bind(picture.pic_width)
        .bind(picture.pic_height)
        .bind(picture.pic_scale)
        .bind(&picture.pic_format)
        .bind(picture.user_id)
        .bind(picture.space_id)
        .bind(picture.review_status)
        .bind(&picture.review_message)
        .bind(picture.reviewer_id)
        .bind(picture.review_time)
        .bind(picture.create_time)
        .bind(picture.edit_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.to_domain())
    }

    #[tracing::instrument(skip(self, picture), fields(db.table = "picture", db.operation = "update", db.record_id = %picture.id))]
    async fn update(&self, picture: &Picture) -> Result<Picture, AppError> {
        let row = sqlx::query_as::<Postgres, PictureRow>(&format!(
            r#"
            UPDATE picture SET
                url = $2, thumbnail_url = $3, original_url = $4, name = $5, introduction = $6,
                category = $7, tags = $8, pic_size = $9, pic_width = $10, pic_height = $11,
                pic_scale = $12, pic_format = $13, space_id = $14, review_status = $15,
                review_message = $16, reviewer_id = $17, review_time = $18, edit_time = $19
            WHERE id = $1
            RETURNING {}
            "#,
            PICTURE_COLUMNS
        ))
        .bind(picture.id)
        .bind(&picture.url)
        .bind(&picture.thumbnail_url)
        .bind(&picture.original_url)
        .bind(&picture.name)
        .bind(&picture.introduction)
        .bind(&picture.category)
        .bind(Json(&picture.tags))
        .bind(picture.pic_size)
        .bind(picture.pic_width)
        .bind(picture.pic_height)
        .bind(picture.pic_scale)
        .bind(&picture.pic_format)
        .bind(picture.space_id)
        .bind(picture.review_status)
        .bind(&picture.review_message)
        .bind(picture.reviewer_id)
        .bind(picture.review_time)
        .bind(picture.edit_time)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PictureRow::to_domain)
            .ok_or_else(|| AppError::NotFound(format!("Picture {} not found", picture.id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "picture", db.operation = "select", db.record_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Picture>, AppError> {
        let row = sqlx::query_as::<Postgres, PictureRow>(&format!(
            "SELECT {} FROM picture WHERE id = $1",
            PICTURE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PictureRow::to_domain))
    }

    #[tracing::instrument(skip(self), fields(db.table = "picture", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM picture WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, query), fields(db.table = "picture", db.operation = "select"))]
    async fn query(&self, query: &PictureQueryRequest) -> Result<(Vec<Picture>, i64), AppError> {
        let (sort_field, ascending) = query.sort()?;

        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM picture");
        push_filters(&mut count_builder, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM picture", PICTURE_COLUMNS));
        push_filters(&mut builder, query);
        builder
            .push(" ORDER BY ")
            .push(sort_field.column())
            .push(if ascending { " ASC" } else { " DESC" })
            .push(", id ASC LIMIT ")
            .push_bind(query.page_size())
            .push(" OFFSET ")
            .push_bind(query.offset()?);

        let rows: Vec<PictureRow> = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok((rows.into_iter().map(PictureRow::to_domain).collect(), total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "picture", db.operation = "count"))]
    async fn count_by_url(&self, url: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM picture WHERE url = $1")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "picture", db.operation = "aggregate", db.space_id = %space_id))]
    async fn space_usage(&self, space_id: Uuid) -> Result<SpaceUsage, AppError> {
        let (total_count, total_size) = sqlx::query_as::<Postgres, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(pic_size), 0)::BIGINT FROM picture WHERE space_id = $1",
        )
        .bind(space_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(SpaceUsage {
            total_count,
            total_size,
        })
    }

    #[tracing::instrument(skip(self, decision), fields(db.table = "picture", db.operation = "update", db.record_id = %id))]
    async fn update_review(&self, id: Uuid, decision: &ReviewDecision) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE picture
            SET review_status = $2, review_message = $3, reviewer_id = $4, review_time = $5
            WHERE id = $1 AND review_status <> $2
            "#,
        )
        .bind(id)
        .bind(decision.status)
        .bind(&decision.message)
        .bind(decision.reviewer_id)
        .bind(decision.review_time)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
