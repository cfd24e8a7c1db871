//! In-memory collaborators for tests.
//!
//! Compiled for this crate's own tests and, behind the `test-helpers`
//! feature, for the HTTP tests in `gallery-api`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use gallery_core::models::{
    Picture, PictureQueryRequest, PictureSortField, ReviewDecision, ReviewStatus, Space,
    SpaceUsage, User, UserRole,
};
use gallery_core::{AppError, CacheError, DistributedCache};
use gallery_db::{PictureStore, SpaceStore, UserStore};
use gallery_storage::{
    BlobStore, ByteStream, DerivationRules, StorageBackend, StorageError, StorageResult,
};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub fn user(role: UserRole) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        user_account: format!("account-{}", &id.simple().to_string()[..8]),
        user_name: Some("Tester".to_string()),
        user_avatar: None,
        user_profile: None,
        user_role: role,
        create_time: Utc::now(),
    }
}

pub fn admin() -> User {
    user(UserRole::Admin)
}

pub fn member() -> User {
    user(UserRole::User)
}

/// A persisted-looking picture owned by `owner`.
pub fn picture(owner: Uuid, status: ReviewStatus) -> Picture {
    let now = Utc::now();
    let id = Uuid::new_v4();
    Picture {
        id,
        url: format!("memory://blobs/public/{}/{}.webp", owner, id),
        thumbnail_url: None,
        original_url: None,
        name: "fixture".to_string(),
        introduction: None,
        category: None,
        tags: Vec::new(),
        pic_size: 1024,
        pic_width: 300,
        pic_height: 200,
        pic_scale: Picture::compute_scale(300, 200),
        pic_format: Some("webp".to_string()),
        user_id: owner,
        space_id: None,
        review_status: status,
        review_message: None,
        reviewer_id: None,
        review_time: None,
        create_time: now,
        edit_time: now,
    }
}

/// PNG bytes of a solid `width` x `height` image.
pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 80, 40, 255]));
    let mut buffer = Cursor::new(Vec::new());
    if let Err(e) = img.write_to(&mut buffer, image::ImageFormat::Png) {
        panic!("failed to encode fixture png: {}", e);
    }
    Bytes::from(buffer.into_inner())
}

#[derive(Default)]
pub struct InMemoryPictureStore {
    pictures: Mutex<HashMap<Uuid, Picture>>,
    queries: AtomicUsize,
}

impl InMemoryPictureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, picture: Picture) {
        lock(&self.pictures).insert(picture.id, picture);
    }

    pub fn get(&self, id: Uuid) -> Option<Picture> {
        lock(&self.pictures).get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.pictures).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.pictures).values().map(|p| p.name.clone()).collect();
        names.sort();
        names
    }

    /// Number of `query` calls served.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

fn matches(picture: &Picture, query: &PictureQueryRequest) -> bool {
    let eq = |want: Option<Uuid>, have: Option<Uuid>| want.is_none() || want == have;
    if !eq(query.id, Some(picture.id))
        || !eq(query.user_id, Some(picture.user_id))
        || !eq(query.space_id, picture.space_id)
        || !eq(query.reviewer_id, picture.reviewer_id)
    {
        return false;
    }
    if query.null_space_id && picture.space_id.is_some() {
        return false;
    }
    if query.review_status.is_some_and(|s| s != picture.review_status) {
        return false;
    }
    if query.pic_width.is_some_and(|w| w != picture.pic_width)
        || query.pic_height.is_some_and(|h| h != picture.pic_height)
        || query.pic_size.is_some_and(|s| s != picture.pic_size)
    {
        return false;
    }
    for (filter, value) in [
        (&query.name, Some(picture.name.as_str())),
        (&query.introduction, picture.introduction.as_deref()),
        (&query.category, picture.category.as_deref()),
        (&query.pic_format, picture.pic_format.as_deref()),
    ] {
        if let Some(filter) = filter.as_deref().filter(|f| !f.is_empty()) {
            if !contains_ci(value, filter) {
                return false;
            }
        }
    }
    if let Some(text) = query.search_text.as_deref().filter(|t| !t.is_empty()) {
        if !contains_ci(Some(picture.name.as_str()), text)
            && !contains_ci(picture.introduction.as_deref(), text)
        {
            return false;
        }
    }
    if let Some(ref tags) = query.tags {
        if !tags.iter().all(|t| picture.tags.contains(t)) {
            return false;
        }
    }
    true
}

fn compare(a: &Picture, b: &Picture, field: PictureSortField) -> CmpOrdering {
    match field {
        PictureSortField::Id => a.id.cmp(&b.id),
        PictureSortField::Name => a.name.cmp(&b.name),
        PictureSortField::Category => a.category.cmp(&b.category),
        PictureSortField::PicSize => a.pic_size.cmp(&b.pic_size),
        PictureSortField::PicWidth => a.pic_width.cmp(&b.pic_width),
        PictureSortField::PicHeight => a.pic_height.cmp(&b.pic_height),
        PictureSortField::PicScale => a.pic_scale.total_cmp(&b.pic_scale),
        PictureSortField::PicFormat => a.pic_format.cmp(&b.pic_format),
        PictureSortField::ReviewStatus => {
            a.review_status.to_string().cmp(&b.review_status.to_string())
        }
        PictureSortField::CreateTime => a.create_time.cmp(&b.create_time),
        PictureSortField::EditTime => a.edit_time.cmp(&b.edit_time),
    }
}

#[async_trait]
impl PictureStore for InMemoryPictureStore {
    async fn insert(&self, picture: &Picture) -> Result<Picture, AppError> {
        lock(&self.pictures).insert(picture.id, picture.clone());
        Ok(picture.clone())
    }

    async fn update(&self, picture: &Picture) -> Result<Picture, AppError> {
        let mut pictures = lock(&self.pictures);
        match pictures.get_mut(&picture.id) {
            Some(slot) => {
                *slot = picture.clone();
                Ok(picture.clone())
            }
            None => Err(AppError::NotFound(format!("Picture {} not found", picture.id))),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Picture>, AppError> {
        Ok(self.get(id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(lock(&self.pictures).remove(&id).is_some())
    }

    async fn query(&self, query: &PictureQueryRequest) -> Result<(Vec<Picture>, i64), AppError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let (field, ascending) = query.sort()?;

        let mut found: Vec<Picture> = lock(&self.pictures)
            .values()
            .filter(|p| matches(p, query))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            let ordering = compare(a, b, field);
            let ordering = if ascending { ordering } else { ordering.reverse() };
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        let total = found.len() as i64;
        let records = found
            .into_iter()
            .skip(query.offset()?.max(0) as usize)
            .take(query.page_size() as usize)
            .collect();
        Ok((records, total))
    }

    async fn count_by_url(&self, url: &str) -> Result<i64, AppError> {
        Ok(lock(&self.pictures).values().filter(|p| p.url == url).count() as i64)
    }

    async fn space_usage(&self, space_id: Uuid) -> Result<SpaceUsage, AppError> {
        let pictures = lock(&self.pictures);
        let in_space = pictures.values().filter(|p| p.space_id == Some(space_id));
        let (total_count, total_size) =
            in_space.fold((0, 0), |(count, size), p| (count + 1, size + p.pic_size));
        Ok(SpaceUsage {
            total_count,
            total_size,
        })
    }

    async fn update_review(&self, id: Uuid, decision: &ReviewDecision) -> Result<bool, AppError> {
        let mut pictures = lock(&self.pictures);
        match pictures.get_mut(&id) {
            Some(picture) if picture.review_status != decision.status => {
                picture.review_status = decision.status;
                picture.review_message = decision.message.clone();
                picture.reviewer_id = Some(decision.reviewer_id);
                picture.review_time = Some(decision.review_time);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Space store whose existence check and insert are separate steps, with a
/// yield in between, like a table without a unique index on the owner.
#[derive(Default)]
pub struct InMemorySpaceStore {
    spaces: Mutex<HashMap<Uuid, Space>>,
}

impl InMemorySpaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, space: Space) {
        lock(&self.spaces).insert(space.id, space);
    }

    pub fn count_for(&self, user_id: Uuid) -> usize {
        lock(&self.spaces)
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl SpaceStore for InMemorySpaceStore {
    async fn create_exclusive(&self, space: &Space) -> Result<Space, AppError> {
        let exists = lock(&self.spaces)
            .values()
            .any(|s| s.user_id == space.user_id);
        if exists {
            return Err(AppError::Conflict(format!(
                "User {} already has a space",
                space.user_id
            )));
        }

        tokio::task::yield_now().await;

        lock(&self.spaces).insert(space.id, space.clone());
        Ok(space.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Space>, AppError> {
        Ok(lock(&self.spaces).get(&id).cloned())
    }

    async fn get_by_user(&self, user_id: Uuid) -> Result<Option<Space>, AppError> {
        Ok(lock(&self.spaces)
            .values()
            .find(|s| s.user_id == user_id)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user: User) -> User {
        lock(&self.users).insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(lock(&self.users).get(&id).cloned())
    }

    async fn get_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        let users = lock(&self.users);
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

/// Distributed cache double that records the expiry of every write.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, u64)>>,
    gets: AtomicUsize,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        lock(&self.entries).get(key).map(|(_, ttl)| *ttl)
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistributedCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.entries).get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        lock(&self.entries).insert(key.to_string(), (value.to_string(), ttl_seconds));
        Ok(())
    }
}

/// Distributed cache that is never reachable.
#[derive(Default)]
pub struct UnreachableCache {
    calls: AtomicUsize,
}

impl UnreachableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DistributedCache for UnreachableCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

/// Blob Store holding objects in memory. Counts every write.
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
    rules: DerivationRules,
    puts: AtomicUsize,
}

pub const MEMORY_BLOB_BASE_URL: &str = "memory://blobs";

impl MemoryBlobStore {
    pub fn new(rules: DerivationRules) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            rules,
            puts: AtomicUsize::new(0),
        }
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new(DerivationRules::default())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<String> {
        gallery_storage::keys::validate_key(key)?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        lock(&self.objects).insert(key.to_string(), data);
        Ok(self.url_for(key))
    }

    async fn fetch(&self, key: &str) -> StorageResult<ByteStream> {
        let data = lock(&self.objects)
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::pin(stream::once(async move {
            Ok::<Bytes, StorageError>(data)
        })))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        lock(&self.objects).remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.contains(key))
    }

    fn public_base_url(&self) -> String {
        MEMORY_BLOB_BASE_URL.to_string()
    }

    fn derivation_rules(&self) -> &DerivationRules {
        &self.rules
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
