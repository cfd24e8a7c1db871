//! Cache-aside picture listing.
//!
//! Lookup order is the process-local LRU, then the distributed cache, then
//! the store. A store result is written to both tiers; remote entries get a
//! random extra lifetime so pages cached together do not expire together.
//! There is no invalidation on write: a listing may be stale for up to one
//! TTL.
//!
//! The distributed tier is optional and never fails a request. Errors from it
//! are logged and treated as a miss.

use gallery_core::constants::MAX_VIEW_PAGE_SIZE;
use gallery_core::models::{Page, PictureQueryRequest, PictureView, ReviewStatus, User};
use gallery_core::{AppError, DistributedCache};
use gallery_db::{PictureStore, UserStore};
use lru::LruCache;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::QueryCacheConfig;
use crate::views::picture_views;

struct LocalEntry {
    value: Arc<str>,
    expires_at: Instant,
}

pub struct QueryCache {
    pictures: Arc<dyn PictureStore>,
    users: Arc<dyn UserStore>,
    remote: Option<Arc<dyn DistributedCache>>,
    local: Mutex<LruCache<String, LocalEntry>>,
    config: QueryCacheConfig,
}

impl QueryCache {
    pub fn new(
        pictures: Arc<dyn PictureStore>,
        users: Arc<dyn UserStore>,
        remote: Option<Arc<dyn DistributedCache>>,
        config: QueryCacheConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.local_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            pictures,
            users,
            remote,
            local: Mutex::new(LruCache::new(capacity)),
            config,
        }
    }

    /// One page of picture views.
    ///
    /// Callers other than administrators only ever see approved pictures,
    /// whatever review status they ask for.
    #[tracing::instrument(skip_all, fields(admin = viewer.is_some_and(|u| u.is_admin())))]
    pub async fn get_page(
        &self,
        mut request: PictureQueryRequest,
        viewer: Option<&User>,
    ) -> Result<Page<PictureView>, AppError> {
        if request.page_size.is_some_and(|size| size > MAX_VIEW_PAGE_SIZE) {
            return Err(AppError::InvalidParams(format!(
                "pageSize must not exceed {}",
                MAX_VIEW_PAGE_SIZE
            )));
        }
        if !viewer.is_some_and(|u| u.is_admin()) {
            request.review_status = Some(ReviewStatus::Pass);
        }
        request.sort()?;
        request.offset()?;

        let key = self.cache_key(&request)?;

        if let Some(page) = self.local_get(&key) {
            tracing::debug!(cache = "local", "Listing cache hit");
            return Ok(page);
        }

        if let Some(value) = self.remote_get(&key).await {
            match serde_json::from_str::<Page<PictureView>>(&value) {
                Ok(page) => {
                    tracing::debug!(cache = "remote", "Listing cache hit");
                    self.local_put(&key, Arc::from(value));
                    return Ok(page);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding undecodable distributed cache entry");
                }
            }
        }

        let (records, total) = self.pictures.query(&request).await?;
        let views = picture_views(self.users.as_ref(), records).await?;
        let page = Page::new(request.page(), request.page_size(), total, views);

        let value = serde_json::to_string(&page)
            .map_err(|e| AppError::Internal(format!("Failed to encode listing page: {}", e)))?;
        self.remote_put(&key, &value).await;
        self.local_put(&key, Arc::from(value));

        Ok(page)
    }

    /// `{prefix}{sha256(request json)}`
    fn cache_key(&self, request: &PictureQueryRequest) -> Result<String, AppError> {
        let json = serde_json::to_string(request)
            .map_err(|e| AppError::Internal(format!("Failed to encode listing query: {}", e)))?;
        let digest = Sha256::digest(json.as_bytes());
        Ok(format!("{}{}", self.config.key_prefix, hex::encode(digest)))
    }

    fn remote_ttl_secs(&self) -> u64 {
        let jitter = rand::rng().random_range(0..=self.config.remote_jitter_secs);
        self.config.remote_base_ttl_secs + jitter
    }

    fn local_cache(&self) -> MutexGuard<'_, LruCache<String, LocalEntry>> {
        match self.local.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn local_get(&self, key: &str) -> Option<Page<PictureView>> {
        let value = {
            let mut cache = self.local_cache();
            let found = cache
                .get(key)
                .map(|entry| (entry.expires_at > Instant::now(), entry.value.clone()));
            match found {
                Some((true, value)) => value,
                Some((false, _)) => {
                    cache.pop(key);
                    return None;
                }
                None => return None,
            }
        };
        serde_json::from_str(&value).ok()
    }

    fn local_put(&self, key: &str, value: Arc<str>) {
        let entry = LocalEntry {
            value,
            expires_at: Instant::now() + self.config.local_ttl,
        };
        self.local_cache().put(key.to_string(), entry);
    }

    async fn remote_get(&self, key: &str) -> Option<String> {
        let remote = self.remote.as_ref()?;
        match remote.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Distributed cache read failed, falling back to store");
                None
            }
        }
    }

    async fn remote_put(&self, key: &str, value: &str) {
        let Some(remote) = self.remote.as_ref() else {
            return;
        };
        let ttl = self.remote_ttl_secs();
        if let Err(e) = remote.set(key, value, ttl).await {
            tracing::warn!(error = %e, "Distributed cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        admin, member, picture, InMemoryCache, InMemoryPictureStore, InMemoryUserStore,
        UnreachableCache,
    };
    use std::time::Duration;

    struct Fixture {
        pictures: Arc<InMemoryPictureStore>,
        users: Arc<InMemoryUserStore>,
    }

    fn fixture() -> Fixture {
        let pictures = Arc::new(InMemoryPictureStore::new());
        let users = Arc::new(InMemoryUserStore::new());
        let owner = users.add(member());
        for status in [
            ReviewStatus::Pass,
            ReviewStatus::Pass,
            ReviewStatus::Reviewing,
            ReviewStatus::Reject,
        ] {
            pictures.put(picture(owner.id, status));
        }
        Fixture { pictures, users }
    }

    fn cache(fixture: &Fixture, remote: Option<Arc<dyn DistributedCache>>) -> QueryCache {
        QueryCache::new(
            fixture.pictures.clone(),
            fixture.users.clone(),
            remote,
            QueryCacheConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_members_only_see_approved_pictures() {
        let fixture = fixture();
        let cache = cache(&fixture, None);
        let request = PictureQueryRequest {
            review_status: Some(ReviewStatus::Reviewing),
            ..Default::default()
        };

        let page = cache.get_page(request.clone(), Some(&member())).await.unwrap();
        assert_eq!(page.total, 2);

        let anonymous = cache.get_page(request.clone(), None).await.unwrap();
        assert_eq!(anonymous.total, 2);

        let page = cache.get_page(request, Some(&admin())).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_views_carry_owner_profile() {
        let fixture = fixture();
        let cache = cache(&fixture, None);
        let page = cache
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();
        assert!(page.records.iter().all(|view| view.user.is_some()));
    }

    #[tokio::test]
    async fn test_unreachable_remote_degrades_to_store() {
        let fixture = fixture();
        let remote = Arc::new(UnreachableCache::new());
        let cache = cache(&fixture, Some(remote.clone()));

        let first = cache
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();
        let second = cache
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert!(remote.calls() >= 1);
    }

    #[tokio::test]
    async fn test_local_hit_skips_store() {
        let fixture = fixture();
        let cache = cache(&fixture, None);

        cache
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();
        cache
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();

        assert_eq!(fixture.pictures.query_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_hit_fills_local_tier() {
        let fixture = fixture();
        let remote = Arc::new(InMemoryCache::new());

        let writer = cache(&fixture, Some(remote.clone()));
        let expected = writer
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(fixture.pictures.query_count(), 1);

        // Fresh local tier, shared remote tier.
        let reader = cache(&fixture, Some(remote.clone()));
        let page = reader
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(page, expected);
        assert_eq!(fixture.pictures.query_count(), 1);

        let gets = remote.get_count();
        reader
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(remote.get_count(), gets);
    }

    #[tokio::test]
    async fn test_remote_ttl_is_jittered_within_window() {
        let fixture = fixture();
        let remote = Arc::new(InMemoryCache::new());
        let config = QueryCacheConfig {
            remote_base_ttl_secs: 300,
            remote_jitter_secs: 300,
            ..QueryCacheConfig::default()
        };
        let cache = QueryCache::new(
            fixture.pictures.clone(),
            fixture.users.clone(),
            Some(remote.clone()),
            config,
        );

        for current in 1..=5 {
            let request = PictureQueryRequest {
                current: Some(current),
                ..Default::default()
            };
            cache.get_page(request, None).await.unwrap();
        }

        let keys = remote.keys();
        assert_eq!(keys.len(), 5);
        for key in keys {
            assert!(key.starts_with("gallery:listPictureViewByPage:"));
            let ttl = remote.ttl_of(&key).unwrap();
            assert!((300..=600).contains(&ttl), "ttl {} outside window", ttl);
        }
    }

    #[tokio::test]
    async fn test_expired_local_entry_is_refreshed() {
        let fixture = fixture();
        let config = QueryCacheConfig {
            local_ttl: Duration::from_millis(10),
            ..QueryCacheConfig::default()
        };
        let cache = QueryCache::new(fixture.pictures.clone(), fixture.users.clone(), None, config);

        cache
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache
            .get_page(PictureQueryRequest::default(), None)
            .await
            .unwrap();

        assert_eq!(fixture.pictures.query_count(), 2);
    }

    #[tokio::test]
    async fn test_rejects_oversized_pages_and_unknown_sorts() {
        let fixture = fixture();
        let cache = cache(&fixture, None);

        let big = PictureQueryRequest {
            page_size: Some(21),
            ..Default::default()
        };
        assert!(matches!(
            cache.get_page(big, None).await,
            Err(AppError::InvalidParams(_))
        ));

        let bad_sort = PictureQueryRequest {
            sort_field: Some("url".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            cache.get_page(bad_sort, None).await,
            Err(AppError::InvalidParams(_))
        ));
        assert_eq!(fixture.pictures.query_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_page_is_invalid_params() {
        let fixture = fixture();
        let cache = cache(&fixture, None);

        let far = PictureQueryRequest {
            current: Some(i64::MAX),
            page_size: Some(20),
            ..Default::default()
        };
        assert!(matches!(
            cache.get_page(far, None).await,
            Err(AppError::InvalidParams(_))
        ));
        assert_eq!(fixture.pictures.query_count(), 0);
    }

    #[test]
    fn test_cache_key_depends_on_request() {
        let fixture = fixture();
        let cache = cache(&fixture, None);
        let a = cache.cache_key(&PictureQueryRequest::default()).unwrap();
        let b = cache
            .cache_key(&PictureQueryRequest {
                name: Some("cat".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(a, cache.cache_key(&PictureQueryRequest::default()).unwrap());
        assert_eq!(a.len(), "gallery:listPictureViewByPage:".len() + 64);
    }
}
