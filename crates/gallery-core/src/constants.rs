//! Shared constants

/// Suggested tags offered to clients when editing a picture.
pub const PICTURE_TAGS: &[&str] = &[
    "popular", "funny", "daily", "art", "campus", "scenery", "anime", "creative",
];

/// Suggested categories offered to clients when editing a picture.
pub const PICTURE_CATEGORIES: &[&str] = &[
    "template", "poster", "wallpaper", "avatar", "emoji", "illustration",
];

/// Largest page size accepted by the public (cached) picture listing.
pub const MAX_VIEW_PAGE_SIZE: i64 = 20;

/// Largest number of pictures a single batch scrape may request.
pub const MAX_BATCH_COUNT: u32 = 30;

/// Name given to a space when the caller does not supply one.
pub const DEFAULT_SPACE_NAME: &str = "default space";
