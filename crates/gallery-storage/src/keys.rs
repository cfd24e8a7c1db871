//! Storage key generation shared by every backend.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::{StorageError, StorageResult};

const RANDOM_SEGMENT_LEN: usize = 16;

/// Prefix for pictures in the public gallery.
pub fn public_prefix(user_id: Uuid) -> String {
    format!("public/{}", user_id)
}

/// Prefix for pictures inside a private space.
pub fn space_prefix(space_id: Uuid) -> String {
    format!("space/{}", space_id)
}

/// Generate a fresh key `{prefix}/{yyyy-MM-dd}_{random16}.{ext}`.
///
/// The caller-supplied file name never appears in the key; only its extension does.
pub fn generate_picture_key(prefix: &str, ext: &str) -> String {
    let date = Utc::now().format("%Y-%m-%d");
    let random: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SEGMENT_LEN)
        .map(char::from)
        .collect();
    format!(
        "{}/{}_{}.{}",
        prefix.trim_end_matches('/'),
        date,
        random,
        ext.to_lowercase()
    )
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Key without its extension.
pub fn stem(key: &str) -> &str {
    match key.rfind('.') {
        Some(dot) if !key[dot..].contains('/') => &key[..dot],
        _ => key,
    }
}

/// Extension of the last path segment, if any.
pub fn extension(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.rfind('.')
        .map(|dot| &name[dot + 1..])
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_layout() {
        let user_id = Uuid::new_v4();
        let key = generate_picture_key(&public_prefix(user_id), "PNG");

        let expected_prefix = format!("public/{}/", user_id);
        assert!(key.starts_with(&expected_prefix));
        assert!(key.ends_with(".png"));

        let file = &key[expected_prefix.len()..];
        let (date, rest) = file.split_once('_').unwrap();
        assert_eq!(date.len(), 10);
        assert_eq!(rest.len(), RANDOM_SEGMENT_LEN + ".png".len());
        assert!(rest[..RANDOM_SEGMENT_LEN]
            .chars()
            .all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generated_keys_do_not_collide() {
        let a = generate_picture_key("space/x", "jpg");
        let b = generate_picture_key("space/x", "jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("public/u/2024-01-01_abc.png").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs/path.png").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn test_stem_and_extension() {
        assert_eq!(stem("public/u/a_b.png"), "public/u/a_b");
        assert_eq!(stem("public/u.d/file"), "public/u.d/file");
        assert_eq!(extension("public/u/a_b.png"), Some("png"));
        assert_eq!(extension("public/u.d/file"), None);
    }
}
