use crate::AppError;

pub const MAX_SPACE_NAME_LENGTH: usize = 30;

pub fn validate_space_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::InvalidParams(
            "space name must not be blank".to_string(),
        ));
    }
    if name.chars().count() > MAX_SPACE_NAME_LENGTH {
        return Err(AppError::InvalidParams(format!(
            "space name exceeds {} characters",
            MAX_SPACE_NAME_LENGTH
        )));
    }
    Ok(())
}
