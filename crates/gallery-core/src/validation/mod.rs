//! Validation modules

pub mod picture;
pub mod space;

pub use picture::{
    validate_picture, validate_picture_edit, MAX_INTRODUCTION_LENGTH, MAX_PICTURE_NAME_LENGTH,
    MAX_URL_LENGTH,
};
pub use space::{validate_space_name, MAX_SPACE_NAME_LENGTH};
