//! Data models for the application
//!
//! Each sub-module covers one feature area: pictures (assets, queries, uploads,
//! review), spaces, users, and pagination.

mod page;
mod picture;
mod review;
mod space;
mod user;

pub use page::*;
pub use picture::*;
pub use review::*;
pub use space::*;
pub use user::*;
