//! Database repositories for data access layer
//!
//! Each repository owns one table. The traits are the seams the services
//! depend on; the `Pg*` types are the production implementations.

pub mod picture;
pub mod space;
pub mod transaction;
pub mod user;

pub use picture::{PgPictureRepository, PictureStore};
pub use space::{PgSpaceRepository, SpaceStore};
pub use transaction::TransactionGuard;
pub use user::{PgUserRepository, UserStore};
