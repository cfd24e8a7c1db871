//! HTTP adapter for the picture gallery.
//!
//! Maps requests onto the services in `gallery-services` and their errors onto
//! status codes. The binary in `main.rs` wires the production backends; tests
//! build an [`state::AppState`] over in-memory doubles and drive the same router.

mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use setup::routes::setup_routes;
pub use state::{AppState, Backends, Settings};
