//! Gallery persistent Store
//!
//! Repository traits for pictures, spaces and users, with their PostgreSQL
//! implementations.

pub mod db;

pub use db::*;
