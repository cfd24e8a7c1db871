pub mod health;
pub mod pictures;
pub mod spaces;
