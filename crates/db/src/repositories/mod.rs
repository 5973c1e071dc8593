//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept a pool (or, where a caller needs a transaction, any
//! executor) as the first argument.

pub mod progress_repo;
pub mod user_repo;

pub use progress_repo::ProgressRepo;
pub use user_repo::UserRepo;
