//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row and the DTOs used to write it.

pub mod progress;
pub mod user;
