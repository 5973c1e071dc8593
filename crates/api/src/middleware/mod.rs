//! Request extractors and middleware.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`readiness::require_db_ready`] -- Answers 503 until the database is ready.

pub mod auth;
pub mod readiness;
