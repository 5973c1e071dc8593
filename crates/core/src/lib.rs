//! Study progress domain logic.
//!
//! Pure building blocks shared by the storage layer, the HTTP server, and
//! client-side tooling:
//!
//! - [`document`] -- the per-user progress document and its stored forms.
//! - [`lecture`] -- canonical lecture entries and the legacy-shape decoder.
//! - [`migration`] -- in-place repair of historical progress documents.
//! - [`envelope`] -- password-derived AES-256-GCM encryption of documents.
//! - [`session_key`] -- the per-session key slot guarding the envelope.
//! - [`autosave`] -- trailing-debounce scheduler for client writes.
//! - [`study_plan`] -- the 15-week plan and the subject catalog.
//! - [`stats`] -- per-subject completion summaries.

pub mod autosave;
pub mod document;
pub mod envelope;
pub mod error;
pub mod lecture;
pub mod migration;
pub mod session_key;
pub mod stats;
pub mod study_plan;
pub mod types;
