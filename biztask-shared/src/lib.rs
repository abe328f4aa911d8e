//! # BizTask Shared Library
//!
//! Domain types and business logic shared by the BizTask API server and the
//! retention worker.
//!
//! ## Module Organization
//!
//! - `models`: user and task documents
//! - `auth`: password hashing, JWT tokens, login and registration
//! - `gateway`: document store trait with in-memory and PostgreSQL backends
//! - `db`: connection pool and migrations for the PostgreSQL backend
//! - `lifecycle`: task status transitions and permission checks
//! - `filter`, `stats`: task list views, dashboard and team statistics
//! - `calendar`: report time zone and deadline arithmetic
//! - `export`, `import`: Excel task report and CSV roster import
//! - `imaging`: image compression to inline JPEG data URLs
//! - `dictation`: speech-to-text for task drafts
//! - `settings`, `session`: local JSON files for store settings and the login session

pub mod auth;
pub mod calendar;
pub mod db;
pub mod dictation;
pub mod export;
pub mod filter;
pub mod gateway;
pub mod imaging;
pub mod import;
pub mod lifecycle;
pub mod models;
pub mod session;
pub mod settings;
pub mod stats;

/// Current version of the BizTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
