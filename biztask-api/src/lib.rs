//! # BizTask API Server Library
//!
//! HTTP surface of BizTask: company registration and login, task lifecycle,
//! dashboards, team statistics, roster management, exports and dictation.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers
//! - `store`: Gateway selection and PostgreSQL bootstrap

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod store;
