//! # BizTask Worker Library
//!
//! Background jobs that run next to the API.
//!
//! ## Modules
//!
//! - `sweeper`: Deletes completed tasks past the retention window
//! - `store`: Connects to the same store as the API

pub mod store;
pub mod sweeper;
