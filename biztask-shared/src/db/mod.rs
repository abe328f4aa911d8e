/// PostgreSQL plumbing for the document store
///
/// # Modules
///
/// - `pool`: connection pool with health checks
/// - `migrations`: embedded schema migrations
///
/// Queries against the `users` and `tasks` tables live in
/// [`crate::gateway::postgres`].

pub mod migrations;
pub mod pool;
