//! Scenario tests for the session core.
//!
//! Test files:
//! - bootstrap.rs: startup resolution of stored sessions
//! - login.rs: login, registration and operation exclusion
//! - refresh_logout.rs: token refresh, auto refresh and logout teardown
//! - favorites.rs: optimistic favorite toggles and rollback
