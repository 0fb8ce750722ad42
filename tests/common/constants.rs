//! Shared constants for end-to-end tests

/// API key configured on servers spawned with `TestServer::spawn_with_api_key`
pub const TEST_API_KEY: &str = "test-api-key";

/// Number of partners seeded in the fake Odoo
pub const PARTNER_COUNT: usize = 25;

/// Models seeded in the fake Odoo's `ir.model`
pub const SEEDED_MODELS: &[&str] = &["res.partner", "res.users", "res.company", "account.move"];

/// Maximum time to wait for a spawned server to answer `/health`
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for the server
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Timeout of every request made by `TestClient`
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
