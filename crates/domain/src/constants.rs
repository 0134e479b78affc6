//! Application constants
//!
//! Centralized location for the endpoint paths, storage key suffixes and
//! timing defaults used by the client.

// Endpoints
pub const DEFAULT_BASE_URL: &str = "http://localhost:5013";
pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

// Durable storage
pub const DEFAULT_STORAGE_NAMESPACE: &str = "novaio";
pub const ACCESS_TOKEN_KEY_SUFFIX: &str = "accessToken";
pub const REFRESH_TOKEN_KEY_SUFFIX: &str = "refreshToken";
pub const USER_KEY_SUFFIX: &str = "user";

// Timing
/// Access tokens expiring within this window are renewed before departure.
pub const DEFAULT_EXPIRY_SKEW_MS: u64 = 15_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 1_000;

// Bus event names
pub const EVENT_CREDENTIALS_ROTATED: &str = "credentials-rotated";
pub const EVENT_REFRESH_FAILED: &str = "refresh-failed";
