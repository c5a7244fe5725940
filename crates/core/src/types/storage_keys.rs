//! Durable storage key names.
//!
//! These names are shared with the web storefront, so a storage file can be
//! seeded from a browser's local storage export.

/// Access token (plain string).
pub const ACCESS_TOKEN: &str = "accessToken";

/// Refresh token (plain string).
pub const REFRESH_TOKEN: &str = "refreshToken";

/// Signed-in user profile (JSON).
pub const AUTH_USER: &str = "authUser";

/// Cookie consent record (JSON). Versioned so a new consent form can
/// invalidate earlier answers.
pub const COOKIE_CONSENT: &str = "sgtprepper_cookie_consent_v1";

/// Pseudonymous analytics client id, generated on first use.
pub const ANALYTICS_CLIENT_ID: &str = "sgtprepper_analytics_client_id";
