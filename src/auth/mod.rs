//! Authentication module
//!
//! Login with Amazon (LWA) refresh-token flow.
//!
//! The `Authenticator` exchanges the long-lived refresh token for a
//! short-lived access token, caches it in process memory and refreshes it
//! when it expires or when the API rejects it with a 401.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{CachedToken, OAuthCredentials};
