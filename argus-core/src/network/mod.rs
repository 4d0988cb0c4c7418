//! Duplex connection management.
//!
//! One [`ConnectionManager`] per session owns one WebSocket. The service
//! addresses sessions by a random connection id embedded in the URL path,
//! so the helpers here build `{base}/{id}` endpoints.

use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};

pub mod connection;

pub use connection::{ConnectionManager, LinkEvent};

/// Length of the per-session connection id.
pub const CONNECTION_ID_LEN: usize = 16;

/// Generate a random alphanumeric connection id.
pub fn connection_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONNECTION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Join a service base URL and a connection id into the per-session
/// endpoint. Tolerates a trailing slash on the base.
pub fn session_url(base: &str, id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), id)
}
