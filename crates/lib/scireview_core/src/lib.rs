//! # scireview_core
//!
//! Authentication and session lifecycle for Sci Review: password hashing,
//! token minting and verification, the login audit journal, the refresh-token
//! store, and the login / rotate / logout protocols that tie them together.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod store;
pub mod users;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
