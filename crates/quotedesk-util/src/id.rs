//! ULID-based identifier generation with prefixes.
//!
//! Identifiers in quotedesk follow the pattern: `prefix_ulid`
//! For example: `ver_01hqxyz...` for version records.

use ulid::Ulid;

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Version,
    Request,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Version => "ver",
            IdPrefix::Request => "req",
        }
    }
}

/// Identifier generation.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        Self::with_ulid(prefix, Ulid::new())
    }

    fn with_ulid(prefix: IdPrefix, ulid: Ulid) -> String {
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Generate a version record ID.
    pub fn version() -> String {
        Self::ascending(IdPrefix::Version)
    }

    /// Generate a request ID for tracing.
    pub fn request() -> String {
        Self::ascending(IdPrefix::Request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_id_shape() {
        let id = Identifier::version();
        assert!(id.starts_with("ver_"));
        assert_eq!(id.len(), 30); // "ver_" (4) + ULID (26)
    }

    #[test]
    fn test_ascending_order() {
        let id1 = Identifier::version();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = Identifier::version();
        assert!(id1 < id2, "Ascending IDs should increase over time");
    }

    #[test]
    fn test_with_ulid_lowercases() {
        let ulid = Ulid::new();
        let id = Identifier::with_ulid(IdPrefix::Request, ulid);
        assert_eq!(id, format!("req_{}", ulid.to_string().to_lowercase()));
    }

    #[test]
    fn test_request_id_prefix() {
        assert!(Identifier::request().starts_with("req_"));
    }
}
