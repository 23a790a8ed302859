//! Content identifiers returned by the object store
//!
//! The engine treats a CID as an opaque string: it never derives one
//! itself, it only stores what the cluster hands back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Object-store content identifier (CID)
///
/// Example: `QmZrR67WGmu364AzVGxiWkt64cqpbKkLxNDazjnqbPKTLa`
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cid(String);

impl Cid {
    /// Wrap an identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Loose check for the usual IPFS encodings: CIDv0 (`Qm`), CIDv1
    /// base32 (`bafy`) or a piece CID (`baga`) followed by at least 40
    /// alphanumerics.
    pub fn looks_like_ipfs(&self) -> bool {
        let rest = ["Qm", "bafy", "baga"]
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix));
        match rest {
            Some(rest) => rest.len() >= 40 && rest.bytes().all(|b| b.is_ascii_alphanumeric()),
            None => false,
        }
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.0)
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Cid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
