//! Destination key validation.
//!
//! Object keys are `/`-separated strings relative to the transport's root
//! (bucket prefix or local directory). Keys are validated once, on
//! construction, so transports can join them onto their root without
//! worrying about traversal.

use crate::error::{ErrorKind, Result};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// A validated, normalized object key.
///
/// # Examples
///
/// ```
/// use keepsake_storage::DestinationKey;
/// // Valid keys
/// assert!(DestinationKey::parse("gallery-42/photo.jpg").is_ok());
/// assert!(DestinationKey::parse("a/../photo.jpg").is_ok()); // (never leaves the root)
/// // Invalid keys
/// assert!(DestinationKey::parse("../photo.jpg").is_err());
/// assert!(DestinationKey::parse("a\\b").is_err());
/// assert!(DestinationKey::parse("a\0b").is_err());
/// // Keys get resolved
/// assert_eq!(
///     DestinationKey::parse("/wrong/../gallery//./photo.jpg/").unwrap().as_str(),
///     "gallery/photo.jpg"
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationKey(String);

impl DestinationKey {
    /// Validates and normalizes a key.
    ///
    /// Returns [`InvalidKey`](crate::error::ErrorKind::InvalidKey) when the
    /// key is empty after normalization, escapes the root with `..`, or
    /// contains NUL bytes or backslashes.
    pub fn parse(key: impl AsRef<str>) -> Result<Self> {
        let raw = key.as_ref();
        // Backslashes are separators on one platform and literal characters on
        // every other; neither interpretation is safe for an object key.
        if raw.contains(['\0', '\\']) {
            exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
        }
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    if segments.pop().is_none() {
                        exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
                    }
                },
                normal => segments.push(normal),
            }
        }
        if segments.is_empty() {
            exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
        }
        Ok(Self(segments.join("/")))
    }

    /// The normalized key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DestinationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DestinationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
