//! Destination key generation.
//!
//! Every attempt gets a fresh key of the form
//! `{destination}/{unix millis}-{random}-{sanitized name}`, so two guests
//! uploading `IMG_0001.jpg` to the same gallery never collide.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use keepsake_storage::DestinationKey;
use rslug::slugify;
use time::OffsetDateTime;
use uuid::Uuid;

/// Length of the random component of a key.
const RANDOM_LEN: usize = 12;
/// Used when nothing of the original stem survives sanitizing.
const FALLBACK_STEM: &str = "file";

/// Build a collision-resistant key for `file_name` under `destination`.
pub fn destination_key(destination: &DestinationKey, file_name: &str, now: OffsetDateTime) -> Result<DestinationKey> {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let random = Uuid::new_v4().simple().to_string();
    let random = &random[..RANDOM_LEN];
    let key = format!("{destination}/{millis}-{random}-{}", sanitize_file_name(file_name));
    DestinationKey::parse(&key).or_raise(|| ErrorKind::InvalidDestination(destination.to_string()))
}

/// Reduce a guest-supplied file name to something safe in any object store
/// namespace: no directories, lowercase ASCII slug stem, alphanumeric
/// extension.
pub fn sanitize_file_name(file_name: &str) -> String {
    // Browsers and phones have been known to send full client-side paths.
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            (stem, Some(ext.to_ascii_lowercase()))
        },
        _ => (base, None),
    };
    let mut stem = slugify!(stem);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    match extension {
        Some(extension) => format!("{stem}.{extension}"),
        None => stem,
    }
}
