//! Command-line override for the configured codec.

use crate::Compression;
use crate::error::Error;
use std::str::FromStr;

/// Shape clap produces for `--compress[=CODEC]`.
pub type Flag = Option<Option<String>>;

/// Codec used when compression is asked for without naming one.
pub const FALLBACK: Compression = Compression::Gzip;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Preference {
    /// `--compress=CODEC`
    Explicit(Compression),
    /// `--compress` with no codec
    Implicit,
    /// No flag; use whatever is configured
    NotSpecified,
}
impl TryFrom<Flag> for Preference {
    type Error = Error;
    fn try_from(value: Flag) -> Result<Self, Self::Error> {
        match value {
            Some(Some(s)) if s.trim().is_empty() => Ok(Self::Implicit),
            Some(Some(s)) => Ok(Self::Explicit(Compression::from_str(&s)?)),
            Some(None) => Ok(Self::Implicit),
            None => Ok(Self::NotSpecified),
        }
    }
}
impl Preference {
    /// Pick the codec to upload with.
    ///
    /// A bare flag keeps a configured codec, and turns on [`FALLBACK`] when
    /// the configuration has compression off.
    pub fn resolve(&self, configured: Compression) -> Compression {
        match self {
            Self::Explicit(c) => *c,
            Self::Implicit if configured == Compression::None => FALLBACK,
            Self::Implicit | Self::NotSpecified => configured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, Preference::NotSpecified)]
    #[case(Some(None), Preference::Implicit)]
    #[case(Some(Some(String::new())), Preference::Implicit)]
    #[case(Some(Some("gz".to_string())), Preference::Explicit(Compression::Gzip))]
    #[case(Some(Some("bzip2".to_string())), Preference::Explicit(Compression::Bzip2))]
    #[case(Some(Some("none".to_string())), Preference::Explicit(Compression::None))]
    #[cfg_attr(feature = "zstd", case(Some(Some("zstd".to_string())), Preference::Explicit(Compression::Zstd)))]
    fn test_construct(#[case] flag: Flag, #[case] expected: Preference) {
        let preference: Preference = flag.try_into().unwrap();
        assert_eq!(preference, expected);
    }

    #[test]
    fn test_construct_invalid() {
        let flag = Some(Some("webp".to_string()));
        let preference: Result<Preference, Error> = flag.try_into();
        assert!(preference.is_err());
    }

    #[rstest]
    #[case(Preference::Explicit(Compression::None), Compression::Bzip2, Compression::None)]
    #[case(Preference::Explicit(Compression::Gzip), Compression::Bzip2, Compression::Gzip)]
    #[case(Preference::Implicit, Compression::Bzip2, Compression::Bzip2)]
    #[case(Preference::Implicit, Compression::None, FALLBACK)]
    #[case(Preference::NotSpecified, Compression::Bzip2, Compression::Bzip2)]
    #[case(Preference::NotSpecified, Compression::None, Compression::None)]
    fn test_resolve(#[case] preference: Preference, #[case] configured: Compression, #[case] expected: Compression) {
        assert_eq!(preference.resolve(configured), expected);
    }
}
