use crate::Compression;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Compression {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl Compression {
    /// Returns the short name for configuration (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Bzip2 => "bzip2",
            Compression::Gzip => "gzip",
            #[cfg(feature = "zstd")]
            Compression::Zstd => "zstd",
        }
    }

    /// Returns the HTTP `Content-Encoding` value for this format, if the
    /// bytes need decoding before use.
    #[inline]
    #[must_use]
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Bzip2 => Some("bzip2"),
            Compression::Gzip => Some("gzip"),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Some("zstd"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;

    #[rstest]
    #[case(Compression::None, None)]
    #[case(Compression::Bzip2, Some("bzip2"))]
    #[case(Compression::Gzip, Some("gzip"))]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd, Some("zstd")))]
    fn test_content_encoding(#[case] format: Compression, #[case] expected: Option<&str>) {
        assert_eq!(format.content_encoding(), expected);
    }

    #[test]
    fn test_display_matches_config_name() {
        assert_eq!(Compression::Gzip.to_string(), "gzip");
        assert_eq!("bzip2".parse::<Compression>().unwrap().to_string(), "bzip2");
    }
}
