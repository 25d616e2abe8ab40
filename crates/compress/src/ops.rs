//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Compression sits on the upload path of a guest's phone, so these are the
// libraries' balanced defaults rather than the smallest possible output.
const BZIP2_LEVEL: BzCompression = BzCompression::new(6);
const GZIP_LEVEL: GzCompression = GzCompression::new(6);
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 3;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use keepsake_compress::Compression;
    ///
    /// let data = b"Hello, world!";
    /// let compressed = Compression::Gzip.compress(data).unwrap();
    /// assert_eq!(Compression::Gzip.decompress(&compressed).unwrap(), data);
    /// ```
    #[instrument(skip(input), fields(format = %self, input_size = input.len(), output_size))]
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Compression::None => output.extend_from_slice(input),
            Compression::Bzip2 => {
                let mut encoder = BzEncoder::new(&mut output, BZIP2_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut output, GZIP_LEVEL);
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut encoder = ZstdEncoder::new(&mut output, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
                encoder.finish().or_raise(|| ErrorKind::Io)?;
            },
        }
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }

    /// Decompress a byte slice in memory.
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        match self {
            Compression::None => output.extend_from_slice(input),
            Compression::Bzip2 => {
                BzDecoder::new(input).read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
            Compression::Gzip => {
                GzDecoder::new(input).read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                let mut decoder = ZstdDecoder::new(input).or_raise(|| ErrorKind::Encoder)?;
                decoder.read_to_end(&mut output).or_raise(|| ErrorKind::InvalidData)?;
            },
        }
        Ok(output)
    }

    /// Compress `input`, but only keep the result if it is strictly smaller.
    ///
    /// Returns `None` when compression would not save any bytes (already
    /// compressed media, tiny inputs, or [`Compression::None`]).
    pub fn compress_if_smaller(&self, input: &[u8]) -> Result<Option<Vec<u8>>> {
        if matches!(self, Compression::None) {
            return Ok(None);
        }
        let output = self.compress(input)?;
        Ok((output.len() < input.len()).then_some(output))
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;
    use rstest::rstest;

    fn repetitive(len: usize) -> Vec<u8> {
        b"confetti ".iter().copied().cycle().take(len).collect()
    }

    #[rstest]
    #[case(Compression::None)]
    #[case(Compression::Bzip2)]
    #[case(Compression::Gzip)]
    #[cfg_attr(feature = "zstd", case(Compression::Zstd))]
    fn test_decompress_restores_input(#[case] format: Compression) {
        let original = repetitive(4096);
        let compressed = format.compress(&original).unwrap();
        assert_eq!(format.decompress(&compressed).unwrap(), original);
    }

    #[rstest]
    #[case(Compression::Bzip2)]
    #[case(Compression::Gzip)]
    fn test_compress_if_smaller_keeps_savings(#[case] format: Compression) {
        let original = repetitive(64 * 1024);
        let compressed = format.compress_if_smaller(&original).unwrap().expect("repetitive data should shrink");
        assert!(compressed.len() < original.len());
    }

    #[test]
    fn test_compress_if_smaller_skips_growth() {
        // A handful of bytes always grows once the gzip header is added.
        assert_eq!(Compression::Gzip.compress_if_smaller(b"hi").unwrap(), None);
        assert_eq!(Compression::None.compress_if_smaller(&repetitive(1024)).unwrap(), None);
    }

    #[test]
    fn test_decompress_garbage() {
        let err = Compression::Gzip.decompress(b"definitely not gzip").unwrap_err();
        assert_eq!(*err, crate::error::ErrorKind::InvalidData);
    }
}
