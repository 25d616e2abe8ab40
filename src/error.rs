//! CLI Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Arguments parsed, but their values are unusable.
    #[display("invalid arguments")]
    Arguments,
    #[display("configuration error")]
    Config,
    /// A file named on the command line couldn't be read.
    #[display("could not read {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    #[display("upload rejected")]
    Upload,
    #[display("could not write output")]
    Output,
}
