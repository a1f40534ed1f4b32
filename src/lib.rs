//! Streaming reader and writer for cpio archives.
//!
//! [`Reader`] decodes the old binary (little-endian), SVR4 "newc" and SVR4
//! CRC header variants. [`Writer`] produces SVR4 archives, using the CRC
//! variant for entries that carry a checksum.
//!
//! ```no_run
//! use std::io;
//! use cpio_stream::{FileMode, FileType, Header, Reader, Writer};
//!
//! # fn main() -> Result<(), cpio_stream::Error> {
//! let mut writer = Writer::new(vec![]);
//! let mut hdr = Header::new("hello.txt", FileMode::new(FileType::Regular, 0o644), 5);
//! writer.write_header(&mut hdr)?;
//! writer.write_body(b"hello")?;
//! writer.close()?;
//!
//! let archive = writer.into_inner();
//! let mut reader = Reader::new(&archive[..]);
//! while let Some(hdr) = reader.next_header()? {
//!     println!("=== {} ===", hdr.name_lossy());
//!     io::copy(&mut reader, &mut io::stdout())?;
//! }
//! # Ok(())
//! # }
//! ```

mod binary;
mod checksum;
mod defs;
mod format;
mod header;
mod mode;
mod reader;
mod svr4;
mod writer;

use std::io::{self, Read, Write};

pub use checksum::{Checksum, ChecksumHasher};
pub use format::CpioFormat;
pub use header::{FileInfo, Header};
pub use mode::{FileMode, FileType};
pub use reader::Reader;
pub use writer::Writer;

/// Error type for reading and writing cpio archives
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Unexpected end of file")]
    EarlyEOFError,

    #[error("Unrecognized magic: {0:02x?}")]
    Magic(Vec<u8>),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Checksum mismatch: header has {expected}, body sums to {actual}")]
    ChecksumMismatch {
        expected: Checksum,
        actual: Checksum,
    },

    #[error("Write too long")]
    WriteTooLong,

    #[error("Write after close")]
    WriteAfterClose,

    #[error("Missed writing {0} bytes")]
    MissedBytes(u64),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => {
                let kind = match &other {
                    Error::EarlyEOFError => io::ErrorKind::UnexpectedEof,
                    Error::WriteTooLong
                    | Error::WriteAfterClose
                    | Error::MissedBytes(_) => io::ErrorKind::InvalidInput,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

/// `read_exact` reporting a short stream as [`Error::EarlyEOFError`]
pub(crate) fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), Error> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::EarlyEOFError
        } else {
            Error::Io(e)
        }
    })
}

/// Move exactly `n` bytes from `r` to `w`
pub(crate) fn copy_n<R: Read, W: Write>(r: &mut R, n: u64, w: &mut W) -> Result<(), Error> {
    if n == 0 {
        return Ok(());
    }

    let copied = io::copy(&mut r.by_ref().take(n), w)?;
    if copied < n {
        return Err(Error::EarlyEOFError);
    }

    Ok(())
}

pub(crate) fn skip<R: Read>(r: &mut R, n: u64) -> Result<(), Error> {
    copy_n(r, n, &mut io::sink())
}
