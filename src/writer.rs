use std::io::{self, Write};

use tracing::debug;

use crate::defs::{self, PATH_MAX};
use crate::header::Header;
use crate::{svr4, Error};

/// Zeroed buffer to copy for padding
const ZERO_BLOCK: [u8; 4] = [0; 4];

/// Sequential writer of SVR4 cpio archives.
///
/// Call [`write_header`](Writer::write_header) to begin an entry, then supply
/// exactly `hdr.size` bytes of body through [`write_body`](Writer::write_body)
/// or the [`Write`] impl. [`close`](Writer::close) appends the trailer.
pub struct Writer<W: Write> {
    inner: W,

    /// Number of unwritten body bytes of the current entry
    nb: u64,

    /// Padding to write once the current body is complete
    pad: u64,

    closed: bool,

    /// Last inode number handed out
    inode: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Writer {
            inner,
            nb: 0,
            pad: 0,
            closed: false,
            inode: 0,
        }
    }

    /// Write `hdr` and prepare to accept the entry's body.
    ///
    /// Finishes the previous entry first, see [`flush_entry`](Writer::flush_entry).
    /// Inode numbers are assigned by the writer: `hdr.inode` is overwritten
    /// with the next number in sequence once the header has been written. A
    /// rejected header leaves both `hdr` and the sequence untouched.
    ///
    /// A symlink with a `linkname` and a `size` of 0 gets the target written
    /// as its body right away. Otherwise the target is expected as body bytes.
    pub fn write_header(&mut self, hdr: &mut Header) -> Result<(), Error> {
        if self.closed {
            return Err(Error::WriteAfterClose);
        }

        if hdr.name == defs::TRAILER_NAME.as_bytes() {
            return Err(Error::InvalidHeader(format!("{} is reserved for the trailer", defs::TRAILER_NAME)));
        }

        let target_body = hdr.is_symlink() && hdr.size == 0 && !hdr.linkname.is_empty();
        if target_body && hdr.linkname.len() as u64 > PATH_MAX {
            return Err(Error::InvalidHeader(
                format!("Symlink target of {} bytes is too long", hdr.linkname.len())
            ));
        }

        let entry = Header {
            inode: self.inode + 1,
            size: if target_body { hdr.linkname.len() as u64 } else { hdr.size },
            ..hdr.clone()
        };
        svr4::validate(&entry)?;

        self.flush_entry()?;

        self.pad = svr4::write_header(&mut self.inner, &entry)?;
        if target_body {
            self.inner.write_all(&entry.linkname)?;
            self.nb = 0;
        } else {
            self.nb = entry.size;
        }

        self.inode = entry.inode;
        hdr.inode = entry.inode;

        debug!(name = %hdr.name_lossy(), inode = hdr.inode, size = hdr.size, "wrote header");

        Ok(())
    }

    /// Write body bytes of the current entry.
    ///
    /// Bytes beyond the size declared in the header are not written and
    /// [`Error::WriteTooLong`] is returned.
    pub fn write_body(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::WriteAfterClose);
        }

        let budget = usize::try_from(self.nb).unwrap_or(usize::MAX);
        let (body, excess) = data.split_at(data.len().min(budget));

        self.inner.write_all(body)?;
        self.nb -= body.len() as u64;

        if !excess.is_empty() {
            return Err(Error::WriteTooLong);
        }

        Ok(())
    }

    /// Finish the current entry by writing its padding.
    ///
    /// Fails with [`Error::MissedBytes`] if the body is incomplete.
    pub fn flush_entry(&mut self) -> Result<(), Error> {
        if self.nb > 0 {
            return Err(Error::MissedBytes(self.nb));
        }

        if self.pad > 0 {
            self.inner.write_all(&ZERO_BLOCK[..self.pad as usize])?;
            self.pad = 0;
        }

        Ok(())
    }

    /// Finish the last entry and write the trailer.
    ///
    /// Closing an already closed writer does nothing. The underlying sink is
    /// flushed but not closed.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }

        self.flush_entry()?;

        let trailer = Header {
            name: defs::TRAILER_NAME.as_bytes().to_vec(),
            links: 1,
            ..Default::default()
        };
        svr4::write_header(&mut self.inner, &trailer)?;
        self.inner.flush()?;

        self.closed = true;
        debug!(entries = self.inode, "wrote trailer");

        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Give back the sink, closed or not
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Writes body bytes of the current entry.
///
/// A write is cut short at the declared size, a write with no budget left
/// fails with [`Error::WriteTooLong`]. `write_all` thus writes exactly the
/// declared size and then reports the error.
impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(Error::WriteAfterClose.into());
        }

        if buf.is_empty() {
            return Ok(0);
        }

        if self.nb == 0 {
            return Err(Error::WriteTooLong.into());
        }

        let max = buf.len().min(usize::try_from(self.nb).unwrap_or(usize::MAX));
        let n = self.inner.write(&buf[..max])?;
        self.nb -= n as u64;

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
