use std::io::{self, Read};

use fallible_iterator::FallibleIterator;
use tracing::{debug, warn};

use crate::checksum::ChecksumHasher;
use crate::format::{detect, CpioFormat};
use crate::header::{Decoded, Header};
use crate::{binary, copy_n, skip, svr4, Error};

/// Sequential access to the entries of a cpio archive.
///
/// [`next_header`](Reader::next_header) advances to the next entry (including
/// the first), after which the `Reader` itself reads that entry's body. Three
/// conditions are kept apart:
///
/// - end of the current body: `read` returns `Ok(0)`
/// - end of the archive: `next_header` returns `Ok(None)`
/// - a corrupt archive: `next_header` returns an error
///
/// The underlying stream is only ever read forward.
pub struct Reader<R: Read> {
    /// Underlying archive stream
    inner: R,

    /// Header of the current entry, `None` before the first and after the last
    hdr: Option<Header>,

    /// Variant the current header was decoded from
    format: Option<CpioFormat>,

    /// Unread body bytes of the current entry
    remaining: u64,

    /// Filler after the current body
    pad: u64,

    /// The trailer (or a clean end of stream) was seen
    exhausted: bool,

    robust: bool,
    verify: bool,

    /// Running sum of the current body while a checksum is being verified
    hasher: Option<ChecksumHasher>,

    /// Junk bytes skipped so far in robust mode
    junk: u64,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Reader {
            inner,
            hdr: None,
            format: None,
            remaining: 0,
            pad: 0,
            exhausted: false,
            robust: false,
            verify: false,
            hasher: None,
            junk: 0,
        }
    }

    /// Skip over bytes that do not start a valid magic instead of failing.
    ///
    /// Any other header error stays fatal, as does the stream ending while
    /// looking for a magic.
    pub fn robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    /// Check the body of every CRC entry against its header checksum.
    ///
    /// The check runs once the body has been consumed, either through `read`
    /// or by `next_header` skipping it, and fails with
    /// [`Error::ChecksumMismatch`].
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Advance to the next entry, skipping whatever is left of the current one.
    ///
    /// Returns `Ok(None)` once the trailer has been read or the stream ends
    /// cleanly between entries.
    pub fn next_header(&mut self) -> Result<Option<Header>, Error> {
        if self.exhausted {
            return Ok(None);
        }

        if self.hdr.is_some() {
            self.finish_entry()?;
        }

        self.hdr = None;
        self.format = None;
        self.hasher = None;

        let detected = match detect(&mut self.inner, self.robust)? {
            Some(detected) => detected,
            None => {
                debug!("archive ended without trailer");
                self.exhausted = true;
                return Ok(None);
            }
        };

        if detected.junk > 0 {
            self.junk += detected.junk;
            warn!(junk = detected.junk, "skipped bytes of junk");
        }

        let mut src = detected.leftover().chain(&mut self.inner);
        let decoded = match detected.format {
            CpioFormat::Binary => binary::read_header(&mut src)?,
            format => svr4::read_header(&mut src, format)?,
        };

        let Some(Decoded { header, pad }) = decoded else {
            debug!("reached trailer");
            self.exhausted = true;
            return Ok(None);
        };

        debug!(
            name = %header.name_lossy(),
            size = header.size,
            format = ?detected.format,
            "read header"
        );

        if self.verify && detected.format.has_checksum() {
            let mut hasher = ChecksumHasher::new();
            // the target of a symlink is its body
            hasher.update(&header.linkname);
            self.hasher = Some(hasher);
        }

        self.format = Some(detected.format);
        self.remaining = header.size;
        self.pad = pad;
        self.hdr = Some(header.clone());

        if self.remaining == 0 {
            self.check_body()?;
        }

        Ok(Some(header))
    }

    /// Consume the rest of the current body and the padding after it
    fn finish_entry(&mut self) -> Result<(), Error> {
        match self.hasher.as_mut() {
            Some(hasher) => copy_n(&mut self.inner, self.remaining, hasher)?,
            None => skip(&mut self.inner, self.remaining)?,
        }
        self.remaining = 0;
        self.check_body()?;

        skip(&mut self.inner, self.pad)?;
        self.pad = 0;

        Ok(())
    }

    /// Compare the summed body with the header, once per entry
    fn check_body(&mut self) -> Result<(), Error> {
        let (Some(hasher), Some(hdr)) = (self.hasher.take(), self.hdr.as_ref()) else {
            return Ok(());
        };

        let actual = hasher.sum();
        if actual != hdr.checksum {
            return Err(Error::ChecksumMismatch { expected: hdr.checksum, actual });
        }

        Ok(())
    }

    /// Header of the current entry
    pub fn header(&self) -> Option<&Header> {
        self.hdr.as_ref()
    }

    /// Header variant of the current entry
    pub fn format(&self) -> Option<CpioFormat> {
        self.format
    }

    /// Total number of junk bytes skipped in robust mode
    pub fn junk_skipped(&self) -> u64 {
        self.junk
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Reads the body of the current entry.
///
/// Returns `Ok(0)` at the end of the body until `next_header` is called, and
/// before the first entry or after the last one.
impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.hdr.is_none() || buf.is_empty() {
            return Ok(0);
        }

        if self.remaining == 0 {
            self.check_body()?;
            return Ok(0);
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(Error::EarlyEOFError.into());
        }

        self.remaining -= n as u64;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..n]);
        }

        Ok(n)
    }
}

impl<R: Read> FallibleIterator for Reader<R> {
    type Item = Header;
    type Error = Error;

    fn next(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        self.next_header()
    }
}
