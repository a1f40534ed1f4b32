use std::io::{self, Read};

use crate::defs::{self, BINARY_MAGIC_LEN, CPIO_MAGIC_LEN};
use crate::Error;

/// On-disk header variant of an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpioFormat {
    /// Old binary format, little-endian words
    Binary,
    /// SVR4 portable ASCII ("newc")
    Newc,
    /// SVR4 portable ASCII with checksum
    Crc,
}

impl CpioFormat {
    pub fn magic(self) -> &'static [u8] {
        match self {
            CpioFormat::Binary => defs::BINARY_MAGIC,
            CpioFormat::Newc => defs::NEWC_MAGIC,
            CpioFormat::Crc => defs::CRC_MAGIC,
        }
    }

    /// Whether entries of this variant carry a body checksum
    pub fn has_checksum(self) -> bool {
        matches!(self, CpioFormat::Crc)
    }
}

/// Outcome of a successful magic match.
///
/// When robust scanning slid over junk, a few bytes past the magic may already
/// have been pulled from the stream. They belong to the header and must be
/// decoded before anything else is read.
pub(crate) struct Detected {
    pub format: CpioFormat,
    pub junk: u64,
    window: [u8; CPIO_MAGIC_LEN],
    start: usize,
    len: usize,
}

impl Detected {
    pub fn leftover(&self) -> &[u8] {
        &self.window[self.start..self.len]
    }
}

/// Read until `window` holds `want` bytes. `false` if the stream ended first.
fn fill<R: Read>(
    r: &mut R,
    window: &mut [u8; CPIO_MAGIC_LEN],
    len: &mut usize,
    want: usize
) -> Result<bool, Error> {
    while *len < want {
        match r.read(&mut window[*len..want]) {
            Ok(0) => return Ok(false),
            Ok(n) => *len += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Identify the header variant at the current stream position.
///
/// Reads the 2-byte binary magic first and only pulls 4 more bytes when they
/// start an ASCII magic. Without `robust`, a mismatch fails with
/// [`Error::Magic`] holding the 2 or 6 bytes consumed. With `robust`, the
/// first byte is dropped as junk and matching restarts one byte later, so no
/// magic is ever stepped over.
///
/// `Ok(None)` means the stream ended cleanly before a single byte was read.
pub(crate) fn detect<R: Read>(r: &mut R, robust: bool) -> Result<Option<Detected>, Error> {
    let mut window = [0u8; CPIO_MAGIC_LEN];
    let mut len = 0;
    let mut junk = 0u64;

    loop {
        if !fill(r, &mut window, &mut len, BINARY_MAGIC_LEN)? {
            if len == 0 && junk == 0 {
                return Ok(None);
            }
            return Err(Error::EarlyEOFError);
        }

        if &window[..BINARY_MAGIC_LEN] == defs::BINARY_MAGIC {
            return Ok(Some(Detected {
                format: CpioFormat::Binary,
                junk,
                window,
                start: BINARY_MAGIC_LEN,
                len,
            }));
        }

        if window[..BINARY_MAGIC_LEN] == defs::NEWC_MAGIC[..BINARY_MAGIC_LEN] {
            if !fill(r, &mut window, &mut len, CPIO_MAGIC_LEN)? {
                return Err(Error::EarlyEOFError);
            }

            let format = if &window[..] == defs::NEWC_MAGIC {
                Some(CpioFormat::Newc)
            } else if &window[..] == defs::CRC_MAGIC {
                Some(CpioFormat::Crc)
            } else {
                None
            };

            if let Some(format) = format {
                return Ok(Some(Detected {
                    format,
                    junk,
                    window,
                    start: CPIO_MAGIC_LEN,
                    len,
                }));
            }
        }

        if !robust {
            return Err(Error::Magic(window[..len].to_vec()));
        }

        window.copy_within(1..len, 0);
        len -= 1;
        junk += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn detect_all(data: &[u8], robust: bool) -> (Result<Option<Detected>, Error>, u64) {
        let mut cursor = Cursor::new(data);
        let res = detect(&mut cursor, robust);
        (res, cursor.position())
    }

    #[test]
    fn detects_each_variant() {
        let (res, pos) = detect_all(b"\xc7\x71rest", false);
        let detected = res.unwrap().unwrap();
        assert_eq!(detected.format, CpioFormat::Binary);
        assert!(detected.leftover().is_empty());
        assert_eq!(pos, 2);

        let (res, pos) = detect_all(b"070701rest", false);
        assert_eq!(res.unwrap().unwrap().format, CpioFormat::Newc);
        assert_eq!(pos, 6);

        let (res, pos) = detect_all(b"070702rest", false);
        assert_eq!(res.unwrap().unwrap().format, CpioFormat::Crc);
        assert_eq!(pos, 6);
    }

    #[test]
    fn mismatch_reports_consumed_bytes() {
        let (res, pos) = detect_all(b"xy070701", false);
        match res {
            Err(Error::Magic(bytes)) => assert_eq!(bytes, b"xy"),
            _ => panic!("expected magic error"),
        }
        assert_eq!(pos, 2);

        let (res, pos) = detect_all(b"070707rest", false);
        match res {
            Err(Error::Magic(bytes)) => assert_eq!(bytes, b"070707"),
            _ => panic!("expected magic error"),
        }
        assert_eq!(pos, 6);
    }

    #[test]
    fn clean_and_early_eof() {
        let (res, _) = detect_all(b"", false);
        assert!(res.unwrap().is_none());

        let (res, _) = detect_all(b"0", false);
        assert!(matches!(res, Err(Error::EarlyEOFError)));

        let (res, _) = detect_all(b"0707", false);
        assert!(matches!(res, Err(Error::EarlyEOFError)));
    }

    #[test]
    fn robust_skips_odd_junk() {
        let (res, pos) = detect_all(b"abc070701", true);
        let detected = res.unwrap().unwrap();
        assert_eq!(detected.format, CpioFormat::Newc);
        assert_eq!(detected.junk, 3);
        assert_eq!(pos, 9);
    }

    #[test]
    fn robust_finds_magic_inside_failed_window() {
        // "07" starts an ascii magic that fails, the real one starts inside it
        let (res, _) = detect_all(b"07070701", true);
        let detected = res.unwrap().unwrap();
        assert_eq!(detected.format, CpioFormat::Newc);
        assert_eq!(detected.junk, 2);
        assert!(detected.leftover().is_empty());

        let (res, pos) = detect_all(b"07\xc7\x71ab--", true);
        let detected = res.unwrap().unwrap();
        assert_eq!(detected.format, CpioFormat::Binary);
        assert_eq!(detected.junk, 2);
        assert_eq!(detected.leftover(), b"ab");
        assert_eq!(pos, 6);
    }

    #[test]
    fn robust_eof_is_fatal() {
        let (res, _) = detect_all(b"junk", true);
        assert!(matches!(res, Err(Error::EarlyEOFError)));
    }
}
