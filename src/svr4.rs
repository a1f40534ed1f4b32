//! SVR4 portable ASCII headers, with ("070702") and without ("070701") checksum.
//!
//! Every numeric field is 8 hex digits. The name follows the 110 byte header
//! and is padded so the body starts on a 4 byte boundary, the body itself is
//! padded to 4 bytes as well.

use std::io::{Read, Write};
use std::str::from_utf8;

use crate::checksum::Checksum;
use crate::defs::{self, CPIO_FIELDS_LEN, CPIO_FIELD_LEN, CPIO_HEADER_LEN, PATH_MAX};
use crate::format::CpioFormat;
use crate::header::{timestamp, Decoded, Header};
use crate::mode::FileMode;
use crate::{read_exact, skip, Error};

/// The 13 numeric fields following the magic, in stream order
#[derive(Debug, Default, PartialEq, Eq)]
struct NewcFields {
    c_ino       : u32,
    c_mode      : u32,
    c_uid       : u32,
    c_gid       : u32,
    c_nlink     : u32,
    c_mtime     : u32,
    c_filesize  : u32,
    c_devmajor  : u32,
    c_devminor  : u32,
    c_rdevmajor : u32,
    c_rdevminor : u32,
    c_namesize  : u32,
    c_check     : u32,
}

fn parse_field(fields: &[u8], index: usize, field_name: &str) -> Result<u32, Error> {
    let raw = &fields[index * CPIO_FIELD_LEN..(index + 1) * CPIO_FIELD_LEN];

    // from_str_radix alone would let a leading '+' through
    if !raw.iter().all(u8::is_ascii_hexdigit) {
        return Err(Error::InvalidHeader(format!("Converting '{field_name}' to u32 failed")));
    }

    let str_field = from_utf8(raw).map_err(|_|
        Error::InvalidHeader(format!("Converting '{field_name}' from utf8 failed"))
    )?;

    u32::from_str_radix(str_field, 16).map_err(|_|
        Error::InvalidHeader(format!("Converting '{field_name}' to u32 failed"))
    )
}

impl NewcFields {
    fn parse(fields: &[u8; CPIO_FIELDS_LEN]) -> Result<Self, Error> {
        Ok(NewcFields {
            c_ino       : parse_field(fields,  0, "c_ino")?,
            c_mode      : parse_field(fields,  1, "c_mode")?,
            c_uid       : parse_field(fields,  2, "c_uid")?,
            c_gid       : parse_field(fields,  3, "c_gid")?,
            c_nlink     : parse_field(fields,  4, "c_nlink")?,
            c_mtime     : parse_field(fields,  5, "c_mtime")?,
            c_filesize  : parse_field(fields,  6, "c_filesize")?,
            c_devmajor  : parse_field(fields,  7, "c_devmajor")?,
            c_devminor  : parse_field(fields,  8, "c_devminor")?,
            c_rdevmajor : parse_field(fields,  9, "c_rdevmajor")?,
            c_rdevminor : parse_field(fields, 10, "c_rdevminor")?,
            c_namesize  : parse_field(fields, 11, "c_namesize")?,
            c_check     : parse_field(fields, 12, "c_check")?,
        })
    }

    fn to_bytes(&self, format: CpioFormat) -> Vec<u8> {
        let mut out = Vec::with_capacity(CPIO_HEADER_LEN);
        out.extend_from_slice(format.magic());

        for value in [
            self.c_ino,
            self.c_mode,
            self.c_uid,
            self.c_gid,
            self.c_nlink,
            self.c_mtime,
            self.c_filesize,
            self.c_devmajor,
            self.c_devminor,
            self.c_rdevmajor,
            self.c_rdevminor,
            self.c_namesize,
            self.c_check,
        ] {
            out.extend_from_slice(format!("{value:08X}").as_bytes());
        }

        out
    }
}

/// Decode the rest of a header whose magic has already been consumed.
///
/// `Ok(None)` is returned for the trailer entry.
pub(crate) fn read_header<R: Read>(r: &mut R, format: CpioFormat) -> Result<Option<Decoded>, Error> {
    let mut raw = [0u8; CPIO_FIELDS_LEN];
    read_exact(r, &mut raw)?;
    let fields = NewcFields::parse(&raw)?;

    if !format.has_checksum() && fields.c_check != 0 {
        return Err(Error::InvalidHeader(
            format!("Non-zero checksum {:08X} in entry without checksum", fields.c_check)
        ));
    }

    let namesize = u64::from(fields.c_namesize);
    if namesize < 1 || namesize > PATH_MAX {
        return Err(Error::InvalidHeader(format!("Name size {namesize} out of range")));
    }

    let mut name = vec![0u8; namesize as usize];
    read_exact(r, &mut name)?;
    if name.pop() != Some(0) {
        return Err(Error::InvalidHeader(String::from("Name is not NUL terminated")));
    }

    if name == defs::TRAILER_NAME.as_bytes() {
        return Ok(None);
    }

    // the body starts 4-byte aligned
    skip(r, defs::pad_len(CPIO_HEADER_LEN as u64 + namesize, 4))?;

    let size = u64::from(fields.c_filesize);
    let mut header = Header {
        device_id: 0,
        inode: u64::from(fields.c_ino),
        mode: FileMode(fields.c_mode),
        uid: fields.c_uid,
        gid: fields.c_gid,
        links: fields.c_nlink,
        mod_time: timestamp(fields.c_mtime)?,
        size,
        name,
        linkname: Vec::new(),
        checksum: Checksum(fields.c_check),
    };

    if header.mode.is_symlink() {
        if size < 1 || size > PATH_MAX {
            return Err(Error::InvalidHeader(format!("Symlink target size {size} out of range")));
        }

        let mut target = vec![0u8; size as usize];
        read_exact(r, &mut target)?;
        header.linkname = target;
        header.size = 0;
    }

    Ok(Some(Decoded { header, pad: defs::pad_len(size, 4) }))
}

/// Reject headers that cannot be represented in the ASCII fields
pub(crate) fn validate(hdr: &Header) -> Result<(), Error> {
    if hdr.size > u64::from(u32::MAX) {
        return Err(Error::InvalidHeader(format!("Size {} does not fit the header", hdr.size)));
    }

    if hdr.inode > u64::from(u32::MAX) {
        return Err(Error::InvalidHeader(format!("Inode {} does not fit the header", hdr.inode)));
    }

    let mtime = hdr.mod_time.timestamp();
    if u32::try_from(mtime).is_err() {
        return Err(Error::InvalidHeader(format!("Modification time {mtime} does not fit the header")));
    }

    if hdr.name.is_empty() || hdr.name.contains(&0) {
        return Err(Error::InvalidHeader(format!("Invalid entry name {:?}", hdr.name_lossy())));
    }

    if hdr.name.len() as u64 + 1 > PATH_MAX {
        return Err(Error::InvalidHeader(format!("Name of {} bytes is too long", hdr.name.len())));
    }

    Ok(())
}

/// Encode `hdr` including its name and the padding up to the body.
///
/// The CRC variant is used when the header carries a checksum. Returns the
/// number of padding bytes owed after `hdr.size` bytes of body.
pub(crate) fn write_header<W: Write>(w: &mut W, hdr: &Header) -> Result<u64, Error> {
    validate(hdr)?;

    let format = if hdr.checksum.is_zero() {
        CpioFormat::Newc
    } else {
        CpioFormat::Crc
    };

    // device numbers are not carried over
    let entry = NewcFields {
        c_ino       : hdr.inode as u32,
        c_mode      : hdr.mode.bits(),
        c_uid       : hdr.uid,
        c_gid       : hdr.gid,
        c_nlink     : hdr.links,
        c_mtime     : hdr.mod_time.timestamp() as u32,
        c_filesize  : hdr.size as u32,
        c_namesize  : (hdr.name.len() + 1) as u32,
        c_check     : hdr.checksum.0,
        ..Default::default()
    };

    let mut entry_data = entry.to_bytes(format);

    // null-terminated internal path
    entry_data.extend_from_slice(&hdr.name);
    entry_data.push(0);

    // pad to four byte alignment before start of file contents
    let pad = defs::pad_len(entry_data.len() as u64, 4);
    entry_data.resize(entry_data.len() + pad as usize, 0);

    w.write_all(&entry_data)?;

    Ok(defs::pad_len(hdr.size, 4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::FileType;
    use std::io::Cursor;

    /// Header bytes after the magic, as a real cpio would write them
    fn raw_fields(mode: u32, size: u32, namesize: u32, check: u32) -> String {
        format!(
            "{:08X}{mode:08X}{:08X}{:08X}{:08X}{:08X}{size:08X}{}{namesize:08X}{check:08X}",
            0x1234, 1000, 100, 1, 0x5f5e1000, "0".repeat(32)
        )
    }

    fn decode(data: &[u8], format: CpioFormat) -> Result<Option<Decoded>, Error> {
        read_header(&mut Cursor::new(data), format)
    }

    #[test]
    fn decodes_regular_file() {
        // 110 + 9 bytes of name puts the body at offset 120
        let mut data = raw_fields(0o100644, 5, 9, 0).into_bytes();
        data.extend_from_slice(b"dir/file\0");
        data.push(0);
        data.extend_from_slice(b"hello");

        let mut cursor = Cursor::new(&data[..]);
        let decoded = read_header(&mut cursor, CpioFormat::Newc).unwrap().unwrap();
        let hdr = decoded.header;

        assert_eq!(hdr.inode, 0x1234);
        assert_eq!(hdr.mode, FileMode(0o100644));
        assert_eq!(hdr.uid, 1000);
        assert_eq!(hdr.gid, 100);
        assert_eq!(hdr.links, 1);
        assert_eq!(hdr.mod_time.timestamp(), 0x5f5e1000);
        assert_eq!(hdr.size, 5);
        assert_eq!(hdr.name, b"dir/file");
        assert_eq!(decoded.pad, 3);
        assert_eq!(cursor.position() as usize, data.len() - 5);
    }

    #[test]
    fn lowercase_hex_is_accepted() {
        let mut data = raw_fields(0o100644, 0, 2, 0).to_lowercase().into_bytes();
        data.extend_from_slice(b"a\0");
        let hdr = decode(&data, CpioFormat::Newc).unwrap().unwrap().header;
        assert_eq!(hdr.inode, 0x1234);
    }

    #[test]
    fn trailer_ends_archive() {
        let mut data = raw_fields(0, 0, 11, 0).into_bytes();
        data.extend_from_slice(b"TRAILER!!!\0");
        assert!(decode(&data, CpioFormat::Newc).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_fields() {
        let mut data = raw_fields(0o100644, 0, 2, 7).into_bytes();
        data.extend_from_slice(b"a\0");
        assert!(matches!(decode(&data, CpioFormat::Newc), Err(Error::InvalidHeader(_))));
        assert!(decode(&data, CpioFormat::Crc).is_ok());

        let data = raw_fields(0o100644, 0, 0, 0).into_bytes();
        assert!(matches!(decode(&data, CpioFormat::Newc), Err(Error::InvalidHeader(_))));

        let data = raw_fields(0o100644, 0, 4097, 0).into_bytes();
        assert!(matches!(decode(&data, CpioFormat::Newc), Err(Error::InvalidHeader(_))));

        let mut data = raw_fields(0o100644, 0, 2, 0).into_bytes();
        data.extend_from_slice(b"ab");
        assert!(matches!(decode(&data, CpioFormat::Newc), Err(Error::InvalidHeader(_))));

        let mut data = raw_fields(0o100644, 0, 2, 0).into_bytes();
        data[10] = b'G';
        data.extend_from_slice(b"a\0");
        assert!(matches!(decode(&data, CpioFormat::Newc), Err(Error::InvalidHeader(_))));

        // signs are not hex digits
        let mut data = raw_fields(0o100644, 0, 2, 0).into_bytes();
        data[..8].copy_from_slice(b"+0000001");
        data.extend_from_slice(b"a\0");
        assert!(matches!(decode(&data, CpioFormat::Newc), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn non_utf8_names_are_kept() {
        let mut data = raw_fields(0o120777, 3, 5, 0).into_bytes();
        data.extend_from_slice(b"caf\xe9\0");
        data.push(0);
        data.extend_from_slice(b"\xff/x");

        let decoded = decode(&data, CpioFormat::Newc).unwrap().unwrap();
        assert_eq!(decoded.header.name, b"caf\xe9");
        assert_eq!(decoded.header.linkname, b"\xff/x");

        let mut out = vec![];
        let hdr = Header::new(&b"caf\xe9"[..], FileMode(0o100644), 0);
        write_header(&mut out, &hdr).unwrap();
        let decoded = decode(&out[6..], CpioFormat::Newc).unwrap().unwrap();
        assert_eq!(decoded.header.name, b"caf\xe9");
    }

    #[test]
    fn truncated_header_is_early_eof() {
        let data = raw_fields(0o100644, 0, 2, 0).into_bytes();
        assert!(matches!(decode(&data[..50], CpioFormat::Newc), Err(Error::EarlyEOFError)));
    }

    #[test]
    fn symlink_target_is_read_into_linkname() {
        let mut data = raw_fields(0o120777, 11, 5, 0).into_bytes();
        data.extend_from_slice(b"link\0");
        data.push(0);
        data.extend_from_slice(b"target/path");

        let decoded = decode(&data, CpioFormat::Newc).unwrap().unwrap();
        assert_eq!(decoded.header.size, 0);
        assert_eq!(decoded.header.linkname, b"target/path");
        assert_eq!(decoded.pad, 1);

        let mut data = raw_fields(0o120777, 0, 5, 0).into_bytes();
        data.extend_from_slice(b"link\0");
        data.push(0);
        assert!(matches!(decode(&data, CpioFormat::Newc), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn encodes_trailer_like_gnu_cpio() {
        let trailer = Header {
            name: b"TRAILER!!!".to_vec(),
            links: 1,
            ..Default::default()
        };

        let mut out = vec![];
        let pad = write_header(&mut out, &trailer).unwrap();
        assert_eq!(pad, 0);

        let mut expected = b"070701".to_vec();
        expected.extend_from_slice(b"00000000000000000000000000000000000000010000000000000000000000000000000000000000000000000000000B00000000TRAILER!!!\0");
        expected.extend_from_slice(&[0, 0, 0]);
        assert_eq!(out, expected);
    }

    #[test]
    fn encode_then_decode() {
        let mut hdr = Header::new("some/file.txt", FileMode::new(FileType::Regular, 0o600), 6);
        hdr.inode = 42;
        hdr.uid = 7;
        hdr.checksum = Checksum(0x99);
        hdr.mod_time = timestamp(1_000_000).unwrap();

        let mut out = vec![];
        let pad = write_header(&mut out, &hdr).unwrap();
        assert_eq!(pad, 2);
        assert_eq!(&out[..6], b"070702");
        assert_eq!(out.len() % 4, 0);

        let decoded = decode(&out[6..], CpioFormat::Crc).unwrap().unwrap();
        assert_eq!(decoded.header, hdr);
        assert_eq!(decoded.pad, 2);
    }

    #[test]
    fn encode_rejects_unrepresentable_headers() {
        let too_big = Header::new("big", FileMode(0o100644), u64::from(u32::MAX) + 1);
        assert!(matches!(write_header(&mut vec![], &too_big), Err(Error::InvalidHeader(_))));

        let unnamed = Header::new("", FileMode(0o100644), 0);
        assert!(matches!(write_header(&mut vec![], &unnamed), Err(Error::InvalidHeader(_))));

        let long = Header::new("x".repeat(4096), FileMode(0o100644), 0);
        assert!(matches!(write_header(&mut vec![], &long), Err(Error::InvalidHeader(_))));

        let mut old = Header::new("old", FileMode(0o100644), 0);
        old.mod_time = chrono::DateTime::from_timestamp(-1, 0).unwrap();
        assert!(matches!(write_header(&mut vec![], &old), Err(Error::InvalidHeader(_))));
    }
}
