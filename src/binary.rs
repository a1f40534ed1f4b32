//! Old binary headers ("070707" stored as the 16 bit word 0x71c7).
//!
//! Only the little-endian flavour is decoded. Writing this format is not
//! supported.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum::Checksum;
use crate::defs::{self, BINARY_FIELDS_LEN, BINARY_MAGIC_LEN, PATH_MAX};
use crate::header::{timestamp, Decoded, Header};
use crate::mode::FileMode;
use crate::{read_exact, skip, Error};

fn read_u16(b: &[u8]) -> u16 {
    LittleEndian::read_u16(b)
}

/// 32 bit values are stored as two 16 bit words, most significant word first.
///
/// The words themselves are taken as little-endian. This matches archives
/// written on little-endian machines only.
fn read_halfwords(b: &[u8]) -> u32 {
    (u32::from(read_u16(&b[0..2])) << 16) | u32::from(read_u16(&b[2..4]))
}

/// Decode the rest of a header whose magic has already been consumed.
///
/// `Ok(None)` is returned for the trailer entry.
pub(crate) fn read_header<R: Read>(r: &mut R) -> Result<Option<Decoded>, Error> {
    let mut buf = [0u8; BINARY_FIELDS_LEN];
    read_exact(r, &mut buf)?;

    // rdev at buf[12..14] is skipped
    let mtime     = read_halfwords(&buf[14..18]);
    let namesize  = u64::from(read_u16(&buf[18..20]));
    let size      = u64::from(read_halfwords(&buf[20..24]));

    if namesize < 1 {
        return Err(Error::InvalidHeader(String::from("Name size 0 in binary header")));
    }

    let mut name = vec![0u8; namesize as usize];
    read_exact(r, &mut name)?;
    if name.pop() != Some(0) {
        return Err(Error::InvalidHeader(String::from("Name is not NUL terminated")));
    }

    if name == defs::TRAILER_NAME.as_bytes() {
        return Ok(None);
    }

    // the body starts 2-byte aligned
    skip(r, defs::pad_len((BINARY_MAGIC_LEN + BINARY_FIELDS_LEN) as u64 + namesize, 2))?;

    let mut header = Header {
        device_id: u32::from(read_u16(&buf[0..2])),
        inode: u64::from(read_u16(&buf[2..4])),
        mode: FileMode(u32::from(read_u16(&buf[4..6]))),
        uid: u32::from(read_u16(&buf[6..8])),
        gid: u32::from(read_u16(&buf[8..10])),
        links: u32::from(read_u16(&buf[10..12])),
        mod_time: timestamp(mtime)?,
        size,
        name,
        linkname: Vec::new(),
        checksum: Checksum::default(),
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

    Ok(Some(Decoded { header, pad: defs::pad_len(size, 2) }))
}
